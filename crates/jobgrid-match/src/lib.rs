//! Profile-to-job match scoring for JobGrid.
//!
//! Scoring is a pure function of the (profile, job) pair: the primary signal
//! is the fraction of the job's skills the profile covers, with bounded
//! bonuses for experience-level and location fit. Reasons are threshold-based
//! annotations layered on top of the score, never inputs back into it.

use std::cmp::Ordering;
use std::collections::HashSet;

use jobgrid_core::{Job, LocationType, Profile};
use thiserror::Error;

pub const CRATE_NAME: &str = "jobgrid-match";

/// Weight of the skill-coverage fraction. The three weights sum to 1.0 so a
/// perfect match lands exactly on the score ceiling.
pub const SKILL_WEIGHT: f64 = 0.7;
pub const EXPERIENCE_BONUS: f64 = 0.15;
pub const LOCATION_BONUS: f64 = 0.15;

pub const EXCELLENT_THRESHOLD: f64 = 0.8;
pub const GOOD_THRESHOLD: f64 = 0.6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("{entity} is missing an identifier")]
    MissingIdentity { entity: &'static str },
}

/// A job annotated with its score and match reasons for one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredJob {
    pub job: Job,
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Score one job against one profile. Deterministic, side-effect free, and
/// total over well-typed input: empty skill lists on either side contribute
/// zero rather than dividing by zero.
pub fn score_job(profile: &Profile, job: &Job) -> (f64, Vec<String>) {
    let profile_skills = normalized_skill_set(&profile.skills);
    let job_skills = normalized_skill_set(&job.skills);

    let skill_fraction = if job_skills.is_empty() {
        0.0
    } else {
        let overlap = job_skills
            .iter()
            .filter(|skill| profile_skills.contains(*skill))
            .count();
        overlap as f64 / job_skills.len() as f64
    };

    let experience_matched = profile
        .desired_experience
        .is_some_and(|wanted| wanted == job.experience_level);
    let location_matched = location_satisfied(profile, job);

    let mut score = skill_fraction * SKILL_WEIGHT;
    if experience_matched {
        score += EXPERIENCE_BONUS;
    }
    if location_matched {
        score += LOCATION_BONUS;
    }
    let score = score.clamp(0.0, 1.0);

    let mut reasons = Vec::new();
    if score >= EXCELLENT_THRESHOLD {
        reasons.push("Excellent skill match".to_string());
    } else if score >= GOOD_THRESHOLD {
        reasons.push("Good skill match".to_string());
    }
    if job.location_type == LocationType::Remote {
        reasons.push("Remote position".to_string());
    }
    if experience_matched {
        reasons.push("Experience level match".to_string());
    }

    (score, reasons)
}

/// Score every candidate, stable-sort descending by score (ties keep their
/// input order), and truncate to `top_k`.
pub fn rank_jobs(profile: &Profile, jobs: Vec<Job>, top_k: usize) -> Result<Vec<ScoredJob>, MatchError> {
    if profile.id.is_nil() {
        return Err(MatchError::MissingIdentity { entity: "profile" });
    }

    let mut scored = Vec::with_capacity(jobs.len());
    for job in jobs {
        if job.id.is_nil() {
            return Err(MatchError::MissingIdentity { entity: "job" });
        }
        let (score, reasons) = score_job(profile, &job);
        scored.push(ScoredJob { job, score, reasons });
    }

    // Vec::sort_by is stable, so equal scores preserve input order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}

fn normalized_skill_set(skills: &[String]) -> HashSet<String> {
    skills
        .iter()
        .map(|skill| skill.trim().to_lowercase())
        .filter(|skill| !skill.is_empty())
        .collect()
}

fn location_satisfied(profile: &Profile, job: &Job) -> bool {
    if let Some(wanted) = profile.desired_location_type {
        if wanted == job.location_type {
            return true;
        }
    }
    let Some(preferred) = profile.preferred_location.as_deref() else {
        return false;
    };
    let preferred = preferred.trim().to_lowercase();
    if preferred.is_empty() {
        return false;
    }
    // A bare "remote" preference is satisfied by any remote job no matter
    // what its literal location string says.
    if preferred == "remote" {
        return job.location_type == LocationType::Remote;
    }
    job.location.to_lowercase().contains(&preferred)
}
