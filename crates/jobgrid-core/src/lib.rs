//! Core domain model and normalization utilities for JobGrid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

pub const CRATE_NAME: &str = "jobgrid-core";

/// Where a role is performed. Unrecognized import values fall back to `Remote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LocationType {
    #[default]
    Remote,
    Hybrid,
    #[serde(rename = "On-site")]
    OnSite,
}

impl LocationType {
    pub fn parse(input: &str) -> Option<Self> {
        match normalize_token(input).as_str() {
            "remote" => Some(Self::Remote),
            "hybrid" => Some(Self::Hybrid),
            "onsite" | "office" | "inoffice" => Some(Self::OnSite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "Remote",
            Self::Hybrid => "Hybrid",
            Self::OnSite => "On-site",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract shape of the posting. Unrecognized import values fall back to `Full-time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmploymentType {
    #[default]
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Internship,
}

impl EmploymentType {
    pub fn parse(input: &str) -> Option<Self> {
        match normalize_token(input).as_str() {
            "fulltime" => Some(Self::FullTime),
            "parttime" => Some(Self::PartTime),
            "contract" | "contractor" | "freelance" => Some(Self::Contract),
            "internship" | "intern" => Some(Self::Internship),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullTime => "Full-time",
            Self::PartTime => "Part-time",
            Self::Contract => "Contract",
            Self::Internship => "Internship",
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seniority band of the posting. Unrecognized import values fall back to `Mid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Entry,
    #[default]
    Mid,
    Senior,
    Lead,
    Executive,
}

impl ExperienceLevel {
    pub fn parse(input: &str) -> Option<Self> {
        match normalize_token(input).as_str() {
            "entry" | "entrylevel" | "junior" => Some(Self::Entry),
            "mid" | "midlevel" | "intermediate" => Some(Self::Mid),
            "senior" => Some(Self::Senior),
            "lead" | "principal" => Some(Self::Lead),
            "executive" => Some(Self::Executive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "Entry",
            Self::Mid => "Mid",
            Self::Senior => "Senior",
            Self::Lead => "Lead",
            Self::Executive => "Executive",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's professional attributes used for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub skills: Vec<String>,
    pub preferred_location: Option<String>,
    pub desired_location_type: Option<LocationType>,
    pub desired_employment_type: Option<EmploymentType>,
    pub desired_experience: Option<ExperienceLevel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employer entity. `slug` is unique and is the natural key for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A job posting. `content_hash` identifies "the same posting" across
/// re-submissions; expired postings are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    pub skills: Vec<String>,
    pub location: String,
    pub location_type: LocationType,
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<String>,
    pub apply_url: Option<String>,
    pub is_easy_apply: bool,
    pub is_featured: bool,
    pub is_active: bool,
    pub content_hash: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Eligible for display and matching at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// URL-safe identifier: lowercase, whitespace becomes hyphens, anything
/// outside `[a-z0-9-]` is stripped. Idempotent.
pub fn slugify(input: &str) -> String {
    input
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Stable dedup fingerprint over the identity-defining fields of a posting.
///
/// Each field is trimmed, lowercased, and has internal whitespace runs
/// collapsed before hashing, so re-submissions that differ only in casing or
/// formatting map to the same row.
pub fn content_fingerprint(title: &str, company_name: &str, description: &str) -> String {
    let canonical = format!(
        "{}\n{}\n{}",
        collapse_whitespace(title),
        collapse_whitespace(company_name),
        collapse_whitespace(description)
    );
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn collapse_whitespace(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_token(input: &str) -> String {
    input
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_strips_and_hyphenates() {
        assert_eq!(slugify("Acme Corp."), "acme-corp");
        assert_eq!(slugify("  Rust & Systems  Engineer "), "--rust--systems--engineer-");
        assert_eq!(slugify("already-slugified-123"), "already-slugified-123");
    }

    #[test]
    fn slugify_is_idempotent() {
        for input in ["Acme Corp.", "Héllo Wörld", "a  b\tc", "UPPER-case", ""] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = content_fingerprint("Backend Engineer", "Acme", "Build services.");
        let b = content_fingerprint("Backend Engineer", "Acme", "Build services.");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_ignores_case_and_whitespace() {
        let a = content_fingerprint("Backend Engineer", "Acme", "Build  services.\n");
        let b = content_fingerprint("backend engineer", " ACME ", "build services.");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_separates_fields() {
        // The field boundary must survive normalization.
        let a = content_fingerprint("a b", "c", "d");
        let b = content_fingerprint("a", "b c", "d");
        assert_ne!(a, b);
    }

    #[test]
    fn enums_parse_spelling_variants() {
        assert_eq!(LocationType::parse("On-site"), Some(LocationType::OnSite));
        assert_eq!(LocationType::parse("onsite"), Some(LocationType::OnSite));
        assert_eq!(LocationType::parse("REMOTE"), Some(LocationType::Remote));
        assert_eq!(EmploymentType::parse("full time"), Some(EmploymentType::FullTime));
        assert_eq!(EmploymentType::parse("Full-time"), Some(EmploymentType::FullTime));
        assert_eq!(ExperienceLevel::parse("entry-level"), Some(ExperienceLevel::Entry));
        assert_eq!(ExperienceLevel::parse("Senior"), Some(ExperienceLevel::Senior));
    }

    #[test]
    fn enums_reject_unknown_values() {
        assert_eq!(LocationType::parse("lunar"), None);
        assert_eq!(EmploymentType::parse("gig"), None);
        assert_eq!(ExperienceLevel::parse("wizard"), None);
    }

    #[test]
    fn enum_defaults_match_ingestion_policy() {
        assert_eq!(LocationType::default(), LocationType::Remote);
        assert_eq!(EmploymentType::default(), EmploymentType::FullTime);
        assert_eq!(ExperienceLevel::default(), ExperienceLevel::Mid);
    }

    #[test]
    fn enum_wire_strings_round_trip() {
        for (json, variant) in [
            ("\"Remote\"", LocationType::Remote),
            ("\"On-site\"", LocationType::OnSite),
        ] {
            let parsed: LocationType = serde_json::from_str(json).expect("deserialize");
            assert_eq!(parsed, variant);
            assert_eq!(serde_json::to_string(&variant).expect("serialize"), json);
        }
        assert_eq!(
            serde_json::to_string(&EmploymentType::FullTime).expect("serialize"),
            "\"Full-time\""
        );
    }
}
