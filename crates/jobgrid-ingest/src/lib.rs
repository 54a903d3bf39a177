//! Bulk import pipeline: content-hash dedup, company resolution, lenient
//! enum normalization, and an itemized per-row report.
//!
//! Rows are processed independently and in input order. A row's failure is
//! recorded in its error slot and the batch continues; nothing aborts the
//! whole import except an empty batch. Re-running a batch is idempotent
//! because insertion is keyed on the content fingerprint.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobgrid_core::{
    content_fingerprint, slugify, EmploymentType, ExperienceLevel, LocationType,
};
use jobgrid_store::{resolve_or_create_company, NewJob, Store, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "jobgrid-ingest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("import batch is empty")]
    EmptyBatch,
}

/// One externally sourced job row, as submitted by the importer collaborator.
/// `title` and `companyName` are required; blank values fail that row's
/// validation without touching the rest of the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub salary_min: Option<i64>,
    #[serde(default)]
    pub salary_max: Option<i64>,
    #[serde(default)]
    pub salary_currency: Option<String>,
    #[serde(default)]
    pub apply_url: Option<String>,
    #[serde(default)]
    pub is_easy_apply: Option<bool>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Itemized outcome of one import batch. `warnings` carries the enum-fallback
/// notices so permissive normalization stays visible to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total: usize,
    pub inserted: usize,
    pub deduplicated: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

enum RecordOutcome {
    Inserted { warnings: Vec<String> },
    Deduplicated,
}

#[derive(Clone)]
pub struct Importer {
    store: Arc<dyn Store>,
}

impl Importer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Run one batch. At-most-once insert per fingerprint, best effort per
    /// row: storage failures degrade to that row's error entry.
    pub async fn run(&self, batch: Vec<ImportRecord>) -> Result<ImportReport, IngestError> {
        if batch.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        let mut report = ImportReport {
            total: batch.len(),
            ..Default::default()
        };
        for (index, record) in batch.into_iter().enumerate() {
            match self.process_record(index, record).await {
                Ok(RecordOutcome::Inserted { warnings }) => {
                    report.inserted += 1;
                    report.warnings.extend(warnings);
                }
                Ok(RecordOutcome::Deduplicated) => report.deduplicated += 1,
                Err(message) => report.errors.push(format!("row {index}: {message}")),
            }
        }

        info!(
            total = report.total,
            inserted = report.inserted,
            deduplicated = report.deduplicated,
            errors = report.errors.len(),
            "import batch finished"
        );
        Ok(report)
    }

    async fn process_record(
        &self,
        index: usize,
        record: ImportRecord,
    ) -> Result<RecordOutcome, String> {
        let title = record.title.trim().to_string();
        if title.is_empty() {
            return Err("missing title".to_string());
        }
        let company_name = record.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err("missing companyName".to_string());
        }

        let description = record.description.clone().unwrap_or_default();
        let content_hash = content_fingerprint(&title, &company_name, &description);

        match self.store.job_by_content_hash(&content_hash).await {
            Ok(Some(_)) => return Ok(RecordOutcome::Deduplicated),
            Ok(None) => {}
            Err(err) => return Err(err.to_string()),
        }

        let company = resolve_or_create_company(
            self.store.as_ref(),
            &company_name,
            record.company_slug.as_deref(),
        )
        .await
        .map_err(|err| err.to_string())?;

        let mut warnings = Vec::new();
        let location_type = normalize_field(
            index,
            "locationType",
            record.location_type.as_deref(),
            LocationType::parse,
            &mut warnings,
        );
        let employment_type = normalize_field(
            index,
            "employmentType",
            record.employment_type.as_deref(),
            EmploymentType::parse,
            &mut warnings,
        );
        let experience_level = normalize_field(
            index,
            "experienceLevel",
            record.experience_level.as_deref(),
            ExperienceLevel::parse,
            &mut warnings,
        );

        let job = NewJob {
            company_id: company.id,
            slug: slugify(&title),
            title,
            description,
            requirements: record.requirements,
            benefits: record.benefits,
            skills: record.skills,
            location: record.location.unwrap_or_default(),
            location_type,
            employment_type,
            experience_level,
            salary_min: record.salary_min,
            salary_max: record.salary_max,
            salary_currency: record.salary_currency,
            apply_url: record.apply_url,
            is_easy_apply: record.is_easy_apply.unwrap_or(false),
            is_featured: false,
            content_hash,
            source: record.source,
            source_url: record.source_url,
            posted_at: Utc::now(),
            expires_at: record.expires_at,
        };

        match self.store.create_job(job).await {
            Ok(_) => Ok(RecordOutcome::Inserted { warnings }),
            // A concurrent importer inserted the same posting between our
            // dedup lookup and this insert.
            Err(StoreError::Conflict { .. }) => Ok(RecordOutcome::Deduplicated),
            Err(err) => Err(err.to_string()),
        }
    }
}

/// Total enum normalization: absent or blank input takes the default
/// silently; a present-but-unrecognized value takes the default with a
/// per-row warning so the fallback is never invisible data loss.
fn normalize_field<T>(
    index: usize,
    field: &str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<T>,
    warnings: &mut Vec<String>,
) -> T
where
    T: Default + std::fmt::Display + Copy,
{
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return T::default();
    };
    match parse(value) {
        Some(parsed) => parsed,
        None => {
            let fallback = T::default();
            warn!(row = index, field, value, %fallback, "unrecognized enum value; using default");
            warnings.push(format!(
                "row {index}: unrecognized {field} {value:?}, defaulted to {fallback}"
            ));
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgrid_store::MemoryStore;

    fn importer() -> (Importer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Importer::new(store.clone()), store)
    }

    fn mk_record(title: &str, company: &str, description: &str) -> ImportRecord {
        ImportRecord {
            title: title.to_string(),
            company_name: company.to_string(),
            description: Some(description.to_string()),
            skills: vec!["go".into(), "postgres".into()],
            location_type: Some("Remote".into()),
            employment_type: Some("Full-time".into()),
            experience_level: Some("Senior".into()),
            ..ImportRecord::default()
        }
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_up_front() {
        let (importer, _) = importer();
        let err = importer.run(vec![]).await.unwrap_err();
        assert_eq!(err, IngestError::EmptyBatch);
    }

    #[tokio::test]
    async fn repeated_batch_dedups_everything() {
        let (importer, _) = importer();
        let batch = vec![
            mk_record("Backend Engineer", "Acme", "Build services."),
            mk_record("Platform Engineer", "Acme", "Run clusters."),
            mk_record("Data Engineer", "Globex", "Move bytes."),
        ];

        let first = importer.run(batch.clone()).await.expect("first run");
        assert_eq!((first.total, first.inserted, first.deduplicated), (3, 3, 0));
        assert!(first.errors.is_empty());

        let second = importer.run(batch).await.expect("second run");
        assert_eq!((second.total, second.inserted, second.deduplicated), (3, 0, 3));
        assert!(second.errors.is_empty());
    }

    #[tokio::test]
    async fn reformatted_description_still_dedups() {
        let (importer, _) = importer();
        let original = mk_record("Backend Engineer", "Acme", "Build reliable services.");
        let reformatted = mk_record("backend engineer", " Acme ", "Build   reliable\nservices.");

        let report = importer
            .run(vec![original, reformatted])
            .await
            .expect("run");
        assert_eq!(report.inserted, 1);
        assert_eq!(report.deduplicated, 1);
    }

    #[tokio::test]
    async fn bad_row_does_not_sink_the_batch() {
        let (importer, _) = importer();
        let mut batch = vec![mk_record("", "Acme", "missing title")];
        for n in 0..9 {
            batch.push(mk_record(&format!("Role {n}"), "Acme", &format!("desc {n}")));
        }

        let report = importer.run(batch).await.expect("run");
        assert_eq!(report.total, 10);
        assert_eq!(report.inserted, 9);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("row 0:"), "got {:?}", report.errors);
        assert!(report.errors[0].contains("missing title"));
    }

    #[tokio::test]
    async fn missing_company_name_is_a_row_error() {
        let (importer, _) = importer();
        let report = importer
            .run(vec![mk_record("Role", "   ", "desc")])
            .await
            .expect("run");
        assert_eq!(report.inserted, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("missing companyName"));
    }

    #[tokio::test]
    async fn unrecognized_enums_default_with_a_warning() {
        let (importer, store) = importer();
        let mut record = mk_record("Backend Engineer", "Acme", "Build services.");
        record.location_type = Some("Lunar".into());
        record.experience_level = Some("Wizard".into());

        let report = importer.run(vec![record]).await.expect("run");
        assert_eq!(report.inserted, 1);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("locationType"));
        assert!(report.warnings[0].contains("Remote"));
        assert!(report.warnings[1].contains("experienceLevel"));
        assert!(report.warnings[1].contains("Mid"));

        let jobs = store.recent_active_jobs(10).await.expect("jobs");
        assert_eq!(jobs[0].location_type, LocationType::Remote);
        assert_eq!(jobs[0].experience_level, ExperienceLevel::Mid);
    }

    #[tokio::test]
    async fn recognized_enums_carry_no_warning() {
        let (importer, store) = importer();
        let mut record = mk_record("Backend Engineer", "Acme", "Build services.");
        record.location_type = Some("on-site".into());
        record.employment_type = Some("contract".into());

        let report = importer.run(vec![record]).await.expect("run");
        assert!(report.warnings.is_empty(), "got {:?}", report.warnings);

        let jobs = store.recent_active_jobs(10).await.expect("jobs");
        assert_eq!(jobs[0].location_type, LocationType::OnSite);
        assert_eq!(jobs[0].employment_type, EmploymentType::Contract);
    }

    #[tokio::test]
    async fn one_company_row_for_many_records() {
        let (importer, store) = importer();
        let batch = vec![
            mk_record("Backend Engineer", "Initech LLC", "a"),
            mk_record("Frontend Engineer", "Initech LLC", "b"),
            mk_record("SRE", "Initech LLC", "c"),
        ];
        let report = importer.run(batch).await.expect("run");
        assert_eq!(report.inserted, 3);

        let company = store
            .company_by_slug("initech-llc")
            .await
            .expect("lookup")
            .expect("company exists");
        assert!(!company.is_verified);

        let jobs = store.recent_active_jobs(10).await.expect("jobs");
        assert!(jobs.iter().all(|j| j.company_id == company.id));
    }

    #[tokio::test]
    async fn explicit_company_slug_wins_over_name() {
        let (importer, store) = importer();
        let mut record = mk_record("Backend Engineer", "Acme Incorporated", "a");
        record.company_slug = Some("acme".into());

        importer.run(vec![record]).await.expect("run");
        assert!(store.company_by_slug("acme").await.expect("lookup").is_some());
        assert!(store
            .company_by_slug("acme-incorporated")
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn provenance_fields_are_preserved() {
        let (importer, store) = importer();
        let mut record = mk_record("Backend Engineer", "Acme", "Build services.");
        record.source = Some("job-feed-x".into());
        record.source_url = Some("https://feed.example/postings/42".into());
        record.apply_url = Some("https://acme.example/apply".into());

        importer.run(vec![record]).await.expect("run");
        let jobs = store.recent_active_jobs(10).await.expect("jobs");
        assert_eq!(jobs[0].source.as_deref(), Some("job-feed-x"));
        assert_eq!(
            jobs[0].source_url.as_deref(),
            Some("https://feed.example/postings/42")
        );
        assert_eq!(jobs[0].apply_url.as_deref(), Some("https://acme.example/apply"));
        assert!(jobs[0].is_active);
    }

    #[test]
    fn import_record_accepts_camel_case_payloads() {
        let record: ImportRecord = serde_json::from_str(
            r#"{
                "title": "Backend Engineer",
                "companyName": "Acme",
                "companySlug": "acme",
                "locationType": "Remote",
                "employmentType": "Full-time",
                "experienceLevel": "Senior",
                "salaryMin": 90000,
                "salaryMax": 120000,
                "salaryCurrency": "USD",
                "applyUrl": "https://acme.example/apply",
                "sourceUrl": "https://feed.example/1"
            }"#,
        )
        .expect("deserialize");
        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.salary_min, Some(90_000));
        assert_eq!(record.source_url.as_deref(), Some("https://feed.example/1"));
    }
}
