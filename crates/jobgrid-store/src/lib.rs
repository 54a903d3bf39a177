//! Relational storage for JobGrid profiles, companies, and jobs.
//!
//! The Postgres schema enforces the two load-bearing uniqueness constraints
//! (`companies.slug`, `jobs.content_hash`); application code treats a unique
//! violation as an expected outcome (a lost creation race or a concurrent
//! duplicate insert), never as a hard failure.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobgrid_core::{
    slugify, Company, EmploymentType, ExperienceLevel, Job, LocationType, Profile,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "jobgrid-store";

/// Embedded migrations, applied by `jobgrid-cli migrate`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} already exists for {key}")]
    Conflict { entity: &'static str, key: String },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub skills: Vec<String>,
    pub preferred_location: Option<String>,
    pub desired_location_type: Option<LocationType>,
    pub desired_employment_type: Option<EmploymentType>,
    pub desired_experience: Option<ExperienceLevel>,
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: String,
    pub slug: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone)]
pub struct NewJob {
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
    pub content_hash: String,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError>;
    async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    async fn create_company(&self, company: NewCompany) -> Result<Company, StoreError>;
    async fn company_by_slug(&self, slug: &str) -> Result<Option<Company>, StoreError>;

    async fn create_job(&self, job: NewJob) -> Result<Job, StoreError>;
    async fn job_by_content_hash(&self, content_hash: &str) -> Result<Option<Job>, StoreError>;
    async fn recent_active_jobs(&self, limit: i64) -> Result<Vec<Job>, StoreError>;

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Find a company by slug, creating it unverified when absent.
///
/// Idempotent and safe under concurrent invocation: a unique violation on the
/// insert means another caller created the row between our lookup and insert,
/// so the winner's row is re-fetched and returned.
pub async fn resolve_or_create_company(
    store: &dyn Store,
    name: &str,
    explicit_slug: Option<&str>,
) -> Result<Company, StoreError> {
    let slug = match explicit_slug {
        Some(s) if !s.trim().is_empty() => slugify(s),
        _ => slugify(name),
    };

    if let Some(existing) = store.company_by_slug(&slug).await? {
        return Ok(existing);
    }

    match store
        .create_company(NewCompany {
            name: name.trim().to_string(),
            slug: slug.clone(),
            is_verified: false,
        })
        .await
    {
        Ok(created) => Ok(created),
        Err(StoreError::Conflict { .. }) => {
            debug!(slug, "company creation raced; reusing existing row");
            store
                .company_by_slug(&slug)
                .await?
                .ok_or(StoreError::NotFound { entity: "company" })
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_insert_error(err: sqlx::Error, entity: &'static str, key: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
            entity,
            key: key.to_string(),
        },
        _ => StoreError::Database(err),
    }
}

fn profile_from_row(row: &PgRow) -> Result<Profile, sqlx::Error> {
    Ok(Profile {
        id: row.try_get("id")?,
        skills: row.try_get("skills")?,
        preferred_location: row.try_get("preferred_location")?,
        desired_location_type: row
            .try_get::<Option<String>, _>("desired_location_type")?
            .as_deref()
            .and_then(LocationType::parse),
        desired_employment_type: row
            .try_get::<Option<String>, _>("desired_employment_type")?
            .as_deref()
            .and_then(EmploymentType::parse),
        desired_experience: row
            .try_get::<Option<String>, _>("desired_experience")?
            .as_deref()
            .and_then(ExperienceLevel::parse),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn company_from_row(row: &PgRow) -> Result<Company, sqlx::Error> {
    Ok(Company {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        is_verified: row.try_get("is_verified")?,
        created_at: row.try_get("created_at")?,
    })
}

fn job_from_row(row: &PgRow) -> Result<Job, sqlx::Error> {
    Ok(Job {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        requirements: row.try_get("requirements")?,
        benefits: row.try_get("benefits")?,
        skills: row.try_get("skills")?,
        location: row.try_get("location")?,
        location_type: LocationType::parse(row.try_get::<String, _>("location_type")?.as_str())
            .unwrap_or_default(),
        employment_type: EmploymentType::parse(
            row.try_get::<String, _>("employment_type")?.as_str(),
        )
        .unwrap_or_default(),
        experience_level: ExperienceLevel::parse(
            row.try_get::<String, _>("experience_level")?.as_str(),
        )
        .unwrap_or_default(),
        salary_min: row.try_get("salary_min")?,
        salary_max: row.try_get("salary_max")?,
        salary_currency: row.try_get("salary_currency")?,
        apply_url: row.try_get("apply_url")?,
        is_easy_apply: row.try_get("is_easy_apply")?,
        is_featured: row.try_get("is_featured")?,
        is_active: row.try_get("is_active")?,
        content_hash: row.try_get("content_hash")?,
        source: row.try_get("source")?,
        source_url: row.try_get("source_url")?,
        posted_at: row.try_get("posted_at")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        let now = Utc::now();
        let created = Profile {
            id: Uuid::new_v4(),
            skills: profile.skills,
            preferred_location: profile.preferred_location,
            desired_location_type: profile.desired_location_type,
            desired_employment_type: profile.desired_employment_type,
            desired_experience: profile.desired_experience,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO profiles (id, skills, preferred_location, desired_location_type,
                                  desired_employment_type, desired_experience, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(created.id)
        .bind(&created.skills)
        .bind(&created.preferred_location)
        .bind(created.desired_location_type.map(|v| v.as_str()))
        .bind(created.desired_employment_type.map(|v| v.as_str()))
        .bind(created.desired_experience.map(|v| v.as_str()))
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(created)
    }

    async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(profile_from_row).transpose().map_err(Into::into)
    }

    async fn create_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        let created = Company {
            id: Uuid::new_v4(),
            name: company.name,
            slug: company.slug,
            is_verified: company.is_verified,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT INTO companies (id, name, slug, is_verified, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(created.id)
        .bind(&created.name)
        .bind(&created.slug)
        .bind(created.is_verified)
        .bind(created.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, "company", &created.slug))?;
        Ok(created)
    }

    async fn company_by_slug(&self, slug: &str) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query("SELECT * FROM companies WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(company_from_row).transpose().map_err(Into::into)
    }

    async fn create_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let now = Utc::now();
        let created = Job {
            id: Uuid::new_v4(),
            company_id: job.company_id,
            title: job.title,
            slug: job.slug,
            description: job.description,
            requirements: job.requirements,
            benefits: job.benefits,
            skills: job.skills,
            location: job.location,
            location_type: job.location_type,
            employment_type: job.employment_type,
            experience_level: job.experience_level,
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            salary_currency: job.salary_currency,
            apply_url: job.apply_url,
            is_easy_apply: job.is_easy_apply,
            is_featured: job.is_featured,
            is_active: true,
            content_hash: job.content_hash,
            source: job.source,
            source_url: job.source_url,
            posted_at: job.posted_at,
            expires_at: job.expires_at,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO jobs (id, company_id, title, slug, description, requirements, benefits,
                              skills, location, location_type, employment_type, experience_level,
                              salary_min, salary_max, salary_currency, apply_url, is_easy_apply,
                              is_featured, is_active, content_hash, source, source_url, posted_at,
                              expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26)
            "#,
        )
        .bind(created.id)
        .bind(created.company_id)
        .bind(&created.title)
        .bind(&created.slug)
        .bind(&created.description)
        .bind(&created.requirements)
        .bind(&created.benefits)
        .bind(&created.skills)
        .bind(&created.location)
        .bind(created.location_type.as_str())
        .bind(created.employment_type.as_str())
        .bind(created.experience_level.as_str())
        .bind(created.salary_min)
        .bind(created.salary_max)
        .bind(&created.salary_currency)
        .bind(&created.apply_url)
        .bind(created.is_easy_apply)
        .bind(created.is_featured)
        .bind(created.is_active)
        .bind(&created.content_hash)
        .bind(&created.source)
        .bind(&created.source_url)
        .bind(created.posted_at)
        .bind(created.expires_at)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_insert_error(err, "job", &created.content_hash))?;
        Ok(created)
    }

    async fn job_by_content_hash(&self, content_hash: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE content_hash = $1")
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose().map_err(Into::into)
    }

    async fn recent_active_jobs(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
             WHERE is_active
               AND (expires_at IS NULL OR expires_at > $2)
             ORDER BY posted_at DESC
             LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;
        let jobs = rows
            .iter()
            .map(job_from_row)
            .collect::<Result<Vec<Job>, sqlx::Error>>()?;
        Ok(jobs)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
               SET is_active = FALSE,
                   updated_at = $1
             WHERE is_active
               AND expires_at IS NOT NULL
               AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory store with the same uniqueness semantics as the Postgres schema.
/// Backs handler and pipeline tests and local runs without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    profiles: HashMap<Uuid, Profile>,
    companies: Vec<Company>,
    jobs: Vec<Job>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        let now = Utc::now();
        let created = Profile {
            id: Uuid::new_v4(),
            skills: profile.skills,
            preferred_location: profile.preferred_location,
            desired_location_type: profile.desired_location_type,
            desired_employment_type: profile.desired_employment_type,
            desired_experience: profile.desired_experience,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().await.profiles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.inner.lock().await.profiles.get(&id).cloned())
    }

    async fn create_company(&self, company: NewCompany) -> Result<Company, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.companies.iter().any(|c| c.slug == company.slug) {
            return Err(StoreError::Conflict {
                entity: "company",
                key: company.slug,
            });
        }
        let created = Company {
            id: Uuid::new_v4(),
            name: company.name,
            slug: company.slug,
            is_verified: company.is_verified,
            created_at: Utc::now(),
        };
        inner.companies.push(created.clone());
        Ok(created)
    }

    async fn company_by_slug(&self, slug: &str) -> Result<Option<Company>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .companies
            .iter()
            .find(|c| c.slug == slug)
            .cloned())
    }

    async fn create_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.jobs.iter().any(|j| j.content_hash == job.content_hash) {
            return Err(StoreError::Conflict {
                entity: "job",
                key: job.content_hash,
            });
        }
        let now = Utc::now();
        let created = Job {
            id: Uuid::new_v4(),
            company_id: job.company_id,
            title: job.title,
            slug: job.slug,
            description: job.description,
            requirements: job.requirements,
            benefits: job.benefits,
            skills: job.skills,
            location: job.location,
            location_type: job.location_type,
            employment_type: job.employment_type,
            experience_level: job.experience_level,
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            salary_currency: job.salary_currency,
            apply_url: job.apply_url,
            is_easy_apply: job.is_easy_apply,
            is_featured: job.is_featured,
            is_active: true,
            content_hash: job.content_hash,
            source: job.source,
            source_url: job.source_url,
            posted_at: job.posted_at,
            expires_at: job.expires_at,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.push(created.clone());
        Ok(created)
    }

    async fn job_by_content_hash(&self, content_hash: &str) -> Result<Option<Job>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .jobs
            .iter()
            .find(|j| j.content_hash == content_hash)
            .cloned())
    }

    async fn recent_active_jobs(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let now = Utc::now();
        let mut jobs: Vec<Job> = self
            .inner
            .lock()
            .await
            .jobs
            .iter()
            .filter(|j| j.is_live(now))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut deactivated = 0;
        for job in &mut inner.jobs {
            if job.is_active && job.expires_at.is_some_and(|expires| expires <= now) {
                job.is_active = false;
                job.updated_at = now;
                deactivated += 1;
            }
        }
        Ok(deactivated)
    }
}
