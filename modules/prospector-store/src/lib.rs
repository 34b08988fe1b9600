//! Persistence gateway for discovered leads.
//!
//! The pipeline only ever asks two questions of storage: "does a lead like
//! this already exist" and "insert this lead". Both live behind [`LeadStore`]
//! so the worker state machine tests against an in-memory implementation
//! with no database running.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use prospector_common::{Lead, LeadKeys};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Result of an insert attempt. A uniqueness conflict is an expected,
/// non-fatal outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// True when a lead matching any of the candidate keys exists:
    /// (name, location) OR source URL OR (name, primary phone).
    async fn exists(&self, keys: &LeadKeys) -> Result<bool>;

    /// Insert a lead. Safe to call concurrently from multiple workers.
    async fn insert(&self, lead: &Lead) -> Result<InsertOutcome>;

    /// Total number of persisted leads.
    async fn count(&self) -> Result<u64>;
}

// --- Postgres implementation ---

pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    /// Connect to Postgres and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run lead store migrations")?;

        info!("Lead store connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn exists(&self, keys: &LeadKeys) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM leads
                WHERE (lower(name) = lower($1) AND lower(location) = lower($2))
                   OR source_url = $3
                   OR ($4::text IS NOT NULL
                       AND lower(name) = lower($1)
                       AND primary_phone = $4)
            )
            "#,
        )
        .bind(&keys.name)
        .bind(&keys.location)
        .bind(&keys.source_url)
        .bind(&keys.primary_phone)
        .fetch_one(&self.pool)
        .await
        .context("Lead existence check failed")?;

        Ok(found)
    }

    async fn insert(&self, lead: &Lead) -> Result<InsertOutcome> {
        // ON CONFLICT DO NOTHING covers all three unique indexes, so a
        // concurrent duplicate lands here as zero rows affected.
        let result = sqlx::query(
            r#"
            INSERT INTO leads (
                id, name, location, category,
                primary_phone, primary_email, phones, emails,
                website, rating, review_count,
                website_quality_score, lead_score, prospect_reason,
                source_url, discovered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(lead.id)
        .bind(&lead.name)
        .bind(&lead.location)
        .bind(&lead.category)
        .bind(&lead.primary_phone)
        .bind(&lead.primary_email)
        .bind(serde_json::json!(lead.phones))
        .bind(serde_json::json!(lead.emails))
        .bind(&lead.website)
        .bind(lead.rating)
        .bind(lead.review_count.map(|n| n as i32))
        .bind(i32::from(lead.website_quality_score))
        .bind(i32::from(lead.lead_score))
        .bind(lead.prospect_reason.as_str())
        .bind(&lead.source_url)
        .bind(lead.discovered_at)
        .execute(&self.pool)
        .await
        .context("Lead insert failed")?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM leads")
            .fetch_one(&self.pool)
            .await
            .context("Lead count failed")?;
        Ok(count as u64)
    }
}

// --- In-memory implementation (tests and dry runs) ---

/// Mutex-guarded in-memory store honoring the same key contract as
/// Postgres. The single lock makes concurrent inserts serialize, which is
/// exactly the uniqueness guarantee the pipeline relies on.
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: Mutex<Vec<Lead>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.leads.lock().unwrap().clone()
    }

    fn matches(lead: &Lead, keys: &LeadKeys) -> bool {
        let name_eq = lead.name.eq_ignore_ascii_case(&keys.name);
        if name_eq && lead.location.eq_ignore_ascii_case(&keys.location) {
            return true;
        }
        if lead.source_url == keys.source_url {
            return true;
        }
        if let (Some(a), Some(b)) = (&lead.primary_phone, &keys.primary_phone) {
            if name_eq && a == b {
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn exists(&self, keys: &LeadKeys) -> Result<bool> {
        let leads = self.leads.lock().unwrap();
        Ok(leads.iter().any(|l| Self::matches(l, keys)))
    }

    async fn insert(&self, lead: &Lead) -> Result<InsertOutcome> {
        let mut leads = self.leads.lock().unwrap();
        if leads.iter().any(|l| Self::matches(l, &lead.keys())) {
            return Ok(InsertOutcome::Duplicate);
        }
        leads.push(lead.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.leads.lock().unwrap().len() as u64)
    }
}
