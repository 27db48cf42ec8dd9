//! SQLite survey store
//!
//! Survey responses are written by the data collection server; this crate
//! only reads them. Normalized documents and analysis results are appended
//! to the observer stream table.

pub mod streams;
pub mod surveys;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::collections::HashSet;
use trialist_common::{Error, Result};
use uuid::Uuid;

use crate::models::{AnalysisResult, NormalizedDocument, SurveyRecord, TrialKey};
use crate::repository::SurveyRepository;

/// Connect to the survey store
///
/// The database must already exist; missing tables are created.
pub async fn init_database_pool(database_url: &str) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", database_url);

    let pool = SqlitePool::connect(database_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the survey store tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaign (
            id INTEGER PRIMARY KEY,
            urn TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS survey_response (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            user_id INTEGER NOT NULL,
            campaign_id INTEGER NOT NULL REFERENCES campaign(id),
            survey_id TEXT NOT NULL,
            epoch_millis INTEGER NOT NULL,
            phone_timezone TEXT NOT NULL,
            survey TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompt_response (
            id INTEGER PRIMARY KEY,
            survey_response_id INTEGER NOT NULL REFERENCES survey_response(id),
            prompt_id TEXT NOT NULL,
            response TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observer_stream_data (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            observer_id TEXT NOT NULL,
            observer_version TEXT NOT NULL,
            stream_id TEXT NOT NULL,
            stream_version TEXT NOT NULL,
            setup_survey_id TEXT,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_survey_response_campaign_user \
         ON survey_response(campaign_id, user_id, epoch_millis)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observer_stream_data_stream \
         ON observer_stream_data(observer_id, stream_id, user_id)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database tables initialized (campaign, survey_response, prompt_response, observer_stream_data)");

    Ok(())
}

/// Parse a UUID column, naming the table row on failure
pub(crate) fn parse_uuid(table: &str, row_id: i64, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        Error::DataIntegrity(format!("{} row {} has invalid UUID '{}': {}", table, row_id, value, e))
    })
}

/// [`SurveyRepository`] over a SQLite pool
#[derive(Clone)]
pub struct SqliteSurveyRepository {
    pool: SqlitePool,
}

impl SqliteSurveyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SurveyRepository for SqliteSurveyRepository {
    async fn fetch_setup_and_start_surveys(&self, campaign_id: &str) -> Result<Vec<SurveyRecord>> {
        surveys::fetch_setup_and_start_surveys(&self.pool, campaign_id).await
    }

    async fn fetch_main_survey_responses(
        &self,
        campaign_id: &str,
        participant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SurveyRecord>> {
        surveys::fetch_main_survey_responses(&self.pool, campaign_id, participant_id, start, end).await
    }

    async fn fetch_processed_trial_keys(&self) -> Result<HashSet<TrialKey>> {
        streams::fetch_processed_trial_keys(&self.pool).await
    }

    async fn fetch_normalized_document(
        &self,
        key: &TrialKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<NormalizedDocument>> {
        streams::fetch_normalized_document(&self.pool, key, start, end).await
    }

    async fn store_normalized_document(&self, key: &TrialKey, document: &NormalizedDocument) -> Result<()> {
        streams::store_normalized_document(&self.pool, key, document).await
    }

    async fn store_analysis_result(&self, participant_id: i64, result: &AnalysisResult) -> Result<()> {
        streams::store_analysis_result(&self.pool, participant_id, result).await
    }
}
