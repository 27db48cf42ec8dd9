//! Observer stream storage
//!
//! Normalized documents go to the `data` stream and analysis results to the
//! `results` stream of the trialist observer. Rows are append-only.

use chrono::NaiveDate;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use trialist_common::{Error, Result};

use super::parse_uuid;
use crate::models::{AnalysisResult, NormalizedDocument, TrialKey, SETUP_SURVEY_ID_FIELD};

pub const OBSERVER_ID: &str = "io.omh.trialist";
pub const OBSERVER_VERSION: &str = "2013013000";

/// A versioned stream of the trialist observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream {
    pub id: &'static str,
    pub version: &'static str,
}

/// Normalized trial documents
pub const DATA_STREAM: Stream = Stream {
    id: "data",
    version: "2013013000",
};

/// Analysis service results
pub const RESULTS_STREAM: Stream = Stream {
    id: "results",
    version: "2013013000",
};

async fn insert(
    pool: &SqlitePool,
    stream: Stream,
    participant_id: i64,
    setup_survey_id: String,
    data: String,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO observer_stream_data (
            user_id, observer_id, observer_version, stream_id, stream_version, setup_survey_id, data
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(participant_id)
    .bind(OBSERVER_ID)
    .bind(OBSERVER_VERSION)
    .bind(stream.id)
    .bind(stream.version)
    .bind(setup_survey_id)
    .bind(data)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn store_normalized_document(
    pool: &SqlitePool,
    key: &TrialKey,
    document: &NormalizedDocument,
) -> Result<()> {
    let data = serde_json::to_string(document)
        .map_err(|e| Error::Internal(format!("Failed to serialize normalized document: {}", e)))?;

    insert(pool, DATA_STREAM, key.participant_id, key.setup_survey_key.to_string(), data).await
}

pub async fn store_analysis_result(pool: &SqlitePool, participant_id: i64, result: &AnalysisResult) -> Result<()> {
    let data = result.to_value().to_string();

    insert(
        pool,
        RESULTS_STREAM,
        participant_id,
        result.setup_survey_key.to_string(),
        data,
    )
    .await
}

/// Most recently stored normalized document for a trial
///
/// Matches the trial window recorded in the document metadata as well as the
/// key.
pub async fn fetch_normalized_document(
    pool: &SqlitePool,
    key: &TrialKey,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Option<NormalizedDocument>> {
    let row = sqlx::query(
        r#"
        SELECT id, data FROM observer_stream_data
        WHERE observer_id = ? AND observer_version = ?
          AND stream_id = ? AND stream_version = ?
          AND user_id = ? AND setup_survey_id = ?
          AND json_extract(data, '$.metadata.trial_start_date') = ?
          AND json_extract(data, '$.metadata.trial_end_date') = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(OBSERVER_ID)
    .bind(OBSERVER_VERSION)
    .bind(DATA_STREAM.id)
    .bind(DATA_STREAM.version)
    .bind(key.participant_id)
    .bind(key.setup_survey_key.to_string())
    .bind(start.to_string())
    .bind(end.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let row_id: i64 = row.get("id");
            let data: String = row.get("data");
            let document = serde_json::from_str(&data).map_err(|e| {
                Error::DataIntegrity(format!(
                    "observer_stream_data row {} is not a normalized document: {}",
                    row_id, e
                ))
            })?;
            Ok(Some(document))
        }
        None => Ok(None),
    }
}

/// Trials that already have an analysis result
///
/// Keys come from the `setup_survey_id` field inside each stored result.
pub async fn fetch_processed_trial_keys(pool: &SqlitePool) -> Result<HashSet<TrialKey>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, data FROM observer_stream_data
        WHERE observer_id = ? AND observer_version = ?
          AND stream_id = ? AND stream_version = ?
        "#,
    )
    .bind(OBSERVER_ID)
    .bind(OBSERVER_VERSION)
    .bind(RESULTS_STREAM.id)
    .bind(RESULTS_STREAM.version)
    .fetch_all(pool)
    .await?;

    let mut keys = HashSet::with_capacity(rows.len());
    for row in rows {
        let row_id: i64 = row.get("id");
        let data: String = row.get("data");

        let value: Value = serde_json::from_str(&data).map_err(|e| {
            Error::DataIntegrity(format!("observer_stream_data row {} is not JSON: {}", row_id, e))
        })?;
        let setup_survey_id = value
            .get(SETUP_SURVEY_ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::DataIntegrity(format!(
                    "observer_stream_data row {} has no {} field",
                    row_id, SETUP_SURVEY_ID_FIELD
                ))
            })?;

        keys.insert(TrialKey {
            participant_id: row.get("user_id"),
            setup_survey_key: parse_uuid("observer_stream_data", row_id, setup_survey_id)?,
        });
    }

    Ok(keys)
}
