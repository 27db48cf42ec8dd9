//! Survey response queries

use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use trialist_common::{Error, Result};

use super::parse_uuid;
use crate::models::survey::SurveyPayload;
use crate::models::{PromptRow, SurveyKind, SurveyRecord};
use crate::normalizer::group_prompt_rows;

/// Setup and start surveys of a campaign, ordered by participant then time
///
/// The survey JSON must hold the ordered prompt responses. A row that cannot
/// be read aborts the whole query.
pub async fn fetch_setup_and_start_surveys(pool: &SqlitePool, campaign_id: &str) -> Result<Vec<SurveyRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT sr.id, sr.uuid, sr.user_id, sr.survey_id, sr.epoch_millis, sr.phone_timezone, sr.survey
        FROM survey_response sr
        JOIN campaign c ON c.id = sr.campaign_id
        WHERE c.urn = ? AND sr.survey_id IN ('setup', 'start')
        ORDER BY sr.user_id, sr.epoch_millis, sr.id
        "#,
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let row_id: i64 = row.get("id");
        let uuid: String = row.get("uuid");
        let survey_id: String = row.get("survey_id");
        let phone_timezone: String = row.get("phone_timezone");
        let survey: String = row.get("survey");

        let kind: SurveyKind = survey_id
            .parse()
            .map_err(|e| Error::DataIntegrity(format!("survey_response row {}: {}", row_id, e)))?;
        let payload = SurveyPayload::parse(&survey).map_err(|e| {
            Error::DataIntegrity(format!(
                "survey_response row {} has unreadable survey JSON: {}",
                row_id, e
            ))
        })?;

        records.push(SurveyRecord {
            survey_key: parse_uuid("survey_response", row_id, &uuid)?,
            participant_id: row.get("user_id"),
            kind,
            epoch_millis: row.get("epoch_millis"),
            timezone: payload.timezone.unwrap_or(phone_timezone),
            responses: payload.responses,
        });
    }

    tracing::debug!(campaign_id, count = records.len(), "Loaded setup and start surveys");

    Ok(records)
}

/// Daily surveys of one participant submitted on `start..=end`
///
/// Days are UTC calendar days of the submission instant. One record per
/// survey response, in submission order, prompts in stored order.
pub async fn fetch_main_survey_responses(
    pool: &SqlitePool,
    campaign_id: &str,
    participant_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SurveyRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT sr.id, sr.uuid, sr.user_id, sr.epoch_millis, sr.phone_timezone, pr.prompt_id, pr.response
        FROM survey_response sr
        JOIN prompt_response pr ON pr.survey_response_id = sr.id
        JOIN campaign c ON c.id = sr.campaign_id
        WHERE c.urn = ?
          AND sr.user_id = ?
          AND sr.survey_id = 'main'
          AND date(sr.epoch_millis / 1000, 'unixepoch') BETWEEN ? AND ?
        ORDER BY sr.epoch_millis, sr.id, pr.id
        "#,
    )
    .bind(campaign_id)
    .bind(participant_id)
    .bind(start.to_string())
    .bind(end.to_string())
    .fetch_all(pool)
    .await?;

    let mut prompt_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let row_id: i64 = row.get("id");
        let uuid: String = row.get("uuid");
        prompt_rows.push(PromptRow {
            survey_key: parse_uuid("survey_response", row_id, &uuid)?,
            participant_id: row.get("user_id"),
            epoch_millis: row.get("epoch_millis"),
            timezone: row.get("phone_timezone"),
            prompt_id: row.get("prompt_id"),
            response: row.get("response"),
        });
    }

    Ok(group_prompt_rows(prompt_rows))
}
