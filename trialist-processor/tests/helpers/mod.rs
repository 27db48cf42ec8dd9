//! Shared fixtures for processor integration tests
//!
//! In-memory survey store seeding and a scripted analysis gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Mutex;
use uuid::Uuid;

use trialist_processor::db::init_tables;
use trialist_processor::models::NormalizedDocument;
use trialist_processor::{AnalysisGateway, GatewayError};

/// 2020-01-01T00:00:00Z
pub const JAN_1_2020_MILLIS: i64 = 1_577_836_800_000;
pub const HOUR_MILLIS: i64 = 3_600_000;
pub const DAY_MILLIS: i64 = 86_400_000;

pub const CAMPAIGN: &str = "urn:campaign:trialist";
pub const MOCK_CAMPAIGN: &str = "urn:campaign:trialist:mock";

/// Single-connection in-memory database with the survey schema
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    pool
}

pub fn survey_uuid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub async fn insert_campaign(pool: &SqlitePool, id: i64, urn: &str) {
    sqlx::query("INSERT INTO campaign (id, urn) VALUES (?, ?)")
        .bind(id)
        .bind(urn)
        .execute(pool)
        .await
        .unwrap();
}

/// Insert a survey response row, returning its row id
pub async fn insert_survey(
    pool: &SqlitePool,
    uuid: Uuid,
    user_id: i64,
    campaign_id: i64,
    survey_id: &str,
    epoch_millis: i64,
    phone_timezone: &str,
    survey: &Value,
) -> i64 {
    sqlx::query(
        "INSERT INTO survey_response (uuid, user_id, campaign_id, survey_id, epoch_millis, phone_timezone, survey) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid.to_string())
    .bind(user_id)
    .bind(campaign_id)
    .bind(survey_id)
    .bind(epoch_millis)
    .bind(phone_timezone)
    .bind(survey.to_string())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub fn setup_survey(duration_key: i64, cycles_key: i64, regimen_a: &str, regimen_b: &str) -> Value {
    json!({
        "responses": [
            {"prompt_id": "regimenDuration", "value": duration_key},
            {"prompt_id": "numberComparisonCycles", "value": cycles_key},
            {"prompt_id": "regimenA", "value": regimen_a},
            {"prompt_id": "regimenB", "value": regimen_b},
            {"prompt_id": "randomAsText", "value": "AB,BA,AB"}
        ]
    })
}

pub fn start_survey(start_date: &str) -> Value {
    json!({"responses": [{"prompt_id": "startPrompt", "value": start_date}]})
}

/// Setup at Dec 30 and start at Dec 31 2019, declaring the given start date
pub async fn seed_trial(
    pool: &SqlitePool,
    campaign_id: i64,
    user_id: i64,
    setup_key: u128,
    setup: &Value,
    start_date: &str,
) {
    insert_survey(
        pool,
        survey_uuid(setup_key),
        user_id,
        campaign_id,
        "setup",
        JAN_1_2020_MILLIS - 2 * DAY_MILLIS,
        "America/Los_Angeles",
        setup,
    )
    .await;
    insert_survey(
        pool,
        survey_uuid(setup_key + 1),
        user_id,
        campaign_id,
        "start",
        JAN_1_2020_MILLIS - DAY_MILLIS,
        "America/Los_Angeles",
        &start_survey(start_date),
    )
    .await;
}

/// Daily survey with its prompt rows
pub async fn seed_daily(
    pool: &SqlitePool,
    uuid: Uuid,
    user_id: i64,
    campaign_id: i64,
    epoch_millis: i64,
    prompts: &[(&str, &str)],
) {
    let survey_response_id = insert_survey(
        pool,
        uuid,
        user_id,
        campaign_id,
        "main",
        epoch_millis,
        "America/Los_Angeles",
        &json!({"responses": []}),
    )
    .await;

    for (prompt_id, response) in prompts {
        sqlx::query("INSERT INTO prompt_response (survey_response_id, prompt_id, response) VALUES (?, ?, ?)")
            .bind(survey_response_id)
            .bind(*prompt_id)
            .bind(*response)
            .execute(pool)
            .await
            .unwrap();
    }
}

pub async fn count_stream_rows(pool: &SqlitePool, stream_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM observer_stream_data WHERE stream_id = ?")
        .bind(stream_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Gateway that records submissions and answers from a script
pub struct FakeGateway {
    fail: bool,
    submitted: Mutex<Vec<NormalizedDocument>>,
}

impl FakeGateway {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<NormalizedDocument> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisGateway for FakeGateway {
    async fn submit(&self, document: &NormalizedDocument) -> Result<Map<String, Value>, GatewayError> {
        self.submitted.lock().unwrap().push(document.clone());
        if self.fail {
            return Err(GatewayError::Status(503, "analysis unavailable".to_string()));
        }

        let mut body = Map::new();
        body.insert("successful".to_string(), json!(true));
        body.insert("days".to_string(), json!(document.data.len()));
        Ok(body)
    }
}
