//! Survey store interface used by the run driver
//!
//! Implemented over SQLite by [`crate::db::SqliteSurveyRepository`]; tests
//! substitute in-memory fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use trialist_common::Result;

use crate::models::{AnalysisResult, NormalizedDocument, SurveyRecord, TrialKey};

#[async_trait]
pub trait SurveyRepository: Send + Sync {
    /// Setup and start surveys of a campaign, ordered by participant then time
    async fn fetch_setup_and_start_surveys(&self, campaign_id: &str) -> Result<Vec<SurveyRecord>>;

    /// Daily surveys of one participant submitted on `start..=end` (UTC days), in time order
    async fn fetch_main_survey_responses(
        &self,
        campaign_id: &str,
        participant_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SurveyRecord>>;

    /// Keys of trials that already have a stored analysis result
    async fn fetch_processed_trial_keys(&self) -> Result<HashSet<TrialKey>>;

    /// Normalized document stored by an earlier run for the trial with this key
    /// and window, if any
    ///
    /// One setup survey may start several trials, so the key alone does not
    /// identify a document.
    async fn fetch_normalized_document(
        &self,
        key: &TrialKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<NormalizedDocument>>;

    async fn store_normalized_document(&self, key: &TrialKey, document: &NormalizedDocument) -> Result<()>;

    async fn store_analysis_result(&self, participant_id: i64, result: &AnalysisResult) -> Result<()>;
}
