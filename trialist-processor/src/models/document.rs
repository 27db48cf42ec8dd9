//! Normalized trial documents and analysis results
//!
//! The normalized document is the per-trial record sent to the analysis
//! service and kept in the `data` stream. Its JSON field names are consumed
//! by the analysis package and must not change.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::lookup::RegimenArm;

/// Field added to analysis results to mark the trial as processed
pub const SETUP_SURVEY_ID_FIELD: &str = "setup_survey_id";

/// Trial-level description of the normalized data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialMetadata {
    /// Labels of the options chosen as regimen A
    pub regimen_a: Vec<String>,
    /// Labels of the options chosen as regimen B
    pub regimen_b: Vec<String>,
    pub trial_start_date: NaiveDate,
    pub trial_end_date: NaiveDate,
    /// Days per regimen
    pub regimen_duration: u32,
    pub number_of_cycles: u32,
    pub cycle_ab_pairs: String,
    #[serde(
        rename = "cognitiveFunctionPromptKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cognitive_function_prompt_key: Option<String>,
}

/// One daily self-report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// 1-based cycle the report falls in
    pub cycle: u32,
    /// Submission instant in the reporter's timezone (ISO-8601)
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regimen: Option<RegimenArm>,
    /// Remaining numeric answers keyed by prompt id
    #[serde(flatten)]
    pub values: BTreeMap<String, i64>,
}

/// Metadata plus chronologically ordered daily data for one trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub metadata: TrialMetadata,
    pub data: Vec<DataPoint>,
}

/// Analysis service response for one trial
///
/// Stored together with the setup survey id so later runs can tell which
/// trials already have results.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub setup_survey_key: Uuid,
    pub body: Map<String, Value>,
}

impl AnalysisResult {
    pub fn new(setup_survey_key: Uuid, body: Map<String, Value>) -> Self {
        Self {
            setup_survey_key,
            body,
        }
    }

    /// JSON stored in the `results` stream
    pub fn to_value(&self) -> Value {
        let mut body = self.body.clone();
        body.insert(
            SETUP_SURVEY_ID_FIELD.to_string(),
            Value::String(self.setup_survey_key.to_string()),
        );
        Value::Object(body)
    }
}
