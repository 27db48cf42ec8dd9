//! Raw survey responses
//!
//! A survey response is one submission of a campaign survey: who sent it,
//! which survey it answers, when, from which timezone, and the ordered list
//! of prompt answers. Records are never modified once read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Campaign surveys the processor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyKind {
    /// One-time trial configuration
    Setup,
    /// Marks the calendar start of the trial
    Start,
    /// Daily self-report
    Main,
}

impl SurveyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyKind::Setup => "setup",
            SurveyKind::Start => "start",
            SurveyKind::Main => "main",
        }
    }
}

impl fmt::Display for SurveyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setup" => Ok(SurveyKind::Setup),
            "start" => Ok(SurveyKind::Start),
            "main" => Ok(SurveyKind::Main),
            other => Err(format!("Unknown survey id: {}", other)),
        }
    }
}

/// One answered prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub prompt_id: String,
    pub value: Value,
}

impl PromptResponse {
    pub fn new(prompt_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            value: value.into(),
        }
    }
}

/// Prompt lookup failures against a survey payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Survey {survey_key} has no response for prompt {prompt_id}")]
    MissingPrompt { survey_key: Uuid, prompt_id: String },

    #[error("Survey {survey_key} prompt {prompt_id}: expected {expected}, found {value}")]
    InvalidValue {
        survey_key: Uuid,
        prompt_id: String,
        expected: &'static str,
        value: String,
    },
}

/// One survey response as read from the survey store
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRecord {
    /// Unique identifier of the survey response
    pub survey_key: Uuid,
    pub participant_id: i64,
    pub kind: SurveyKind,
    /// Submission instant in epoch milliseconds
    pub epoch_millis: i64,
    /// Timezone identifier reported by the phone
    pub timezone: String,
    /// Prompt answers in survey order
    pub responses: Vec<PromptResponse>,
}

impl SurveyRecord {
    /// Raw value for a prompt, if answered
    pub fn prompt(&self, prompt_id: &str) -> Option<&Value> {
        self.responses
            .iter()
            .find(|r| r.prompt_id == prompt_id)
            .map(|r| &r.value)
    }

    fn required_prompt(&self, prompt_id: &str) -> Result<&Value, PayloadError> {
        self.prompt(prompt_id).ok_or_else(|| PayloadError::MissingPrompt {
            survey_key: self.survey_key,
            prompt_id: prompt_id.to_string(),
        })
    }

    fn invalid(&self, prompt_id: &str, expected: &'static str, value: &Value) -> PayloadError {
        PayloadError::InvalidValue {
            survey_key: self.survey_key,
            prompt_id: prompt_id.to_string(),
            expected,
            value: value.to_string(),
        }
    }

    /// Integer answer (numbers and numeric strings are accepted)
    pub fn int_prompt(&self, prompt_id: &str) -> Result<i64, PayloadError> {
        let value = self.required_prompt(prompt_id)?;
        value_as_int(value).ok_or_else(|| self.invalid(prompt_id, "an integer", value))
    }

    /// Text answer
    pub fn text_prompt(&self, prompt_id: &str) -> Result<String, PayloadError> {
        let value = self.required_prompt(prompt_id)?;
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(self.invalid(prompt_id, "text", other)),
        }
    }

    /// Multi-choice answer: a JSON array of keys, or a string holding one
    pub fn int_list_prompt(&self, prompt_id: &str) -> Result<Vec<i64>, PayloadError> {
        let value = self.required_prompt(prompt_id)?;
        let parsed;
        let items = match value {
            Value::Array(items) => items,
            Value::String(s) => {
                parsed = serde_json::from_str::<Value>(s)
                    .map_err(|_| self.invalid(prompt_id, "a JSON array of keys", value))?;
                match &parsed {
                    Value::Array(items) => items,
                    _ => return Err(self.invalid(prompt_id, "a JSON array of keys", value)),
                }
            }
            other => return Err(self.invalid(prompt_id, "a JSON array of keys", other)),
        };

        items
            .iter()
            .map(|item| value_as_int(item).ok_or_else(|| self.invalid(prompt_id, "integer keys", value)))
            .collect()
    }
}

/// Integer view of a prompt value
pub fn value_as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stored shape of a survey response's JSON column
#[derive(Debug, Deserialize)]
pub struct SurveyPayload {
    pub responses: Vec<PromptResponse>,
    /// Timezone recorded inside the survey, preferred over the phone's
    #[serde(default)]
    pub timezone: Option<String>,
}

impl SurveyPayload {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One prompt answer joined with its survey response
///
/// Daily surveys are read one prompt per row; consecutive rows with the same
/// `survey_key` belong to the same submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRow {
    pub survey_key: Uuid,
    pub participant_id: i64,
    pub epoch_millis: i64,
    pub timezone: String,
    pub prompt_id: String,
    pub response: String,
}
