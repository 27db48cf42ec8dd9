//! Resolved trials
//!
//! A trial pairs a participant's setup survey with the start survey that
//! followed it. Its window runs from the start date through the end date,
//! both inclusive, in UTC calendar days.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::document::NormalizedDocument;
use super::survey::{PayloadError, SurveyRecord};
use crate::lookup::{total_trial_days, CycleCount, RegimenDuration, UnknownKey};

/// Setup survey prompt ids
pub mod prompts {
    pub const REGIMEN_DURATION: &str = "regimenDuration";
    pub const NUMBER_OF_CYCLES: &str = "numberComparisonCycles";
    pub const REGIMEN_A: &str = "regimenA";
    pub const REGIMEN_B: &str = "regimenB";
    pub const CYCLE_AB_PAIRS: &str = "randomAsText";
    pub const COGNITIVE_FUNCTION: &str = "cognitiveFunction";
}

/// Natural key of a trial
///
/// A participant may run several trials; each one is identified by the setup
/// survey that configured it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrialKey {
    pub participant_id: i64,
    pub setup_survey_key: Uuid,
}

impl fmt::Display for TrialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.participant_id, self.setup_survey_key)
    }
}

/// Setup survey that failed to yield a configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Setup survey {survey_key}: {source}")]
    UnknownKey {
        survey_key: Uuid,
        #[source]
        source: UnknownKey,
    },
}

/// Trial configuration taken from a setup survey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupConfig {
    /// Setup survey response this configuration came from
    pub survey_key: Uuid,
    pub regimen_duration: RegimenDuration,
    pub cycle_count: CycleCount,
    /// Option keys chosen as regimen A, in survey order
    pub regimen_a_keys: Vec<i64>,
    /// Option keys chosen as regimen B, in survey order
    pub regimen_b_keys: Vec<i64>,
    /// Randomized A/B order per cycle, passed through untouched
    pub cycle_ab_pairs: String,
    /// Cognitive function prompt chosen for the trial, if any
    pub cognitive_function: Option<String>,
}

impl SetupConfig {
    /// Read the configuration prompts of a setup survey
    ///
    /// Regimen option keys are only parsed here; they are translated to
    /// labels (and range-checked) during normalization.
    pub fn from_record(record: &SurveyRecord) -> Result<Self, SetupError> {
        let unknown = |source| SetupError::UnknownKey {
            survey_key: record.survey_key,
            source,
        };

        let regimen_duration =
            RegimenDuration::from_key(record.int_prompt(prompts::REGIMEN_DURATION)?)
                .map_err(unknown)?;
        let cycle_count =
            CycleCount::from_key(record.int_prompt(prompts::NUMBER_OF_CYCLES)?).map_err(unknown)?;

        Ok(Self {
            survey_key: record.survey_key,
            regimen_duration,
            cycle_count,
            regimen_a_keys: record.int_list_prompt(prompts::REGIMEN_A)?,
            regimen_b_keys: record.int_list_prompt(prompts::REGIMEN_B)?,
            cycle_ab_pairs: record.text_prompt(prompts::CYCLE_AB_PAIRS)?,
            cognitive_function: record.text_prompt(prompts::COGNITIVE_FUNCTION).ok(),
        })
    }

    /// Days added to the start date to reach the end date
    pub fn total_days(&self) -> u32 {
        total_trial_days(self.regimen_duration, self.cycle_count)
    }
}

/// One participant's trial, the unit of work of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub participant_id: i64,
    /// First trial day (UTC)
    pub start_date: NaiveDate,
    /// Last trial day (UTC), inclusive
    pub end_date: NaiveDate,
    pub setup: SetupConfig,
    /// Normalized daily data, attached once per trial
    pub normalized: Option<NormalizedDocument>,
}

impl Trial {
    /// Create a trial, deriving the end date from the setup configuration
    ///
    /// Returns `None` if the end date falls outside the supported calendar.
    pub fn new(participant_id: i64, start_date: NaiveDate, setup: SetupConfig) -> Option<Self> {
        let end_date = start_date.checked_add_days(Days::new(u64::from(setup.total_days())))?;
        Some(Self {
            participant_id,
            start_date,
            end_date,
            setup,
            normalized: None,
        })
    }

    pub fn key(&self) -> TrialKey {
        TrialKey {
            participant_id: self.participant_id,
            setup_survey_key: self.setup.survey_key,
        }
    }

    /// Whether `date` lies inside the trial window
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

impl fmt::Display for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trial [participant_id={}, start={}, end={}, setup_survey_id={}]",
            self.participant_id, self.start_date, self.end_date, self.setup.survey_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::survey::{PromptResponse, SurveyKind};
    use serde_json::json;

    fn setup_record(responses: Vec<PromptResponse>) -> SurveyRecord {
        SurveyRecord {
            survey_key: Uuid::from_u128(0x5e7),
            participant_id: 42,
            kind: SurveyKind::Setup,
            epoch_millis: 0,
            timezone: "UTC".to_string(),
            responses,
        }
    }

    fn complete_responses(duration: i64, cycles: i64) -> Vec<PromptResponse> {
        vec![
            PromptResponse::new(prompts::REGIMEN_DURATION, json!(duration)),
            PromptResponse::new(prompts::NUMBER_OF_CYCLES, json!(cycles)),
            PromptResponse::new(prompts::REGIMEN_A, json!("[0]")),
            PromptResponse::new(prompts::REGIMEN_B, json!("[1,2]")),
            PromptResponse::new(prompts::CYCLE_AB_PAIRS, json!("AB,BA,AB")),
        ]
    }

    #[test]
    fn test_setup_config_from_record() {
        let config = SetupConfig::from_record(&setup_record(complete_responses(1, 1))).unwrap();
        assert_eq!(config.regimen_duration, RegimenDuration::OneWeek);
        assert_eq!(config.cycle_count, CycleCount::Three);
        assert_eq!(config.regimen_a_keys, vec![0]);
        assert_eq!(config.regimen_b_keys, vec![1, 2]);
        assert_eq!(config.cycle_ab_pairs, "AB,BA,AB");
        assert_eq!(config.cognitive_function, None);
        assert_eq!(config.total_days(), 41);
    }

    #[test]
    fn test_setup_config_missing_prompt() {
        let mut responses = complete_responses(1, 1);
        responses.retain(|r| r.prompt_id != prompts::REGIMEN_B);

        let err = SetupConfig::from_record(&setup_record(responses)).unwrap_err();
        assert!(matches!(
            err,
            SetupError::Payload(PayloadError::MissingPrompt { ref prompt_id, .. }) if prompt_id == "regimenB"
        ));
    }

    #[test]
    fn test_setup_config_unknown_duration_key() {
        let err = SetupConfig::from_record(&setup_record(complete_responses(5, 1))).unwrap_err();
        match err {
            SetupError::UnknownKey { source, .. } => {
                assert_eq!(source.table, "regimen duration");
                assert_eq!(source.key, 5);
            }
            other => panic!("Expected unknown key, got {:?}", other),
        }
    }

    #[test]
    fn test_trial_end_date_and_window() {
        let config = SetupConfig::from_record(&setup_record(complete_responses(1, 1))).unwrap();
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let trial = Trial::new(42, start, config).unwrap();

        assert_eq!(trial.end_date, NaiveDate::from_ymd_opt(2020, 2, 11).unwrap());
        assert!(trial.contains(start));
        assert!(trial.contains(trial.end_date));
        assert!(!trial.contains(NaiveDate::from_ymd_opt(2020, 2, 12).unwrap()));
        assert_eq!(trial.key().participant_id, 42);
        assert_eq!(trial.key().setup_survey_key, Uuid::from_u128(0x5e7));
    }
}
