//! Response normalization
//!
//! Turns a trial's daily survey responses into the [`NormalizedDocument`]
//! consumed by the analysis service:
//! - metadata: regimen option labels, trial window, duration, cycle count
//!   and the A/B pairing string from the setup survey
//! - one data point per daily submission, in submission order, carrying the
//!   cycle number, a local timestamp, the regimen letter and every other
//!   numeric answer (free-text notes are dropped)
//!
//! Any failure here affects only the trial being normalized.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::lookup::{is_mock_campaign, regimen_label, RegimenArm, RegimenDuration, UnknownKey};
use crate::models::survey::value_as_int;
use crate::models::{
    DataPoint, NormalizedDocument, PayloadError, PromptResponse, PromptRow, SurveyKind,
    SurveyRecord, Trial, TrialMetadata,
};

/// Daily survey prompt recording which regimen the participant followed
pub const CURRENT_REGIMEN_PROMPT: &str = "currentRegimen";

/// Daily survey free-text prompt, not used by the analysis
pub const NOTES_PROMPT: &str = "notesAboutToday";

/// Normalization failures (fatal for one trial only)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Setup survey {setup_survey_key} regimen {arm} options: {source}")]
    RegimenOption {
        setup_survey_key: Uuid,
        arm: &'static str,
        #[source]
        source: UnknownKey,
    },

    #[error("Survey {survey_key}: {source}")]
    CurrentRegimen {
        survey_key: Uuid,
        #[source]
        source: UnknownKey,
    },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Survey {survey_key} has a timezone that cannot be parsed: {timezone}")]
    UnknownTimezone { survey_key: Uuid, timezone: String },

    #[error("Survey {survey_key} submitted at {epoch_millis} falls outside the trial window")]
    OutsideWindow { survey_key: Uuid, epoch_millis: i64 },
}

/// Builds normalized documents for one campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    is_mock: bool,
}

impl Normalizer {
    pub fn new(is_mock: bool) -> Self {
        Self { is_mock }
    }

    /// Mock and test campaigns label regimens with music genres
    pub fn for_campaign(campaign_id: &str) -> Self {
        Self::new(is_mock_campaign(campaign_id))
    }

    /// Build the document for `trial` from its ordered daily responses
    pub fn normalize(
        &self,
        trial: &Trial,
        responses: &[SurveyRecord],
    ) -> Result<NormalizedDocument, NormalizeError> {
        let metadata = self.metadata(trial)?;
        let data = responses
            .iter()
            .map(|record| data_point(trial, record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NormalizedDocument { metadata, data })
    }

    pub fn metadata(&self, trial: &Trial) -> Result<TrialMetadata, NormalizeError> {
        let setup = &trial.setup;

        Ok(TrialMetadata {
            regimen_a: self.labels(setup.survey_key, RegimenArm::A, &setup.regimen_a_keys)?,
            regimen_b: self.labels(setup.survey_key, RegimenArm::B, &setup.regimen_b_keys)?,
            trial_start_date: trial.start_date,
            trial_end_date: trial.end_date,
            regimen_duration: setup.regimen_duration.days(),
            number_of_cycles: setup.cycle_count.cycles(),
            cycle_ab_pairs: setup.cycle_ab_pairs.clone(),
            cognitive_function_prompt_key: setup.cognitive_function.clone(),
        })
    }

    fn labels(
        &self,
        setup_survey_key: Uuid,
        arm: RegimenArm,
        keys: &[i64],
    ) -> Result<Vec<String>, NormalizeError> {
        keys.iter()
            .map(|&key| {
                regimen_label(key, self.is_mock)
                    .map(str::to_string)
                    .map_err(|source| NormalizeError::RegimenOption {
                        setup_survey_key,
                        arm: arm.label(),
                        source,
                    })
            })
            .collect()
    }
}

/// One data point from one daily submission
pub fn data_point(trial: &Trial, record: &SurveyRecord) -> Result<DataPoint, NormalizeError> {
    let outside = || NormalizeError::OutsideWindow {
        survey_key: record.survey_key,
        epoch_millis: record.epoch_millis,
    };

    let submitted = DateTime::<Utc>::from_timestamp_millis(record.epoch_millis).ok_or_else(outside)?;
    let day = submitted.date_naive();
    if !trial.contains(day) {
        return Err(outside());
    }
    let cycle = cycle_number(trial.start_date, day, trial.setup.regimen_duration).ok_or_else(outside)?;

    let timezone: Tz = record
        .timezone
        .parse()
        .map_err(|_| NormalizeError::UnknownTimezone {
            survey_key: record.survey_key,
            timezone: record.timezone.clone(),
        })?;
    let timestamp = submitted
        .with_timezone(&timezone)
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut regimen = None;
    let mut values = BTreeMap::new();

    for response in &record.responses {
        match response.prompt_id.as_str() {
            NOTES_PROMPT => {}
            CURRENT_REGIMEN_PROMPT => {
                let key = numeric_value(record.survey_key, response)?;
                let arm = RegimenArm::from_key(key).map_err(|source| NormalizeError::CurrentRegimen {
                    survey_key: record.survey_key,
                    source,
                })?;
                regimen = Some(arm);
            }
            prompt_id => {
                let value = numeric_value(record.survey_key, response)?;
                values.insert(prompt_id.to_string(), value);
            }
        }
    }

    Ok(DataPoint {
        cycle,
        timestamp,
        regimen,
        values,
    })
}

fn numeric_value(survey_key: Uuid, response: &PromptResponse) -> Result<i64, PayloadError> {
    value_as_int(&response.value).ok_or_else(|| PayloadError::InvalidValue {
        survey_key,
        prompt_id: response.prompt_id.clone(),
        expected: "an integer",
        value: response.value.to_string(),
    })
}

/// 1-based cycle number of `day` in a trial starting on `start`
///
/// Returns `None` for days before the start.
pub fn cycle_number(start: NaiveDate, day: NaiveDate, duration: RegimenDuration) -> Option<u32> {
    let elapsed = u32::try_from((day - start).num_days()).ok()?;
    Some(elapsed / duration.cycle_length_days() + 1)
}

/// Group per-prompt rows into one daily survey record per submission
///
/// Rows must already be ordered by submission; consecutive rows with the
/// same survey key form one record and keep their prompt order.
pub fn group_prompt_rows<I>(rows: I) -> Vec<SurveyRecord>
where
    I: IntoIterator<Item = PromptRow>,
{
    let mut records: Vec<SurveyRecord> = Vec::new();

    for row in rows {
        let response = PromptResponse::new(row.prompt_id, Value::String(row.response));
        match records.last_mut() {
            Some(current) if current.survey_key == row.survey_key => current.responses.push(response),
            _ => records.push(SurveyRecord {
                survey_key: row.survey_key,
                participant_id: row.participant_id,
                kind: SurveyKind::Main,
                epoch_millis: row.epoch_millis,
                timezone: row.timezone,
                responses: vec![response],
            }),
        }
    }

    records
}
