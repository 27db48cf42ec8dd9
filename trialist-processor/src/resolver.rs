//! Trial window resolution
//!
//! Setup and start surveys arrive ordered by participant, then by time. A
//! single-slot cursor holds the participant's current setup survey; every
//! start survey that follows it for the same participant yields a [`Trial`].
//!
//! Transitions (see [`step`]):
//! - `Empty` + setup → hold that setup
//! - `Empty` + anything else → stay empty (start without setup is skipped)
//! - holding P + start from P → emit a trial, keep holding
//! - holding P + other survey from P → keep holding
//! - holding P + setup from Q → hold Q's setup
//! - holding P + non-setup from Q → empty (Q's sequence is incomplete)
//!
//! A start survey with an unrecognized timezone is skipped without touching
//! the cursor, so a later well-formed start for the same setup still counts.
//! Every other failure is fatal for the run.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::models::{PayloadError, SetupConfig, SetupError, SurveyKind, SurveyRecord, Trial};

/// Start survey prompt holding the declared start date
pub const START_DATE_PROMPT: &str = "startPrompt";

/// Trial resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Start survey {survey_key} has a timezone that cannot be parsed: {timezone}")]
    UnknownTimezone { survey_key: Uuid, timezone: String },

    #[error("Start survey {survey_key} has an unparseable start date: {value}")]
    InvalidStartDate { survey_key: Uuid, value: String },

    #[error("Malformed start survey: {0}")]
    StartPayload(#[source] PayloadError),

    #[error("Malformed setup survey for participant {participant_id}: {source}")]
    Setup {
        participant_id: i64,
        #[source]
        source: SetupError,
    },

    #[error("Trial for participant {participant_id} (setup survey {setup_survey_key}) ends outside the supported calendar")]
    DateOutOfRange {
        participant_id: i64,
        setup_survey_key: Uuid,
    },
}

impl ResolveError {
    /// Whether the offending start survey is skipped rather than ending the run
    pub fn skips_record(&self) -> bool {
        matches!(self, ResolveError::UnknownTimezone { .. })
    }
}

impl From<ResolveError> for trialist_common::Error {
    fn from(err: ResolveError) -> Self {
        trialist_common::Error::DataIntegrity(err.to_string())
    }
}

/// Cursor over the setup/start sequence
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScanState {
    #[default]
    Empty,
    HoldingSetup {
        participant_id: i64,
        setup: SurveyRecord,
    },
}

/// What a single record contributed
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Idle,
    Emitted(Trial),
    Skipped { survey_key: Uuid, reason: ResolveError },
}

/// Advance the cursor by one record
pub fn step(state: ScanState, record: &SurveyRecord) -> Result<(ScanState, StepOutcome), ResolveError> {
    match state {
        ScanState::Empty => {
            if record.kind == SurveyKind::Setup {
                Ok((hold(record), StepOutcome::Idle))
            } else {
                Ok((ScanState::Empty, StepOutcome::Idle))
            }
        }
        ScanState::HoldingSetup {
            participant_id,
            setup,
        } if participant_id == record.participant_id => {
            if record.kind != SurveyKind::Start {
                return Ok((ScanState::HoldingSetup { participant_id, setup }, StepOutcome::Idle));
            }

            let outcome = match build_trial(participant_id, &setup, record) {
                Ok(trial) => StepOutcome::Emitted(trial),
                Err(reason) if reason.skips_record() => StepOutcome::Skipped {
                    survey_key: record.survey_key,
                    reason,
                },
                Err(reason) => return Err(reason),
            };
            Ok((ScanState::HoldingSetup { participant_id, setup }, outcome))
        }
        ScanState::HoldingSetup { .. } => {
            if record.kind == SurveyKind::Setup {
                Ok((hold(record), StepOutcome::Idle))
            } else {
                Ok((ScanState::Empty, StepOutcome::Idle))
            }
        }
    }
}

fn hold(record: &SurveyRecord) -> ScanState {
    ScanState::HoldingSetup {
        participant_id: record.participant_id,
        setup: record.clone(),
    }
}

/// Scan ordered setup/start surveys and collect every resolved trial
pub fn resolve_trials<'a, I>(records: I) -> Result<Vec<Trial>, ResolveError>
where
    I: IntoIterator<Item = &'a SurveyRecord>,
{
    let mut state = ScanState::Empty;
    let mut trials = Vec::new();

    for record in records {
        let (next, outcome) = step(state, record).map_err(|e| {
            error!(
                participant_id = record.participant_id,
                survey_id = %record.survey_key,
                "Cannot resolve trial: {}", e
            );
            e
        })?;
        state = next;

        match outcome {
            StepOutcome::Idle => {}
            StepOutcome::Emitted(trial) => {
                debug!("Resolved {}", trial);
                trials.push(trial);
            }
            StepOutcome::Skipped { survey_key, reason } => {
                warn!(
                    participant_id = record.participant_id,
                    survey_id = %survey_key,
                    "Skipping start survey: {}", reason
                );
            }
        }
    }

    Ok(trials)
}

fn build_trial(participant_id: i64, setup: &SurveyRecord, start: &SurveyRecord) -> Result<Trial, ResolveError> {
    let config = SetupConfig::from_record(setup).map_err(|source| ResolveError::Setup {
        participant_id,
        source,
    })?;

    let timezone: Tz = start
        .timezone
        .parse()
        .map_err(|_| ResolveError::UnknownTimezone {
            survey_key: start.survey_key,
            timezone: start.timezone.clone(),
        })?;

    let declared = start
        .text_prompt(START_DATE_PROMPT)
        .map_err(ResolveError::StartPayload)?;
    let start_date = utc_start_date(&declared, timezone).ok_or_else(|| ResolveError::InvalidStartDate {
        survey_key: start.survey_key,
        value: declared.clone(),
    })?;

    let setup_survey_key = config.survey_key;
    Trial::new(participant_id, start_date, config).ok_or(ResolveError::DateOutOfRange {
        participant_id,
        setup_survey_key,
    })
}

/// UTC calendar date of a declared start value read in the participant's timezone
///
/// Accepts `YYYY-MM-DD`, a local date-time, or an RFC 3339 instant. Local
/// values falling into a DST gap move forward one hour.
pub fn utc_start_date(value: &str, timezone: Tz) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc).date_naive());
    }

    let local = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok())?;

    let instant = match timezone.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => timezone
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()?,
    };

    Some(instant.with_timezone(&Utc).date_naive())
}
