//! Eligibility filtering
//!
//! Chooses which resolved trials a run processes:
//! 1. Only finished trials (end date no later than yesterday) qualify.
//! 2. With `reprocess_all` every finished trial is kept; otherwise only
//!    trials ending exactly on the target end date.
//! 3. Unless reprocessing, trials that already have a stored analysis result
//!    are dropped, so each trial is processed at most once.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::models::{Trial, TrialKey};

/// Inputs of the eligibility decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityCriteria {
    /// Trials ending on this date are processed
    pub target_end_date: NaiveDate,
    /// Last day a trial may end on and still count as finished
    pub yesterday: NaiveDate,
    /// Also process trials that already have results
    pub reprocess: bool,
    /// Process every finished trial regardless of end date
    pub reprocess_all: bool,
}

impl EligibilityCriteria {
    /// Whether trials with stored results are processed again
    pub fn includes_processed(&self) -> bool {
        self.reprocess || self.reprocess_all
    }

    /// Date rules only (steps 1 and 2)
    pub fn matches_dates(&self, trial: &Trial) -> bool {
        if trial.end_date > self.yesterday {
            return false;
        }
        self.reprocess_all || trial.end_date == self.target_end_date
    }
}

/// Trials to process this run
pub fn select_trials(
    trials: Vec<Trial>,
    criteria: &EligibilityCriteria,
    processed: &HashSet<TrialKey>,
) -> Vec<Trial> {
    trials
        .into_iter()
        .filter(|trial| criteria.matches_dates(trial))
        .filter(|trial| criteria.includes_processed() || !processed.contains(&trial.key()))
        .collect()
}
