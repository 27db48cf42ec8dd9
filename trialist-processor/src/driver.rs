//! Run orchestration
//!
//! One run reads the campaign's setup and start surveys, resolves trials,
//! selects the eligible ones, then normalizes, submits and stores each trial
//! in turn. Survey store failures end the run; normalization and submission
//! failures only skip the trial at hand.

use chrono::NaiveDate;
use tracing::{error, info, warn};
use trialist_common::Result;

use crate::config::RunParameters;
use crate::eligibility::select_trials;
use crate::gateway::AnalysisGateway;
use crate::models::{AnalysisResult, Trial};
use crate::normalizer::Normalizer;
use crate::repository::SurveyRepository;
use crate::resolver::resolve_trials;

/// Terminal state of an eligible trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    /// Analysis result stored; the trial counts as processed
    Stored,
    FailedNormalization,
    /// Left unprocessed so a later run retries it
    FailedSubmission,
}

/// Tally of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub resolved: usize,
    pub eligible: usize,
    pub processed: usize,
    pub failed_normalization: usize,
    pub failed_submission: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: TrialOutcome) {
        match outcome {
            TrialOutcome::Stored => self.processed += 1,
            TrialOutcome::FailedNormalization => self.failed_normalization += 1,
            TrialOutcome::FailedSubmission => self.failed_submission += 1,
        }
    }
}

/// Process every eligible trial of the campaign
///
/// `summary` is updated as the run progresses, so it stays meaningful when
/// the run ends early with an error.
pub async fn run<R, G>(
    repository: &R,
    gateway: &G,
    params: &RunParameters,
    today: NaiveDate,
    summary: &mut RunSummary,
) -> Result<()>
where
    R: SurveyRepository,
    G: AnalysisGateway,
{
    let campaign_id = params.campaign_id.as_str();

    let records = repository.fetch_setup_and_start_surveys(campaign_id).await?;
    let trials = resolve_trials(&records)?;
    summary.resolved = trials.len();
    info!(campaign_id, count = trials.len(), "Resolved trials");

    let processed = repository.fetch_processed_trial_keys().await?;
    let eligible = select_trials(trials, &params.eligibility(today), &processed);
    summary.eligible = eligible.len();
    info!(
        campaign_id,
        trial_end_date = %params.trial_end_date,
        count = eligible.len(),
        "Eligible trials"
    );

    let normalizer = Normalizer::for_campaign(campaign_id);
    for trial in eligible {
        let outcome = process_trial(repository, gateway, &normalizer, campaign_id, trial).await?;
        summary.record(outcome);
    }

    Ok(())
}

/// Normalize, submit and store one trial
///
/// Only survey store errors are returned; everything else becomes the
/// trial's outcome.
pub async fn process_trial<R, G>(
    repository: &R,
    gateway: &G,
    normalizer: &Normalizer,
    campaign_id: &str,
    mut trial: Trial,
) -> Result<TrialOutcome>
where
    R: SurveyRepository,
    G: AnalysisGateway,
{
    let key = trial.key();
    let participant_id = trial.participant_id;
    let setup_survey_id = key.setup_survey_key;
    info!(participant_id, setup_survey_id = %setup_survey_id, "Processing {}", trial);

    let stored = repository
        .fetch_normalized_document(&key, trial.start_date, trial.end_date)
        .await?;
    let document = match stored {
        Some(document) => {
            info!(participant_id, setup_survey_id = %setup_survey_id, "Reusing stored normalized data");
            document
        }
        None => {
            let responses = repository
                .fetch_main_survey_responses(campaign_id, participant_id, trial.start_date, trial.end_date)
                .await?;
            info!(
                participant_id,
                setup_survey_id = %setup_survey_id,
                "{} survey response(s) in trial window",
                responses.len()
            );

            let document = match normalizer.normalize(&trial, &responses) {
                Ok(document) => document,
                Err(e) => {
                    error!(participant_id, setup_survey_id = %setup_survey_id, "Normalization failed: {}", e);
                    return Ok(TrialOutcome::FailedNormalization);
                }
            };
            repository.store_normalized_document(&key, &document).await?;
            document
        }
    };
    let document = trial.normalized.insert(document);

    if document.data.is_empty() {
        warn!(participant_id, setup_survey_id = %setup_survey_id, "Trial has no daily survey data");
    }

    let body = match gateway.submit(document).await {
        Ok(body) => body,
        Err(e) => {
            error!(participant_id, setup_survey_id = %setup_survey_id, "Analysis submission failed: {}", e);
            return Ok(TrialOutcome::FailedSubmission);
        }
    };

    let result = AnalysisResult::new(setup_survey_id, body);
    repository.store_analysis_result(participant_id, &result).await?;
    info!(participant_id, setup_survey_id = %setup_survey_id, "Stored analysis result");

    Ok(TrialOutcome::Stored)
}
