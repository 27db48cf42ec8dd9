//! Run parameters
//!
//! What a single run processes: the campaign, the trial end date to target,
//! and whether trials with stored results are processed again. Supplied
//! either as command line flags or as one JSON object:
//!
//! ```json
//! {"reprocess": false, "reprocess-all": false,
//!  "trial-end-date": "2020-02-11", "campaign-id": "urn:campaign:trialist"}
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use trialist_common::time::previous_day;
use trialist_common::{Error, Result};

use crate::eligibility::EligibilityCriteria;

/// Validated parameters of one run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunParameters {
    #[serde(alias = "also-reprocess")]
    pub reprocess: bool,

    #[serde(rename = "reprocess-all", alias = "also-reprocess-all")]
    pub reprocess_all: bool,

    #[serde(rename = "trial-end-date")]
    pub trial_end_date: NaiveDate,

    #[serde(rename = "campaign-id", alias = "campaign-urn")]
    pub campaign_id: String,
}

/// Run parameters given as individual flags; unset values take defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub reprocess: bool,
    pub reprocess_all: bool,
    pub trial_end_date: Option<NaiveDate>,
    pub campaign_id: Option<String>,
}

impl RunParameters {
    /// Trials ending yesterday in the default campaign, no reprocessing
    pub fn defaults(today: NaiveDate, default_campaign_id: &str) -> Self {
        Self {
            reprocess: false,
            reprocess_all: false,
            trial_end_date: previous_day(today),
            campaign_id: default_campaign_id.to_string(),
        }
    }

    /// Parse a JSON parameter object; every key is required
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("Invalid run parameters: {}", e)))?;
        params.validate()
    }

    pub fn from_flags(flags: RunFlags, today: NaiveDate, default_campaign_id: &str) -> Result<Self> {
        let defaults = Self::defaults(today, default_campaign_id);
        Self {
            reprocess: flags.reprocess,
            reprocess_all: flags.reprocess_all,
            trial_end_date: flags.trial_end_date.unwrap_or(defaults.trial_end_date),
            campaign_id: flags.campaign_id.unwrap_or(defaults.campaign_id),
        }
        .validate()
    }

    fn validate(self) -> Result<Self> {
        if self.campaign_id.trim().is_empty() {
            return Err(Error::InvalidInput("campaign-id must not be empty".to_string()));
        }
        Ok(self)
    }

    /// Eligibility rules for a run started on `today`
    pub fn eligibility(&self, today: NaiveDate) -> EligibilityCriteria {
        EligibilityCriteria {
            target_end_date: self.trial_end_date,
            yesterday: previous_day(today),
            reprocess: self.reprocess,
            reprocess_all: self.reprocess_all,
        }
    }
}
