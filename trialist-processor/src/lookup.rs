//! Survey answer lookup tables
//!
//! The setup and daily surveys record multiple-choice answers as the option
//! key configured in the campaign XML. These closed enumerations map keys to
//! the values the analysis needs. Each lookup is fallible and reports the
//! table and key it could not resolve.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A multiple-choice key outside a lookup table's domain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown key for {table}: {key}")]
pub struct UnknownKey {
    /// Name of the table that rejected the key
    pub table: &'static str,
    /// The rejected key
    pub key: i64,
}

impl UnknownKey {
    fn new(table: &'static str, key: i64) -> Self {
        Self { table, key }
    }
}

/// How long each regimen is followed before switching
///
/// One cycle runs regimen A then regimen B, so a cycle lasts twice this long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimenDuration {
    /// Key 0
    TwoDays,
    /// Key 1
    OneWeek,
    /// Key 2
    TwoWeeks,
}

impl RegimenDuration {
    pub const ALL: [RegimenDuration; 3] = [Self::TwoDays, Self::OneWeek, Self::TwoWeeks];

    pub fn from_key(key: i64) -> Result<Self, UnknownKey> {
        match key {
            0 => Ok(Self::TwoDays),
            1 => Ok(Self::OneWeek),
            2 => Ok(Self::TwoWeeks),
            _ => Err(UnknownKey::new("regimen duration", key)),
        }
    }

    pub fn key(self) -> i64 {
        match self {
            Self::TwoDays => 0,
            Self::OneWeek => 1,
            Self::TwoWeeks => 2,
        }
    }

    /// Days spent on a single regimen
    pub fn days(self) -> u32 {
        match self {
            Self::TwoDays => 2,
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
        }
    }

    /// Days in one A/B cycle
    pub fn cycle_length_days(self) -> u32 {
        self.days() * 2
    }
}

/// Number of A/B comparison cycles in a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleCount {
    /// Key 0
    Two,
    /// Key 1
    Three,
    /// Key 2
    Four,
}

impl CycleCount {
    pub const ALL: [CycleCount; 3] = [Self::Two, Self::Three, Self::Four];

    pub fn from_key(key: i64) -> Result<Self, UnknownKey> {
        match key {
            0 => Ok(Self::Two),
            1 => Ok(Self::Three),
            2 => Ok(Self::Four),
            _ => Err(UnknownKey::new("number of cycles", key)),
        }
    }

    pub fn key(self) -> i64 {
        match self {
            Self::Two => 0,
            Self::Three => 1,
            Self::Four => 2,
        }
    }

    pub fn cycles(self) -> u32 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }
}

/// Days to add to the start date to reach the (inclusive) end date
///
/// `2 * duration * cycles - 1`: the start day itself is the first trial day.
pub fn total_trial_days(duration: RegimenDuration, cycles: CycleCount) -> u32 {
    duration.cycle_length_days() * cycles.cycles() - 1
}

/// Which of the two compared regimens a daily report was made under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimenArm {
    A,
    B,
}

impl RegimenArm {
    pub fn from_key(key: i64) -> Result<Self, UnknownKey> {
        match key {
            0 => Ok(Self::A),
            1 => Ok(Self::B),
            _ => Err(UnknownKey::new("regimen", key)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

/// Treatment options offered by real campaigns
const MEDICATION_LABELS: [&str; 8] = [
    "No specific treatment",
    "Tylenol (acetaminophen)",
    "Any NSAID (e.g., ibuprofen, naproxen, sulindac)",
    "Codeine combination product (e.g., Tylenol with codeine, Tylenol #3)",
    "Tramadol (e.g., Ultram, Ryzolt, ConZip, Rybix)",
    "Hydrocodone combination product (e.g., Vicodin, Norco)",
    "Oxycodone combination treatment (e.g., Percocet)",
    "Complementary treatment: including but not limited to physical activity (exercise, \
     stretching, yoga), mindfulness (meditation, relaxation, music therapy)",
];

/// Options offered by mock and test campaigns; key 8 is "Other"
const GENRE_LABELS: [&str; 9] = [
    "Classical",
    "Country",
    "Easy Listening",
    "Folk",
    "Hip hop",
    "Jazz",
    "Pop",
    "Rock",
    "Other",
];

/// Mock and test campaigns compare music genres instead of medications
pub fn is_mock_campaign(campaign_id: &str) -> bool {
    campaign_id.contains("old") || campaign_id.contains("mock")
}

/// Human-readable label for a regimen option key
pub fn regimen_label(key: i64, is_mock: bool) -> Result<&'static str, UnknownKey> {
    let labels: &[&'static str] = if is_mock {
        &GENRE_LABELS
    } else {
        &MEDICATION_LABELS
    };

    usize::try_from(key)
        .ok()
        .and_then(|index| labels.get(index))
        .copied()
        .ok_or_else(|| {
            let table = if is_mock {
                "mock regimen option"
            } else {
                "regimen option"
            };
            UnknownKey::new(table, key)
        })
}
