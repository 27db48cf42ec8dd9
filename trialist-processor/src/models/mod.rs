//! Domain models for trial processing

pub mod document;
pub mod survey;
pub mod trial;

pub use document::{AnalysisResult, DataPoint, NormalizedDocument, TrialMetadata, SETUP_SURVEY_ID_FIELD};
pub use survey::{PayloadError, PromptResponse, PromptRow, SurveyKind, SurveyRecord};
pub use trial::{SetupConfig, SetupError, Trial, TrialKey};
