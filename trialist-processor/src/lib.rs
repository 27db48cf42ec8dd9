//! Trialist analysis processor
//!
//! Batch job for N-of-1 trials: finds each participant's trial window from
//! the setup and start surveys, picks the trials that finished and still need
//! analysis, turns their daily surveys into a normalized document, submits it
//! to the analysis service and stores both the document and the result.

pub mod config;
pub mod db;
pub mod driver;
pub mod eligibility;
pub mod gateway;
pub mod lookup;
pub mod models;
pub mod normalizer;
pub mod repository;
pub mod resolver;

pub use config::{RunFlags, RunParameters};
pub use driver::{run, RunSummary, TrialOutcome};
pub use gateway::{AnalysisGateway, GatewayError, HttpAnalysisGateway};
pub use repository::SurveyRepository;
