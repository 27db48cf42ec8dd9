//! # Trialist Common Library
//!
//! Shared code for the Trialist batch tools including:
//! - Error and result types
//! - Configuration loading
//! - UTC calendar helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
