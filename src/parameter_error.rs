//! Error handling for the planner parameters

use std::io;
use thiserror::Error;

/// Unified error to report failures while loading or validating `ApfParams`.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),

    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Invalid Length of {field}: expected {expected}, found {found}")]
    InvalidLength { field: &'static str, expected: usize, found: usize },

    #[error("Invalid value of {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Attractive gains of the {field} field do not match: zeta * radius = {inner}, alfa = {outer}")]
    MismatchedGains { field: &'static str, inner: f64, outer: f64 },
}
