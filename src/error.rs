// src/error.rs

use polars::prelude::PolarsError;
use thiserror::Error;

/// A convention name that does not map onto any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} convention: '{value}'")]
pub struct UnknownConventionError {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownConventionError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        UnknownConventionError {
            kind,
            value: value.into(),
        }
    }
}

/// Errors raised by the crate. Data-quality findings are not errors; see
/// [`crate::consistency::ConsistencyWarning`].
#[derive(Error, Debug)]
pub enum SeriesError {
    /// Malformed input: empty table, bad time key, non-numeric columns.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    UnknownConvention(#[from] UnknownConventionError),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("download failed: {0}")]
    Download(String),
}

impl SeriesError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SeriesError::Validation(message.into())
    }
}

pub type Result<T, E = SeriesError> = std::result::Result<T, E>;
