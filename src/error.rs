/*!
Errors
======

A calibration is a one-shot batch job, so every error is fatal for the run
that raised it. Degenerate data (an optimizer that does not settle, too few
posterior samples) is not an error: it is logged and flagged on the value that
is handed back to the caller.
 */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AbcError>;

#[derive(Error, Debug)]
pub enum AbcError {
    /// Metadata and run data do not fit together, or a setting is out of range.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A logarithm was requested for a value where it is not defined.
    #[error("domain error: metric {metric}: cannot take the logarithm of {value}")]
    Domain { metric: String, value: f64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AbcError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AbcError::Configuration(message.into())
    }
}
