//! Error taxonomy for the flow engine.
//!
//! Detection, graph building, analysis and export are total over well-formed
//! input. Only out-of-range configuration (thresholds, windows, limits) and
//! unknown export formats surface as errors. Storage and CLI code wrap these in
//! `anyhow` like the rest of the crate.

use thiserror::Error;

/// Errors produced by the flow engine.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A caller-supplied parameter is outside its valid domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested export format is not one of `json`, `dot`, `mermaid`.
    #[error("unsupported export format: {0} (supported: json, dot, mermaid)")]
    UnsupportedFormat(String),

    /// JSON serialization of a graph failed.
    #[error("failed to serialize flow graph: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Validate that `value` is a finite threshold in `[0.0, 1.0]`.
pub fn check_unit_interval(name: &str, value: f64) -> Result<f64, FlowError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(FlowError::invalid(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )))
    }
}
