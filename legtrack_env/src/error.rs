//! Error types for the environment layer.

use thiserror::Error;

/// Errors raised by transform providers.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// No transform between the two frames is known at this time.
    #[error("transform from '{source_frame}' to '{target}' unavailable")]
    Unavailable { target: String, source_frame: String },

    /// A frame id was empty or malformed.
    #[error("invalid frame id: '{0}'")]
    InvalidFrame(String),
}

impl TransformError {
    /// Convenience constructor for a failed lookup.
    pub fn unavailable(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Unavailable {
            target: target.into(),
            source_frame: source.into(),
        }
    }
}
