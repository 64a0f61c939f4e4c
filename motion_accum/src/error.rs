//! Error types for motion_accum.
//!
//! The integration path itself never fails; only configuration is checked.

use thiserror::Error;

/// Errors raised while validating accumulator or frame-source configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// Confidence threshold was NaN or infinite.
    #[error("invalid confidence threshold: {0} (must be finite)")]
    InvalidThreshold(f32),

    /// Scale floor was not a finite, strictly positive number.
    #[error("invalid minimum scale: {0} (must be finite and > 0)")]
    InvalidMinScale(f32),

    /// A reference magnitude used to derive probabilities was unusable.
    #[error("invalid reference magnitude `{name}`: {value} (must be finite and > 0)")]
    InvalidReference {
        /// Which reference.
        name:  &'static str,
        /// Offending value.
        value: f32,
    },
}

/// Result alias for motion_accum.
pub type Result<T> = std::result::Result<T, MotionError>;
