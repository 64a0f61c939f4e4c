//! Application error type.

use motion_accum::MotionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The window could not be created.
    #[error("window error: {0}")]
    Window(#[from] minifb::Error),

    /// Accumulator or frame-comparison configuration was rejected.
    #[error("configuration error: {0}")]
    Config(#[from] MotionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_wraps_motion_error() {
        let err: AppError = MotionError::InvalidMinScale(-1.0).into();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("minimum scale"));
    }
}
