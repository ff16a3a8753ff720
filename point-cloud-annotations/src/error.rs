//! Error types for measurement and annotation operations.

use thiserror::Error;

/// Result alias for chain operations.
pub type MeasureResult<T> = Result<T, MeasureError>;

/// Failures of point CRUD on a measurement chain.
///
/// Geometry queries on too few points are not errors; they return a neutral
/// value (0 or an invisible overlay) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MeasureError {
    #[error("point index {index} out of range for chain of {len} points")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("chain already holds the maximum of {max} points")]
    CapacityExceeded { max: usize },
}

/// Failures of annotation tree operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("annotation does not exist in this tree")]
    UnknownAnnotation,

    #[error("attaching this annotation would create a cycle")]
    Cycle,

    #[error("annotation has no camera view to fly to")]
    NoView,

    #[error("annotation has no action at index {index}")]
    UnknownAction { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_bounds() {
        let err = MeasureError::IndexOutOfRange { index: 4, len: 2 };
        assert!(err.to_string().contains("4"));
        assert!(err.to_string().contains("2 points"));

        let err = MeasureError::CapacityExceeded { max: 3 };
        assert!(err.to_string().contains("maximum of 3"));

        assert!(AnnotationError::Cycle.to_string().contains("cycle"));
    }
}
