//! Error types for visibility computations.

use thiserror::Error;

use crate::types::ObjectId;

/// Errors raised by the visibility engine.
///
/// All of these are deterministic: retrying the same call reproduces the
/// same failure.
#[derive(Debug, Error)]
pub enum VisError {
    /// Geometry has no defined horizon or separation angle.
    #[error("Domain error: {reason}")]
    Domain { reason: String },

    /// Input sequences do not line up.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    Shape {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Invalid sample sequence handed to the zero-crossing extractor.
    #[error("Invalid value: {0}")]
    Value(String),

    /// Crossing interpolation between samples `index` and `index + 1`
    /// did not produce a finite time.
    #[error("Degenerate crossing interpolation at sample {index}")]
    Arithmetic { index: usize },

    /// Identifiers of different kinds cannot be ordered.
    #[error("Identifiers {left} and {right} are not mutually comparable")]
    IncomparableIds { left: ObjectId, right: ObjectId },

    /// A scheduled window names a sensor or target the availability
    /// list doesn't have.
    #[error("Unknown {role} identifier {id}")]
    UnknownId { role: &'static str, id: ObjectId },

    /// Malformed JSON input or unserializable output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisError {
    pub(crate) fn domain(reason: impl Into<String>) -> Self {
        VisError::Domain {
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        VisError::Shape {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Result type alias for visibility operations.
pub type VisResult<T> = Result<T, VisError>;
