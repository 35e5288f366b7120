//! Error types for road-constrained state construction and scoring.
//!
//! Every fallible operation in the crate returns [`Result`]. Precondition
//! violations fail fast with [`TrackingError::InvalidArgument`] or
//! [`TrackingError::DimensionMismatch`]; nothing is coerced silently.
use thiserror::Error;

/// Errors raised by the vehicle state core and its I/O surfaces.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// A constructor or operation received an argument that violates its contract.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The belief dimensionality does not agree with the edge state.
    #[error("Dimension mismatch: expected a {expected}-D belief, found {found}-D")]
    DimensionMismatch { expected: usize, found: usize },

    /// The coordinate projector was asked to project onto the off-road sentinel.
    #[error("Cannot project road coordinates onto the off-road edge")]
    OffRoadProjection,

    /// The requested operation is intentionally unsupported.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Configuration could not be parsed or written.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl TrackingError {
    /// Creates an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
