//! Error types for framescope analysis operations.
//!
//! Every failure crosses the subsystem boundary as an explicit `Result`
//! value; callers can degrade a single debugging feature without tearing
//! down the session.

use thiserror::Error;

use crate::resource::ResourceId;

/// The main error type for analysis operations.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The resource id is not registered.
    #[error("unknown resource {0:?}")]
    UnknownResource(ResourceId),

    /// A numeric range was degenerate (histogram requires `min < max`).
    #[error("degenerate range: min {min} must be strictly less than max {max}")]
    DegenerateRange { min: f32, max: f32 },

    /// The device lacks compute shader support; recorded once as a
    /// portability warning, then returned on every affected call.
    #[error("compute shaders unavailable on this device")]
    ComputeUnavailable,

    /// A required pipeline failed to build earlier in the session and the
    /// feature is disabled.
    #[error("feature disabled after pipeline compile failure: {0}")]
    FeatureDisabled(&'static str),

    /// The request addressed the resource out of bounds or with
    /// unsupported parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Buffer mapping or readback failed.
    #[error("readback failed: {0}")]
    Readback(String),
}

/// A specialized Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
