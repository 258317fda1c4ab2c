//! Engine construction error types.

use thiserror::Error;

/// Errors raised while bringing up the GPU backend.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to create a wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create a wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),
}

/// A specialized Result type for engine construction.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
