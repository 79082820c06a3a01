//! HAL error types.

use ash::vk;
use thiserror::Error;

/// Errors produced by the hardware abstraction layer.
#[derive(Error, Debug)]
pub enum HalError {
    /// A descriptor field is structurally invalid.
    #[error("Invalid argument: {0}")]
    ArgumentInvalid(String),

    /// A required argument is missing or empty.
    #[error("Null argument: {0}")]
    ArgumentNull(String),

    /// A range lies outside the target resource.
    #[error("Out of range: {0}")]
    ArgumentOutOfRange(String),

    /// A descriptor is internally inconsistent.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Vulkan error propagated from the backend.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Shader compilation failed; carries the compiler diagnostic verbatim.
    #[error("Shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, HalError>;
