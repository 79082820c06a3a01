//! Vulkan hardware abstraction layer.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - GPU capability and format introspection
//! - Buffer and texture creation with staging-backed map/unmap emulation
//! - GLSL shader compilation with automatic header injection
//! - Pipeline validation and creation

pub mod allocator;
pub mod buffer;
pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod format;
pub mod framebuffer;
pub mod instance;
pub mod pipeline;
pub mod sampler;
pub mod shader;
pub mod staging;
pub mod texture;

pub use allocator::{DeviceBuffer, DeviceImage, GpuAllocator};
pub use buffer::Buffer;
pub use capabilities::{
    DeviceFeature, DeviceLimit, FormatCapabilities, GpuCapabilities, GpuVendor,
};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    AddressMode, BufferDesc, BufferRange, BufferType, CompareOp, ComputePipelineDesc, CullMode,
    DepthStencilDesc, Filter, FramebufferDesc, PrimitiveTopology, RenderPipelineDesc, SamplerDesc,
    ShaderModuleDesc, ShaderSource, ShaderStage, ShaderStages, StorageMode, TextureDesc,
    TextureUsage,
};
pub use device::Device;
pub use error::{HalError, Result};
pub use format::TextureFormat;
pub use framebuffer::Framebuffer;
pub use pipeline::{ComputePipeline, DepthStencilState, RenderPipeline};
pub use sampler::Sampler;
pub use shader::ShaderModule;
pub use staging::StagingEngine;
pub use texture::Texture;
