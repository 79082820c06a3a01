//! Resource descriptors.
//!
//! Callers describe the resource they want; the [`Device`](crate::Device)
//! facade validates the descriptor and hands back a live backend object.

use crate::format::TextureFormat;
use crate::shader::ShaderModule;
use crate::texture::Texture;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Usage-type bitmask for buffers. At least one bit must be set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferType: u32 {
        const INDEX = 1 << 0;
        const VERTEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDIRECT = 1 << 4;
    }
}

bitflags! {
    /// Usage-type bitmask for textures. At least one bit must be set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const ATTACHMENT = 1 << 2;
    }
}

/// Storage tier of a GPU allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Device-local memory; only reachable through copy commands.
    #[default]
    Private,
    /// Host-visible, coherent memory; directly mappable.
    Shared,
}

/// A byte range within a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRange {
    pub offset: u64,
    pub size: u64,
}

impl BufferRange {
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferDesc<'a> {
    /// Size in bytes; fixed for the lifetime of the buffer.
    pub length: u64,
    /// Usage-type bitmask.
    pub buffer_type: BufferType,
    /// Requested storage tier. The effective tier may be demoted to
    /// [`StorageMode::Shared`] when the context has staging disabled.
    pub storage: StorageMode,
    /// Optional initial contents, uploaded synchronously at creation.
    pub data: Option<&'a [u8]>,
    /// Debug label.
    pub debug_name: &'a str,
}

impl Default for BufferType {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// Shader input: GLSL text or precompiled SPIR-V words.
#[derive(Debug, Clone, Copy)]
pub enum ShaderSource<'a> {
    /// GLSL source. If it carries no `#version` marker, a stage-specific
    /// header is synthesized and prepended before compilation.
    Glsl(&'a str),
    /// Precompiled SPIR-V, passed to the backend unmodified.
    Spirv(&'a [u32]),
}

/// Descriptor for creating a shader module.
#[derive(Debug, Clone, Copy)]
pub struct ShaderModuleDesc<'a> {
    pub stage: ShaderStage,
    pub source: ShaderSource<'a>,
    pub debug_name: &'a str,
}

/// A set of shader modules keyed by stage.
#[derive(Debug, Clone, Default)]
pub struct ShaderStages {
    pub vertex: Option<Arc<ShaderModule>>,
    pub fragment: Option<Arc<ShaderModule>>,
    pub compute: Option<Arc<ShaderModule>>,
}

impl ShaderStages {
    /// Build a render stage set from vertex and fragment modules.
    pub fn render(vertex: Arc<ShaderModule>, fragment: Arc<ShaderModule>) -> Self {
        Self {
            vertex: Some(vertex),
            fragment: Some(fragment),
            compute: None,
        }
    }

    /// Build a compute stage set.
    pub fn compute(compute: Arc<ShaderModule>) -> Self {
        Self {
            vertex: None,
            fragment: None,
            compute: Some(compute),
        }
    }

    /// Get the module bound to a stage, if any.
    pub fn module(&self, stage: ShaderStage) -> Option<&Arc<ShaderModule>> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_ref(),
            ShaderStage::Fragment => self.fragment.as_ref(),
            ShaderStage::Compute => self.compute.as_ref(),
        }
    }
}

/// Depth/stencil state configuration.
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare: CompareOp,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            compare: CompareOp::Less,
        }
    }
}

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Primitive topology for render pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    None,
    #[default]
    Back,
    Front,
}

/// Descriptor for creating a compute pipeline.
#[derive(Debug, Clone, Default)]
pub struct ComputePipelineDesc {
    /// Shader stage set; must contain a compute module.
    pub stages: Option<ShaderStages>,
    pub debug_name: String,
}

/// Descriptor for creating a render pipeline.
#[derive(Debug, Clone, Default)]
pub struct RenderPipelineDesc {
    /// Shader stage set; must contain vertex and fragment modules.
    pub stages: Option<ShaderStages>,
    /// Color attachment formats. May be empty only when a depth
    /// attachment is present.
    pub color_formats: Vec<TextureFormat>,
    /// Depth attachment format; [`TextureFormat::Invalid`] means none.
    pub depth_format: TextureFormat,
    pub depth_stencil: DepthStencilDesc,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub debug_name: String,
}

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    Linear,
    Nearest,
}

/// Sampler addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Descriptor for creating a sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mipmap_filter: Filter,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    /// Requested anisotropy; clamped to the hardware maximum.
    pub max_anisotropy: f32,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mipmap_filter: Filter::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            max_anisotropy: 1.0,
        }
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, Default)]
pub struct TextureDesc<'a> {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub storage: StorageMode,
    /// Optional initial contents, tightly packed.
    pub data: Option<&'a [u8]>,
    pub debug_name: &'a str,
}

/// Descriptor grouping attachments into a framebuffer.
#[derive(Clone, Default)]
pub struct FramebufferDesc {
    pub color: Vec<Arc<Texture>>,
    pub depth: Option<Arc<Texture>>,
}
