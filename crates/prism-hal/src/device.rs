//! Device facade.
//!
//! The single entry point for resource creation: descriptors go in,
//! validated live resources come out. All resources created through one
//! [`Device`] share its context, allocator, and staging engine.

use crate::buffer::Buffer;
use crate::capabilities::{DeviceFeature, DeviceLimit, FormatCapabilities, GpuCapabilities};
use crate::context::GpuContext;
use crate::descriptors::{
    BufferDesc, BufferRange, ComputePipelineDesc, DepthStencilDesc, FramebufferDesc,
    RenderPipelineDesc, SamplerDesc, ShaderModuleDesc, TextureDesc,
};
use crate::error::{HalError, Result};
use crate::format::TextureFormat;
use crate::framebuffer::Framebuffer;
use crate::pipeline::{ComputePipeline, DepthStencilState, RenderPipeline};
use crate::sampler::Sampler;
use crate::shader::ShaderModule;
use crate::texture::Texture;
use std::sync::Arc;

/// Resource factory bound to one GPU context.
#[derive(Clone)]
pub struct Device {
    ctx: Arc<GpuContext>,
}

impl Device {
    /// Wrap a context in a device facade.
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }

    /// The underlying context.
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Queried hardware capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        self.ctx.capabilities()
    }

    /// Create a buffer. When the descriptor carries initial data, the
    /// upload happens synchronously after allocation; an upload failure
    /// is non-fatal and returned alongside the live buffer.
    pub fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<(Buffer, Option<HalError>)> {
        let mut buffer = Buffer::create(self.ctx.clone(), desc)?;

        let upload_error = match desc.data {
            Some(data) => buffer
                .upload(data, BufferRange::new(0, data.len() as u64))
                .err(),
            None => None,
        };

        if let Some(e) = &upload_error {
            tracing::warn!(name = desc.debug_name, "Initial buffer upload failed: {e}");
        }

        Ok((buffer, upload_error))
    }

    /// Create a texture, uploading initial data when present.
    pub fn create_texture(&self, desc: &TextureDesc<'_>) -> Result<Arc<Texture>> {
        Ok(Arc::new(Texture::create(self.ctx.clone(), desc)?))
    }

    /// Compile or wrap a shader module.
    pub fn create_shader_module(&self, desc: &ShaderModuleDesc<'_>) -> Result<Arc<ShaderModule>> {
        Ok(Arc::new(ShaderModule::create(&self.ctx, desc)?))
    }

    /// Create a compute pipeline after validating the descriptor.
    pub fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<ComputePipeline> {
        ComputePipeline::create(&self.ctx, desc)
    }

    /// Create a render pipeline after validating the descriptor.
    pub fn create_render_pipeline(&self, desc: &RenderPipelineDesc) -> Result<RenderPipeline> {
        RenderPipeline::create(&self.ctx, desc)
    }

    /// Create a sampler.
    pub fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler> {
        Sampler::create(&self.ctx, desc)
    }

    /// Group attachments into a framebuffer after validating that they
    /// share one extent.
    pub fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Framebuffer> {
        Framebuffer::create(desc)
    }

    /// Create an immutable depth/stencil state object.
    pub fn create_depth_stencil_state(&self, desc: DepthStencilDesc) -> DepthStencilState {
        DepthStencilState::new(desc)
    }

    /// Whether the hardware supports a feature.
    pub fn has_feature(&self, feature: DeviceFeature) -> bool {
        self.ctx.capabilities().has_feature(feature)
    }

    /// Numeric limit for a capability.
    pub fn feature_limit(&self, limit: DeviceLimit) -> u64 {
        self.ctx.capabilities().feature_limit(limit)
    }

    /// Per-format capability bitmask.
    pub fn texture_format_capabilities(&self, format: TextureFormat) -> FormatCapabilities {
        self.ctx.texture_format_capabilities(format)
    }

    /// Wait for all submitted GPU work to finish.
    pub fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}
