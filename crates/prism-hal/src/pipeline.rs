//! Pipeline validation and creation.
//!
//! Structural preconditions are enforced before any backend object is
//! constructed; a validation failure never yields a partial pipeline.

use crate::context::GpuContext;
use crate::descriptors::{
    CompareOp, ComputePipelineDesc, CullMode, DepthStencilDesc, PrimitiveTopology,
    RenderPipelineDesc, ShaderStage,
};
use crate::error::{HalError, Result};
use crate::format::TextureFormat;
use crate::shader::ShaderModule;
use ash::vk;
use std::sync::Arc;

/// Check the structural preconditions of a compute pipeline descriptor
/// and extract the compute module.
pub(crate) fn validate_compute_pipeline(
    desc: &ComputePipelineDesc,
) -> Result<Arc<ShaderModule>> {
    let Some(stages) = &desc.stages else {
        return Err(HalError::ArgumentInvalid("Missing shader stages".to_string()));
    };
    stages
        .module(ShaderStage::Compute)
        .cloned()
        .ok_or_else(|| HalError::ArgumentInvalid("Missing compute shader".to_string()))
}

/// Check the structural preconditions of a render pipeline descriptor
/// and extract the vertex and fragment modules.
pub(crate) fn validate_render_pipeline(
    desc: &RenderPipelineDesc,
) -> Result<(Arc<ShaderModule>, Arc<ShaderModule>)> {
    let Some(stages) = &desc.stages else {
        return Err(HalError::ArgumentInvalid("Missing shader stages".to_string()));
    };

    let has_color = desc
        .color_formats
        .iter()
        .any(|f| *f != TextureFormat::Invalid);
    let has_depth = desc.depth_format != TextureFormat::Invalid;
    if !has_color && !has_depth {
        return Err(HalError::ArgumentInvalid(
            "Need at least one attachment".to_string(),
        ));
    }

    let vertex = stages
        .module(ShaderStage::Vertex)
        .cloned()
        .ok_or_else(|| HalError::ArgumentInvalid("Missing vertex shader".to_string()))?;
    let fragment = stages
        .module(ShaderStage::Fragment)
        .cloned()
        .ok_or_else(|| HalError::ArgumentInvalid("Missing fragment shader".to_string()))?;

    Ok((vertex, fragment))
}

fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::Front => vk::CullModeFlags::FRONT,
    }
}

/// Immutable depth/stencil state object.
pub struct DepthStencilState {
    desc: DepthStencilDesc,
}

impl DepthStencilState {
    pub(crate) fn new(desc: DepthStencilDesc) -> Self {
        Self { desc }
    }

    pub fn desc(&self) -> &DepthStencilDesc {
        &self.desc
    }
}

/// Compute pipeline object.
pub struct ComputePipeline {
    device: Arc<ash::Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    // Keeps the module alive for the pipeline's lifetime
    #[allow(dead_code)]
    shader: Arc<ShaderModule>,
}

impl ComputePipeline {
    /// Validate the descriptor and build the pipeline.
    pub(crate) fn create(ctx: &GpuContext, desc: &ComputePipelineDesc) -> Result<Self> {
        let shader = validate_compute_pipeline(desc)?;

        let device = ctx.device();

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(|e| HalError::PipelineCreation(e.to_string()))?
        };

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader.handle())
            .name(c"main");

        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage_info)
            .layout(layout);

        let pipelines = unsafe {
            device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_pipelines, e)| {
                    device.destroy_pipeline_layout(layout, None);
                    HalError::PipelineCreation(e.to_string())
                })?
        };

        tracing::debug!(name = desc.debug_name, "Created compute pipeline");

        Ok(Self {
            device: ctx.device_arc(),
            pipeline: pipelines[0],
            layout,
            shader,
        })
    }

    /// Raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout handle.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Render pipeline object built for dynamic rendering.
pub struct RenderPipeline {
    device: Arc<ash::Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    // Keeps the modules alive for the pipeline's lifetime
    #[allow(dead_code)]
    shaders: (Arc<ShaderModule>, Arc<ShaderModule>),
}

impl RenderPipeline {
    /// Validate the descriptor and build the pipeline.
    pub(crate) fn create(ctx: &GpuContext, desc: &RenderPipelineDesc) -> Result<Self> {
        let (vertex, fragment) = validate_render_pipeline(desc)?;

        let color_formats: Vec<vk::Format> = desc
            .color_formats
            .iter()
            .map(|f| {
                f.to_vk().ok_or_else(|| {
                    HalError::ArgumentInvalid(format!("Color format {f:?} has no Vulkan equivalent"))
                })
            })
            .collect::<Result<_>>()?;

        let depth_format = if desc.depth_format == TextureFormat::Invalid {
            None
        } else {
            Some(desc.depth_format.to_vk().ok_or_else(|| {
                HalError::ArgumentInvalid(format!(
                    "Depth format {:?} has no Vulkan equivalent",
                    desc.depth_format
                ))
            })?)
        };

        let device = ctx.device();

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex.handle())
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment.handle())
                .name(c"main"),
        ];

        // Vertex pulling through buffer references; no fixed-function input
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test)
            .depth_write_enable(desc.depth_stencil.depth_write)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments: Vec<_> = color_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(|e| HalError::PipelineCreation(e.to_string()))?
        };

        let mut rendering_info =
            vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);

        if let Some(depth_format) = depth_format {
            rendering_info = rendering_info.depth_attachment_format(depth_format);
        }

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_pipelines, e)| {
                    device.destroy_pipeline_layout(layout, None);
                    HalError::PipelineCreation(e.to_string())
                })?
        };

        tracing::debug!(name = desc.debug_name, "Created render pipeline");

        Ok(Self {
            device: ctx.device_arc(),
            pipeline: pipelines[0],
            layout,
            shaders: (vertex, fragment),
        })
    }

    /// Raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout handle.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::ShaderStages;

    #[test]
    fn compute_pipeline_requires_stage_set() {
        let desc = ComputePipelineDesc::default();
        let err = validate_compute_pipeline(&desc).unwrap_err();
        assert!(matches!(err, HalError::ArgumentInvalid(msg) if msg.contains("shader stages")));
    }

    #[test]
    fn compute_pipeline_requires_compute_module() {
        let desc = ComputePipelineDesc {
            stages: Some(ShaderStages::default()),
            ..Default::default()
        };
        let err = validate_compute_pipeline(&desc).unwrap_err();
        assert!(matches!(err, HalError::ArgumentInvalid(msg) if msg.contains("compute shader")));
    }

    #[test]
    fn render_pipeline_requires_stage_set() {
        let desc = RenderPipelineDesc {
            color_formats: vec![TextureFormat::Rgba8Unorm],
            ..Default::default()
        };
        let err = validate_render_pipeline(&desc).unwrap_err();
        assert!(matches!(err, HalError::ArgumentInvalid(msg) if msg.contains("shader stages")));
    }

    #[test]
    fn render_pipeline_requires_an_attachment() {
        // Independent of shader stages: the attachment check fires even
        // with a stage set present.
        let desc = RenderPipelineDesc {
            stages: Some(ShaderStages::default()),
            ..Default::default()
        };
        let err = validate_render_pipeline(&desc).unwrap_err();
        assert!(matches!(err, HalError::ArgumentInvalid(msg) if msg.contains("attachment")));
    }

    #[test]
    fn depth_only_attachment_is_sufficient() {
        let desc = RenderPipelineDesc {
            stages: Some(ShaderStages::default()),
            depth_format: TextureFormat::Depth32Float,
            ..Default::default()
        };
        // Passes the attachment check, then fails on the missing vertex
        // module.
        let err = validate_render_pipeline(&desc).unwrap_err();
        assert!(matches!(err, HalError::ArgumentInvalid(msg) if msg.contains("vertex shader")));
    }

    #[test]
    fn invalid_color_formats_do_not_count_as_attachments() {
        let desc = RenderPipelineDesc {
            stages: Some(ShaderStages::default()),
            color_formats: vec![TextureFormat::Invalid],
            ..Default::default()
        };
        let err = validate_render_pipeline(&desc).unwrap_err();
        assert!(matches!(err, HalError::ArgumentInvalid(msg) if msg.contains("attachment")));
    }

    #[test]
    fn missing_vertex_fails_with_any_attachment_configuration() {
        for (color, depth) in [
            (vec![TextureFormat::Rgba8Unorm], TextureFormat::Invalid),
            (vec![], TextureFormat::Depth32Float),
            (vec![TextureFormat::Bgra8Srgb], TextureFormat::Depth32Float),
        ] {
            let desc = RenderPipelineDesc {
                stages: Some(ShaderStages::default()),
                color_formats: color,
                depth_format: depth,
                ..Default::default()
            };
            let err = validate_render_pipeline(&desc).unwrap_err();
            assert!(matches!(err, HalError::ArgumentInvalid(_)));
        }
    }
}
