//! Shader module compilation.
//!
//! GLSL sources that carry no `#version` marker get a stage-specific
//! header prepended before compilation: the bindless slot table every
//! shader needs, and for fragment shaders the descriptor arrays plus the
//! texture sampling helper family. Precompiled SPIR-V is passed to the
//! backend unmodified.

use crate::context::GpuContext;
use crate::descriptors::{ShaderModuleDesc, ShaderSource, ShaderStage};
use crate::error::{HalError, Result};
use ash::vk;
use std::sync::Arc;

/// Whether the source already declares a GLSL version header.
pub fn has_version_marker(source: &str) -> bool {
    source.contains("#version ")
}

/// Number of bindless slots in the synthesized bindings block.
pub const BINDING_SLOT_COUNT: usize = 16;

/// Synthesize the header block for a stage.
///
/// Pure; `debug_printf` reflects the capability captured at context
/// initialization.
pub fn shader_preamble(stage: ShaderStage, debug_printf: bool) -> String {
    let mut header = String::from("#version 460\n");

    if debug_printf {
        header.push_str("#extension GL_EXT_debug_printf : enable\n");
    }

    header.push_str(
        r"#extension GL_EXT_nonuniform_qualifier : require
#extension GL_EXT_buffer_reference : require
#extension GL_EXT_buffer_reference_uvec2 : require
#extension GL_EXT_shader_explicit_arithmetic_types_float16 : require
",
    );

    if stage == ShaderStage::Fragment {
        header.push_str(
            r"
layout (set = 0, binding = 0) uniform texture2D kTextures2D[];
layout (set = 0, binding = 1) uniform texture2DArray kTextures2DArray[];
layout (set = 0, binding = 2) uniform texture3D kTextures3D[];
layout (set = 0, binding = 3) uniform textureCube kTexturesCube[];
layout (set = 0, binding = 4) uniform sampler kSamplers[];
layout (set = 0, binding = 5) uniform samplerShadow kSamplersShadow[];
",
        );
    }

    // Slot layout: texture (x), sampler (y), buffer (zw); packed into
    // uvec4 because scalar block layout is not guaranteed pre-1.2.
    header.push_str(
        r"
layout (set = 1, binding = 0) uniform Bindings {
  uvec4 slots[16];
} bindings;
uvec2 getBuffer(uint slot) {
  return bindings.slots[slot].zw;
}
",
    );

    if stage == ShaderStage::Fragment {
        header.push_str(
            r"ivec2 textureSize2D(uint slotTexture, uint slotSampler) {
  uint idxTex = bindings.slots[slotTexture].x;
  uint idxSmp = bindings.slots[slotSampler].y;
  return textureSize(sampler2D(kTextures2D[nonuniformEXT(idxTex)],
                               kSamplers[nonuniformEXT(idxSmp)]), 0);
}
vec4 textureSample2D(uint slotTexture, uint slotSampler, vec2 uv) {
  uint idxTex = bindings.slots[slotTexture].x;
  uint idxSmp = bindings.slots[slotSampler].y;
  return texture(sampler2D(kTextures2D[nonuniformEXT(idxTex)],
                           kSamplers[nonuniformEXT(idxSmp)]), uv);
}
float textureSample2DShadow(uint slotTexture, uint slotSampler, vec3 uvw) {
  uint idxTex = bindings.slots[slotTexture].x;
  uint idxSmp = bindings.slots[slotSampler].y;
  return texture(sampler2DShadow(kTextures2D[nonuniformEXT(idxTex)],
                                 kSamplersShadow[nonuniformEXT(idxSmp)]), uvw);
}
vec4 textureSample2DArray(uint slotTexture, uint slotSampler, vec3 uvw) {
  uint idxTex = bindings.slots[slotTexture].x;
  uint idxSmp = bindings.slots[slotSampler].y;
  return texture(sampler2DArray(kTextures2DArray[nonuniformEXT(idxTex)],
                                kSamplers[nonuniformEXT(idxSmp)]), uvw);
}
vec4 textureSampleCube(uint slotTexture, uint slotSampler, vec3 uvw) {
  uint idxTex = bindings.slots[slotTexture].x;
  uint idxSmp = bindings.slots[slotSampler].y;
  return texture(samplerCube(kTexturesCube[nonuniformEXT(idxTex)],
                             kSamplers[nonuniformEXT(idxSmp)]), uvw);
}
vec4 textureSample3D(uint slotTexture, uint slotSampler, vec3 uvw) {
  uint idxTex = bindings.slots[slotTexture].x;
  uint idxSmp = bindings.slots[slotSampler].y;
  return texture(sampler3D(kTextures3D[nonuniformEXT(idxTex)],
                           kSamplers[nonuniformEXT(idxSmp)]), uvw);
}
vec4 textureLod2D(uint slotTexture, uint slotSampler, vec3 uvw, float lod) {
  uint idxTex = bindings.slots[slotTexture].x;
  uint idxSmp = bindings.slots[slotSampler].y;
  return textureLod(samplerCube(kTexturesCube[nonuniformEXT(idxTex)],
                                kSamplers[nonuniformEXT(idxSmp)]), uvw, lod);
}
",
        );
    }

    header
}

fn shader_kind(stage: ShaderStage) -> shaderc::ShaderKind {
    match stage {
        ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
        ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
        ShaderStage::Compute => shaderc::ShaderKind::Compute,
    }
}

/// A compiled shader module.
pub struct ShaderModule {
    device: Arc<ash::Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    debug_name: String,
}

impl ShaderModule {
    /// Compile or wrap a shader module from a descriptor.
    pub(crate) fn create(ctx: &GpuContext, desc: &ShaderModuleDesc<'_>) -> Result<Self> {
        let module = match desc.source {
            ShaderSource::Spirv(words) => Self::create_from_spirv(ctx.device(), words)?,
            ShaderSource::Glsl(text) => {
                Self::compile_glsl(ctx, desc.stage, text, desc.debug_name)?
            }
        };

        if !desc.debug_name.is_empty() {
            tracing::debug!(name = desc.debug_name, stage = ?desc.stage, "Created shader module");
        }

        Ok(Self {
            device: ctx.device_arc(),
            module,
            stage: desc.stage,
            debug_name: desc.debug_name.to_string(),
        })
    }

    /// Binary path: hand the words to the backend unmodified.
    fn create_from_spirv(device: &ash::Device, words: &[u32]) -> Result<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None)? };
        Ok(module)
    }

    /// Text path: patch in the stage header when needed, then compile.
    fn compile_glsl(
        ctx: &GpuContext,
        stage: ShaderStage,
        source: &str,
        debug_name: &str,
    ) -> Result<vk::ShaderModule> {
        if source.is_empty() {
            return Err(HalError::ArgumentNull("Shader source is empty".to_string()));
        }

        let patched;
        let source = if has_version_marker(source) {
            source
        } else {
            patched = format!(
                "{}{}",
                shader_preamble(stage, ctx.supports_debug_printf()),
                source
            );
            &patched
        };

        let compiler = shaderc::Compiler::new()
            .ok_or_else(|| HalError::ShaderCompilation("Compiler unavailable".to_string()))?;
        let mut options = shaderc::CompileOptions::new()
            .ok_or_else(|| HalError::ShaderCompilation("Compiler unavailable".to_string()))?;
        options.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_3 as u32,
        );

        let input_name = if debug_name.is_empty() {
            "shader"
        } else {
            debug_name
        };

        let artifact = compiler
            .compile_into_spirv(source, shader_kind(stage), input_name, "main", Some(&options))
            .map_err(|e| HalError::ShaderCompilation(e.to_string()))?;

        Self::create_from_spirv(ctx.device(), artifact.as_binary())
    }

    /// Target stage.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Raw Vulkan module handle.
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Debug label.
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

impl std::fmt::Debug for ShaderModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModule")
            .field("stage", &self.stage)
            .field("debug_name", &self.debug_name)
            .finish_non_exhaustive()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_marker_detection() {
        assert!(has_version_marker("#version 460\nvoid main() {}"));
        assert!(has_version_marker("// header\n#version 450 core\n"));
        assert!(!has_version_marker("void main() {}"));
        // `#version` with no trailing space is not a marker
        assert!(!has_version_marker("#versionless"));
    }

    #[test]
    fn every_preamble_declares_a_version() {
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment, ShaderStage::Compute] {
            let preamble = shader_preamble(stage, false);
            assert!(preamble.starts_with("#version 460\n"));
            assert!(has_version_marker(&preamble));
        }
    }

    #[test]
    fn vertex_and_compute_preambles_carry_bindings_block() {
        for stage in [ShaderStage::Vertex, ShaderStage::Compute] {
            let preamble = shader_preamble(stage, false);
            assert!(preamble.contains("uvec4 slots[16]"));
            assert!(preamble.contains("uvec2 getBuffer(uint slot)"));
            assert!(!preamble.contains("textureSample2D"));
            assert!(!preamble.contains("kTextures2D"));
        }
    }

    #[test]
    fn fragment_preamble_declares_bindless_helpers() {
        let preamble = shader_preamble(ShaderStage::Fragment, false);
        for decl in [
            "uniform texture2D kTextures2D[]",
            "uniform texture2DArray kTextures2DArray[]",
            "uniform texture3D kTextures3D[]",
            "uniform textureCube kTexturesCube[]",
            "uniform sampler kSamplers[]",
            "uniform samplerShadow kSamplersShadow[]",
        ] {
            assert!(preamble.contains(decl), "missing declaration: {decl}");
        }
        for helper in [
            "ivec2 textureSize2D(",
            "vec4 textureSample2D(",
            "float textureSample2DShadow(",
            "vec4 textureSample2DArray(",
            "vec4 textureSampleCube(",
            "vec4 textureSample3D(",
            "vec4 textureLod2D(",
        ] {
            assert!(preamble.contains(helper), "missing helper: {helper}");
        }
        assert!(preamble.contains("uvec4 slots[16]"));
    }

    #[test]
    fn debug_printf_extension_is_conditional() {
        let without = shader_preamble(ShaderStage::Vertex, false);
        assert!(!without.contains("GL_EXT_debug_printf"));

        let with = shader_preamble(ShaderStage::Vertex, true);
        assert!(with.contains("#extension GL_EXT_debug_printf : enable"));
    }
}
