//! End-to-end resource tests against a live Vulkan device.
//!
//! These tests require a GPU and will be skipped in CI without GPU
//! support.

use prism_hal::{
    BufferDesc, BufferRange, BufferType, ComputePipelineDesc, Device, GpuContextBuilder,
    RenderPipelineDesc, SamplerDesc, ShaderModuleDesc, ShaderSource, ShaderStage, ShaderStages,
    StorageMode, TextureDesc, TextureFormat, TextureUsage,
};
use std::sync::Arc;

fn test_device() -> Device {
    let ctx = GpuContextBuilder::new()
        .app_name("prism-tests")
        .validation(false)
        .build()
        .unwrap();
    Device::new(Arc::new(ctx))
}

#[test]
#[ignore = "Requires GPU hardware"]
fn shared_buffer_round_trip() {
    let device = test_device();

    let data: Vec<u8> = (0..=255).collect();
    let (mut buffer, upload_err) = device
        .create_buffer(&BufferDesc {
            length: 256,
            buffer_type: BufferType::STORAGE,
            storage: StorageMode::Shared,
            data: Some(&data),
            debug_name: "round trip shared",
        })
        .unwrap();
    assert!(upload_err.is_none());
    assert_eq!(buffer.storage_mode(), StorageMode::Shared);

    let mapped = buffer.map(BufferRange::new(0, 256)).unwrap();
    assert_eq!(mapped, &data[..]);
    buffer.unmap();
}

#[test]
#[ignore = "Requires GPU hardware"]
fn private_buffer_round_trip_through_staging() {
    let device = test_device();

    let data = vec![0xA5u8; 4096];
    let (mut buffer, upload_err) = device
        .create_buffer(&BufferDesc {
            length: 4096,
            buffer_type: BufferType::VERTEX,
            storage: StorageMode::Private,
            data: Some(&data),
            debug_name: "round trip private",
        })
        .unwrap();
    assert!(upload_err.is_none());
    assert_eq!(buffer.storage_mode(), StorageMode::Private);

    let mapped = buffer.map(BufferRange::new(0, 4096)).unwrap();
    assert_eq!(mapped, &data[..]);
    buffer.unmap();

    // The unmap wrote the unchanged scratch back; contents must survive
    let mapped = buffer.map(BufferRange::new(0, 4096)).unwrap();
    assert_eq!(mapped, &data[..]);
    buffer.unmap();
}

#[test]
#[ignore = "Requires GPU hardware"]
fn private_demoted_to_shared_without_staging() {
    let ctx = GpuContextBuilder::new()
        .app_name("prism-tests")
        .validation(false)
        .staging(false)
        .build()
        .unwrap();
    let device = Device::new(Arc::new(ctx));

    let (buffer, _) = device
        .create_buffer(&BufferDesc {
            length: 64,
            buffer_type: BufferType::UNIFORM,
            storage: StorageMode::Private,
            debug_name: "demoted",
            ..Default::default()
        })
        .unwrap();
    assert_eq!(buffer.storage_mode(), StorageMode::Shared);
}

#[test]
#[ignore = "Requires GPU hardware"]
fn map_write_unmap_persists() {
    let device = test_device();

    let (mut buffer, _) = device
        .create_buffer(&BufferDesc {
            length: 128,
            buffer_type: BufferType::STORAGE,
            storage: StorageMode::Private,
            debug_name: "map write",
            ..Default::default()
        })
        .unwrap();

    let mapped = buffer.map(BufferRange::new(32, 64)).unwrap();
    mapped.fill(0x3C);
    buffer.unmap();
    assert!(!buffer.is_mapped());

    let mapped = buffer.map(BufferRange::new(32, 64)).unwrap();
    assert!(mapped.iter().all(|&b| b == 0x3C));
    buffer.unmap();
}

#[test]
#[ignore = "Requires GPU hardware"]
fn double_map_finalizes_previous_mapping() {
    let device = test_device();

    let (mut buffer, _) = device
        .create_buffer(&BufferDesc {
            length: 64,
            buffer_type: BufferType::STORAGE,
            storage: StorageMode::Private,
            debug_name: "double map",
            ..Default::default()
        })
        .unwrap();

    let mapped = buffer.map(BufferRange::new(0, 32)).unwrap();
    mapped.fill(0x11);

    // Mapping a different range finalizes the first mapping
    let _ = buffer.map(BufferRange::new(32, 32)).unwrap();
    buffer.unmap();

    let mapped = buffer.map(BufferRange::new(0, 32)).unwrap();
    assert!(mapped.iter().all(|&b| b == 0x11));
    buffer.unmap();
}

#[test]
#[ignore = "Requires GPU hardware"]
fn failed_map_leaves_buffer_unmapped_and_intact() {
    let device = test_device();

    let data = vec![0x7Eu8; 256];
    let (mut buffer, upload_err) = device
        .create_buffer(&BufferDesc {
            length: 256,
            buffer_type: BufferType::STORAGE,
            storage: StorageMode::Private,
            data: Some(&data),
            debug_name: "failed map",
        })
        .unwrap();
    assert!(upload_err.is_none());

    // A map that fails must not leave an active mapping behind
    assert!(buffer.map(BufferRange::new(128, 256)).is_err());
    assert!(!buffer.is_mapped());

    // Unmapping with no active mapping is a warned no-op; the device
    // contents must be untouched afterwards
    buffer.unmap();
    let mapped = buffer.map(BufferRange::new(0, 256)).unwrap();
    assert_eq!(mapped, &data[..]);
    buffer.unmap();
}

#[test]
#[ignore = "Requires GPU hardware"]
fn oversized_allocation_fails_without_breaking_the_allocator() {
    let device = test_device();

    // Far beyond any device heap; the allocation must fail cleanly
    let result = device.create_buffer(&BufferDesc {
        length: 1 << 60,
        buffer_type: BufferType::STORAGE,
        storage: StorageMode::Private,
        debug_name: "oversized",
        ..Default::default()
    });
    assert!(result.is_err());

    // The allocator must still serve normal requests afterwards
    let (buffer, _) = device
        .create_buffer(&BufferDesc {
            length: 64,
            buffer_type: BufferType::STORAGE,
            storage: StorageMode::Shared,
            debug_name: "after failure",
            ..Default::default()
        })
        .unwrap();
    assert_eq!(buffer.size_in_bytes(), 64);
}

#[test]
#[ignore = "Requires GPU hardware"]
fn typed_upload_round_trip() {
    let device = test_device();

    let (mut buffer, _) = device
        .create_buffer(&BufferDesc {
            length: 48,
            buffer_type: BufferType::VERTEX,
            storage: StorageMode::Shared,
            debug_name: "typed upload",
            ..Default::default()
        })
        .unwrap();

    let positions: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
    buffer.upload_slice(&positions, 0).unwrap();

    let mapped = buffer.map(BufferRange::new(0, 24)).unwrap();
    assert_eq!(mapped, bytemuck::cast_slice::<f32, u8>(&positions));
    buffer.unmap();
}

#[test]
#[ignore = "Requires GPU hardware"]
fn map_out_of_range_fails() {
    let device = test_device();

    let (mut buffer, _) = device
        .create_buffer(&BufferDesc {
            length: 64,
            buffer_type: BufferType::STORAGE,
            storage: StorageMode::Shared,
            debug_name: "oob map",
            ..Default::default()
        })
        .unwrap();

    assert!(buffer.map(BufferRange::new(32, 64)).is_err());
    assert!(!buffer.is_mapped());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn glsl_without_version_marker_compiles() {
    let device = test_device();

    let module = device
        .create_shader_module(&ShaderModuleDesc {
            stage: ShaderStage::Compute,
            source: ShaderSource::Glsl(
                "layout (local_size_x = 64) in;\nvoid main() {}\n",
            ),
            debug_name: "headerless compute",
        })
        .unwrap();
    assert_eq!(module.stage(), ShaderStage::Compute);
}

#[test]
#[ignore = "Requires GPU hardware"]
fn empty_shader_source_fails() {
    let device = test_device();

    let result = device.create_shader_module(&ShaderModuleDesc {
        stage: ShaderStage::Vertex,
        source: ShaderSource::Glsl(""),
        debug_name: "empty",
    });
    assert!(result.is_err());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn compute_pipeline_from_glsl() {
    let device = test_device();

    let module = device
        .create_shader_module(&ShaderModuleDesc {
            stage: ShaderStage::Compute,
            source: ShaderSource::Glsl(
                "layout (local_size_x = 64) in;\nvoid main() {}\n",
            ),
            debug_name: "noop compute",
        })
        .unwrap();

    let pipeline = device
        .create_compute_pipeline(&ComputePipelineDesc {
            stages: Some(ShaderStages::compute(module)),
            debug_name: "noop".to_string(),
        })
        .unwrap();
    assert_ne!(pipeline.handle(), ash::vk::Pipeline::null());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn render_pipeline_from_glsl() {
    let device = test_device();

    let vertex = device
        .create_shader_module(&ShaderModuleDesc {
            stage: ShaderStage::Vertex,
            source: ShaderSource::Glsl(
                "void main() { gl_Position = vec4(0.0, 0.0, 0.0, 1.0); }\n",
            ),
            debug_name: "fullscreen vertex",
        })
        .unwrap();
    let fragment = device
        .create_shader_module(&ShaderModuleDesc {
            stage: ShaderStage::Fragment,
            source: ShaderSource::Glsl(
                "layout (location = 0) out vec4 color;\nvoid main() { color = vec4(1.0); }\n",
            ),
            debug_name: "solid fragment",
        })
        .unwrap();

    let pipeline = device
        .create_render_pipeline(&RenderPipelineDesc {
            stages: Some(ShaderStages::render(vertex, fragment)),
            color_formats: vec![TextureFormat::Rgba8Unorm],
            debug_name: "solid".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_ne!(pipeline.handle(), ash::vk::Pipeline::null());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn texture_with_initial_data() {
    let device = test_device();

    let pixels = vec![0xFFu8; 16 * 16 * 4];
    let texture = device
        .create_texture(&TextureDesc {
            width: 16,
            height: 16,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::SAMPLED,
            data: Some(&pixels),
            debug_name: "white 16x16",
            ..Default::default()
        })
        .unwrap();
    assert_eq!(texture.width(), 16);
    assert_eq!(texture.depth(), 1);
}

#[test]
#[ignore = "Requires GPU hardware"]
fn framebuffer_rejects_mismatched_extents() {
    let device = test_device();

    let make = |w, h| {
        device
            .create_texture(&TextureDesc {
                width: w,
                height: h,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::ATTACHMENT,
                debug_name: "attachment",
                ..Default::default()
            })
            .unwrap()
    };

    let a = make(64, 64);
    let b = make(32, 32);

    let result = device.create_framebuffer(&prism_hal::FramebufferDesc {
        color: vec![a, b],
        depth: None,
    });
    assert!(result.is_err());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn sampler_anisotropy_is_clamped() {
    let device = test_device();

    let sampler = device
        .create_sampler(&SamplerDesc {
            max_anisotropy: 1024.0,
            ..Default::default()
        })
        .unwrap();
    assert_ne!(sampler.handle(), ash::vk::Sampler::null());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn format_capability_queries() {
    let device = test_device();

    // Every implementation supports sampling RGBA8
    let caps = device.texture_format_capabilities(TextureFormat::Rgba8Unorm);
    assert!(caps.contains(prism_hal::FormatCapabilities::SAMPLED));

    let invalid = device.texture_format_capabilities(TextureFormat::Invalid);
    assert!(invalid.is_empty());
}
