//! Prints the capabilities of the first suitable GPU.

use prism_hal::{
    BufferDesc, BufferRange, BufferType, Device, DeviceFeature, DeviceLimit, FormatCapabilities,
    GpuContextBuilder, StorageMode, TextureFormat,
};
use std::sync::Arc;
use tracing::info;

fn capability_row(caps: FormatCapabilities) -> String {
    let mut row = String::new();
    for (flag, label) in [
        (FormatCapabilities::SAMPLED, "sampled"),
        (FormatCapabilities::SAMPLED_FILTERED, "filtered"),
        (FormatCapabilities::STORAGE, "storage"),
        (FormatCapabilities::ATTACHMENT, "attachment"),
        (FormatCapabilities::SAMPLED_ATTACHMENT, "sampled-attachment"),
    ] {
        if caps.contains(flag) {
            if !row.is_empty() {
                row.push_str(", ");
            }
            row.push_str(label);
        }
    }
    if row.is_empty() {
        row.push_str("unsupported");
    }
    row
}

fn main() -> prism_hal::Result<()> {
    tracing_subscriber::fmt::init();

    let ctx = GpuContextBuilder::new().app_name("prism-info").build()?;
    let device = Device::new(Arc::new(ctx));

    let caps = device.capabilities();
    info!("GPU: {}", caps.summary());

    for feature in [
        DeviceFeature::MultiSample,
        DeviceFeature::MultiSampleResolve,
        DeviceFeature::TextureFilterAnisotropic,
    ] {
        info!("feature {feature:?}: {}", device.has_feature(feature));
    }

    for limit in [
        DeviceLimit::MaxDimension1D2D,
        DeviceLimit::MaxDimensionCube,
        DeviceLimit::MaxUniformBufferBytes,
        DeviceLimit::MaxPushConstantBytes,
        DeviceLimit::MaxSamples,
    ] {
        info!("limit {limit:?}: {}", device.feature_limit(limit));
    }

    for format in [
        TextureFormat::R8Unorm,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8Srgb,
        TextureFormat::Bgra8Srgb,
        TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Float,
        TextureFormat::Depth16Unorm,
        TextureFormat::Depth32Float,
    ] {
        let caps = device.texture_format_capabilities(format);
        info!("format {format:?}: {}", capability_row(caps));
    }

    // Exercise the upload and mapping paths with a small round trip
    let payload: Vec<u8> = (0..64).collect();
    let (mut buffer, upload_err) = device.create_buffer(&BufferDesc {
        length: 64,
        buffer_type: BufferType::STORAGE,
        storage: StorageMode::Private,
        data: Some(&payload),
        debug_name: "info round trip",
    })?;
    if let Some(e) = upload_err {
        info!("initial upload failed: {e}");
    }

    let mapped = buffer.map(BufferRange::new(0, 64))?;
    let intact = mapped == &payload[..];
    buffer.unmap();
    info!(
        "device-local round trip through staging: {}",
        if intact { "ok" } else { "MISMATCH" }
    );

    drop(buffer);
    device.wait_idle()?;

    Ok(())
}
