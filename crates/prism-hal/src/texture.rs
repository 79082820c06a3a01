//! Texture resources.

use crate::allocator::DeviceImage;
use crate::context::GpuContext;
use crate::descriptors::{StorageMode, TextureDesc, TextureUsage};
use crate::error::{HalError, Result};
use crate::format::TextureFormat;
use ash::vk;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

/// Derive Vulkan image usage flags from the usage-type bitmask. Fails
/// when no usage-type bit is set.
pub(crate) fn texture_usage_flags(
    usage: TextureUsage,
    format: TextureFormat,
) -> Result<vk::ImageUsageFlags> {
    if usage.is_empty() {
        return Err(HalError::InvalidOperation(
            "Invalid texture usage".to_string(),
        ));
    }

    // Initial data arrives through staging copies
    let mut flags = vk::ImageUsageFlags::TRANSFER_DST;

    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::ATTACHMENT) {
        flags |= if format.is_depth() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };
    }

    Ok(flags)
}

/// A GPU texture with its image view.
pub struct Texture {
    ctx: Arc<GpuContext>,
    raw: DeviceImage,
    view: vk::ImageView,
    format: TextureFormat,
    usage: TextureUsage,
    width: u32,
    height: u32,
    depth: u32,
    debug_name: String,
}

impl Texture {
    /// Create a texture from a descriptor, uploading initial data when
    /// present.
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &TextureDesc<'_>) -> Result<Self> {
        let usage = texture_usage_flags(desc.usage, desc.format)?;

        let vk_format = desc.format.to_vk().ok_or_else(|| {
            HalError::ArgumentInvalid(format!(
                "Texture format {:?} has no Vulkan equivalent",
                desc.format
            ))
        })?;

        if desc.width == 0 || desc.height == 0 {
            return Err(HalError::ArgumentOutOfRange(
                "Texture dimensions must be non-zero".to_string(),
            ));
        }

        let depth = desc.depth.max(1);
        let image_type = if depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        };

        let extent = vk::Extent3D {
            width: desc.width,
            height: desc.height,
            depth,
        };

        let create_info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(vk_format)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let location = match desc.storage {
            StorageMode::Private => MemoryLocation::GpuOnly,
            StorageMode::Shared => MemoryLocation::CpuToGpu,
        };

        let raw = ctx
            .allocator()
            .lock()
            .create_image(&create_info, location, desc.debug_name)?;

        let aspect = if desc.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let view_type = if depth > 1 {
            vk::ImageViewType::TYPE_3D
        } else {
            vk::ImageViewType::TYPE_2D
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(raw.handle())
            .view_type(view_type)
            .format(vk_format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .level_count(1)
                    .layer_count(1),
            );

        let view = unsafe {
            match ctx.device().create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    let mut raw = raw;
                    let _ = ctx.allocator().lock().free_image(&mut raw);
                    return Err(e.into());
                }
            }
        };

        let texture = Self {
            ctx,
            raw,
            view,
            format: desc.format,
            usage: desc.usage,
            width: desc.width,
            height: desc.height,
            depth,
            debug_name: desc.debug_name.to_string(),
        };

        if let Some(data) = desc.data {
            texture.upload_initial_data(data, extent, aspect)?;
        }

        Ok(texture)
    }

    fn upload_initial_data(
        &self,
        data: &[u8],
        extent: vk::Extent3D,
        aspect: vk::ImageAspectFlags,
    ) -> Result<()> {
        let texel_size = self.format.bytes_per_texel().ok_or_else(|| {
            HalError::ArgumentInvalid(format!(
                "Texture format {:?} has no fixed texel size",
                self.format
            ))
        })?;
        let expected =
            u64::from(extent.width) * u64::from(extent.height) * u64::from(extent.depth)
                * texel_size;
        if (data.len() as u64) < expected {
            return Err(HalError::ArgumentOutOfRange(format!(
                "Initial data of {} bytes is shorter than the {expected} bytes the texture holds",
                data.len()
            )));
        }

        let staging = self.ctx.staging().ok_or_else(|| {
            HalError::InvalidOperation(
                "Texture upload requires staging support".to_string(),
            )
        })?;
        let mut staging = staging.lock();

        staging.transition_image(
            self.raw.handle(),
            aspect,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        staging.upload_image(self.raw.handle(), extent, &data[..expected as usize])?;
        staging.transition_image(
            self.raw.handle(),
            aspect,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        Ok(())
    }

    /// Texture format declared at creation.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Usage-type bitmask declared at creation.
    pub fn usage(&self) -> TextureUsage {
        self.usage
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Raw Vulkan image handle.
    pub fn handle(&self) -> vk::Image {
        self.raw.handle()
    }

    /// Image view covering the whole texture.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Debug label.
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device().destroy_image_view(self.view, None);
        }
        if let Err(e) = self.ctx.allocator().lock().free_image(&mut self.raw) {
            tracing::warn!(name = self.debug_name, "Failed to free texture: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_usage_type_is_invalid() {
        let result = texture_usage_flags(TextureUsage::empty(), TextureFormat::Rgba8Unorm);
        assert!(matches!(result, Err(HalError::InvalidOperation(_))));
    }

    #[test]
    fn sampled_and_storage_map_to_fixed_flags() {
        let flags = texture_usage_flags(
            TextureUsage::SAMPLED | TextureUsage::STORAGE,
            TextureFormat::Rgba8Unorm,
        )
        .unwrap();
        assert!(flags.contains(vk::ImageUsageFlags::SAMPLED));
        assert!(flags.contains(vk::ImageUsageFlags::STORAGE));
        assert!(flags.contains(vk::ImageUsageFlags::TRANSFER_DST));
        assert!(!flags.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    }

    #[test]
    fn attachment_flag_follows_format_aspect() {
        let color =
            texture_usage_flags(TextureUsage::ATTACHMENT, TextureFormat::Bgra8Srgb).unwrap();
        assert!(color.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(!color.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));

        let depth =
            texture_usage_flags(TextureUsage::ATTACHMENT, TextureFormat::Depth32Float).unwrap();
        assert!(depth.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));
        assert!(!depth.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    }
}
