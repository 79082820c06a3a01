//! Sampler objects.

use crate::context::GpuContext;
use crate::descriptors::{AddressMode, Filter, SamplerDesc};
use crate::error::Result;
use ash::vk;
use std::sync::Arc;

fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Linear => vk::Filter::LINEAR,
        Filter::Nearest => vk::Filter::NEAREST,
    }
}

fn mipmap_mode_to_vk(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
    }
}

fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

/// An immutable sampler.
pub struct Sampler {
    device: Arc<ash::Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Create a sampler from a descriptor. The requested anisotropy is
    /// clamped to the hardware maximum.
    pub(crate) fn create(ctx: &GpuContext, desc: &SamplerDesc) -> Result<Self> {
        let max_anisotropy = desc
            .max_anisotropy
            .clamp(1.0, ctx.capabilities().max_sampler_anisotropy);

        let create_info = vk::SamplerCreateInfo::default()
            .min_filter(filter_to_vk(desc.min_filter))
            .mag_filter(filter_to_vk(desc.mag_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_filter))
            .address_mode_u(address_mode_to_vk(desc.address_mode_u))
            .address_mode_v(address_mode_to_vk(desc.address_mode_v))
            .address_mode_w(address_mode_to_vk(desc.address_mode_w))
            .anisotropy_enable(max_anisotropy > 1.0)
            .max_anisotropy(max_anisotropy)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK);

        let sampler = unsafe { ctx.device().create_sampler(&create_info, None)? };

        Ok(Self {
            device: ctx.device_arc(),
            sampler,
        })
    }

    /// Raw Vulkan sampler handle.
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}
