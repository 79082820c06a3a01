//! GPU capability and limit introspection.

use ash::vk;
use bitflags::bitflags;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Closed set of optional hardware features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFeature {
    MultiSample,
    MultiSampleResolve,
    TextureFilterAnisotropic,
}

/// Closed set of queryable numeric hardware limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceLimit {
    /// Smaller of the 1D and 2D maximum image dimensions.
    MaxDimension1D2D,
    MaxDimensionCube,
    MaxUniformBufferBytes,
    MaxPushConstantBytes,
    /// Largest supported framebuffer color sample count.
    MaxSamples,
}

bitflags! {
    /// Per-format capability bitmask. The empty set means the format is
    /// unsupported by the backend.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatCapabilities: u32 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const SAMPLED_FILTERED = 1 << 2;
        const ATTACHMENT = 1 << 3;
        /// Derived: set only when both SAMPLED and ATTACHMENT are set.
        const SAMPLED_ATTACHMENT = 1 << 4;
    }
}

impl FormatCapabilities {
    /// The unsupported value: no capability bits at all.
    pub const fn unsupported() -> Self {
        Self::empty()
    }
}

/// Derive the capability bitmask from the three Vulkan feature-flag
/// sources of a format (buffer, linear tiling, optimal tiling).
pub fn format_capabilities_from_features(
    buffer: vk::FormatFeatureFlags,
    linear: vk::FormatFeatureFlags,
    optimal: vk::FormatFeatureFlags,
) -> FormatCapabilities {
    let features = buffer | linear | optimal;

    let mut caps = FormatCapabilities::empty();
    if features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE) {
        caps |= FormatCapabilities::SAMPLED;
    }
    if features.contains(vk::FormatFeatureFlags::STORAGE_IMAGE) {
        caps |= FormatCapabilities::STORAGE;
    }
    if features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR) {
        caps |= FormatCapabilities::SAMPLED_FILTERED;
    }
    if features.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT) {
        caps |= FormatCapabilities::ATTACHMENT;
    }
    if features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT) {
        caps |= FormatCapabilities::ATTACHMENT;
    }

    if caps.contains(FormatCapabilities::SAMPLED | FormatCapabilities::ATTACHMENT) {
        caps |= FormatCapabilities::SAMPLED_ATTACHMENT;
    }

    caps
}

/// Snapshot of hardware capabilities, queried once at context creation.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,

    // Image limits
    pub max_image_dimension_1d: u32,
    pub max_image_dimension_2d: u32,
    pub max_image_dimension_cube: u32,

    // Buffer limits
    pub max_uniform_buffer_range: u32,
    pub max_push_constants_size: u32,

    // Sampling limits
    pub framebuffer_color_sample_counts: vk::SampleCountFlags,
    pub max_sampler_anisotropy: f32,

    /// Whether `VK_KHR_shader_non_semantic_info` is available, which
    /// gates the debug-printf shader extension.
    pub supports_debug_printf: bool,

    // Available device extensions
    pub available_extensions: HashSet<String>,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = instance.get_physical_device_properties(physical_device);

        let extensions = instance
            .enumerate_device_extension_properties(physical_device)
            .unwrap_or_default();

        let available_extensions: HashSet<String> = extensions
            .iter()
            .filter_map(|ext| {
                CStr::from_ptr(ext.extension_name.as_ptr())
                    .to_str()
                    .ok()
                    .map(String::from)
            })
            .collect();

        let vendor = GpuVendor::from_vendor_id(properties.vendor_id);
        let device_name = CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        let limits = &properties.limits;

        Self {
            vendor,
            device_name,
            api_version: properties.api_version,
            driver_version: properties.driver_version,

            max_image_dimension_1d: limits.max_image_dimension1_d,
            max_image_dimension_2d: limits.max_image_dimension2_d,
            max_image_dimension_cube: limits.max_image_dimension_cube,

            max_uniform_buffer_range: limits.max_uniform_buffer_range,
            max_push_constants_size: limits.max_push_constants_size,

            framebuffer_color_sample_counts: limits.framebuffer_color_sample_counts,
            max_sampler_anisotropy: limits.max_sampler_anisotropy,

            supports_debug_printf: available_extensions
                .contains("VK_KHR_shader_non_semantic_info"),

            available_extensions,
        }
    }

    /// Whether the hardware supports an optional feature.
    pub fn has_feature(&self, feature: DeviceFeature) -> bool {
        match feature {
            DeviceFeature::MultiSample | DeviceFeature::MultiSampleResolve => {
                self.framebuffer_color_sample_counts != vk::SampleCountFlags::TYPE_1
                    && !self.framebuffer_color_sample_counts.is_empty()
            }
            DeviceFeature::TextureFilterAnisotropic => self.max_sampler_anisotropy > 1.0,
        }
    }

    /// Numeric hardware limit for the given query.
    pub fn feature_limit(&self, limit: DeviceLimit) -> u64 {
        match limit {
            DeviceLimit::MaxDimension1D2D => {
                u64::from(self.max_image_dimension_1d.min(self.max_image_dimension_2d))
            }
            DeviceLimit::MaxDimensionCube => u64::from(self.max_image_dimension_cube),
            DeviceLimit::MaxUniformBufferBytes => u64::from(self.max_uniform_buffer_range),
            DeviceLimit::MaxPushConstantBytes => u64::from(self.max_push_constants_size),
            DeviceLimit::MaxSamples => {
                let counts = self.framebuffer_color_sample_counts;
                // Test descending power-of-two flags; default to 1.
                let candidates = [
                    (vk::SampleCountFlags::TYPE_64, 64),
                    (vk::SampleCountFlags::TYPE_32, 32),
                    (vk::SampleCountFlags::TYPE_16, 16),
                    (vk::SampleCountFlags::TYPE_8, 8),
                    (vk::SampleCountFlags::TYPE_4, 4),
                    (vk::SampleCountFlags::TYPE_2, 2),
                ];
                for (flag, value) in candidates {
                    if counts.contains(flag) {
                        return value;
                    }
                }
                1
            }
        }
    }

    /// Get a human-readable summary of the device.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{}",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps_with(samples: vk::SampleCountFlags, anisotropy: f32) -> GpuCapabilities {
        GpuCapabilities {
            vendor: GpuVendor::Other(0),
            device_name: "test".to_string(),
            api_version: vk::API_VERSION_1_3,
            driver_version: 0,
            max_image_dimension_1d: 8192,
            max_image_dimension_2d: 16384,
            max_image_dimension_cube: 4096,
            max_uniform_buffer_range: 65536,
            max_push_constants_size: 128,
            framebuffer_color_sample_counts: samples,
            max_sampler_anisotropy: anisotropy,
            supports_debug_printf: false,
            available_extensions: HashSet::new(),
        }
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
    }

    #[test]
    fn multisample_feature_tracks_sample_counts() {
        let single = caps_with(vk::SampleCountFlags::TYPE_1, 1.0);
        assert!(!single.has_feature(DeviceFeature::MultiSample));

        let multi = caps_with(
            vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_4,
            1.0,
        );
        assert!(multi.has_feature(DeviceFeature::MultiSample));
        assert!(multi.has_feature(DeviceFeature::MultiSampleResolve));
    }

    #[test]
    fn anisotropy_feature() {
        assert!(!caps_with(vk::SampleCountFlags::TYPE_1, 1.0)
            .has_feature(DeviceFeature::TextureFilterAnisotropic));
        assert!(caps_with(vk::SampleCountFlags::TYPE_1, 16.0)
            .has_feature(DeviceFeature::TextureFilterAnisotropic));
    }

    #[test]
    fn max_samples_picks_highest_flag() {
        let caps = caps_with(
            vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_4
                | vk::SampleCountFlags::TYPE_8,
            1.0,
        );
        assert_eq!(caps.feature_limit(DeviceLimit::MaxSamples), 8);
    }

    #[test]
    fn max_samples_defaults_to_one() {
        let caps = caps_with(vk::SampleCountFlags::TYPE_1, 1.0);
        assert_eq!(caps.feature_limit(DeviceLimit::MaxSamples), 1);
    }

    #[test]
    fn dimension_limit_takes_smaller_of_1d_2d() {
        let caps = caps_with(vk::SampleCountFlags::TYPE_1, 1.0);
        assert_eq!(caps.feature_limit(DeviceLimit::MaxDimension1D2D), 8192);
        assert_eq!(caps.feature_limit(DeviceLimit::MaxUniformBufferBytes), 65536);
    }

    #[test]
    fn no_features_means_unsupported() {
        let caps = format_capabilities_from_features(
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::empty(),
        );
        assert_eq!(caps, FormatCapabilities::unsupported());
        assert!(caps.is_empty());
    }

    #[test]
    fn features_from_any_source_count() {
        let caps = format_capabilities_from_features(
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::SAMPLED_IMAGE,
            vk::FormatFeatureFlags::STORAGE_IMAGE,
        );
        assert!(caps.contains(FormatCapabilities::SAMPLED));
        assert!(caps.contains(FormatCapabilities::STORAGE));
        assert!(!caps.contains(FormatCapabilities::SAMPLED_ATTACHMENT));
    }

    #[test]
    fn sampled_attachment_is_derived() {
        let caps = format_capabilities_from_features(
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::COLOR_ATTACHMENT,
        );
        assert!(caps.contains(FormatCapabilities::SAMPLED_ATTACHMENT));

        let depth_caps = format_capabilities_from_features(
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::SAMPLED_IMAGE
                | vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        );
        assert!(depth_caps.contains(FormatCapabilities::SAMPLED_ATTACHMENT));
    }

    #[test]
    fn attachment_only_is_not_sampled_attachment() {
        let caps = format_capabilities_from_features(
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::empty(),
            vk::FormatFeatureFlags::COLOR_ATTACHMENT,
        );
        assert!(caps.contains(FormatCapabilities::ATTACHMENT));
        assert!(!caps.contains(FormatCapabilities::SAMPLED_ATTACHMENT));
    }
}
