//! Abstract texture formats and their Vulkan equivalents.

use ash::vk;

/// Backend-agnostic texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// No format; used to mark an absent attachment.
    #[default]
    Invalid,
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Uint,
    Rgba32Uint,
    Depth16Unorm,
    Depth32Float,
    Depth24UnormStencil8,
}

impl TextureFormat {
    /// Map to the native Vulkan format. `None` when the backend has no
    /// equivalent (including [`TextureFormat::Invalid`]).
    pub fn to_vk(self) -> Option<vk::Format> {
        match self {
            Self::Invalid => None,
            Self::R8Unorm => Some(vk::Format::R8_UNORM),
            Self::Rg8Unorm => Some(vk::Format::R8G8_UNORM),
            Self::Rgba8Unorm => Some(vk::Format::R8G8B8A8_UNORM),
            Self::Rgba8Srgb => Some(vk::Format::R8G8B8A8_SRGB),
            Self::Bgra8Unorm => Some(vk::Format::B8G8R8A8_UNORM),
            Self::Bgra8Srgb => Some(vk::Format::B8G8R8A8_SRGB),
            Self::R16Float => Some(vk::Format::R16_SFLOAT),
            Self::Rg16Float => Some(vk::Format::R16G16_SFLOAT),
            Self::Rgba16Float => Some(vk::Format::R16G16B16A16_SFLOAT),
            Self::R32Float => Some(vk::Format::R32_SFLOAT),
            Self::Rg32Float => Some(vk::Format::R32G32_SFLOAT),
            Self::Rgba32Float => Some(vk::Format::R32G32B32A32_SFLOAT),
            Self::R32Uint => Some(vk::Format::R32_UINT),
            Self::Rgba32Uint => Some(vk::Format::R32G32B32A32_UINT),
            Self::Depth16Unorm => Some(vk::Format::D16_UNORM),
            Self::Depth32Float => Some(vk::Format::D32_SFLOAT),
            Self::Depth24UnormStencil8 => Some(vk::Format::D24_UNORM_S8_UINT),
        }
    }

    /// Whether this format carries a depth aspect.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth32Float | Self::Depth24UnormStencil8
        )
    }

    /// Bytes per texel for uncompressed color formats; used to size
    /// initial-data uploads. Depth formats return `None`.
    pub fn bytes_per_texel(self) -> Option<u64> {
        match self {
            Self::Invalid
            | Self::Depth16Unorm
            | Self::Depth32Float
            | Self::Depth24UnormStencil8 => None,
            Self::R8Unorm => Some(1),
            Self::Rg8Unorm | Self::R16Float => Some(2),
            Self::Rgba8Unorm | Self::Rgba8Srgb | Self::Bgra8Unorm | Self::Bgra8Srgb
            | Self::Rg16Float | Self::R32Float | Self::R32Uint => Some(4),
            Self::Rgba16Float | Self::Rg32Float => Some(8),
            Self::Rgba32Float | Self::Rgba32Uint => Some(16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_has_no_vk_equivalent() {
        assert_eq!(TextureFormat::Invalid.to_vk(), None);
    }

    #[test]
    fn color_format_mapping() {
        assert_eq!(
            TextureFormat::Rgba8Unorm.to_vk(),
            Some(vk::Format::R8G8B8A8_UNORM)
        );
        assert_eq!(
            TextureFormat::Bgra8Srgb.to_vk(),
            Some(vk::Format::B8G8R8A8_SRGB)
        );
    }

    #[test]
    fn depth_formats_flagged() {
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Rgba8Unorm.is_depth());
    }

    #[test]
    fn texel_sizes() {
        assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_texel(), Some(4));
        assert_eq!(TextureFormat::Rgba32Float.bytes_per_texel(), Some(16));
        assert_eq!(TextureFormat::Depth32Float.bytes_per_texel(), None);
    }
}
