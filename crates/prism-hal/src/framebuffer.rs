//! Framebuffer attachment groups.
//!
//! With dynamic rendering there is no backend framebuffer object; a
//! [`Framebuffer`] is a validated grouping of attachment textures that a
//! render pass can be begun against.

use crate::descriptors::{FramebufferDesc, TextureUsage};
use crate::error::{HalError, Result};
use crate::texture::Texture;
use std::sync::Arc;

/// A validated group of render attachments sharing one extent.
pub struct Framebuffer {
    color: Vec<Arc<Texture>>,
    depth: Option<Arc<Texture>>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    /// Validate and group the attachments in a descriptor.
    pub(crate) fn create(desc: &FramebufferDesc) -> Result<Self> {
        let first = desc
            .color
            .first()
            .or(desc.depth.as_ref())
            .ok_or_else(|| {
                HalError::ArgumentInvalid("Need at least one attachment".to_string())
            })?;

        let width = first.width();
        let height = first.height();

        for texture in desc.color.iter().chain(desc.depth.as_ref()) {
            if texture.width() != width || texture.height() != height {
                return Err(HalError::ArgumentInvalid(format!(
                    "Attachment {:?} is {}x{} but the framebuffer is {width}x{height}",
                    texture.debug_name(),
                    texture.width(),
                    texture.height()
                )));
            }
            if !texture.usage().contains(TextureUsage::ATTACHMENT) {
                return Err(HalError::ArgumentInvalid(format!(
                    "Attachment {:?} was not created with attachment usage",
                    texture.debug_name()
                )));
            }
        }

        for texture in &desc.color {
            if texture.format().is_depth() {
                return Err(HalError::ArgumentInvalid(format!(
                    "Color attachment {:?} has a depth format",
                    texture.debug_name()
                )));
            }
        }
        if let Some(depth) = &desc.depth {
            if !depth.format().is_depth() {
                return Err(HalError::ArgumentInvalid(format!(
                    "Depth attachment {:?} has a color format",
                    depth.debug_name()
                )));
            }
        }

        Ok(Self {
            color: desc.color.clone(),
            depth: desc.depth.clone(),
            width,
            height,
        })
    }

    /// Color attachments in declaration order.
    pub fn color_attachments(&self) -> &[Arc<Texture>] {
        &self.color
    }

    /// Depth attachment, if any.
    pub fn depth_attachment(&self) -> Option<&Arc<Texture>> {
        self.depth.as_ref()
    }

    /// Shared attachment width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Shared attachment height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }
}
