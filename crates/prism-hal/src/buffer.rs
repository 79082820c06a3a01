//! Buffer resources.
//!
//! A [`Buffer`] presents one uniform upload/map/unmap contract over two
//! very different memory tiers: host-visible allocations are mapped
//! directly, device-local allocations are emulated through a scratch copy
//! shuttled by the staging engine. The device-local path costs a full
//! round-trip copy per map/unmap; callers should treat it as expensive.

use crate::context::GpuContext;
use crate::descriptors::{BufferDesc, BufferRange, BufferType, StorageMode};
use crate::error::{HalError, Result};
use ash::vk;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::allocator::DeviceBuffer;

/// Derive Vulkan usage flags from the usage-type bitmask and storage
/// tier. Fails when no usage-type bit is set.
pub(crate) fn buffer_usage_flags(
    buffer_type: BufferType,
    storage: StorageMode,
) -> Result<vk::BufferUsageFlags> {
    if buffer_type.is_empty() {
        return Err(HalError::InvalidOperation("Invalid buffer type".to_string()));
    }

    // Private storage is only reachable through staging copies
    let mut usage = if storage == StorageMode::Private {
        vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST
    } else {
        vk::BufferUsageFlags::empty()
    };

    if buffer_type.contains(BufferType::INDEX) {
        usage |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if buffer_type.contains(BufferType::VERTEX) {
        usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if buffer_type.contains(BufferType::UNIFORM) {
        usage |= vk::BufferUsageFlags::UNIFORM_BUFFER
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    }
    if buffer_type.contains(BufferType::STORAGE) {
        usage |= vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    }
    if buffer_type.contains(BufferType::INDIRECT) {
        usage |= vk::BufferUsageFlags::INDIRECT_BUFFER
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    }

    Ok(usage)
}

/// Whether `range` lies fully within a buffer of `length` bytes.
pub(crate) fn range_in_bounds(range: BufferRange, length: u64) -> bool {
    range.size <= length && range.offset <= length - range.size
}

/// A GPU buffer with a declared usage type and storage tier.
pub struct Buffer {
    ctx: Arc<GpuContext>,
    raw: DeviceBuffer,
    length: u64,
    buffer_type: BufferType,
    storage: StorageMode,
    debug_name: String,
    /// Currently mapped range; size 0 means unmapped.
    mapped_range: BufferRange,
    /// Scratch bytes backing the device-local mapping emulation.
    scratch: Vec<u8>,
}

impl Buffer {
    /// Create a buffer from a descriptor. Initial data is not uploaded
    /// here; the [`Device`](crate::Device) facade drives that.
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &BufferDesc<'_>) -> Result<Self> {
        // Without staging there is no way to reach device-local memory;
        // demote the request. Observable via `storage_mode()`.
        let storage = if desc.storage == StorageMode::Private && !ctx.use_staging() {
            tracing::debug!(
                name = desc.debug_name,
                "Staging disabled; demoting Private buffer to Shared"
            );
            StorageMode::Shared
        } else {
            desc.storage
        };

        let usage = buffer_usage_flags(desc.buffer_type, storage)?;

        let location = match storage {
            StorageMode::Private => MemoryLocation::GpuOnly,
            StorageMode::Shared => MemoryLocation::CpuToGpu,
        };

        let raw = ctx
            .allocator()
            .lock()
            .create_buffer(desc.length, usage, location, desc.debug_name)?;

        Ok(Self {
            ctx,
            raw,
            length: desc.length,
            buffer_type: desc.buffer_type,
            storage,
            debug_name: desc.debug_name.to_string(),
            mapped_range: BufferRange::default(),
            scratch: Vec::new(),
        })
    }

    /// Buffer size in bytes, fixed at creation.
    pub fn size_in_bytes(&self) -> u64 {
        self.length
    }

    /// Usage-type bitmask declared at creation.
    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    /// Effective storage tier. May differ from the requested tier when
    /// the context had staging disabled.
    pub fn storage_mode(&self) -> StorageMode {
        self.storage
    }

    /// Debug label.
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// Raw Vulkan buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.raw.handle()
    }

    /// Whether a mapping is currently active.
    pub fn is_mapped(&self) -> bool {
        self.mapped_range.size != 0
    }

    /// Device address of the buffer plus `offset`.
    ///
    /// The offset must be 8-byte aligned for GLSL buffer references.
    pub fn gpu_address(&self, offset: u64) -> vk::DeviceAddress {
        debug_assert!(
            offset & 7 == 0,
            "Buffer offset must be 8-byte aligned for buffer references"
        );
        self.raw.device_address(self.ctx.device()) + offset
    }

    /// Write `range.size` bytes of `data` into the buffer at
    /// `range.offset`. The only write path into device-local storage.
    pub fn upload(&mut self, data: &[u8], range: BufferRange) -> Result<()> {
        if !range_in_bounds(range, self.length) {
            return Err(HalError::ArgumentOutOfRange("Out of range".to_string()));
        }
        if (data.len() as u64) < range.size {
            return Err(HalError::ArgumentInvalid(
                "Data shorter than upload range".to_string(),
            ));
        }

        let bytes = &data[..range.size as usize];

        if self.raw.is_host_visible() {
            // Coherent mapping; writes are immediately live
            let mapped = self.raw.mapped_slice_mut().ok_or_else(|| {
                HalError::InvalidOperation("Host-visible buffer lost its mapping".to_string())
            })?;
            mapped[range.offset as usize..(range.offset + range.size) as usize]
                .copy_from_slice(bytes);
            Ok(())
        } else {
            let staging = self.ctx.staging().ok_or_else(|| {
                HalError::InvalidOperation(
                    "Device-local buffer without staging support".to_string(),
                )
            })?;
            staging.lock().upload(&self.raw, range.offset, bytes)
        }
    }

    /// Write a slice of plain-old-data values at a byte offset.
    pub fn upload_slice<T: bytemuck::NoUninit>(&mut self, data: &[T], offset: u64) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.upload(bytes, BufferRange::new(offset, bytes.len() as u64))
    }

    /// Map a range for host access.
    ///
    /// Host-visible buffers return a view straight into the coherent
    /// allocation. Device-local buffers return a scratch copy pulled
    /// through the staging engine; writes only reach the device on
    /// [`unmap`](Self::unmap).
    ///
    /// Mapping while a different range is already mapped is a caller
    /// bug; the previous mapping is finalized first and a warning is
    /// logged.
    pub fn map(&mut self, range: BufferRange) -> Result<&mut [u8]> {
        if !range_in_bounds(range, self.length) {
            return Err(HalError::ArgumentOutOfRange(
                "Range exceeds buffer length".to_string(),
            ));
        }

        if self.mapped_range.size != 0 && self.mapped_range != range {
            tracing::warn!(
                name = self.debug_name,
                "Buffer::map() called again without Buffer::unmap()"
            );
            self.unmap();
        }

        // The mapping only becomes active once the fallible work below
        // has succeeded; a failed map must leave the buffer unmapped so
        // no later unmap writes back bytes that were never mapped.
        if self.raw.is_host_visible() {
            let mapped = self.raw.mapped_slice_mut().ok_or_else(|| {
                HalError::InvalidOperation("Host-visible buffer lost its mapping".to_string())
            })?;
            self.mapped_range = range;
            Ok(&mut mapped[range.offset as usize..(range.offset + range.size) as usize])
        } else {
            let staging = self.ctx.staging().ok_or_else(|| {
                HalError::InvalidOperation(
                    "Device-local buffer without staging support".to_string(),
                )
            })?;
            self.scratch.resize(range.size as usize, 0);
            staging
                .lock()
                .download(&self.raw, range.offset, &mut self.scratch)?;
            self.mapped_range = range;
            Ok(self.scratch.as_mut_slice())
        }
    }

    /// Close the active mapping. For the device-local emulation path the
    /// scratch contents are written back at the mapped offset first.
    pub fn unmap(&mut self) {
        if self.mapped_range.size == 0 {
            tracing::warn!(
                name = self.debug_name,
                "Buffer::unmap() called without Buffer::map()"
            );
            return;
        }

        if !self.raw.is_host_visible() {
            let range = BufferRange::new(self.mapped_range.offset, self.scratch.len() as u64);
            let scratch = std::mem::take(&mut self.scratch);
            if let Err(e) = self.upload(&scratch, range) {
                tracing::warn!(
                    name = self.debug_name,
                    "Failed to write back mapped contents: {e}"
                );
            }
            self.scratch = scratch;
        }

        self.mapped_range.size = 0;
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.allocator().lock().free_buffer(&mut self.raw) {
            tracing::warn!(name = self.debug_name, "Failed to free buffer: {e}");
        }
    }
}
