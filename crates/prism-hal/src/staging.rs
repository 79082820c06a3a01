//! Staging transfer engine.
//!
//! The only path by which data moves between host memory and device-local
//! memory. One reusable host-visible transfer buffer is shared across all
//! operations; transfers larger than its capacity are split into chunks
//! internally, each submitted and waited on synchronously.
//!
//! The engine is a shared mutable service: the owning context wraps it in
//! a mutex and serializes all callers.

use crate::allocator::{DeviceBuffer, GpuAllocator};
use crate::command::{execute_single_time_commands, CommandPool};
use crate::error::{HalError, Result};
use ash::vk;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

/// Default capacity of the reusable transfer buffer.
pub const DEFAULT_STAGING_CAPACITY: u64 = 16 * 1024 * 1024;

/// Staging transfer engine backed by one reusable host-visible buffer.
pub struct StagingEngine {
    device: Arc<ash::Device>,
    queue: vk::Queue,
    pool: CommandPool,
    buffer: DeviceBuffer,
    capacity: u64,
}

impl StagingEngine {
    /// Create the engine with a transfer buffer of `capacity` bytes.
    ///
    /// # Safety
    /// The device and queue must be valid; the queue family must support
    /// transfer operations.
    pub unsafe fn new(
        device: Arc<ash::Device>,
        allocator: &mut GpuAllocator,
        queue: vk::Queue,
        queue_family: u32,
        capacity: u64,
    ) -> Result<Self> {
        let pool = CommandPool::new(
            &device,
            queue_family,
            vk::CommandPoolCreateFlags::TRANSIENT,
        )?;

        let buffer = allocator.create_buffer(
            capacity,
            vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::CpuToGpu,
            "prism staging buffer",
        )?;

        if !buffer.is_host_visible() {
            return Err(HalError::AllocationFailed(
                "Staging buffer is not host-visible".to_string(),
            ));
        }

        tracing::debug!(capacity, "Created staging engine");

        Ok(Self {
            device,
            queue,
            pool,
            buffer,
            capacity,
        })
    }

    /// Capacity of the transfer buffer in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Copy `data` into `dst` at `dst_offset`, chunking through the
    /// transfer buffer. Blocks until the last copy has completed.
    pub fn upload(&mut self, dst: &DeviceBuffer, dst_offset: u64, data: &[u8]) -> Result<()> {
        for (chunk_offset, chunk_len) in chunks(data.len() as u64, self.capacity) {
            let chunk = &data[chunk_offset as usize..(chunk_offset + chunk_len) as usize];

            let mapped = self
                .buffer
                .mapped_slice_mut()
                .ok_or_else(|| HalError::InvalidOperation("Staging buffer unmapped".to_string()))?;
            mapped[..chunk.len()].copy_from_slice(chunk);

            let region = vk::BufferCopy::default()
                .src_offset(0)
                .dst_offset(dst_offset + chunk_offset)
                .size(chunk_len);

            let staging = self.buffer.handle();
            let target = dst.handle();
            unsafe {
                execute_single_time_commands(&self.device, &self.pool, self.queue, |cmd| {
                    self.device.cmd_copy_buffer(cmd, staging, target, &[region]);
                })?;
            }
        }

        Ok(())
    }

    /// Read `out.len()` bytes from `src` at `src_offset` into `out`,
    /// chunking through the transfer buffer. Blocks until done.
    pub fn download(&mut self, src: &DeviceBuffer, src_offset: u64, out: &mut [u8]) -> Result<()> {
        for (chunk_offset, chunk_len) in chunks(out.len() as u64, self.capacity) {
            let region = vk::BufferCopy::default()
                .src_offset(src_offset + chunk_offset)
                .dst_offset(0)
                .size(chunk_len);

            let staging = self.buffer.handle();
            let source = src.handle();
            unsafe {
                execute_single_time_commands(&self.device, &self.pool, self.queue, |cmd| {
                    self.device.cmd_copy_buffer(cmd, source, staging, &[region]);
                })?;
            }

            let mapped = self
                .buffer
                .mapped_slice()
                .ok_or_else(|| HalError::InvalidOperation("Staging buffer unmapped".to_string()))?;
            out[chunk_offset as usize..(chunk_offset + chunk_len) as usize]
                .copy_from_slice(&mapped[..chunk_len as usize]);
        }

        Ok(())
    }

    /// Copy `data` into an image through the transfer buffer, with the
    /// image already in TRANSFER_DST_OPTIMAL layout. The data must fit
    /// the transfer buffer in one piece.
    pub fn upload_image(
        &mut self,
        dst: vk::Image,
        extent: vk::Extent3D,
        data: &[u8],
    ) -> Result<()> {
        if data.len() as u64 > self.capacity {
            return Err(HalError::ArgumentOutOfRange(format!(
                "Image upload of {} bytes exceeds staging capacity of {} bytes",
                data.len(),
                self.capacity
            )));
        }

        let mapped = self
            .buffer
            .mapped_slice_mut()
            .ok_or_else(|| HalError::InvalidOperation("Staging buffer unmapped".to_string()))?;
        mapped[..data.len()].copy_from_slice(data);

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_extent(extent);

        let staging = self.buffer.handle();
        unsafe {
            execute_single_time_commands(&self.device, &self.pool, self.queue, |cmd| {
                self.device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            })?;
        }

        Ok(())
    }

    /// Transition an image between layouts with a full barrier. Blocks
    /// until the transition has executed.
    pub fn transition_image(
        &mut self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<()> {
        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE)
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .level_count(1)
                    .layer_count(1),
            );

        unsafe {
            execute_single_time_commands(&self.device, &self.pool, self.queue, |cmd| {
                let dependency = vk::DependencyInfo::default()
                    .image_memory_barriers(std::slice::from_ref(&barrier));
                self.device.cmd_pipeline_barrier2(cmd, &dependency);
            })?;
        }

        Ok(())
    }

    /// Release the transfer buffer and command pool.
    ///
    /// Must be called before the allocator shuts down.
    pub fn destroy(&mut self, allocator: &mut GpuAllocator) {
        if let Err(e) = allocator.free_buffer(&mut self.buffer) {
            tracing::warn!("Failed to free staging buffer: {e}");
        }
        unsafe {
            self.pool.destroy(&self.device);
        }
    }
}

/// Split a transfer of `total` bytes into `(offset, len)` chunks of at
/// most `capacity` bytes each.
fn chunks(total: u64, capacity: u64) -> impl Iterator<Item = (u64, u64)> {
    let mut offset = 0;
    std::iter::from_fn(move || {
        if offset >= total {
            return None;
        }
        let len = (total - offset).min(capacity);
        let item = (offset, len);
        offset += len;
        Some(item)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_range_contiguously() {
        let parts: Vec<_> = chunks(10, 4).collect();
        assert_eq!(parts, vec![(0, 4), (4, 4), (8, 2)]);
    }

    #[test]
    fn chunks_never_exceed_capacity() {
        for (_, len) in chunks(1_000_003, 4096) {
            assert!(len <= 4096);
        }
        let total: u64 = chunks(1_000_003, 4096).map(|(_, len)| len).sum();
        assert_eq!(total, 1_000_003);
    }

    #[test]
    fn single_chunk_when_it_fits() {
        let parts: Vec<_> = chunks(100, 4096).collect();
        assert_eq!(parts, vec![(0, 100)]);
    }

    #[test]
    fn zero_length_transfer_is_empty() {
        assert_eq!(chunks(0, 4096).count(), 0);
    }
}
