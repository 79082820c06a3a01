//! GPU context management.

use crate::allocator::GpuAllocator;
use crate::capabilities::{format_capabilities_from_features, FormatCapabilities, GpuCapabilities};
use crate::error::{HalError, Result};
use crate::format::TextureFormat;
use crate::instance::{create_instance, select_physical_device};
use crate::staging::{StagingEngine, DEFAULT_STAGING_CAPACITY};
use ash::vk;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::sync::Arc;

/// Main GPU context holding Vulkan resources.
///
/// Owns the instance, logical device, memory allocator, and the staging
/// transfer engine shared by all resources created against this context.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,
    pub(crate) staging: Option<Mutex<StagingEngine>>,

    pub(crate) graphics_queue_family: u32,
    pub(crate) transfer_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) transfer_queue: vk::Queue,

    // Captured once at initialization; shader preambles key off this.
    pub(crate) debug_printf: bool,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub(crate) fn device_arc(&self) -> Arc<ash::Device> {
        self.device.clone()
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Get the staging engine, if staging is enabled.
    pub fn staging(&self) -> Option<&Mutex<StagingEngine>> {
        self.staging.as_ref()
    }

    /// Whether device-local resources can be reached through staging
    /// transfers. When false, Private storage requests are demoted to
    /// Shared at creation.
    pub fn use_staging(&self) -> bool {
        self.staging.is_some()
    }

    /// Whether the debug-printf shader extension was enabled at context
    /// initialization.
    pub fn supports_debug_printf(&self) -> bool {
        self.debug_printf
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Get the transfer queue. Falls back to the graphics queue on
    /// hardware without a dedicated transfer family.
    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// Get the transfer queue family index.
    pub fn transfer_queue_family(&self) -> u32 {
        self.transfer_queue_family
    }

    /// Per-format capability bitmask. Formats with no native equivalent
    /// return the empty (unsupported) set.
    pub fn texture_format_capabilities(&self, format: TextureFormat) -> FormatCapabilities {
        let Some(vk_format) = format.to_vk() else {
            return FormatCapabilities::unsupported();
        };

        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, vk_format)
        };

        format_capabilities_from_features(
            properties.buffer_features,
            properties.linear_tiling_features,
            properties.optimal_tiling_features,
        )
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Staging owns an allocation; release it before the allocator
            // shuts down, and shut the allocator down before the device
            // is destroyed.
            if let Some(staging) = &self.staging {
                staging.lock().destroy(&mut self.allocator.lock());
            }
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    enable_staging: bool,
    staging_capacity: u64,
    enable_debug_printf: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "prism".to_string(),
            enable_validation: cfg!(debug_assertions),
            enable_staging: true,
            staging_capacity: DEFAULT_STAGING_CAPACITY,
            enable_debug_printf: false,
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Enable or disable the staging transfer engine. Without it,
    /// device-local buffer requests are demoted to host-visible storage.
    pub fn staging(mut self, enable: bool) -> Self {
        self.enable_staging = enable;
        self
    }

    /// Set the staging transfer buffer capacity in bytes.
    pub fn staging_capacity(mut self, bytes: u64) -> Self {
        self.staging_capacity = bytes;
        self
    }

    /// Request the debug-printf shader extension. Only takes effect when
    /// the hardware exposes `VK_KHR_shader_non_semantic_info`.
    pub fn debug_printf(mut self, enable: bool) -> Self {
        self.enable_debug_printf = enable;
        self
    }

    /// Build the GPU context.
    pub fn build(self) -> Result<GpuContext> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| HalError::Other(format!("Failed to load Vulkan: {e}")))?;

        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        let physical_device = unsafe { select_physical_device(&instance) }?;

        let capabilities = unsafe { GpuCapabilities::query(&instance, physical_device) };

        tracing::info!("Selected GPU: {}", capabilities.summary());

        let debug_printf = self.enable_debug_printf && capabilities.supports_debug_printf;

        let queue_families = unsafe { find_queue_families(&instance, physical_device) }?;

        let (device, graphics_queue, transfer_queue) = unsafe {
            create_device(&instance, physical_device, &queue_families, debug_printf)?
        };

        let device = Arc::new(device);

        let mut allocator =
            unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }?;

        let staging = if self.enable_staging {
            let engine = unsafe {
                StagingEngine::new(
                    device.clone(),
                    &mut allocator,
                    transfer_queue,
                    queue_families.transfer,
                    self.staging_capacity,
                )
            }?;
            Some(Mutex::new(engine))
        } else {
            None
        };

        Ok(GpuContext {
            entry,
            instance,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            staging,
            graphics_queue_family: queue_families.graphics,
            transfer_queue_family: queue_families.transfer,
            graphics_queue,
            transfer_queue,
            debug_printf,
        })
    }
}

/// Queue family indices.
struct QueueFamilyIndices {
    graphics: u32,
    transfer: u32,
}

/// Find queue families for graphics and transfer work.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn find_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<QueueFamilyIndices> {
    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

    let mut graphics_family = None;
    let mut transfer_family = None;

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        // Look for a dedicated transfer queue (no graphics or compute)
        if family.queue_flags.contains(vk::QueueFlags::TRANSFER)
            && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && !family.queue_flags.contains(vk::QueueFlags::COMPUTE)
            && transfer_family.is_none()
        {
            transfer_family = Some(i);
        }

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
            graphics_family = Some(i);
        }
    }

    let graphics = graphics_family.ok_or(HalError::NoSuitableDevice)?;

    // Fall back to the graphics queue if no dedicated transfer queue
    let transfer = transfer_family.unwrap_or(graphics);

    Ok(QueueFamilyIndices { graphics, transfer })
}

/// Device extensions to enable.
fn device_extensions(debug_printf: bool) -> Vec<&'static CStr> {
    let mut extensions = Vec::new();
    if debug_printf {
        extensions.push(ash::khr::shader_non_semantic_info::NAME);
    }
    extensions
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
    debug_printf: bool,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let mut unique_families = std::collections::HashSet::new();
    unique_families.insert(queue_families.graphics);
    unique_families.insert(queue_families.transfer);

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extensions = device_extensions(debug_printf);
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    // Vulkan 1.3: dynamic rendering replaces render pass objects
    let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true)
        .maintenance4(true);

    // Vulkan 1.2: bindless shader preambles need buffer references and
    // non-uniform descriptor indexing
    let mut vulkan_1_2_features = vk::PhysicalDeviceVulkan12Features::default()
        .buffer_device_address(true)
        .descriptor_indexing(true)
        .runtime_descriptor_array(true)
        .shader_sampled_image_array_non_uniform_indexing(true);

    let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .features(features)
        .push_next(&mut vulkan_1_3_features)
        .push_next(&mut vulkan_1_2_features);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(HalError::from)?;

    let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
    let transfer_queue = device.get_device_queue(queue_families.transfer, 0);

    Ok((device, graphics_queue, transfer_queue))
}
