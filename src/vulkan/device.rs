use std::ops::Deref;

use anyhow::Context;
use ash::vk;

use super::physical::pick_physical_device;

/// Owns the logical device, the single graphics+present queue, and the
/// physical device's memory-type table that every later allocation
/// consults. Shared as `Arc<DeviceContext>` so the device outlives every
/// resource created from it; the device itself is destroyed when the
/// last holder goes away.
pub struct DeviceContext {
    device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub queue_family_index: u32,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub physical_device: vk::PhysicalDevice,
}

impl DeviceContext {
    pub fn new(
        instance: &ash::Instance,
        surface: &ash::khr::surface::Instance,
        surface_khr: vk::SurfaceKHR,
    ) -> anyhow::Result<Self> {
        let (physical_device, queue_family_index) =
            pick_physical_device(instance, surface, surface_khr)
                .context("failed to pick physical device")?;

        let queue_priorities = [1.0f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)];

        let device_extensions_ptrs = [ash::khr::swapchain::NAME.as_ptr()];

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
            .buffer_device_address(true)
            .descriptor_indexing(true);
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extensions_ptrs)
            .push_next(&mut features12)
            .push_next(&mut features13);

        let device = unsafe {
            instance
                .create_device(physical_device, &device_create_info, None)
                .context("failed to create logical device")?
        };
        let graphics_queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        log::trace!("Created logical device");

        Ok(Self {
            device,
            graphics_queue,
            queue_family_index,
            memory_properties,
            physical_device,
        })
    }

    pub fn wait_idle(&self) -> anyhow::Result<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .context("failed waiting for device idle")
        }
    }
}

impl Deref for DeviceContext {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        log::trace!("Destroying logical device");
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
