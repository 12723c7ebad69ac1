use std::sync::Arc;

use anyhow::Context;
use ash::vk;

use crate::vulkan::DeviceContext;

/// Sync set for the single frame in flight: one reusable fence gating
/// command-buffer reuse, one semaphore signaled on image acquisition and
/// one signaled when rendering retires, plus the shared command buffer.
pub struct Frame {
    device: Arc<DeviceContext>,
    pub fence: vk::Fence,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
}

impl Frame {
    pub fn new(device: Arc<DeviceContext>) -> anyhow::Result<Self> {
        // Handles start null and are filled in creation order. Destroying
        // a null handle is a no-op, so a failure part-way through unwinds
        // the earlier handles via Drop.
        let mut frame = Self {
            device,
            fence: vk::Fence::null(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
        };

        // Signaled so the very first fence wait falls through.
        frame.fence =
            create_fence(&frame.device, true).context("failed to create frame fence")?;
        frame.image_available =
            create_semaphore(&frame.device).context("failed to create image available semaphore")?;
        frame.render_finished =
            create_semaphore(&frame.device).context("failed to create render finished semaphore")?;

        frame.command_pool = {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(frame.device.queue_family_index)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            unsafe {
                frame
                    .device
                    .create_command_pool(&pool_info, None)
                    .context("failed to create frame command pool")?
            }
        };

        frame.command_buffer = {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(frame.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            unsafe {
                frame
                    .device
                    .allocate_command_buffers(&alloc_info)
                    .context("failed to allocate frame command buffer")?[0]
            }
        };

        Ok(frame)
    }

    /// Blocks until the previous submission fully retires, then resets
    /// the fence. After this returns the command buffer and every
    /// resource it references are safe to reuse.
    pub fn wait_and_reset(&self) -> anyhow::Result<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .context("failed waiting for frame fence")?;
            self.device
                .reset_fences(&[self.fence])
                .context("failed to reset frame fence")?;
        }
        Ok(())
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        log::trace!("Destroying frame");
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_semaphore(self.render_finished, None);
            self.device.destroy_semaphore(self.image_available, None);
            self.device.destroy_fence(self.fence, None);
        }
    }
}

fn create_semaphore(device: &ash::Device) -> anyhow::Result<vk::Semaphore> {
    unsafe {
        device
            .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
            .context("failed to create semaphore")
    }
}

fn create_fence(device: &ash::Device, signaled: bool) -> anyhow::Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    unsafe {
        device
            .create_fence(&create_info, None)
            .context("failed to create fence")
    }
}
