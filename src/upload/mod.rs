use std::sync::Arc;

use anyhow::Context;
use ash::vk;

use crate::vulkan::DeviceContext;

/// First-fit scan of the device's memory-type table: the winning index
/// is the smallest one whose bit is set in `type_filter` and whose
/// property flags are a superset of `required`. No fallback to a
/// lesser-capable type.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        type_filter & (1 << i) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(required)
    })
}

/// A device-local buffer with its backing allocation, created once
/// before the frame loop and never written by two in-flight submissions.
pub struct DeviceBuffer {
    device: Arc<DeviceContext>,
    pub buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl DeviceBuffer {
    pub fn device_local(
        device: Arc<DeviceContext>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> anyhow::Result<Self> {
        let (buffer, memory) = create_bound_buffer(
            &device,
            size,
            usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS),
        )
        .context("failed to create device-local buffer")?;

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Only valid for buffers created with SHADER_DEVICE_ADDRESS usage.
    pub fn device_address(&self) -> vk::DeviceAddress {
        let info = vk::BufferDeviceAddressInfo::default().buffer(self.buffer);
        unsafe { self.device.get_buffer_device_address(&info) }
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Records and submits startup host-to-device transfers. Synchronous and
/// blocking: each upload retires on the GPU before the staging buffer is
/// released. Uploads only happen before the frame loop starts.
pub struct Uploader {
    device: Arc<DeviceContext>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
}

impl Uploader {
    pub fn new(device: Arc<DeviceContext>) -> anyhow::Result<Self> {
        // Handles start null and are filled in creation order; a failure
        // part-way through unwinds the earlier handles via Drop, which
        // ignores null handles.
        let mut uploader = Self {
            device,
            command_pool: vk::CommandPool::null(),
            command_buffer: vk::CommandBuffer::null(),
            fence: vk::Fence::null(),
        };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(uploader.device.queue_family_index)
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            );
        uploader.command_pool = unsafe {
            uploader
                .device
                .create_command_pool(&pool_info, None)
                .context("failed to create upload command pool")?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(uploader.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        uploader.command_buffer = unsafe {
            uploader
                .device
                .allocate_command_buffers(&alloc_info)
                .context("failed to allocate upload command buffer")?[0]
        };

        uploader.fence = unsafe {
            uploader
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .context("failed to create upload fence")?
        };

        Ok(uploader)
    }

    /// Copies `bytes` into `dst` through a staging buffer sized to
    /// exactly the payload. The staging buffer and its memory are
    /// released on every exit path.
    pub fn upload(&self, dst: &DeviceBuffer, bytes: &[u8]) -> anyhow::Result<()> {
        let size = bytes.len() as vk::DeviceSize;
        anyhow::ensure!(
            size <= dst.size,
            "payload ({size} bytes) exceeds destination buffer ({} bytes)",
            dst.size
        );

        let staging = StagingBuffer::new(self.device.clone(), bytes)
            .context("failed to create staging buffer")?;

        let result = self.submit_copy(staging.buffer, dst.buffer, size);
        drop(staging);
        result.with_context(|| format!("failed to upload {} bytes", bytes.len()))
    }

    fn submit_copy(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    ) -> anyhow::Result<()> {
        let device = &self.device;
        unsafe {
            device.reset_command_buffer(
                self.command_buffer,
                vk::CommandBufferResetFlags::empty(),
            )?;
            device.begin_command_buffer(
                self.command_buffer,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;

            let region = vk::BufferCopy::default().size(size);
            device.cmd_copy_buffer(self.command_buffer, src, dst, &[region]);

            device.end_command_buffer(self.command_buffer)?;

            let command_buffers = [self.command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device.queue_submit(device.graphics_queue, &[submit_info], self.fence)?;

            // The fence ties staging release to this transfer alone, not
            // whole-queue quiescence.
            device.wait_for_fences(&[self.fence], true, u64::MAX)?;
            device.reset_fences(&[self.fence])?;
        }
        Ok(())
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        log::trace!("Destroying uploader");
        unsafe {
            self.device.destroy_fence(self.fence, None);
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Host-visible, host-coherent transfer source. Coherence is required at
/// allocation time, so no explicit flush happens after the memcpy.
struct StagingBuffer {
    device: Arc<DeviceContext>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
}

impl StagingBuffer {
    fn new(device: Arc<DeviceContext>, bytes: &[u8]) -> anyhow::Result<Self> {
        let size = bytes.len() as vk::DeviceSize;
        let (buffer, memory) = create_bound_buffer(
            &device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            false,
        )?;

        let staging = Self {
            device,
            buffer,
            memory,
        };

        unsafe {
            let ptr = staging
                .device
                .map_memory(staging.memory, 0, size, vk::MemoryMapFlags::empty())
                .context("failed to map staging memory")?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            staging.device.unmap_memory(staging.memory);
        }

        Ok(staging)
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn create_bound_buffer(
    device: &DeviceContext,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    required_memory: vk::MemoryPropertyFlags,
    device_address: bool,
) -> anyhow::Result<(vk::Buffer, vk::DeviceMemory)> {
    let buffer_info = vk::BufferCreateInfo::default()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer = unsafe {
        device
            .create_buffer(&buffer_info, None)
            .context("failed to create buffer")?
    };

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

    let memory_type_index = match find_memory_type(
        &device.memory_properties,
        requirements.memory_type_bits,
        required_memory,
    ) {
        Some(index) => index,
        None => {
            unsafe { device.destroy_buffer(buffer, None) };
            anyhow::bail!("no memory type satisfies {required_memory:?}");
        }
    };

    let mut flags_info =
        vk::MemoryAllocateFlagsInfo::default().flags(vk::MemoryAllocateFlags::DEVICE_ADDRESS);
    let mut alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);
    if device_address {
        alloc_info = alloc_info.push_next(&mut flags_info);
    }

    let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(e).context("failed to allocate buffer memory");
        }
    };

    if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
        unsafe {
            device.destroy_buffer(buffer, None);
            device.free_memory(memory, None);
        }
        return Err(e).context("failed to bind buffer memory");
    }

    Ok((buffer, memory))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = flags.len() as u32;
        for (i, &f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = f;
        }
        props
    }

    const DEVICE_LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST_VISIBLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_COHERENT;

    #[test]
    fn first_matching_index_wins() {
        let props = table(&[
            DEVICE_LOCAL,
            DEVICE_LOCAL,
            HOST_VISIBLE | HOST_COHERENT,
        ]);
        assert_eq!(find_memory_type(&props, 0b111, DEVICE_LOCAL), Some(0));
        // Same request with type 0 masked out falls through to type 1.
        assert_eq!(find_memory_type(&props, 0b110, DEVICE_LOCAL), Some(1));
    }

    #[test]
    fn required_flags_must_be_a_superset() {
        let props = table(&[HOST_VISIBLE, HOST_VISIBLE | HOST_COHERENT]);
        assert_eq!(
            find_memory_type(&props, 0b11, HOST_VISIBLE | HOST_COHERENT),
            Some(1)
        );
    }

    #[test]
    fn superset_types_satisfy_smaller_requests() {
        let props = table(&[DEVICE_LOCAL | HOST_VISIBLE | HOST_COHERENT]);
        assert_eq!(find_memory_type(&props, 0b1, HOST_VISIBLE), Some(0));
    }

    #[test]
    fn no_match_is_deterministic_none() {
        let props = table(&[DEVICE_LOCAL, HOST_VISIBLE]);
        // Flag set never offered.
        assert_eq!(
            find_memory_type(&props, 0b11, HOST_VISIBLE | HOST_COHERENT),
            None
        );
        // Compatible type exists but the filter excludes it.
        assert_eq!(find_memory_type(&props, 0b01, HOST_VISIBLE), None);
        // Empty filter never matches.
        assert_eq!(find_memory_type(&props, 0, DEVICE_LOCAL), None);
    }

    #[test]
    fn types_past_the_count_are_ignored() {
        let mut props = table(&[DEVICE_LOCAL]);
        props.memory_types[1].property_flags = DEVICE_LOCAL;
        assert_eq!(find_memory_type(&props, 0b10, DEVICE_LOCAL), None);
    }
}
