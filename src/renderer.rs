use std::sync::Arc;

use anyhow::Context;
use ash::vk;
use winit::window::Window;

use crate::error::{FatalError, FrameStage, FrameStageExt};
use crate::geometry::{QUAD_INDICES, QUAD_VERTICES};
use crate::render::{
    Frame, QuadPipeline, load_spv, present_frame, record_frame, submit_frame,
};
use crate::upload::{DeviceBuffer, Uploader};
use crate::vulkan::{DeviceContext, SwapchainContext, VulkanContext};

const VERT_SPV_PATH: &str = "assets/quad.vert.spv";
const FRAG_SPV_PATH: &str = "assets/quad.frag.spv";

/// Owns every GPU object and drives the per-frame state machine. Exactly
/// one frame is ever in flight; the fence in [`Frame`] serializes
/// consecutive iterations.
///
/// Field order doubles as teardown order: the frame, pipeline and
/// buffers drop before the swapchain, the device drops once nothing
/// references it, and the instance goes last.
pub struct Renderer {
    frame: Frame,
    pipeline: QuadPipeline,
    vertex_address: vk::DeviceAddress,
    _vertex_buffer: DeviceBuffer,
    index_buffer: DeviceBuffer,
    swapchain: SwapchainContext,
    device: Arc<DeviceContext>,
    _vk: VulkanContext,
}

impl Renderer {
    pub fn new(window: &Window) -> Result<Self, FatalError> {
        Self::build(window).map_err(FatalError::setup)
    }

    fn build(window: &Window) -> anyhow::Result<Self> {
        let vk = VulkanContext::new(window).context("failed to create Vulkan context")?;

        let device = Arc::new(
            DeviceContext::new(&vk.instance, &vk.surface_instance, vk.surface_khr)
                .context("failed to create device context")?,
        );

        let size = window.inner_size();
        let swapchain = SwapchainContext::new(
            &vk.instance,
            device.clone(),
            &vk.surface_instance,
            vk.surface_khr,
            [size.width, size.height],
        )
        .context("failed to create swapchain")?;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        let index_bytes: &[u8] = bytemuck::cast_slice(&QUAD_INDICES);

        let vertex_buffer = DeviceBuffer::device_local(
            device.clone(),
            vertex_bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        )
        .context("failed to create vertex buffer")?;

        let index_buffer = DeviceBuffer::device_local(
            device.clone(),
            index_bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::INDEX_BUFFER,
        )
        .context("failed to create index buffer")?;

        {
            let uploader =
                Uploader::new(device.clone()).context("failed to create uploader")?;
            uploader
                .upload(&vertex_buffer, vertex_bytes)
                .context("failed to upload vertex data")?;
            uploader
                .upload(&index_buffer, index_bytes)
                .context("failed to upload index data")?;
        }

        let vertex_address = vertex_buffer.device_address();

        let vert_spv = load_spv(VERT_SPV_PATH).context("failed to load vertex shader")?;
        let frag_spv = load_spv(FRAG_SPV_PATH).context("failed to load fragment shader")?;
        let pipeline = QuadPipeline::new(
            device.clone(),
            crate::vulkan::SWAPCHAIN_FORMAT,
            &vert_spv,
            &frag_spv,
        )
        .context("failed to create quad pipeline")?;

        let frame = Frame::new(device.clone()).context("failed to create frame")?;

        log::debug!("Renderer ready: {} swapchain images", swapchain.images.len());

        Ok(Self {
            frame,
            pipeline,
            vertex_address,
            _vertex_buffer: vertex_buffer,
            index_buffer,
            swapchain,
            device,
            _vk: vk,
        })
    }

    /// One full iteration of the frame state machine:
    /// fence wait -> acquire -> record -> submit -> present.
    pub fn draw_frame(&mut self) -> Result<(), FatalError> {
        self.frame.wait_and_reset().stage(FrameStage::FenceWait)?;

        let image_index = self
            .swapchain
            .acquire_next_image(self.frame.image_available)
            .stage(FrameStage::Acquire)?;

        record_frame(
            &self.device,
            &self.frame,
            &self.swapchain,
            image_index,
            &self.pipeline,
            self.vertex_address,
            &self.index_buffer,
        )
        .stage(FrameStage::Record)?;

        submit_frame(&self.device, self.device.graphics_queue, &self.frame)
            .stage(FrameStage::Submit)?;

        present_frame(
            self.device.graphics_queue,
            &self.frame,
            &self.swapchain,
            image_index,
        )
        .stage(FrameStage::Present)?;

        #[cfg(feature = "tracing")]
        tracy_client::frame_mark();

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::trace!("Destroying renderer");
        // Let in-flight work retire before the field drops tear the
        // resources down.
        if let Err(e) = self.device.wait_idle() {
            log::warn!("device wait idle failed during teardown: {e:#}");
        }
    }
}
