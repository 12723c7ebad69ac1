use anyhow::Context;
use ash::vk;

use crate::vulkan::SwapchainContext;

use super::frame::Frame;

/// Presents the acquired image once `render_finished` signals.
/// Suboptimal results are tolerated; genuine errors are fatal upstream.
pub fn present_frame(
    queue: vk::Queue,
    frame: &Frame,
    swapchain: &SwapchainContext,
    image_index: u32,
) -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    let _span = tracy_client::span!("present_frame");

    let wait_semaphores = [frame.render_finished];
    let indices = [image_index];
    let swapchains = [swapchain.swapchain];

    let present_info = vk::PresentInfoKHR::default()
        .wait_semaphores(&wait_semaphores)
        .swapchains(&swapchains)
        .image_indices(&indices);

    unsafe {
        swapchain
            .swapchain_device
            .queue_present(queue, &present_info)
            .context("failed to present frame")?;
    }
    Ok(())
}
