use anyhow::Context;
use ash::vk;

use super::frame::Frame;

/// Submits the recorded frame: waits on image acquisition at the
/// color-attachment-output stage, signals `render_finished` once all
/// graphics work retires, and attaches the frame fence to the
/// submission.
pub fn submit_frame(
    device: &ash::Device,
    graphics_queue: vk::Queue,
    frame: &Frame,
) -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    let _span = tracy_client::span!("submit_frame");

    let wait_info = vk::SemaphoreSubmitInfo::default()
        .semaphore(frame.image_available)
        .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
    let signal_info = vk::SemaphoreSubmitInfo::default()
        .semaphore(frame.render_finished)
        .stage_mask(vk::PipelineStageFlags2::ALL_GRAPHICS);
    let cmd_info = vk::CommandBufferSubmitInfo::default().command_buffer(frame.command_buffer);

    let submit_info = vk::SubmitInfo2::default()
        .wait_semaphore_infos(std::slice::from_ref(&wait_info))
        .command_buffer_infos(std::slice::from_ref(&cmd_info))
        .signal_semaphore_infos(std::slice::from_ref(&signal_info));

    unsafe {
        device
            .queue_submit2(graphics_queue, &[submit_info], frame.fence)
            .context("failed to submit frame")?;
    }

    Ok(())
}
