use anyhow::Context;
use ash::vk;

use crate::geometry::QUAD_INDICES;
use crate::upload::DeviceBuffer;
use crate::vulkan::SwapchainContext;

use super::frame::Frame;
use super::pipeline::QuadPipeline;

const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Records the whole frame into the shared command buffer: the acquired
/// image moves UNDEFINED -> COLOR_ATTACHMENT_OPTIMAL, gets drawn into
/// inside a dynamic rendering pass, then moves to PRESENT_SRC_KHR.
pub fn record_frame(
    device: &ash::Device,
    frame: &Frame,
    swapchain: &SwapchainContext,
    image_index: u32,
    pipeline: &QuadPipeline,
    vertex_address: vk::DeviceAddress,
    index_buffer: &DeviceBuffer,
) -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    let _span = tracy_client::span!("record_frame");

    let cmd = frame.command_buffer;
    let image = swapchain.images[image_index as usize];
    let image_view = swapchain.image_views[image_index as usize];

    let render_area = vk::Rect2D {
        offset: vk::Offset2D::default(),
        extent: swapchain.extent,
    };
    let viewport = vk::Viewport {
        width: swapchain.extent.width as f32,
        height: swapchain.extent.height as f32,
        max_depth: 1.0,
        ..Default::default()
    };

    unsafe {
        device
            .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
            .context("failed to reset command buffer")?;
        device
            .begin_command_buffer(
                cmd,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )
            .context("failed to begin command buffer")?;

        transition_image(
            device,
            cmd,
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );

        device.cmd_set_viewport(cmd, 0, &[viewport]);
        device.cmd_set_scissor(cmd, 0, &[render_area]);

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(image_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));
        device.cmd_begin_rendering(cmd, &rendering_info);

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        device.cmd_push_constants(
            cmd,
            pipeline.layout,
            vk::ShaderStageFlags::VERTEX,
            0,
            &vertex_address.to_ne_bytes(),
        );
        device.cmd_bind_index_buffer(cmd, index_buffer.buffer, 0, vk::IndexType::UINT32);
        device.cmd_draw_indexed(cmd, QUAD_INDICES.len() as u32, 1, 0, 0, 0);

        device.cmd_end_rendering(cmd);

        transition_image(
            device,
            cmd,
            image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );

        device
            .end_command_buffer(cmd)
            .context("failed to end command buffer")?;
    }

    Ok(())
}

/// Conservative full-pipeline barrier; fine for a single barrier pair
/// per frame, too heavy for anything bigger.
fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let barrier = vk::ImageMemoryBarrier2::default()
        .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(vk::REMAINING_MIP_LEVELS)
                .base_array_layer(0)
                .layer_count(vk::REMAINING_ARRAY_LAYERS),
        );

    let dependency_info =
        vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&barrier));
    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency_info) }
}
