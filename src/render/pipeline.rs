use std::ffi::CString;
use std::sync::Arc;

use anyhow::Context;
use ash::vk;

use crate::vulkan::DeviceContext;

/// The fixed-function pipeline drawing the quad. Vertices are pulled
/// through a buffer device address pushed as the lone push constant, so
/// the vertex input state stays empty and no vertex buffer is bound.
pub struct QuadPipeline {
    device: Arc<DeviceContext>,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
}

/// One 64-bit device address handed to the vertex stage per draw.
fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::VERTEX)
        .offset(0)
        .size(std::mem::size_of::<vk::DeviceAddress>() as u32)
}

impl QuadPipeline {
    pub fn new(
        device: Arc<DeviceContext>,
        color_format: vk::Format,
        vert_spv: &[u32],
        frag_spv: &[u32],
    ) -> anyhow::Result<Self> {
        let push_constant_ranges = [push_constant_range()];
        let layout_info =
            vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_constant_ranges);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .context("failed to create pipeline layout")?
        };

        let pipeline = match build_pipeline(&device, layout, color_format, vert_spv, frag_spv) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device,
            layout,
            pipeline,
        })
    }
}

impl Drop for QuadPipeline {
    fn drop(&mut self) {
        log::trace!("Destroying quad pipeline");
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn build_pipeline(
    device: &DeviceContext,
    layout: vk::PipelineLayout,
    color_format: vk::Format,
    vert_spv: &[u32],
    frag_spv: &[u32],
) -> anyhow::Result<vk::Pipeline> {
    let formats = [color_format];
    let mut rendering_info =
        vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&formats);

    // No bound vertex buffers; the shader indexes the pushed address.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let raster = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA);

    let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
        .attachments(std::slice::from_ref(&color_blend_attachment));

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default();

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let vert_module = create_shader_module(device, vert_spv)
        .context("failed to create vertex shader module")?;
    let frag_module = match create_shader_module(device, frag_spv) {
        Ok(module) => module,
        Err(e) => {
            unsafe { device.destroy_shader_module(vert_module, None) };
            return Err(e).context("failed to create fragment shader module");
        }
    };

    let entry_point = CString::new("main")?;
    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(&entry_point),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(&entry_point),
    ];

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&raster)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .depth_stencil_state(&depth_stencil)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .push_next(&mut rendering_info);

    let result = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    };

    // Modules are only needed for pipeline creation.
    unsafe {
        device.destroy_shader_module(vert_module, None);
        device.destroy_shader_module(frag_module, None);
    }

    let pipelines =
        result.map_err(|(_, e)| anyhow::anyhow!("failed to create graphics pipeline: {e:?}"))?;
    pipelines
        .first()
        .copied()
        .context("no pipeline returned from create_graphics_pipelines")
}

fn create_shader_module(
    device: &ash::Device,
    code: &[u32],
) -> anyhow::Result<vk::ShaderModule> {
    Ok(unsafe {
        device.create_shader_module(&vk::ShaderModuleCreateInfo::default().code(code), None)?
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constant_slot_holds_one_device_address() {
        let range = push_constant_range();
        assert_eq!(range.size, 8);
        assert_eq!(range.offset, 0);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
