use std::sync::Arc;

use anyhow::{Context, bail};
use ash::vk;

use super::device::DeviceContext;

/// The presentation chain is fixed for the lifetime of the process:
/// 8-bit sRGB color, FIFO pacing, no recreation on resize.
pub const SWAPCHAIN_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;
const SWAPCHAIN_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;
const SWAPCHAIN_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

pub struct SwapchainContext {
    device: Arc<DeviceContext>,
    pub swapchain_device: ash::khr::swapchain::Device,
    pub swapchain: vk::SwapchainKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

impl SwapchainContext {
    pub fn new(
        instance: &ash::Instance,
        device: Arc<DeviceContext>,
        surface_instance: &ash::khr::surface::Instance,
        surface_khr: vk::SurfaceKHR,
        preferred_dimensions: [u32; 2],
    ) -> anyhow::Result<Self> {
        let physical_device = device.physical_device;

        let formats = unsafe {
            surface_instance
                .get_physical_device_surface_formats(physical_device, surface_khr)
                .context("failed to get surface formats")?
        };
        if !formats.iter().any(|f| {
            f.format == SWAPCHAIN_FORMAT && f.color_space == SWAPCHAIN_COLOR_SPACE
        }) {
            bail!("surface does not support {SWAPCHAIN_FORMAT:?}/{SWAPCHAIN_COLOR_SPACE:?}");
        }

        let capabilities = unsafe {
            surface_instance
                .get_physical_device_surface_capabilities(physical_device, surface_khr)
                .context("failed to get surface capabilities")?
        };

        let extent = choose_extent(&capabilities, preferred_dimensions);
        let image_count = {
            let max = capabilities.max_image_count;
            let mut preferred = capabilities.min_image_count + 1;
            if max > 0 && preferred > max {
                preferred = max;
            }
            preferred
        };

        log::debug!(
            "Creating swapchain.\n\tFormat: {:?}\n\tPresentMode: {:?}\n\tExtent: {:?}\n\tImageCount: {:?}",
            SWAPCHAIN_FORMAT,
            SWAPCHAIN_PRESENT_MODE,
            extent,
            image_count,
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface_khr)
            .min_image_count(image_count)
            .image_format(SWAPCHAIN_FORMAT)
            .image_color_space(SWAPCHAIN_COLOR_SPACE)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(SWAPCHAIN_PRESENT_MODE)
            .clipped(true);

        let swapchain_device = ash::khr::swapchain::Device::new(instance, &device);
        let swapchain = unsafe {
            swapchain_device
                .create_swapchain(&create_info, None)
                .context("failed to create swapchain")?
        };

        // From here on the partially built context owns the swapchain,
        // so an early return releases it and any views created so far.
        let mut ctx = Self {
            device,
            swapchain_device,
            swapchain,
            extent,
            images: Vec::new(),
            image_views: Vec::new(),
        };

        ctx.images = unsafe {
            ctx.swapchain_device
                .get_swapchain_images(ctx.swapchain)
                .context("failed to get swapchain images")?
        };

        for &image in &ctx.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(SWAPCHAIN_FORMAT)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let view = unsafe {
                ctx.device
                    .create_image_view(&view_info, None)
                    .context("failed to create swapchain image view")?
            };
            ctx.image_views.push(view);
        }

        Ok(ctx)
    }

    /// Blocks until an image is free, signaling `semaphore` once the
    /// returned index is usable. Suboptimal chains are tolerated since
    /// recreation is out of scope; real errors are fatal upstream.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> anyhow::Result<u32> {
        let (index, _suboptimal) = unsafe {
            self.swapchain_device
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
                .context("failed to acquire next swapchain image")?
        };
        Ok(index)
    }
}

impl Drop for SwapchainContext {
    fn drop(&mut self) {
        log::trace!("Destroying swapchain");
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.swapchain_device.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Surfaces either pin the extent via `current_extent` or leave it free
/// (`width == u32::MAX`), in which case the preferred size is clamped
/// into the supported range.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    preferred_dimensions: [u32; 2],
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: preferred_dimensions[0].clamp(min.width, max.width),
        height: preferred_dimensions[1].clamp(min.height, max.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: u32, min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current,
                height: current,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn fixed_current_extent_wins() {
        let capabilities = caps(640, (1, 1), (4096, 4096));
        let extent = choose_extent(&capabilities, [1280, 720]);
        assert_eq!((extent.width, extent.height), (640, 640));
    }

    #[test]
    fn free_extent_clamps_preferred_size() {
        let capabilities = caps(u32::MAX, (800, 600), (1024, 640));
        let extent = choose_extent(&capabilities, [1280, 720]);
        assert_eq!((extent.width, extent.height), (1024, 640));

        let extent = choose_extent(&capabilities, [100, 100]);
        assert_eq!((extent.width, extent.height), (800, 600));
    }
}
