mod context;
mod debug;
mod device;
mod physical;
mod swapchain;

pub use context::VulkanContext;
pub use device::DeviceContext;
pub use swapchain::{SWAPCHAIN_FORMAT, SwapchainContext};
