use std::ffi::CStr;

use anyhow::Context;
use ash::{khr::surface, vk};

fn get_required_device_extensions() -> [&'static CStr; 1] {
    [ash::khr::swapchain::NAME]
}

/// Picks the first physical device exposing a single queue family that
/// supports both graphics and presentation to `surface_khr`, the
/// swapchain extension, and the 1.2/1.3 features the renderer depends on
/// (buffer device address, descriptor indexing, dynamic rendering,
/// synchronization2). Returns the device and that queue family index.
pub fn pick_physical_device(
    instance: &ash::Instance,
    surface: &surface::Instance,
    surface_khr: vk::SurfaceKHR,
) -> anyhow::Result<(vk::PhysicalDevice, u32)> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .context("failed to enumerate physical devices")?
    };

    let (device, queue_family_index) = devices
        .into_iter()
        .find_map(|device| {
            let family = find_graphics_present_family(instance, surface, surface_khr, device)?;
            let suitable = check_device_extension_support(instance, device)
                && check_required_features(instance, device);
            suitable.then_some((device, family))
        })
        .context("no suitable physical device")?;

    let props = unsafe { instance.get_physical_device_properties(device) };
    log::debug!(
        "Selected physical device: {:?} (queue family {})",
        unsafe { CStr::from_ptr(props.device_name.as_ptr()) },
        queue_family_index,
    );

    Ok((device, queue_family_index))
}

fn find_graphics_present_family(
    instance: &ash::Instance,
    surface: &surface::Instance,
    surface_khr: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> Option<u32> {
    let props = unsafe { instance.get_physical_device_queue_family_properties(device) };

    props
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_count > 0)
        .find_map(|(index, family)| {
            let index = index as u32;
            if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                return None;
            }
            match unsafe {
                surface.get_physical_device_surface_support(device, index, surface_khr)
            } {
                Ok(true) => Some(index),
                Ok(false) => None,
                Err(e) => {
                    log::warn!("failed to query present support for queue family {index}: {e}");
                    None
                }
            }
        })
}

fn check_required_features(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut features12)
        .push_next(&mut features13);
    unsafe { instance.get_physical_device_features2(device, &mut features2) };

    let supported = features12.buffer_device_address == vk::TRUE
        && features12.descriptor_indexing == vk::TRUE
        && features13.dynamic_rendering == vk::TRUE
        && features13.synchronization2 == vk::TRUE;

    if !supported {
        log::warn!("physical device is missing required 1.2/1.3 features");
    }
    supported
}

fn check_device_extension_support(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let required_extensions = get_required_device_extensions();

    let extension_props = match unsafe { instance.enumerate_device_extension_properties(device) } {
        Ok(props) => props,
        Err(e) => {
            log::warn!("failed to enumerate device extension properties: {e}");
            return false;
        }
    };

    required_extensions.iter().all(|required| {
        let found = extension_props.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            required == &name
        });
        if !found {
            log::warn!(
                "required device extension not supported: {}",
                required.to_string_lossy()
            );
        }
        found
    })
}
