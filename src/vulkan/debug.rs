use std::ffi::{CStr, CString, c_char, c_void};

use anyhow::bail;
use ash::{Entry, ext::debug_utils, vk};

#[cfg(debug_assertions)]
pub const ENABLE_VALIDATION_LAYERS: bool = true;
#[cfg(not(debug_assertions))]
pub const ENABLE_VALIDATION_LAYERS: bool = false;

const REQUIRED_LAYERS: [&str; 1] = ["VK_LAYER_KHRONOS_validation"];

unsafe extern "system" fn vulkan_debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    typ: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> vk::Bool32 {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

    let message = unsafe { CStr::from_ptr((*p_callback_data).p_message) };
    match severity {
        Severity::VERBOSE => log::debug!("{:?} - {:?}", typ, message),
        Severity::INFO => log::info!("{:?} - {:?}", typ, message),
        Severity::WARNING => log::warn!("{:?} - {:?}", typ, message),
        _ => log::error!("{:?} - {:?}", typ, message),
    }
    vk::FALSE
}

pub fn get_layer_names_and_pointers() -> (Vec<CString>, Vec<*const c_char>) {
    let layer_names = REQUIRED_LAYERS
        .iter()
        .filter_map(|&name| CString::new(name).ok())
        .collect::<Vec<_>>();
    let layer_names_ptrs = layer_names.iter().map(|name| name.as_ptr()).collect();
    (layer_names, layer_names_ptrs)
}

pub fn check_validation_layer_support(entry: &Entry) -> anyhow::Result<()> {
    let supported = unsafe { entry.enumerate_instance_layer_properties()? };
    for required in REQUIRED_LAYERS {
        let found = supported.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_str().is_ok_and(|n| n == required)
        });
        if !found {
            bail!("validation layer not supported: {required}");
        }
    }
    Ok(())
}

pub fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    if !ENABLE_VALIDATION_LAYERS {
        return None;
    }

    let create_info = create_debug_create_info();
    let debug_utils = debug_utils::Instance::new(entry, instance);
    match unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) } {
        Ok(messenger) => Some((debug_utils, messenger)),
        Err(e) => {
            log::warn!("failed to create debug messenger: {:?}", e);
            None
        }
    }
}

pub fn create_debug_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}
