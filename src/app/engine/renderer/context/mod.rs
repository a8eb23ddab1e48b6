use anyhow::{Context as _, Result, anyhow};
use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::c_void;
use thiserror::Error;
use vulkanalia::Version;
use vulkanalia::loader::{LIBRARY, LibloadingLoader};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;
use vulkanalia::window as vk_window;
use winit::window::Window;

use vulkanalia::vk::{ExtDebugUtilsExtension, KhrSurfaceExtension};

use super::swapchain::SwapchainSupport;

/// Instance, surface and logical device for one window.
///
/// Everything created from `device` must be destroyed before the context is
/// dropped.
pub struct Context {
    pub entry: Entry,
    pub instance: Instance,
    pub data: AppData,
    pub device: Device,
}

pub struct AppData {
    pub messenger: vk::DebugUtilsMessengerEXT,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilyIndices,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

const VALIDATION_ENABLED: bool = cfg!(debug_assertions);

const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

const DEVICE_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

impl Context {
    pub unsafe fn create(window: &Window) -> Result<Self> {
        let loader = LibloadingLoader::new(LIBRARY).context("Failed to load the Vulkan library")?;
        let mut data = AppData {
            messenger: vk::DebugUtilsMessengerEXT::null(),
            surface: vk::SurfaceKHR::null(),
            physical_device: vk::PhysicalDevice::null(),
            queue_families: QueueFamilyIndices::default(),
            graphics_queue: vk::Queue::null(),
            present_queue: vk::Queue::null(),
        };
        let entry = Entry::new(loader).map_err(|e| anyhow!("{}", e))?;
        let instance = Self::create_instance(window, &entry, &mut data)?;
        let instance_teardown = Teardown::new({
            let instance = instance.clone();
            let messenger = data.messenger;
            move || unsafe { destroy_instance(&instance, messenger) }
        });

        data.surface = vk_window::create_surface(&instance, window, window)?;
        let surface_teardown = Teardown::new({
            let instance = instance.clone();
            let surface = data.surface;
            move || unsafe { instance.destroy_surface_khr(surface, None) }
        });

        Self::pick_physical_device(&instance, &mut data)?;
        let device = Self::create_logical_device(&entry, &instance, &mut data)?;

        // `Drop for Context` owns everything from here on.
        surface_teardown.disarm();
        instance_teardown.disarm();
        Ok(Self {
            entry,
            instance,
            data,
            device,
        })
    }

    unsafe fn create_instance(
        window: &Window,
        entry: &Entry,
        data: &mut AppData,
    ) -> Result<Instance> {
        let app_info = vk::ApplicationInfo::builder()
            .application_name(b"Vulkan Shader Demo\0")
            .application_version(vk::make_version(1, 0, 0))
            .engine_name(b"No Engine\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 0, 0));

        let available_layers = entry
            .enumerate_instance_layer_properties()?
            .iter()
            .map(|l| l.layer_name)
            .collect::<HashSet<_>>();

        tracing::debug!("Available layers:");
        for layer in &available_layers {
            let name = unsafe { CStr::from_ptr(layer.as_ptr()) };
            tracing::debug!("  {}", name.to_string_lossy());
        }

        if VALIDATION_ENABLED && !available_layers.contains(&VALIDATION_LAYER) {
            return Err(anyhow!("Validation layer requested but not supported."));
        }

        let layers = if VALIDATION_ENABLED {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let mut extensions = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        if VALIDATION_ENABLED {
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }

        // Enable portability extensions for MoltenVK on macOS
        let flags = if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
            extensions.push(
                vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION
                    .name
                    .as_ptr(),
            );
            extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let mut debug_info = Self::debug_messenger_info();
        if VALIDATION_ENABLED {
            info = info.push_next(&mut debug_info);
        }

        let instance = entry.create_instance(&info, None)?;

        if VALIDATION_ENABLED {
            let debug_info = Self::debug_messenger_info();
            match instance.create_debug_utils_messenger_ext(&debug_info, None) {
                Ok(messenger) => data.messenger = messenger,
                Err(error) => {
                    instance.destroy_instance(None);
                    return Err(error.into());
                }
            }
        }

        Ok(instance)
    }

    fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .user_callback(Some(Self::debug_callback))
    }

    pub extern "system" fn debug_callback(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        type_: vk::DebugUtilsMessageTypeFlagsEXT,
        data: *const vk::DebugUtilsMessengerCallbackDataEXT,
        _: *mut c_void,
    ) -> vk::Bool32 {
        let data = unsafe { *data };
        let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

        if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
            tracing::error!("({:?}) {}", type_, message);
        } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
            tracing::warn!("({:?}) {}", type_, message);
        } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
            tracing::debug!("({:?}) {}", type_, message);
        } else {
            tracing::trace!("({:?}) {}", type_, message);
        }

        vk::FALSE
    }

    unsafe fn check_physical_device(
        instance: &Instance,
        data: &AppData,
        physical_device: vk::PhysicalDevice,
    ) -> Result<()> {
        QueueFamilyIndices::get(instance, data, physical_device)?;
        Self::check_device_extensions(instance, physical_device)?;

        let support = SwapchainSupport::get(instance, data, physical_device)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Err(anyhow!(SuitabilityError("swapchain support")));
        }

        Ok(())
    }

    unsafe fn check_device_extensions(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<()> {
        let extensions = instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();

        if DEVICE_EXTENSIONS.iter().all(|e| extensions.contains(e)) {
            Ok(())
        } else {
            Err(anyhow!(SuitabilityError(
                "required device extensions"
            )))
        }
    }

    unsafe fn pick_physical_device(instance: &Instance, data: &mut AppData) -> Result<()> {
        for physical_device in instance.enumerate_physical_devices()? {
            let properties = instance.get_physical_device_properties(physical_device);

            if let Err(error) = Self::check_physical_device(instance, data, physical_device) {
                tracing::warn!(
                    "Skipping physical device (`{}`): {}",
                    properties.device_name,
                    error
                );
            } else {
                tracing::info!("Selected physical device (`{}`).", properties.device_name);
                data.physical_device = physical_device;
                data.queue_families = QueueFamilyIndices::get(instance, data, physical_device)?;
                return Ok(());
            }
        }

        Err(anyhow!("Failed to find suitable physical device."))
    }

    unsafe fn create_logical_device(
        entry: &Entry,
        instance: &Instance,
        data: &mut AppData,
    ) -> Result<Device> {
        let indices = data.queue_families;

        let mut unique_indices = HashSet::new();
        unique_indices.insert(indices.graphics);
        unique_indices.insert(indices.present);

        let queue_priorities = &[1.0];
        let queue_infos = unique_indices
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if VALIDATION_ENABLED {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = DEVICE_EXTENSIONS
            .iter()
            .map(|n| n.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }
        let features = vk::PhysicalDeviceFeatures::builder();

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = instance.create_device(data.physical_device, &info, None)?;
        data.graphics_queue = device.get_device_queue(indices.graphics, 0);
        data.present_queue = device.get_device_queue(indices.present, 0);
        Ok(device)
    }

    /// Index of a memory type allowed by `requirements` that has all of `properties`.
    pub unsafe fn memory_type_index(
        &self,
        properties: vk::MemoryPropertyFlags,
        requirements: vk::MemoryRequirements,
    ) -> Result<u32> {
        let memory = self
            .instance
            .get_physical_device_memory_properties(self.data.physical_device);

        (0..memory.memory_type_count)
            .find(|i| {
                let suitable = (requirements.memory_type_bits & (1 << i)) != 0;
                let memory_type = memory.memory_types[*i as usize];
                suitable && memory_type.property_flags.contains(properties)
            })
            .ok_or_else(|| anyhow!("Failed to find suitable memory type."))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_surface_khr(self.data.surface, None);
            destroy_instance(&self.instance, self.data.messenger);
        }
        tracing::debug!("Destroyed Vulkan context");
    }
}

unsafe fn destroy_instance(instance: &Instance, messenger: vk::DebugUtilsMessengerEXT) {
    if VALIDATION_ENABLED {
        unsafe { instance.destroy_debug_utils_messenger_ext(messenger, None) };
    }
    unsafe { instance.destroy_instance(None) };
}

/// Runs a release step on drop unless disarmed first.
///
/// Covers objects created before the owning value exists, so an early `?`
/// still releases them. Guards run in reverse order of creation.
struct Teardown<F: FnOnce()> {
    release: Option<F>,
}

impl<F: FnOnce()> Teardown<F> {
    fn new(release: F) -> Self {
        Self {
            release: Some(release),
        }
    }

    fn disarm(mut self) {
        self.release = None;
    }
}

impl<F: FnOnce()> Drop for Teardown<F> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[derive(Debug, Error)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub &'static str);

#[derive(Copy, Clone, Debug, Default)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    unsafe fn get(
        instance: &Instance,
        data: &AppData,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance.get_physical_device_queue_family_properties(physical_device);

        let graphics = properties
            .iter()
            .position(|p| p.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32);

        let mut present = None;
        for (index, _) in properties.iter().enumerate() {
            if instance.get_physical_device_surface_support_khr(
                physical_device,
                index as u32,
                data.surface,
            )? {
                present = Some(index as u32);
                break;
            }
        }

        if let (Some(graphics), Some(present)) = (graphics, present) {
            Ok(Self { graphics, present })
        } else {
            Err(anyhow!(SuitabilityError(
                "required queue families"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn failing_setup(log: &RefCell<Vec<&'static str>>, fail_late: bool) -> Result<()> {
        let instance = Teardown::new(|| log.borrow_mut().push("instance"));
        let surface = Teardown::new(|| log.borrow_mut().push("surface"));
        if fail_late {
            return Err(anyhow!(SuitabilityError("required queue families")));
        }
        surface.disarm();
        instance.disarm();
        Ok(())
    }

    #[test]
    fn early_return_releases_in_reverse_order() {
        let log = RefCell::new(vec![]);
        assert!(failing_setup(&log, true).is_err());
        assert_eq!(*log.borrow(), ["surface", "instance"]);
    }

    #[test]
    fn disarmed_teardown_does_nothing() {
        let log = RefCell::new(vec![]);
        failing_setup(&log, false).unwrap();
        assert!(log.borrow().is_empty());
    }
}
