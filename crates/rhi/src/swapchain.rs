//! Swapchain ownership and lifecycle.
//!
//! The [`SwapchainManager`] owns the presentable image chain for one surface
//! and tracks its lifecycle explicitly:
//!
//! - `Uninitialized`: no chain exists (or the last creation attempt failed)
//! - `Ready`: the chain matches the surface and may be acquired from
//! - `Stale`: the chain no longer matches the surface and must be recreated
//!   before the next acquire
//!
//! Recreation is only legal from `Stale`, and only after the caller has
//! waited for all in-flight work that references the current images - the
//! frame orchestrator enforces that pairing. Every image view the manager
//! hands out is tagged with the generation that produced it, so a handle
//! that survives a recreation is rejected instead of used.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Lifecycle state of the presentable image chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainState {
    /// No chain exists yet, or the last creation attempt failed.
    Uninitialized,
    /// The chain matches the surface and may be acquired from.
    Ready,
    /// The chain no longer matches the surface; recreate before acquiring.
    Stale,
}

impl SwapchainState {
    /// Whether `create` is a legal transition from this state.
    #[inline]
    pub fn can_create(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Stale)
    }

    /// Whether `recreate` is a legal transition from this state.
    #[inline]
    pub fn can_recreate(self) -> bool {
        matches!(self, Self::Stale)
    }
}

/// Surface support details for swapchain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    /// Surface capabilities (image count bounds, extents, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface format / color space combinations
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Queries swapchain support for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the surface queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// A swapchain color target tagged with the generation that produced it.
///
/// The view handle is only valid while the producing generation is current;
/// [`SwapchainManager::validate_target`] rejects anything older.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainTarget {
    /// Image view for the acquired swapchain image.
    pub view: vk::ImageView,
    /// Extent of the chain the image belongs to.
    pub extent: vk::Extent2D,
    /// Generation counter value at the time the target was issued.
    pub generation: u64,
}

/// The created chain: handle, images, and views.
struct Chain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Chain {
    /// Creates a chain, optionally handing the driver the retiring one.
    fn create(
        device: &Arc<Device>,
        surface_loader: &ash::khr::surface::Instance,
        loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        let support = SwapchainSupport::query(device.physical_device(), surface, surface_loader)?;

        if !support.is_adequate() {
            return Err(RhiError::Swapchain(
                "inadequate surface support (no formats or present modes)".to_owned(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = determine_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} images",
            extent.width, extent.height, surface_format.format, present_mode, image_count
        );

        let graphics_family = device.graphics_family();
        let present_family = device.present_family();
        let queue_family_indices = [graphics_family, present_family];

        let (sharing_mode, queue_family_indices_slice) = if graphics_family != present_family {
            debug!(
                "Using CONCURRENT sharing between graphics ({}) and present ({}) families",
                graphics_family, present_family
            );
            (vk::SharingMode::CONCURRENT, queue_family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(queue_family_indices_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { loader.create_swapchain(&create_info, None)? };

        let images = unsafe { loader.get_swapchain_images(handle)? };
        info!("Swapchain created with {} images", images.len());

        let image_views = match create_image_views(device, &images, surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                // The half-built chain must not leak
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device: device.clone(),
            loader: loader.clone(),
            handle,
            images,
            image_views,
            format: surface_format.format,
            extent,
            present_mode,
        })
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        for &view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(view, None);
            }
        }
        unsafe {
            self.loader.destroy_swapchain(self.handle, None);
        }
        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Owns the presentable image chain for one surface and drives its
/// lifecycle state machine.
pub struct SwapchainManager {
    device: Arc<Device>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    state: SwapchainState,
    chain: Option<Chain>,
    /// Incremented on every successful (re)creation; tags issued targets.
    generation: u64,
}

impl SwapchainManager {
    /// Creates a manager in the `Uninitialized` state.
    ///
    /// No Vulkan objects are created until [`SwapchainManager::create`].
    pub fn new(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR) -> Self {
        let surface_loader =
            ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let swapchain_loader =
            ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        Self {
            device,
            surface,
            surface_loader,
            swapchain_loader,
            state: SwapchainState::Uninitialized,
            chain: None,
            generation: 0,
        }
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Whether the chain must be recreated before the next acquire.
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.state == SwapchainState::Stale
    }

    /// Generation of the current chain; bumped on every (re)creation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Creates the chain at the requested size.
    ///
    /// Transitions `Uninitialized | Stale -> Ready`. On failure the manager
    /// stays (or becomes) `Uninitialized` with no chain.
    ///
    /// # Errors
    ///
    /// Returns an error if called from `Ready`, or if chain creation fails.
    pub fn create(&mut self, width: u32, height: u32) -> RhiResult<()> {
        if !self.state.can_create() {
            return Err(RhiError::Swapchain(format!(
                "create is invalid from state {:?}",
                self.state
            )));
        }

        let old_handle = self
            .chain
            .as_ref()
            .map(|chain| chain.handle)
            .unwrap_or(vk::SwapchainKHR::null());

        match Chain::create(
            &self.device,
            &self.surface_loader,
            &self.swapchain_loader,
            self.surface,
            width,
            height,
            old_handle,
        ) {
            Ok(chain) => {
                // Dropping the previous chain destroys the retired handle
                // and its views; the driver has already consumed it via
                // old_swapchain above.
                self.chain = Some(chain);
                self.generation += 1;
                self.state = SwapchainState::Ready;
                debug!("Swapchain generation is now {}", self.generation);
                Ok(())
            }
            Err(e) => {
                warn!("Swapchain creation failed: {}", e);
                self.chain = None;
                self.state = SwapchainState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Marks the chain as no longer matching the surface.
    ///
    /// Called when a resize is pending or when acquire/present reported the
    /// chain out of date or suboptimal. Transitions `Ready -> Stale`; a
    /// no-op in any other state.
    pub fn mark_stale(&mut self) {
        if self.state == SwapchainState::Ready {
            debug!("Swapchain marked stale");
            self.state = SwapchainState::Stale;
        }
    }

    /// Recreates the chain at a new size.
    ///
    /// Valid only from `Stale`. The caller must have waited for all
    /// in-flight work referencing the current images; the frame loop pairs
    /// every recreation with a full device wait.
    ///
    /// # Errors
    ///
    /// Returns an error if called from any state but `Stale`, or if chain
    /// creation fails.
    pub fn recreate(&mut self, width: u32, height: u32) -> RhiResult<()> {
        if !self.state.can_recreate() {
            return Err(RhiError::Swapchain(format!(
                "recreate is invalid from state {:?}",
                self.state
            )));
        }

        info!("Recreating swapchain at {}x{}", width, height);
        self.create(width, height)
    }

    /// Destroys the chain and returns to `Uninitialized`.
    ///
    /// The caller must have waited for all in-flight work first.
    pub fn destroy(&mut self) {
        self.chain = None;
        self.state = SwapchainState::Uninitialized;
    }

    fn chain(&self) -> RhiResult<&Chain> {
        self.chain
            .as_ref()
            .ok_or_else(|| RhiError::Swapchain("no swapchain exists".to_owned()))
    }

    /// Extent of the current chain, or zero if none exists.
    pub fn extent(&self) -> vk::Extent2D {
        self.chain
            .as_ref()
            .map(|chain| chain.extent)
            .unwrap_or_default()
    }

    /// Image format of the current chain, or `UNDEFINED` if none exists.
    pub fn format(&self) -> vk::Format {
        self.chain
            .as_ref()
            .map(|chain| chain.format)
            .unwrap_or_default()
    }

    /// Present mode of the current chain, if one exists.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.chain
            .as_ref()
            .map(|chain| chain.present_mode)
            .unwrap_or_default()
    }

    /// Number of images in the current chain.
    pub fn image_count(&self) -> u32 {
        self.chain
            .as_ref()
            .map(|chain| chain.images.len() as u32)
            .unwrap_or(0)
    }

    /// The swapchain image at `image_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if no chain exists or the index is out of bounds.
    pub fn image(&self, image_index: u32) -> RhiResult<vk::Image> {
        let chain = self.chain()?;
        chain
            .images
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                RhiError::Swapchain(format!("image index {} out of bounds", image_index))
            })
    }

    /// Issues a generation-tagged target for the image at `image_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if no chain exists or the index is out of bounds.
    pub fn target(&self, image_index: u32) -> RhiResult<SwapchainTarget> {
        let chain = self.chain()?;
        let view = chain
            .image_views
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                RhiError::Swapchain(format!("image index {} out of bounds", image_index))
            })?;

        Ok(SwapchainTarget {
            view,
            extent: chain.extent,
            generation: self.generation,
        })
    }

    /// Acquires the next swapchain image.
    ///
    /// Returns `(image_index, suboptimal)` on success. The raw `vk::Result`
    /// error is preserved so the caller can distinguish out-of-date,
    /// timeout, and device loss.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<(u32, bool), vk::Result> {
        let chain = self
            .chain
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;

        unsafe {
            self.swapchain_loader.acquire_next_image(
                chain.handle,
                timeout_ns,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Presents the image at `image_index` after `wait_semaphore` signals.
    ///
    /// Returns true if the chain is suboptimal and should be recreated. The
    /// raw `vk::Result` error is preserved so the caller can distinguish
    /// out-of-date from device loss.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let chain = self
            .chain
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;

        let swapchains = [chain.handle];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }
}

/// Chooses the best surface format from the available formats.
///
/// Prefers B8G8R8A8_SRGB with the SRGB_NONLINEAR color space so the
/// backbuffer is gamma-correct; falls back to B8G8R8A8_UNORM, then to the
/// first available format.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        debug!("Selected surface format B8G8R8A8_SRGB / SRGB_NONLINEAR");
        return format;
    }

    let alternative = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = alternative {
        warn!("Using fallback surface format B8G8R8A8_UNORM / SRGB_NONLINEAR");
        return format;
    }

    warn!(
        "Using first available surface format: {:?}",
        formats[0].format
    );
    formats[0]
}

/// Chooses the best present mode from the available modes.
///
/// Prefers MAILBOX (no tearing, low latency); falls back to FIFO, which the
/// Vulkan spec guarantees.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    debug!("Selected FIFO present mode");
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent when the backend fixes it; otherwise
/// clamps the requested size to the surface's limits.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Determines the number of swapchain images.
///
/// One more than the minimum, clamped to the maximum when one is set
/// (max_image_count of 0 means unbounded).
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Creates image views for the swapchain images.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => view,
            Err(e) => {
                // Roll back the views created so far
                for &view in &image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::Swapchain(format!(
                    "failed to create image view: {:?}",
                    e
                )));
            }
        };

        image_views.push(view);
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transition_rules() {
        assert!(SwapchainState::Uninitialized.can_create());
        assert!(SwapchainState::Stale.can_create());
        assert!(!SwapchainState::Ready.can_create());

        assert!(SwapchainState::Stale.can_recreate());
        assert!(!SwapchainState::Uninitialized.can_recreate());
        assert!(!SwapchainState::Ready.can_recreate());
    }

    #[test]
    fn choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn choose_surface_format_falls_back_to_first() {
        let formats = vec![vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn choose_present_mode_prefers_mailbox() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];

        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn choose_present_mode_falls_back_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];

        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn choose_extent_uses_fixed_surface_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 3000, 3000);
        assert_eq!(extent.width, 2000);
        assert_eq!(extent.height, 2000);

        let extent = choose_extent(&capabilities, 50, 50);
        assert_eq!(extent.width, 100);
        assert_eq!(extent.height, 100);

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);

        // max_image_count of 0 means no upper bound
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn support_adequacy_requires_formats_and_modes() {
        let adequate = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![],
        };
        assert!(!no_modes.is_adequate());
    }
}
