//! winit-backed window platform.
//!
//! This module provides window creation, event pumping, and Vulkan surface
//! creation for the [`Platform`] trait.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window as WinitWindow, WindowAttributes, WindowId};

use wsi_core::{Error, Result};

use crate::input::InputState;
use crate::platform::Platform;

/// RAII wrapper for a Vulkan surface.
///
/// Owns a `vk::SurfaceKHR` handle and destroys it on drop. The caller must
/// ensure the Vulkan instance outlives this surface.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// The raw Vulkan surface handle.
    ///
    /// Valid only as long as this `Surface` exists; do not store it past
    /// the wrapper's lifetime.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// The surface extension loader, for capability/format/present-mode
    /// queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created by ash_window::create_surface and
        // the loader comes from the same instance; this is the only place
        // the surface is destroyed.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Window state mutated by winit callbacks.
///
/// winit hands this struct back by `&mut` on every event, which is how the
/// wrapping platform is reached from callbacks without any global lookup.
struct WindowHost {
    window: Option<Arc<WinitWindow>>,
    title: String,
    width: u32,
    height: u32,
    pending_resize: Option<(u32, u32)>,
    close_requested: bool,
    input: InputState,
}

impl WindowHost {
    fn notify_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width, height));
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }
}

impl ApplicationHandler for WindowHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title(&self.title)
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(true);

        match event_loop.create_window(attrs) {
            Ok(window) => {
                tracing::info!("Window created: {}x{}", self.width, self.height);
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                tracing::error!("Failed to create window: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                self.notify_resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            _ => {}
        }
    }
}

/// A winit-backed [`Platform`].
///
/// Owns the event loop and the window, and pumps events on demand so the
/// caller keeps a plain `poll -> frame` control loop instead of handing
/// control to winit.
pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    host: WindowHost,
}

impl WinitPlatform {
    /// Create the event loop and window with the given dimensions and title.
    ///
    /// Pumps the event loop until the backend delivers the window, so the
    /// returned platform is immediately usable for surface creation.
    pub fn new(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut host = WindowHost {
            window: None,
            title: title.to_owned(),
            width,
            height,
            pending_resize: None,
            close_requested: false,
            input: InputState::new(),
        };

        // The window is created on the first resume; pump until it exists.
        for _ in 0..16 {
            let _ = event_loop.pump_app_events(Some(Duration::ZERO), &mut host);
            if host.window.is_some() {
                break;
            }
        }

        if host.window.is_none() {
            return Err(Error::Window(
                "event loop never delivered a window".to_owned(),
            ));
        }

        // Window creation may leave an initial Resized event pending; the
        // first frame should not treat it as a resize.
        host.pending_resize = None;

        Ok(Self { event_loop, host })
    }

    /// Current keyboard state.
    pub fn input(&self) -> &InputState {
        &self.host.input
    }

    fn window(&self) -> Result<&Arc<WinitWindow>> {
        self.host
            .window
            .as_ref()
            .ok_or_else(|| Error::Window("window not yet created".to_owned()))
    }
}

impl Platform for WinitPlatform {
    fn create_surface(&mut self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let window = self.window()?.clone();

        let display_handle = window
            .display_handle()
            .map_err(|e| Error::Surface(format!("failed to get display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::Surface(format!("failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid references provided by the
        // caller, and the display/window handles come from a live winit
        // window. The surface is destroyed in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Surface(format!("failed to create Vulkan surface: {}", e)))?
        };

        let loader = ash::khr::surface::Instance::new(entry, instance);

        // The compositor may have granted a framebuffer size different from
        // the request; trust what the window actually reports.
        let actual = window.inner_size();
        self.host.width = actual.width;
        self.host.height = actual.height;

        tracing::info!(
            "Vulkan surface created ({}x{})",
            actual.width,
            actual.height
        );

        Ok(Surface { handle, loader })
    }

    fn instance_extensions(&self) -> Result<Vec<*const i8>> {
        let window = self.window()?;
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::Surface(format!("failed to get display handle: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| Error::Vulkan(format!("failed to enumerate required extensions: {}", e)))?;

        Ok(extensions.to_vec())
    }

    fn surface_width(&self) -> u32 {
        self.host.width
    }

    fn surface_height(&self) -> u32 {
        self.host.height
    }

    fn alive(&self) -> bool {
        !self.host.close_requested
    }

    fn poll_input(&mut self) {
        self.host.input.begin_frame();
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.host);
        if let PumpStatus::Exit(_) = status {
            self.host.close_requested = true;
        }
    }

    fn notify_resize(&mut self, width: u32, height: u32) {
        self.host.notify_resize(width, height);
    }

    fn take_resize(&mut self) -> Option<(u32, u32)> {
        self.host.pending_resize.take()
    }

    fn request_close(&mut self) {
        self.host.close_requested = true;
    }
}
