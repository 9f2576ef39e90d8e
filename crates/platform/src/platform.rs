//! The window platform capability surface.

use wsi_core::Result;

use crate::window::Surface;

/// Capabilities a native window backend must provide to drive presentation.
///
/// One implementation exists per windowing backend ([`crate::WinitPlatform`]
/// for winit). The frame orchestrator never stores a platform; callers pass
/// it by reference into each call, so the orchestrator cannot outlive it.
///
/// # Liveness
///
/// [`Platform::alive`] starts true and transitions to false exactly once,
/// when the user or the backend asks the window to close. Implementations
/// must never report true again afterwards.
///
/// # Resize delivery
///
/// Resize notifications arrive synchronously from inside
/// [`Platform::poll_input`] on the control thread. They set a pending flag
/// and update the cached dimensions; several notifications between two
/// frames coalesce to the most recent size. [`Platform::take_resize`]
/// consumes the pending flag.
pub trait Platform {
    /// Construct the native drawable surface for this window.
    ///
    /// May refresh the cached width/height to the framebuffer size the
    /// backend actually granted.
    fn create_surface(&mut self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface>;

    /// Instance extensions required to present to this platform's surfaces.
    ///
    /// Pure query; the result is invariant for the process lifetime. The
    /// returned pointers reference static strings owned by the loader.
    fn instance_extensions(&self) -> Result<Vec<*const i8>>;

    /// Last known drawable width. Does not query the backend.
    fn surface_width(&self) -> u32;

    /// Last known drawable height. Does not query the backend.
    fn surface_height(&self) -> u32;

    /// False once the window has been asked to close; never true again.
    fn alive(&self) -> bool;

    /// Pump the backend event queue.
    ///
    /// Call at most once per loop iteration, before frame timing begins.
    /// May synchronously invoke resize and close notifications.
    fn poll_input(&mut self);

    /// Record a resize: sets the pending flag and caches the dimensions.
    ///
    /// Safe to call from within [`Platform::poll_input`].
    fn notify_resize(&mut self, width: u32, height: u32);

    /// Consume the pending resize, if any, coalesced to the latest size.
    fn take_resize(&mut self) -> Option<(u32, u32)>;

    /// Ask the window to close; [`Platform::alive`] is false afterwards.
    fn request_close(&mut self);
}
