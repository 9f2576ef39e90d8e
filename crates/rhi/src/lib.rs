//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Safe wrappers over `ash` for the presentation stack:
//! - Instance and device bring-up
//! - The swapchain lifecycle state machine
//! - Command recording for frame-scoped contexts
//! - Synchronization primitives the frame loop rotates

mod error;

pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod rendering;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that callers need for recording.
pub use ash::vk;
