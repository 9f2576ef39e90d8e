//! Frame orchestration.
//!
//! This crate drives the `begin_frame -> record -> end_frame` cycle against
//! a swapchain: admission of new frames, swapchain recreation on resize or
//! staleness, and the ordering between CPU submission and GPU/display
//! consumption. The caller records into the context each open frame hands
//! out and never touches a synchronization primitive directly.

mod backend;
mod orchestrator;
mod vulkan;

pub use backend::{AcquireOutcome, PresentOutcome, RenderBackend};
pub use orchestrator::{ACQUIRE_TIMEOUT, Frame, FrameError, FrameOrchestrator, LoopState};
pub use vulkan::VulkanBackend;

/// Number of synchronization slots rotated for CPU/GPU overlap.
///
/// The public API admits one open frame at a time regardless; this constant
/// only controls how many submissions may be in flight on the device while
/// the CPU prepares the next one.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
