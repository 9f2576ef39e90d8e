//! Platform abstraction layer for the presentation stack.
//!
//! This crate provides:
//! - The [`Platform`] capability trait over a native window
//! - A winit-backed implementation with Vulkan surface creation
//! - Minimal keyboard input tracking

mod input;
mod platform;
mod window;

pub use input::{InputState, KeyCode};
pub use platform::Platform;
pub use window::{Surface, WinitPlatform};
