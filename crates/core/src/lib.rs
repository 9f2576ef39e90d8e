//! Core utilities shared across the presentation stack.
//!
//! This crate provides foundational pieces used by every other crate:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing

mod error;
mod logging;
mod timer;

pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::FrameTimer;
