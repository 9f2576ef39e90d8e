//! Error types for the presentation stack.

use thiserror::Error;

/// Top-level error type for the windowing and presentation layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or event-loop errors
    #[error("Window error: {0}")]
    Window(String),

    /// Native surface creation errors
    #[error("Surface error: {0}")]
    Surface(String),

    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Asset loading errors
    #[error("Asset error: {0}")]
    Asset(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the stack's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
