//! Error types for asset loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for asset loading operations.
#[derive(Error, Debug)]
pub enum AssetError {
    /// Failed to parse an OBJ file.
    #[error("Failed to load OBJ file '{path}': {source}")]
    Obj {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: tobj::LoadError,
    },

    /// An OBJ file parsed but contained no usable geometry.
    #[error("OBJ file '{0}' contains no geometry")]
    EmptyMesh(PathBuf),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
