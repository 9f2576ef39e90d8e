//! Texture image loading.

use std::path::Path;

use tracing::info;

use crate::error::{AssetError, AssetResult};

/// Decoded image data, tightly packed RGBA8.
#[derive(Debug)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decode an image file into RGBA8 pixels.
    ///
    /// Any source format the decoder understands is expanded to four
    /// channels, so the result is always `width * height * 4` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or fails to decode.
    pub fn load(path: &Path) -> AssetResult<Self> {
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()));
        }

        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();

        info!(
            "Loaded texture '{}': {}x{}",
            path.display(),
            width,
            height
        );

        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// Total size of the pixel data in bytes.
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}
