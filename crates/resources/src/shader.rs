//! Shader byte-code loading.

use std::fs;
use std::path::Path;

use crate::error::{AssetError, AssetResult};

/// Read a shader byte-code blob (e.g. SPIR-V) into memory.
///
/// The bytes are returned as-is; interpreting them is the device's job.
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable.
pub fn load_binary(path: &Path) -> AssetResult<Vec<u8>> {
    if !path.exists() {
        return Err(AssetError::FileNotFound(path.to_path_buf()));
    }

    Ok(fs::read(path)?)
}
