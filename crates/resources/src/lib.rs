//! Startup-time asset loading.
//!
//! Pure `Path -> in-memory data` utilities:
//! - Wavefront OBJ mesh loading
//! - Texture decoding to RGBA8
//! - Shader byte-code blobs
//!
//! All of these run before the frame loop starts; their failures are fatal
//! load errors reported to the caller, never retried.

mod error;
mod mesh;
mod shader;
mod texture;

pub use error::{AssetError, AssetResult};
pub use mesh::{MeshData, Vertex};
pub use shader::load_binary;
pub use texture::TextureData;
