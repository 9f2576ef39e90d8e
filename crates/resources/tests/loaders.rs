//! Integration tests for the asset loaders.
//!
//! Fixtures are generated on the fly so the tests do not depend on
//! checked-in assets.

use std::fs;
use std::path::PathBuf;

use wsi_resources::{AssetError, MeshData, TextureData, load_binary};

fn fixture_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wsi_resources_test_{}", std::process::id()));
    fs::create_dir_all(&dir).expect("failed to create fixture dir");
    dir
}

const QUAD_OBJ: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

#[test]
fn load_obj_quad() {
    let path = fixture_dir().join("quad.obj");
    fs::write(&path, QUAD_OBJ).expect("failed to write fixture");

    let mesh = MeshData::load(&path).expect("failed to load OBJ");

    // Four unique vertices shared between two triangles
    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.indices.len(), 6);
    assert_eq!(mesh.triangle_count(), 2);

    // Every index must reference a real vertex
    for &index in &mesh.indices {
        assert!((index as usize) < mesh.vertices.len());
    }

    // Normals came through
    for vertex in &mesh.vertices {
        assert_eq!(vertex.normal.z, 1.0);
    }
}

#[test]
fn load_obj_flips_texture_v() {
    let path = fixture_dir().join("quad_uv.obj");
    fs::write(&path, QUAD_OBJ).expect("failed to write fixture");

    let mesh = MeshData::load(&path).expect("failed to load OBJ");

    // OBJ vt 0.0 (bottom) must map to sampler-space 1.0 (bottom)
    let origin = mesh
        .vertices
        .iter()
        .find(|v| v.position.x == 0.0 && v.position.y == 0.0)
        .expect("origin vertex missing");
    assert_eq!(origin.tex_coord.x, 0.0);
    assert_eq!(origin.tex_coord.y, 1.0);

    let top_right = mesh
        .vertices
        .iter()
        .find(|v| v.position.x == 1.0 && v.position.y == 1.0)
        .expect("top-right vertex missing");
    assert_eq!(top_right.tex_coord.x, 1.0);
    assert_eq!(top_right.tex_coord.y, 0.0);
}

#[test]
fn load_obj_missing_file() {
    let path = fixture_dir().join("does_not_exist.obj");
    match MeshData::load(&path) {
        Err(AssetError::FileNotFound(p)) => assert_eq!(p, path),
        Err(other) => panic!("expected FileNotFound, got {:?}", other),
        Ok(_) => panic!("expected FileNotFound, got a mesh"),
    }
}

#[test]
fn load_texture_rgba8() {
    let path = fixture_dir().join("checker.png");

    let pixels = image::RgbaImage::from_fn(2, 2, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    });
    pixels.save(&path).expect("failed to write fixture png");

    let texture = TextureData::load(&path).expect("failed to load texture");

    assert_eq!(texture.width, 2);
    assert_eq!(texture.height, 2);
    assert_eq!(texture.size_bytes(), 2 * 2 * 4);
    // Top-left texel is white, its neighbor black
    assert_eq!(&texture.pixels[0..4], &[255, 255, 255, 255]);
    assert_eq!(&texture.pixels[4..8], &[0, 0, 0, 255]);
}

#[test]
fn load_texture_missing_file() {
    let path = fixture_dir().join("does_not_exist.png");
    assert!(matches!(
        TextureData::load(&path),
        Err(AssetError::FileNotFound(_))
    ));
}

#[test]
fn load_binary_round_trip() {
    let path = fixture_dir().join("shader.spv");
    let blob: Vec<u8> = (0u8..64).collect();
    fs::write(&path, &blob).expect("failed to write fixture");

    let loaded = load_binary(&path).expect("failed to load binary");
    assert_eq!(loaded, blob);
}

#[test]
fn load_binary_missing_file() {
    let path = fixture_dir().join("does_not_exist.spv");
    assert!(matches!(
        load_binary(&path),
        Err(AssetError::FileNotFound(_))
    ));
}
