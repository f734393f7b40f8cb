//! Unit tests for the default asset loader

use std::io::Cursor;
use std::path::{Path, PathBuf};
use crate::error::Error;
use crate::resource::{AssetLoader, DefaultAssetLoader, MemoryAssetSource};

const QUAD_OBJ: &str = "\
mtllib quad.mtl
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
usemtl brick
f 1/1/1 2/2/1 3/3/1 4/4/1
";

const QUAD_MTL: &str = "\
newmtl brick
map_Kd brick_diffuse.png
map_Ks brick_specular.png
";

pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png).unwrap();
    bytes
}

// ============================================================================
// IMAGES
// ============================================================================

#[test]
fn test_decode_png() {
    let data = DefaultAssetLoader.decode_image(&png_bytes(3, 2, [10, 20, 30, 255]), "test.png").unwrap();
    assert_eq!((data.width, data.height), (3, 2));
    assert_eq!(data.pixels.len(), 3 * 2 * 4);
    assert_eq!(&data.pixels[..4], &[10, 20, 30, 255]);
}

#[test]
fn test_decode_garbage_fails() {
    let err = DefaultAssetLoader.decode_image(b"not an image", "bad.png").unwrap_err();
    assert!(matches!(err, Error::InvalidResource(_)));
}

// ============================================================================
// MODELS
// ============================================================================

#[test]
fn test_parse_obj_with_material() {
    let source = MemoryAssetSource::new();
    source.insert("/models/quad.obj", QUAD_OBJ);
    source.insert("/models/quad.mtl", QUAD_MTL);

    let model = DefaultAssetLoader
        .parse_model(QUAD_OBJ.as_bytes(), Path::new("/models/quad.obj"), &source)
        .unwrap();

    assert_eq!(model.meshes.len(), 1);
    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertices.len(), 4);
    // One quad triangulated into two triangles
    assert_eq!(mesh.indices.len(), 6);
    assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    assert_eq!(mesh.diffuse_texture, Some(PathBuf::from("brick_diffuse.png")));
    assert_eq!(mesh.specular_texture, Some(PathBuf::from("brick_specular.png")));
    assert_eq!(source.read_count("/models/quad.mtl"), 1);
}

#[test]
fn test_parse_obj_flips_v() {
    let source = MemoryAssetSource::new();
    source.insert("/models/quad.mtl", QUAD_MTL);
    let model = DefaultAssetLoader
        .parse_model(QUAD_OBJ.as_bytes(), Path::new("/models/quad.obj"), &source)
        .unwrap();
    let uvs: Vec<[f32; 2]> = model.meshes[0].vertices.iter().map(|v| v.uv).collect();
    assert!(uvs.contains(&[0.0, 1.0]));
    assert!(uvs.contains(&[1.0, 0.0]));
}

#[test]
fn test_parse_obj_missing_material_still_loads() {
    let source = MemoryAssetSource::new();
    let model = DefaultAssetLoader
        .parse_model(QUAD_OBJ.as_bytes(), Path::new("/models/quad.obj"), &source)
        .unwrap();
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.meshes[0].diffuse_texture, None);
}
