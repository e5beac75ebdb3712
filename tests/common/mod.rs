//! Shared helpers for the integration tests

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

/// Shipped asset directory
pub fn shipped_assets() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets")
}

/// Fresh, empty directory under the system temp dir
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("figure_viewer_it_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A single triangle offset along X so each part is distinguishable
pub fn triangle_obj(x: f32, material_library: &str) -> String {
    format!(
        "mtllib {material_library}\n\
         v {x} 0 0\nv {} 0 0\nv {x} 1 0\n\
         vt 0 0\nvt 1 0\nvt 0 1\n\
         vn 0 0 1\n\
         usemtl paint\n\
         f 1/1/1 2/2/1 3/3/1\n",
        x + 1.0
    )
}

/// Write a complete asset tree: six meshes, two textures and a material library
pub fn write_asset_tree(root: &Path) {
    std::fs::create_dir_all(root.join("obj")).unwrap();
    std::fs::create_dir_all(root.join("texture")).unwrap();

    let parts = ["head", "torso", "leg_left", "leg_right", "arm_left", "arm_right"];
    for (i, part) in parts.iter().enumerate() {
        std::fs::write(
            root.join("obj").join(format!("{part}.obj")),
            triangle_obj(i as f32 * 10.0, "paint.mtl"),
        )
        .unwrap();
    }
    std::fs::write(root.join("texture/paint.mtl"), "newmtl paint\nKd 0.25 0.5 0.75\n").unwrap();

    RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))
        .save(root.join("texture/head.png"))
        .unwrap();
    RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]))
        .save(root.join("texture/torso.png"))
        .unwrap();
}
