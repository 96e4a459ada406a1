// Copyright @yucwang 2026

use crate::math::bitmap::Bitmap;

use exr::prelude::*;
use std::path::Path;

/// Writes a bitmap as a scanline RGB EXR file.
pub fn write_exr_to_file<P: AsRef<Path>>(image: &Bitmap, path: P) -> std::result::Result<(), String> {
    let path = path.as_ref();
    log::info!(
        "writing exr image {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );

    write_rgb_file(path, image.width(), image.height(), |x, y| {
        let c = image[(x, y)];
        (c[0], c[1], c[2])
    })
    .map_err(|e| format!("failed to write exr {}: {}", path.display(), e))
}

/* Tests for EXR output */
