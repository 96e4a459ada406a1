// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector3f};

use exr::prelude::*;
use image::io::Reader as ImageReader;
use std::path::Path;

/// Channel layout requested by the texture that owns the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelConversion {
    RequestScalar,
    RequestRgb,
}

/// Raw typed pixel buffer handed over to the texture. Ownership transfers
/// to the caller.
pub enum TexelBuffer {
    ScalarLdr(Vec<u8>),
    ScalarHdr(Vec<Float>),
    RgbLdr(Vec<[u8; 3]>),
    RgbHdr(Vec<Vector3f>),
}

pub fn is_hdr<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("exr"))
        .unwrap_or(false)
}

struct ExrPixels {
    width: usize,
    height: usize,
    data: Vec<Vector3f>,
}

fn load_exr(path: &Path) -> std::result::Result<(Vec<Vector3f>, usize, usize), String> {
    let image = read()
        .no_deep_data()
        .largest_resolution_level()
        .rgba_channels(
            |resolution, _| ExrPixels {
                width: resolution.width(),
                height: resolution.height(),
                data: vec![Vector3f::zeros(); resolution.width() * resolution.height()],
            },
            |image, position, (r, g, b, _a): (f32, f32, f32, f32)| {
                let idx = position.y() * image.width + position.x();
                image.data[idx] = Vector3f::new(r, g, b);
            },
        )
        .first_valid_layer()
        .all_attributes()
        .from_file(path)
        .map_err(|e| format!("failed to read exr {}: {}", path.display(), e))?;

    let pixels = image.layer_data.channel_data.pixels;
    Ok((pixels.data, pixels.width, pixels.height))
}

pub fn load_hdr<P: AsRef<Path>>(
    path: P,
    conversion: TexelConversion,
) -> std::result::Result<(TexelBuffer, usize, usize), String> {
    let (rgb, w, h) = load_exr(path.as_ref())?;
    let buffer = match conversion {
        TexelConversion::RequestRgb => TexelBuffer::RgbHdr(rgb),
        TexelConversion::RequestScalar => {
            TexelBuffer::ScalarHdr(rgb.iter().map(|c| (c[0] + c[1] + c[2]) / 3.0).collect())
        }
    };
    Ok((buffer, w, h))
}

pub fn load_ldr<P: AsRef<Path>>(
    path: P,
    conversion: TexelConversion,
) -> std::result::Result<(TexelBuffer, usize, usize), String> {
    let path = path.as_ref();
    let img = ImageReader::open(path)
        .map_err(|e| format!("failed to open image {}: {}", path.display(), e))?
        .decode()
        .map_err(|e| format!("failed to decode image {}: {}", path.display(), e))?;

    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let buffer = match conversion {
        TexelConversion::RequestRgb => {
            TexelBuffer::RgbLdr(rgb.pixels().map(|p| [p[0], p[1], p[2]]).collect())
        }
        TexelConversion::RequestScalar => TexelBuffer::ScalarLdr(
            rgb.pixels()
                .map(|p| ((p[0] as u32 + p[1] as u32 + p[2] as u32) / 3) as u8)
                .collect(),
        ),
    };
    Ok((buffer, w, h))
}

/// Loads a texture image, dispatching on the file extension.
pub fn load_texels<P: AsRef<Path>>(
    path: P,
    conversion: TexelConversion,
) -> std::result::Result<(TexelBuffer, usize, usize), String> {
    if is_hdr(&path) {
        load_hdr(path, conversion)
    } else {
        load_ldr(path, conversion)
    }
}
