// Copyright @yucwang 2026

use crate::core::texture::{Texture, TextureMapJacobian, JACOBIAN_COUNT};
use crate::io::image_utils::{self, TexelBuffer, TexelConversion};
use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::spectrum::RGBSpectrum;
use crate::sampling::distribution::Distribution2D;

use std::path::PathBuf;

/// Typed pixel storage. The texture owns the buffer exclusively.
pub enum TexelStorage {
    ScalarLdr(Vec<u8>),
    ScalarHdr(Vec<Float>),
    RgbLdr(Vec<[u8; 3]>),
    RgbHdr(Vec<Vector3f>),
}

impl From<TexelBuffer> for TexelStorage {
    fn from(buffer: TexelBuffer) -> Self {
        match buffer {
            TexelBuffer::ScalarLdr(v) => TexelStorage::ScalarLdr(v),
            TexelBuffer::ScalarHdr(v) => TexelStorage::ScalarHdr(v),
            TexelBuffer::RgbLdr(v) => TexelStorage::RgbLdr(v),
            TexelBuffer::RgbHdr(v) => TexelStorage::RgbHdr(v),
        }
    }
}

/// Image-backed texture with bilinear or nearest lookup, filter-footprint
/// derivatives and lazily built importance distributions (one per Jacobian
/// kind).
pub struct BitmapTexture {
    path: Option<PathBuf>,
    conversion: TexelConversion,
    linear: bool,
    clamp: bool,
    valid: bool,
    w: usize,
    h: usize,
    texels: TexelStorage,
    min: Vector3f,
    max: Vector3f,
    avg: Vector3f,
    distributions: [Option<Distribution2D>; JACOBIAN_COUNT],
}

impl BitmapTexture {
    /// Texture bound to an image file; pixels materialize in
    /// `load_resources`.
    pub fn from_path<P: Into<PathBuf>>(
        path: P,
        conversion: TexelConversion,
        linear: bool,
        clamp: bool,
    ) -> Self {
        let mut texture = Self {
            path: Some(path.into()),
            conversion,
            linear,
            clamp,
            valid: false,
            w: 0,
            h: 0,
            texels: TexelStorage::ScalarLdr(Vec::new()),
            min: Vector3f::zeros(),
            max: Vector3f::zeros(),
            avg: Vector3f::zeros(),
            distributions: [None, None],
        };
        texture.load_resources();
        texture
    }

    /// Texture over an already materialized pixel buffer.
    pub fn from_texels(texels: TexelStorage, w: usize, h: usize, linear: bool, clamp: bool) -> Self {
        let mut texture = Self {
            path: None,
            conversion: TexelConversion::RequestRgb,
            linear,
            clamp,
            valid: true,
            w: 0,
            h: 0,
            texels: TexelStorage::ScalarLdr(Vec::new()),
            min: Vector3f::zeros(),
            max: Vector3f::zeros(),
            avg: Vector3f::zeros(),
            distributions: [None, None],
        };
        texture.init(texels, w, h);
        texture
    }

    /// Loads the backing image. An unreadable file leaves a 2x2 magenta
    /// placeholder and `valid() == false`; the texture still works.
    fn load_resources(&mut self) {
        let loaded = self
            .path
            .as_ref()
            .ok_or_else(|| String::from("no path"))
            .and_then(|path| image_utils::load_texels(path, self.conversion));

        match loaded {
            Ok((buffer, w, h)) => {
                self.valid = true;
                self.init(buffer.into(), w, h);
            }
            Err(err) => {
                if let Some(path) = &self.path {
                    log::warn!("unable to load texture at '{}': {}", path.display(), err);
                }
                self.valid = false;
                let magenta = [255u8, 0, 255];
                self.init(TexelStorage::RgbLdr(vec![magenta; 4]), 2, 2);
            }
        }
    }

    fn init(&mut self, texels: TexelStorage, w: usize, h: usize) {
        self.texels = texels;
        self.w = w;
        self.h = h;

        let mut min = self.get_rgb(0, 0);
        let mut max = min;
        let mut avg = Vector3f::zeros();
        let inv_count = 1.0 / (w * h) as Float;
        for y in 0..h {
            for x in 0..w {
                let c = self.get_rgb(x, y);
                min = min.inf(&c);
                max = max.sup(&c);
                avg += c * inv_count;
            }
        }
        self.min = min;
        self.max = max;
        self.avg = avg;
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    fn is_rgb(&self) -> bool {
        matches!(self.texels, TexelStorage::RgbLdr(_) | TexelStorage::RgbHdr(_))
    }

    fn get_scalar(&self, x: usize, y: usize) -> Float {
        let idx = x + y * self.w;
        match &self.texels {
            TexelStorage::ScalarLdr(v) => v[idx] as Float * (1.0 / 255.0),
            TexelStorage::ScalarHdr(v) => v[idx],
            TexelStorage::RgbLdr(v) => {
                let p = v[idx];
                (p[0] as Float + p[1] as Float + p[2] as Float) * (1.0 / (3.0 * 255.0))
            }
            TexelStorage::RgbHdr(v) => {
                let c = v[idx];
                (c[0] + c[1] + c[2]) * (1.0 / 3.0)
            }
        }
    }

    fn get_rgb(&self, x: usize, y: usize) -> Vector3f {
        let idx = x + y * self.w;
        match &self.texels {
            TexelStorage::ScalarLdr(v) => {
                let s = v[idx] as Float * (1.0 / 255.0);
                Vector3f::new(s, s, s)
            }
            TexelStorage::ScalarHdr(v) => {
                let s = v[idx];
                Vector3f::new(s, s, s)
            }
            TexelStorage::RgbLdr(v) => {
                let p = v[idx];
                Vector3f::new(p[0] as Float, p[1] as Float, p[2] as Float) * (1.0 / 255.0)
            }
            TexelStorage::RgbHdr(v) => v[idx],
        }
    }

    // Importance weight of one texel.
    fn weight(&self, x: usize, y: usize) -> Float {
        if self.is_rgb() {
            self.get_rgb(x, y).max()
        } else {
            self.get_scalar(x, y)
        }
    }

    fn lerp(x00: Vector3f, x01: Vector3f, x10: Vector3f, x11: Vector3f, u: Float, v: Float) -> Vector3f {
        (x00 * (1.0 - u) + x01 * u) * (1.0 - v) + (x10 * (1.0 - u) + x11 * u) * v
    }

    fn lerp_scalar(x00: Float, x01: Float, x10: Float, x11: Float, u: Float, v: Float) -> Float {
        (x00 * (1.0 - u) + x01 * u) * (1.0 - v) + (x10 * (1.0 - u) + x11 * u) * v
    }

    fn fetch(&self, uv: Vector2f) -> Vector3f {
        let fu = uv.x * self.w as Float;
        let fv = (1.0 - uv.y) * self.h as Float;
        // Floor keeps the fractional weights non-negative so negative
        // coordinates wrap instead of mirroring.
        let mut iu = fu.floor() as i64;
        let mut iv = fv.floor() as i64;
        let u = fu - iu as Float;
        let v = fv - iv as Float;
        if !self.clamp {
            iu = iu.rem_euclid(self.w as i64);
            iv = iv.rem_euclid(self.h as i64);
        }
        let (iu, iv) = if self.linear {
            (
                iu.clamp(0, (self.w as i64 - 2).max(0)) as usize,
                iv.clamp(0, (self.h as i64 - 2).max(0)) as usize,
            )
        } else {
            (
                iu.clamp(0, self.w as i64 - 1) as usize,
                iv.clamp(0, self.h as i64 - 1) as usize,
            )
        };

        if !self.linear {
            return self.get_rgb(iu, iv);
        }

        Self::lerp(
            self.get_rgb(iu, iv),
            self.get_rgb(iu + 1, iv),
            self.get_rgb(iu, iv + 1),
            self.get_rgb(iu + 1, iv + 1),
            u,
            v,
        )
    }

    fn scalar_at(&self, x: usize, y: usize) -> Float {
        if self.is_rgb() {
            let c = self.get_rgb(x, y);
            (c[0] + c[1] + c[2]) * (1.0 / 3.0)
        } else {
            self.get_scalar(x, y)
        }
    }
}

impl Texture for BitmapTexture {
    fn eval(&self, uv: Vector2f) -> RGBSpectrum {
        RGBSpectrum::from_vector(self.fetch(uv))
    }

    /// Central differences over a 4x4 stencil at half-texel centers,
    /// bilinearly interpolated and scaled to uv space.
    fn derivatives(&self, uv: Vector2f) -> Vector2f {
        let w = self.w;
        let h = self.h;

        let fu = uv.x * w as Float - 0.5;
        let fv = (1.0 - uv.y) * h as Float - 0.5;
        let iu = (fu.floor() as i64).rem_euclid(w as i64) as usize;
        let iv = (fv.floor() as i64).rem_euclid(h as i64) as usize;
        let u = fu - fu.floor();
        let v = fv - fv.floor();

        let x0 = if iu == 0 { w - 1 } else { iu - 1 };
        let x1 = iu;
        let x2 = (iu + 1) % w;
        let x3 = (iu + 2) % w;
        let y0 = if iv == 0 { h - 1 } else { iv - 1 };
        let y1 = iv;
        let y2 = (iv + 1) % h;
        let y3 = (iv + 2) % h;

        // Filter footprint.
        let a01 = self.scalar_at(x1, y0);
        let a02 = self.scalar_at(x2, y0);
        let a10 = self.scalar_at(x0, y1);
        let a11 = self.scalar_at(x1, y1);
        let a12 = self.scalar_at(x2, y1);
        let a13 = self.scalar_at(x3, y1);
        let a20 = self.scalar_at(x0, y2);
        let a21 = self.scalar_at(x1, y2);
        let a22 = self.scalar_at(x2, y2);
        let a23 = self.scalar_at(x3, y2);
        let a31 = self.scalar_at(x1, y3);
        let a32 = self.scalar_at(x2, y3);

        let du11 = a12 - a10;
        let du12 = a13 - a11;
        let du21 = a22 - a20;
        let du22 = a23 - a21;
        let dv11 = a21 - a01;
        let dv12 = a22 - a02;
        let dv21 = a31 - a11;
        let dv22 = a32 - a12;

        Vector2f::new(
            Self::lerp_scalar(du11, du12, du21, du22, u, v) * w as Float,
            Self::lerp_scalar(dv11, dv12, dv21, dv22, u, v) * h as Float,
        )
    }

    fn minimum(&self) -> RGBSpectrum {
        RGBSpectrum::from_vector(self.min)
    }

    fn maximum(&self) -> RGBSpectrum {
        RGBSpectrum::from_vector(self.max)
    }

    fn average(&self) -> RGBSpectrum {
        RGBSpectrum::from_vector(self.avg)
    }

    fn make_samplable(&mut self, jacobian: TextureMapJacobian) {
        if self.distributions[jacobian as usize].is_some() {
            return;
        }

        let w = self.w;
        let h = self.h;
        let mut weights = vec![0.0; w * h];
        let mut idx = 0;
        for y in 0..h {
            let row_weight = match jacobian {
                TextureMapJacobian::Spherical => ((y as Float + 0.5) * PI / h as Float).sin(),
                TextureMapJacobian::Planar => 1.0,
            };
            for x in 0..w {
                // Small blur so isolated bright texels do not starve their
                // neighborhood of samples.
                let value = self.weight(x, y) * 4.0
                    + self.weight((x + w - 1) % w, y)
                    + self.weight(x, (y + h - 1) % h)
                    + self.weight((x + 1) % w, y)
                    + self.weight(x, (y + 1) % h);
                weights[idx] = value * 0.125 * row_weight;
                idx += 1;
            }
        }

        self.distributions[jacobian as usize] = Some(Distribution2D::new(&weights, w, h));
    }

    fn is_samplable(&self, jacobian: TextureMapJacobian) -> bool {
        self.distributions[jacobian as usize]
            .as_ref()
            .map(|d| d.is_valid())
            .unwrap_or(false)
    }

    fn sample(&self, jacobian: TextureMapJacobian, uv: Vector2f) -> Vector2f {
        // Callers are expected to check is_samplable; falling back to the
        // unwarped sample keeps an unchecked call harmless.
        let distribution = match &self.distributions[jacobian as usize] {
            Some(d) if d.is_valid() => d,
            _ => return uv,
        };
        let (row, col, remapped) = distribution.warp(uv);
        Vector2f::new(
            (col as Float + remapped.x) / self.w as Float,
            1.0 - (row as Float + remapped.y) / self.h as Float,
        )
    }

    fn pdf(&self, jacobian: TextureMapJacobian, uv: Vector2f) -> Float {
        let distribution = match &self.distributions[jacobian as usize] {
            Some(d) => d,
            None => return 0.0,
        };
        let row = (((1.0 - uv.y) * self.h as Float) as usize).min(self.h - 1);
        let col = ((uv.x * self.w as Float) as usize).min(self.w - 1);
        distribution.pdf(row, col) * (self.w * self.h) as Float
    }
}

/* Tests for BitmapTexture */
