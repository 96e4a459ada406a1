// Copyright @yucwang 2026

use crate::core::texture::Texture;
use crate::math::constants::Vector2f;
use crate::math::spectrum::RGBSpectrum;

pub struct ConstantTexture {
    value: RGBSpectrum,
}

impl ConstantTexture {
    pub fn new(value: RGBSpectrum) -> Self {
        Self { value }
    }
}

impl Texture for ConstantTexture {
    fn eval(&self, _uv: Vector2f) -> RGBSpectrum {
        self.value
    }

    fn minimum(&self) -> RGBSpectrum {
        self.value
    }

    fn maximum(&self) -> RGBSpectrum {
        self.value
    }

    fn average(&self) -> RGBSpectrum {
        self.value
    }
}
