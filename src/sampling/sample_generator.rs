// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f};

/// Source of 1D/2D sample values for the estimators. Reseeding through
/// `setup` makes the stream a pure function of (seed, pixel, sample index).
pub trait SampleGenerator: Send {
    fn setup(&mut self, pixel_index: u32, sample_index: u32);
    fn next_1d(&mut self) -> Float;

    fn next_2d(&mut self) -> Vector2f {
        let x = self.next_1d();
        let y = self.next_1d();
        Vector2f::new(x, y)
    }
}

pub fn hash_32(mut x: u32) -> u32 {
    x = (x ^ 61) ^ (x >> 16);
    x = x.wrapping_mul(9);
    x ^= x >> 4;
    x = x.wrapping_mul(0x27d4_eb2d);
    x ^ (x >> 15)
}

fn mix_64(seed: u32, pixel_index: u32, sample_index: u32) -> u64 {
    let mut h = ((seed as u64) << 32) | pixel_index as u64;
    h ^= (sample_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

/// Plain pseudo-random generator.
pub struct UniformSampler {
    seed: u32,
    state: u64,
}

impl UniformSampler {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            state: mix_64(seed, 0, 0),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }
}

impl SampleGenerator for UniformSampler {
    fn setup(&mut self, pixel_index: u32, sample_index: u32) {
        self.state = mix_64(self.seed, pixel_index, sample_index);
    }

    fn next_1d(&mut self) -> Float {
        // 24 mantissa bits keep the value strictly below 1.
        (self.next_u32() >> 8) as Float * (1.0 / 16777216.0)
    }
}

// The generator itself lives in sobol_burley; four dimensions come back per
// call, so fetches are cached per dimension set.
const SOBOL_DIMENSION_SETS: u32 = 32;

/// Owen-scrambled low-discrepancy sequence, keyed by pixel index.
pub struct SobolSampler {
    seed: u32,
    scramble: u32,
    index: u32,
    dimension: u32,
    cache: [Float; 4],
    overflow: UniformSampler,
}

impl SobolSampler {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            scramble: seed,
            index: 0,
            dimension: u32::MAX,
            cache: [0.0; 4],
            overflow: UniformSampler::new(seed ^ 0x5EED),
        }
    }
}

impl SampleGenerator for SobolSampler {
    fn setup(&mut self, pixel_index: u32, sample_index: u32) {
        self.scramble = hash_32(pixel_index) ^ self.seed;
        self.index = sample_index;
        self.dimension = u32::MAX;
        self.overflow.setup(self.scramble, sample_index);
    }

    fn next_1d(&mut self) -> Float {
        let dimension = self.dimension.wrapping_add(1);
        self.dimension = dimension;

        let set = dimension / 4;
        if set >= SOBOL_DIMENSION_SETS {
            // Deep dimensions rarely matter for stratification; continue with
            // the scrambled uniform stream.
            return self.overflow.next_1d();
        }
        if dimension % 4 == 0 || dimension == 0 {
            self.cache = sobol_burley::sample_4d(self.index, set, self.scramble);
        }
        self.cache[(dimension % 4) as usize]
    }
}

/* Tests for sample generators */
