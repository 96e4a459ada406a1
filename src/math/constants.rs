// Copyright @yucwang 2026

use nalgebra as na;

pub type Float = f32;
pub type Int = i32;
pub type UInt = u32;

pub type Vector2f = na::Vector2<Float>;
pub type Vector3f = na::Vector3<Float>;
pub type Matrix4f = na::Matrix4<Float>;

pub const EPSILON: Float = 1e-4;
pub const PI: Float = std::f32::consts::PI;
pub const TWO_PI: Float = 2.0 * PI;
pub const INV_PI: Float = std::f32::consts::FRAC_1_PI;
pub const INV_TWO_PI: Float = 0.5 * INV_PI;
pub const FLOAT_MAX: Float = std::f32::MAX;
pub const FLOAT_MIN: Float = -std::f32::MAX;
pub const ONE_MINUS_EPSILON: Float = 1.0 - Float::EPSILON / 2.0;
