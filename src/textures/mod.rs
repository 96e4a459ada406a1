// Copyright @yucwang 2026

pub mod bitmap;
pub mod constant;
