// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f};

/// Discrete inversion-method sampler over non-negative weights.
#[derive(Debug, Clone)]
pub struct Distribution1D {
    pdf: Vec<Float>,
    cdf: Vec<Float>,
    sum: Float,
}

impl Distribution1D {
    pub fn new(weights: Vec<Float>) -> Self {
        let n = weights.len();
        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        for i in 0..n {
            cdf.push(cdf[i] + weights[i]);
        }

        let sum = cdf[n];
        let mut pdf = weights;
        if sum > 0.0 {
            let inv_sum = 1.0 / sum;
            for v in pdf.iter_mut() {
                *v *= inv_sum;
            }
            for v in cdf.iter_mut() {
                *v *= inv_sum;
            }
            cdf[n] = 1.0;
        }

        Self { pdf, cdf, sum }
    }

    pub fn len(&self) -> usize {
        self.pdf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdf.is_empty()
    }

    /// False when all weights were zero; warping is undefined in that case.
    pub fn is_valid(&self) -> bool {
        self.sum > 0.0
    }

    pub fn sum(&self) -> Float {
        self.sum
    }

    pub fn pdf(&self, index: usize) -> Float {
        self.pdf[index]
    }

    /// Maps u in [0, 1) to a cell index, returning the sample remapped to
    /// [0, 1) within that cell.
    pub fn warp(&self, u: Float) -> (usize, Float) {
        // Index of the last cdf entry <= u.
        let idx = self
            .cdf
            .partition_point(|&c| c <= u)
            .saturating_sub(1)
            .min(self.pdf.len() - 1);

        let span = self.cdf[idx + 1] - self.cdf[idx];
        let remapped = if span > 0.0 {
            ((u - self.cdf[idx]) / span).min(crate::math::constants::ONE_MINUS_EPSILON)
        } else {
            0.0
        };

        (idx, remapped)
    }
}

/// Row-major composition of a marginal distribution over row sums and one
/// conditional distribution per row.
#[derive(Debug, Clone)]
pub struct Distribution2D {
    marginal: Distribution1D,
    rows: Vec<Distribution1D>,
}

impl Distribution2D {
    pub fn new(weights: &[Float], w: usize, h: usize) -> Self {
        debug_assert_eq!(weights.len(), w * h);

        let rows: Vec<Distribution1D> = (0..h)
            .map(|y| Distribution1D::new(weights[y * w..(y + 1) * w].to_vec()))
            .collect();
        let marginal = Distribution1D::new(rows.iter().map(|r| r.sum()).collect());

        Self { marginal, rows }
    }

    pub fn is_valid(&self) -> bool {
        self.marginal.is_valid()
    }

    /// Warps a 2D sample to (row, column) and remaps it within the chosen
    /// cell: v selects the row, u the column.
    pub fn warp(&self, uv: Vector2f) -> (usize, usize, Vector2f) {
        let (row, v) = self.marginal.warp(uv.y);
        let (col, u) = self.rows[row].warp(uv.x);
        (row, col, Vector2f::new(u, v))
    }

    /// Discrete probability of the (row, col) cell.
    pub fn pdf(&self, row: usize, col: usize) -> Float {
        self.marginal.pdf(row) * self.rows[row].pdf(col)
    }
}

/* Tests for distributions */
