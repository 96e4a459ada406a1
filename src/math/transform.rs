// Copyright @yucwang 2026

use super::constants::{Float, Matrix4f, Vector3f};

/// Affine placement of a primitive, kept together with its inverse so
/// normals can be transformed without refactoring the matrix per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: Matrix4f::identity(),
            inv_matrix: Matrix4f::identity(),
        }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self {
            matrix,
            inv_matrix: matrix.try_inverse().unwrap_or_else(Matrix4f::identity),
        }
    }

    pub fn translate(offset: Vector3f) -> Self {
        Self::new(Matrix4f::new_translation(&offset))
    }

    pub fn scale(factor: Float) -> Self {
        Self::new(Matrix4f::new_scaling(factor))
    }

    pub fn compose(&self, inner: &Transform) -> Self {
        Self::new(self.matrix * inner.matrix)
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        let h = self.matrix * p.push(1.0);
        h.xyz() / h.w
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        (self.matrix * v.push(0.0)).xyz()
    }

    // Normals transform by the inverse transpose.
    pub fn apply_normal(&self, n: Vector3f) -> Vector3f {
        (self.inv_matrix.transpose() * n.push(0.0)).xyz()
    }

    pub fn inv_apply_vector(&self, v: Vector3f) -> Vector3f {
        (self.inv_matrix * v.push(0.0)).xyz()
    }
}

/* Tests for Transform */

#[cfg(test)]
mod tests {
    use super::{Matrix4f, Transform, Vector3f};

    #[test]
    fn test_transform_point_vector() {
        let t = Transform::translate(Vector3f::new(1.0, 2.0, 3.0));
        let p = t.apply_point(Vector3f::new(1.0, 1.0, 1.0));
        assert!((p - Vector3f::new(2.0, 3.0, 4.0)).norm() < 1e-6);

        // Vectors ignore translation.
        let v = t.apply_vector(Vector3f::new(1.0, 0.0, 0.0));
        assert!((v - Vector3f::new(1.0, 0.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_normal_under_nonuniform_scale() {
        let m = Matrix4f::new_nonuniform_scaling(&Vector3f::new(2.0, 1.0, 1.0));
        let t = Transform::new(m);

        // A plane with normal (1, 1, 0) scaled by 2 along x has normal
        // proportional to (0.5, 1, 0).
        let n = t.apply_normal(Vector3f::new(1.0, 1.0, 0.0)).normalize();
        let expected = Vector3f::new(0.5, 1.0, 0.0).normalize();
        assert!((n - expected).norm() < 1e-6);
    }
}
