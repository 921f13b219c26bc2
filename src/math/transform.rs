// Copyright 2020 @TwoCookingMice

use super::constants::{ Matrix4f, Vector3f };

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Matrix4f::identity(),
               inv_matrix: Matrix4f::identity() }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self { matrix,
               inv_matrix: matrix.try_inverse().unwrap_or(Matrix4f::identity()) }
    }

    pub fn matrix(&self) -> &Matrix4f {
        &self.matrix
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        Self::point_mul(&self.matrix, p)
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        Self::vector_mul(&self.matrix, v)
    }

    pub fn inv_apply_point(&self, p: Vector3f) -> Vector3f {
        Self::point_mul(&self.inv_matrix, p)
    }

    pub fn inv_apply_vector(&self, v: Vector3f) -> Vector3f {
        Self::vector_mul(&self.inv_matrix, v)
    }

    fn point_mul(m: &Matrix4f, p: Vector3f) -> Vector3f {
        let x = p[0] * m[(0, 0)] + p[1] * m[(0, 1)] + p[2] * m[(0, 2)] + m[(0, 3)];
        let y = p[0] * m[(1, 0)] + p[1] * m[(1, 1)] + p[2] * m[(1, 2)] + m[(1, 3)];
        let z = p[0] * m[(2, 0)] + p[1] * m[(2, 1)] + p[2] * m[(2, 2)] + m[(2, 3)];
        let w = p[0] * m[(3, 0)] + p[1] * m[(3, 1)] + p[2] * m[(3, 2)] + m[(3, 3)];

        Vector3f::new(x / w, y / w, z / w)
    }

    fn vector_mul(m: &Matrix4f, v: Vector3f) -> Vector3f {
        let x = v[0] * m[(0, 0)] + v[1] * m[(0, 1)] + v[2] * m[(0, 2)];
        let y = v[0] * m[(1, 0)] + v[1] * m[(1, 1)] + v[2] * m[(1, 2)];
        let z = v[0] * m[(2, 0)] + v[1] * m[(2, 1)] + v[2] * m[(2, 2)];

        Vector3f::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_inverse_roundtrip() {
        let matrix = Matrix4f::new_translation(&Vector3f::new(1.0, -2.0, 3.0));
        let transform = Transform::new(matrix);

        let p = Vector3f::new(0.5, 0.5, 0.5);
        let moved = transform.apply_point(p);
        assert!((moved.x - 1.5).abs() < 1e-5);

        let back = transform.inv_apply_point(moved);
        assert!((back - p).norm() < 1e-5);

        // Vectors ignore translation.
        let v = transform.apply_vector(Vector3f::new(0.0, 0.0, -1.0));
        assert!((v.z + 1.0).abs() < 1e-5);
    }
}
