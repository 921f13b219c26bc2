// Copyright @yucwang 2026

use crate::math::bitmap::Bitmap;
use crate::math::buffer::Buffer2D;
use crate::math::constants::{ Vector3f, Vector4f };

/// Collapse the per-sample accumulation texture to the display image: the
/// `samples` texels of a pixel sit contiguously in a row, the output is
/// their mean. Linear radiance; tone mapping happens when the image is
/// written out.
pub fn resolve(accum: &Buffer2D<Vector4f>, samples: usize) -> Bitmap {
    debug_assert!(samples >= 1);
    debug_assert_eq!(accum.width() % samples, 0);

    let width = accum.width() / samples;
    let height = accum.height();
    let mut image = Bitmap::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut sum = Vector3f::zeros();
            for s in 0..samples {
                let texel = accum[(x * samples + s, y)];
                sum += Vector3f::new(texel.x, texel.y, texel.z);
            }
            image[(x, y)] = sum / samples as f32;
        }
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_averages_contiguous_samples() {
        let mut accum: Buffer2D<Vector4f> = Buffer2D::new(4, 1);
        accum[(0, 0)] = Vector4f::new(1.0, 0.0, 0.0, 1.0);
        accum[(1, 0)] = Vector4f::new(0.0, 1.0, 0.0, 1.0);
        accum[(2, 0)] = Vector4f::new(0.5, 0.5, 0.5, 1.0);
        accum[(3, 0)] = Vector4f::new(0.5, 0.5, 0.5, 1.0);

        let image = resolve(&accum, 2);
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 1);
        assert!((image[(0, 0)] - Vector3f::new(0.5, 0.5, 0.0)).norm() < 1e-6);
        assert!((image[(1, 0)] - Vector3f::new(0.5, 0.5, 0.5)).norm() < 1e-6);
    }

    #[test]
    fn test_single_sample_is_identity() {
        let mut accum: Buffer2D<Vector4f> = Buffer2D::new(2, 2);
        accum[(1, 1)] = Vector4f::new(0.25, 0.5, 0.75, 1.0);

        let image = resolve(&accum, 1);
        assert_eq!(image[(1, 1)], Vector3f::new(0.25, 0.5, 0.75));
        assert_eq!(image[(0, 0)], Vector3f::zeros());
    }
}
