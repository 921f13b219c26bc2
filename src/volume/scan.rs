// Copyright @yucwang 2026

use crate::math::constants::{ Float, Vector3f, Vector3i };
use super::voxel::PackedVoxel;

/// The packed scan grid. Immutable once built: the render session owns it and
/// every pipeline stage borrows it read-only, so unsynchronized concurrent
/// reads are safe.
///
/// Sampling outside the grid behaves like a black border (zero density,
/// unmasked), matching the clamp-to-border semantics of the GPU binding this
/// stands in for.
#[derive(Debug)]
pub struct ScanVolume {
    data: Vec<PackedVoxel>,
    width: usize,
    height: usize,
    depth: usize,
    physical_size: Vector3f,
}

impl ScanVolume {
    pub(crate) fn new(
        data: Vec<PackedVoxel>,
        width: usize,
        height: usize,
        depth: usize,
        physical_size: Vector3f,
    ) -> Self {
        debug_assert!(depth >= 1);
        debug_assert_eq!(data.len(), width * height * depth);
        debug_assert!(physical_size.x > 0.0 && physical_size.y > 0.0 && physical_size.z > 0.0);
        Self { data, width, height, depth, physical_size }
    }

    pub fn dims(&self) -> Vector3i {
        Vector3i::new(self.width as i32, self.height as i32, self.depth as i32)
    }

    /// Physical extent in meters, strictly positive on every axis.
    pub fn physical_size(&self) -> Vector3f {
        self.physical_size
    }

    pub fn fetch(&self, x: isize, y: isize, z: isize) -> PackedVoxel {
        if x < 0 || y < 0 || z < 0
            || x >= self.width as isize
            || y >= self.height as isize
            || z >= self.depth as isize {
            return PackedVoxel::default();
        }
        self.data[(z as usize * self.height + y as usize) * self.width + x as usize]
    }

    /// Nearest voxel at normalized coordinates, used where the decoded mask
    /// label matters (labels must not be interpolated).
    pub fn fetch_norm(&self, p: Vector3f) -> PackedVoxel {
        let x = (p.x * self.width as Float).floor() as isize;
        let y = (p.y * self.height as Float).floor() as isize;
        let z = (p.z * self.depth as Float).floor() as isize;
        self.fetch(x, y, z)
    }

    /// Trilinear normalized density at normalized coordinates in [0, 1]^3.
    pub fn sample_density(&self, p: Vector3f) -> Float {
        let x = p.x * (self.width as Float - 1.0);
        let y = p.y * (self.height as Float - 1.0);
        let z = p.z * (self.depth as Float - 1.0);

        let x0 = x.floor() as isize;
        let y0 = y.floor() as isize;
        let z0 = z.floor() as isize;

        let tx = x - x0 as Float;
        let ty = y - y0 as Float;
        let tz = z - z0 as Float;

        let d = |xi: isize, yi: isize, zi: isize| self.fetch(xi, yi, zi).density_norm();

        let c00 = d(x0, y0, z0) * (1.0 - tx) + d(x0 + 1, y0, z0) * tx;
        let c10 = d(x0, y0 + 1, z0) * (1.0 - tx) + d(x0 + 1, y0 + 1, z0) * tx;
        let c01 = d(x0, y0, z0 + 1) * (1.0 - tx) + d(x0 + 1, y0, z0 + 1) * tx;
        let c11 = d(x0, y0 + 1, z0 + 1) * (1.0 - tx) + d(x0 + 1, y0 + 1, z0 + 1) * tx;

        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;

        c0 * (1.0 - tz) + c1 * tz
    }
}
