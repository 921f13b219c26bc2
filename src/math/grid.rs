// Copyright @yucwang 2026

use super::constants::{ Float, Vector4f };

/// Dense RGBA voxel grid, one mip level of the baked lighting volume.
/// Sampling clamps to the grid edge.
#[derive(Debug, Clone)]
pub struct Grid3 {
    data: Vec<Vector4f>,
    xres: usize,
    yres: usize,
    zres: usize,
}

impl Grid3 {
    pub fn new(xres: usize, yres: usize, zres: usize) -> Self {
        Self {
            data: vec![Vector4f::zeros(); xres * yres * zres],
            xres,
            yres,
            zres,
        }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.xres, self.yres, self.zres)
    }

    pub fn max_dim(&self) -> usize {
        self.xres.max(self.yres).max(self.zres)
    }

    pub fn fetch(&self, x: usize, y: usize, z: usize) -> Vector4f {
        self.data[(z * self.yres + y) * self.xres + x]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: Vector4f) {
        self.data[(z * self.yres + y) * self.xres + x] = value;
    }

    /// Trilinear sample at normalized coordinates in [0, 1]^3.
    pub fn sample_trilinear(&self, px: Float, py: Float, pz: Float) -> Vector4f {
        let x = px.clamp(0.0, 1.0) * (self.xres as Float - 1.0);
        let y = py.clamp(0.0, 1.0) * (self.yres as Float - 1.0);
        let z = pz.clamp(0.0, 1.0) * (self.zres as Float - 1.0);

        let x0 = x.floor() as isize;
        let y0 = y.floor() as isize;
        let z0 = z.floor() as isize;

        let tx = x - x0 as Float;
        let ty = y - y0 as Float;
        let tz = z - z0 as Float;

        let cx = |v: isize| v.clamp(0, self.xres as isize - 1) as usize;
        let cy = |v: isize| v.clamp(0, self.yres as isize - 1) as usize;
        let cz = |v: isize| v.clamp(0, self.zres as isize - 1) as usize;

        let x0u = cx(x0);
        let y0u = cy(y0);
        let z0u = cz(z0);
        let x1u = cx(x0 + 1);
        let y1u = cy(y0 + 1);
        let z1u = cz(z0 + 1);

        let c000 = self.fetch(x0u, y0u, z0u);
        let c100 = self.fetch(x1u, y0u, z0u);
        let c010 = self.fetch(x0u, y1u, z0u);
        let c110 = self.fetch(x1u, y1u, z0u);
        let c001 = self.fetch(x0u, y0u, z1u);
        let c101 = self.fetch(x1u, y0u, z1u);
        let c011 = self.fetch(x0u, y1u, z1u);
        let c111 = self.fetch(x1u, y1u, z1u);

        let c00 = c000 * (1.0 - tx) + c100 * tx;
        let c10 = c010 * (1.0 - tx) + c110 * tx;
        let c01 = c001 * (1.0 - tx) + c101 * tx;
        let c11 = c011 * (1.0 - tx) + c111 * tx;

        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;

        c0 * (1.0 - tz) + c1 * tz
    }

    /// One step of the mip chain: 2x box downsample on every axis.
    pub fn downsample(&self) -> Grid3 {
        let nx = (self.xres / 2).max(1);
        let ny = (self.yres / 2).max(1);
        let nz = (self.zres / 2).max(1);
        let mut out = Grid3::new(nx, ny, nz);

        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let mut sum = Vector4f::zeros();
                    let mut count = 0usize;
                    for dz in 0..2usize {
                        for dy in 0..2usize {
                            for dx in 0..2usize {
                                let sx = 2 * x + dx;
                                let sy = 2 * y + dy;
                                let sz = 2 * z + dz;
                                if sx < self.xres && sy < self.yres && sz < self.zres {
                                    sum += self.fetch(sx, sy, sz);
                                    count += 1;
                                }
                            }
                        }
                    }
                    out.set(x, y, z, sum / (count as Float));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_trilinear_center() {
        let mut grid = Grid3::new(2, 2, 2);
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    let v = (x + 2 * y + 4 * z) as Float;
                    grid.set(x, y, z, Vector4f::new(v, v, v, v));
                }
            }
        }

        let center = grid.sample_trilinear(0.5, 0.5, 0.5);
        assert!((center.x - 3.5).abs() < 1e-4);

        // Outside coordinates clamp to the edge texel.
        let clamped = grid.sample_trilinear(2.0, 2.0, 2.0);
        assert!((clamped.x - 7.0).abs() < 1e-4);
    }

    #[test]
    fn test_grid_downsample_preserves_mean() {
        let mut grid = Grid3::new(4, 4, 4);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    let v = (x + 4 * y + 16 * z) as Float;
                    grid.set(x, y, z, Vector4f::new(v, 0.0, 0.0, 1.0));
                }
            }
        }

        let half = grid.downsample();
        assert_eq!(half.dims(), (2, 2, 2));

        let mut mean = 0.0;
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    mean += half.fetch(x, y, z).x;
                }
            }
        }
        mean /= 8.0;
        assert!((mean - 31.5).abs() < 1e-3);
    }
}
