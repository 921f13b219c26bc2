// Copyright @yucwang 2026

use crate::core::transfer::TransferTables;
use crate::math::constants::{ Float, Vector3f, Vector4f };
use crate::math::grid::Grid3;
use crate::volume::scan::ScanVolume;
use super::stage::{ compile, PassCmd, ResourceId, StageDesc, StageId };
use super::PipelineError;

/// Workgroup edge of the precompute kernel; the bake resolution must be a
/// multiple of it.
pub const BAKE_GROUP_SIZE: usize = 8;

/// Precomputed lighting volume: level 0 holds (emission rgb,
/// density * opacity) per voxel at a fixed resolution independent of the
/// scan, followed by a full 2x mip chain down to 1^3 for cone sampling.
pub struct BakedVolume {
    levels: Vec<Grid3>,
}

impl BakedVolume {
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> &Grid3 {
        &self.levels[index]
    }

    /// Trilinear sample with linear interpolation between mip levels,
    /// the host-side analogue of LINEAR_MIPMAP_LINEAR.
    pub fn sample_lod(&self, p: Vector3f, lod: Float) -> Vector4f {
        let max_lod = (self.levels.len() - 1) as Float;
        let lod = lod.clamp(0.0, max_lod);
        let lo = lod.floor() as usize;
        let hi = (lo + 1).min(self.levels.len() - 1);
        let t = lod - lo as Float;

        let a = self.levels[lo].sample_trilinear(p.x, p.y, p.z);
        let b = self.levels[hi].sample_trilinear(p.x, p.y, p.z);
        a * (1.0 - t) + b * t
    }
}

/// Bake the lighting volume once from the raw scan and the current transfer
/// tables. Reconfiguring the transfer functions afterwards does NOT re-bake;
/// callers who care must call this again and rebuild the pass (known
/// staleness limitation).
pub fn bake(
    scan: &ScanVolume,
    luts: &TransferTables,
    target_resolution: usize,
) -> Result<BakedVolume, PipelineError> {
    if target_resolution == 0 || target_resolution % BAKE_GROUP_SIZE != 0 {
        return Err(PipelineError::BadDispatchSize(format!(
            "bake resolution {} is not a positive multiple of {}",
            target_resolution, BAKE_GROUP_SIZE
        )));
    }

    const STAGES: [StageDesc; 2] = [
        StageDesc {
            id: StageId::Precompute,
            reads: &[ResourceId::RawVolume, ResourceId::TransferLut, ResourceId::OpacityLut],
            writes: &[ResourceId::SigmaVolume],
        },
        StageDesc {
            id: StageId::MipGen,
            reads: &[ResourceId::SigmaVolume],
            writes: &[ResourceId::SigmaVolume],
        },
    ];

    let mut volume = None;
    for command in compile(&STAGES) {
        match command {
            // The mip chain reads what precompute wrote; the scheduler puts
            // the visibility barrier between them.
            PassCmd::Barrier => {}
            PassCmd::Dispatch(StageId::Precompute) => {
                volume = Some(run_precompute(scan, luts, target_resolution));
            }
            PassCmd::Dispatch(StageId::MipGen) => {
                let level0 = volume.take().ok_or_else(|| {
                    PipelineError::DispatchFailure("mip_gen dispatched before precompute".to_string())
                })?;
                return Ok(BakedVolume { levels: build_mip_chain(level0) });
            }
            PassCmd::Dispatch(other) => {
                return Err(PipelineError::DispatchFailure(format!(
                    "unexpected stage in bake pass: {:?}", other
                )));
            }
        }
    }

    Err(PipelineError::DispatchFailure("bake pass compiled to no mip_gen stage".to_string()))
}

fn run_precompute(scan: &ScanVolume, luts: &TransferTables, resolution: usize) -> Grid3 {
    let mut grid = Grid3::new(resolution, resolution, resolution);
    // One thread per baked voxel, (resolution / 8)^3 groups of 8^3.
    for z in 0..resolution {
        for y in 0..resolution {
            for x in 0..resolution {
                let p = Vector3f::new(
                    (x as Float + 0.5) / resolution as Float,
                    (y as Float + 0.5) / resolution as Float,
                    (z as Float + 0.5) / resolution as Float,
                );
                let density = scan.sample_density(p);
                let color = luts.color.sample(density);
                let opacity = luts.opacity.sample(density);
                grid.set(x, y, z, Vector4f::new(
                    color.x, color.y, color.z,
                    density * opacity,
                ));
            }
        }
    }
    grid
}

fn build_mip_chain(level0: Grid3) -> Vec<Grid3> {
    let mut levels = vec![level0];
    while levels[levels.len() - 1].max_dim() > 1 {
        let next = levels[levels.len() - 1].downsample();
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transfer::{ Interpolation, PiecewiseFunction, TransferTables };
    use crate::volume::voxel::PackedVoxel;

    fn uniform_scan(density: u16) -> ScanVolume {
        let data = vec![PackedVoxel::pack_highp(density); 8 * 8 * 8];
        ScanVolume::new(data, 8, 8, 8, Vector3f::new(0.1, 0.1, 0.1))
    }

    fn ramp_tables() -> TransferTables {
        let mut color = PiecewiseFunction::new(Interpolation::Linear);
        color.add_stop(0.0, Vector4f::new(0.0, 0.0, 0.0, 1.0));
        color.add_stop(1.0, Vector4f::new(1.0, 1.0, 1.0, 1.0));
        let mut opacity = PiecewiseFunction::new(Interpolation::Linear);
        opacity.add_stop(0.0, 0.0);
        opacity.add_stop(1.0, 1.0);
        TransferTables::new(&color, &opacity, 100)
    }

    #[test]
    fn test_bake_resolution_must_fit_workgroups() {
        let scan = uniform_scan(30000);
        let luts = ramp_tables();
        assert!(matches!(bake(&scan, &luts, 0), Err(PipelineError::BadDispatchSize(_))));
        assert!(matches!(bake(&scan, &luts, 12), Err(PipelineError::BadDispatchSize(_))));
        assert!(bake(&scan, &luts, 16).is_ok());
    }

    #[test]
    fn test_mip_chain_shape() {
        let scan = uniform_scan(30000);
        let luts = ramp_tables();
        let baked = bake(&scan, &luts, 16).expect("bake");

        // 1 + log2(16) levels, ending at 1^3.
        assert_eq!(baked.level_count(), 5);
        assert_eq!(baked.level(0).dims(), (16, 16, 16));
        assert_eq!(baked.level(4).dims(), (1, 1, 1));
    }

    #[test]
    fn test_baked_voxel_combines_density_and_luts() {
        let scan = uniform_scan(40000);
        let luts = ramp_tables();
        let baked = bake(&scan, &luts, 8).expect("bake");

        let density = PackedVoxel::pack_highp(40000).density_norm();
        let center = baked.level(0).sample_trilinear(0.5, 0.5, 0.5);
        assert!((center.x - density).abs() < 0.02);
        assert!((center.w - density * density).abs() < 0.02);
    }

    #[test]
    fn test_lod_sampling_blends_levels() {
        let scan = uniform_scan(40000);
        let luts = ramp_tables();
        let baked = bake(&scan, &luts, 8).expect("bake");

        // A uniform volume's interior is identical at every lod.
        let p = Vector3f::new(0.5, 0.5, 0.5);
        let fine = baked.sample_lod(p, 0.0);
        let blended = baked.sample_lod(p, 1.5);
        assert!((fine.w - blended.w).abs() < 0.05);

        // Lod clamps instead of indexing out of range.
        let coarse = baked.sample_lod(p, 100.0);
        assert!(coarse.w >= 0.0);
    }
}
