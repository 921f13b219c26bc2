// Copyright @yucwang 2026

use crate::core::rng::LcgRng;
use crate::core::transfer::TransferTables;
use crate::math::buffer::Buffer2D;
use crate::math::constants::{ Float, Matrix4f, UInt, Vector2i, Vector3f, Vector4f };
use crate::math::transform::Transform;
use crate::volume::scan::ScanVolume;
use super::bake::{ bake, BakedVolume };
use super::cubemap::Cubemap;
use super::stage::{ compile, PassCmd, ResourceId, StageDesc, StageId };
use super::PipelineError;

/// Screen-space stages dispatch (w * samples / 16, h / 16, 1) workgroups.
pub const SCREEN_GROUP_SIZE: usize = 16;

/// Fixed number of primary march steps across the volume's largest extent.
const MARCH_STEPS: usize = 256;
/// Extinction per unit opacity, tuned for meter-scale scans.
const SIGMA_SCALE: Float = 400.0;
/// 45 degree vertical field of view: 1 / tan(22.5 deg).
const CAMERA_FOCAL: Float = 2.41421356;
/// Tangent of the cone half-angle used for indirect gathering.
const CONE_SPREAD: Float = 0.35;
const CONE_STEPS: usize = 48;
/// Transmittance below which a ray is considered absorbed.
const BETA_CUTOFF: Float = 1e-4;

/// Uniform slots shared by the screen-space kernels, mirroring the declared
/// compute-program contract.
pub struct Uniforms {
    pub num_samples: UInt,
    pub scale_factor: Vector3f,
    pub lower_bound: Vector3f,
    pub view: Matrix4f,
    pub itrs: UInt,
    pub depth: UInt,
    pub scan_size: Vector3f,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassState {
    /// View changed (or never rendered): the next iteration restarts
    /// accumulation from scratch.
    Dirty,
    Accumulating,
}

/// Orchestrates one progressive iteration per `execute` call: ray
/// generation, primary raymarch, indirect cone trace, each an explicit
/// stage with declared bindings. Owns the working buffers and the baked
/// lighting volume; the scan itself is borrowed per call, the session owns
/// it.
pub struct RaytracePass {
    size: Vector2i,
    num_samples: usize,
    itrs: u32,
    state: PassState,
    baked: BakedVolume,
    commands: Vec<PassCmd>,
    ray_pos: Buffer2D<Vector4f>,
    ray_dir: Buffer2D<Vector4f>,
    accum: Buffer2D<Vector4f>,
}

impl RaytracePass {
    pub fn new(
        size: Vector2i,
        num_samples: usize,
        scan: &ScanVolume,
        luts: &TransferTables,
        bake_resolution: usize,
    ) -> Result<Self, PipelineError> {
        if size.x <= 0 || size.y <= 0
            || size.x as usize % SCREEN_GROUP_SIZE != 0
            || size.y as usize % SCREEN_GROUP_SIZE != 0 {
            return Err(PipelineError::BadDispatchSize(format!(
                "output size {}x{} is not a positive multiple of {}",
                size.x, size.y, SCREEN_GROUP_SIZE
            )));
        }
        if num_samples == 0 {
            return Err(PipelineError::BadDispatchSize(
                "samples per pixel must be at least 1".to_string()));
        }

        let buf_width = (size.x as usize)
            .checked_mul(num_samples)
            .ok_or_else(|| PipelineError::ResourceExhaustion(
                "accumulation buffer width overflows".to_string()))?;
        let buf_height = size.y as usize;

        let baked = bake(scan, luts, bake_resolution)?;

        const STAGES: [StageDesc; 3] = [
            StageDesc {
                id: StageId::GenRays,
                reads: &[],
                writes: &[ResourceId::RayPosTex, ResourceId::RayDirTex],
            },
            StageDesc {
                id: StageId::Raymarch,
                reads: &[
                    ResourceId::RawVolume,
                    ResourceId::TransferLut,
                    ResourceId::OpacityLut,
                    ResourceId::ClearcoatLut,
                    ResourceId::RayPosTex,
                    ResourceId::RayDirTex,
                ],
                writes: &[
                    ResourceId::AccumTex,
                    ResourceId::RayPosTex,
                    ResourceId::RayDirTex,
                ],
            },
            StageDesc {
                id: StageId::ConeTrace,
                reads: &[
                    ResourceId::SigmaVolume,
                    ResourceId::Cubemap,
                    ResourceId::RayPosTex,
                    ResourceId::RayDirTex,
                ],
                writes: &[ResourceId::AccumTex],
            },
        ];

        Ok(Self {
            size,
            num_samples,
            itrs: 1,
            state: PassState::Dirty,
            baked,
            commands: compile(&STAGES),
            ray_pos: Buffer2D::new(buf_width, buf_height),
            ray_dir: Buffer2D::new(buf_width, buf_height),
            accum: Buffer2D::new(buf_width, buf_height),
        })
    }

    pub fn itrs(&self) -> u32 {
        self.itrs
    }

    pub fn accum(&self) -> &Buffer2D<Vector4f> {
        &self.accum
    }

    pub fn baked(&self) -> &BakedVolume {
        &self.baked
    }

    /// Mark the accumulated image stale. The next `execute` restarts at
    /// iteration 1; an iteration already computed against the old view is
    /// superseded, never aborted.
    pub fn invalidate(&mut self) {
        self.state = PassState::Dirty;
    }

    /// Run one progressive iteration.
    pub fn execute(
        &mut self,
        scan: &ScanVolume,
        luts: &TransferTables,
        cubemap: &Cubemap,
        view: &Matrix4f,
    ) -> Result<(), PipelineError> {
        if self.state == PassState::Dirty {
            self.itrs = 1;
        }

        if view.try_inverse().is_none() {
            return Err(PipelineError::DispatchFailure(
                "view transform is singular".to_string()));
        }

        let physical_size = scan.physical_size();
        let uniforms = Uniforms {
            num_samples: self.num_samples as UInt,
            scale_factor: Vector3f::new(
                1.0 / physical_size.x,
                1.0 / physical_size.y,
                1.0 / physical_size.z,
            ),
            lower_bound: -physical_size * 0.5,
            view: *view,
            itrs: self.itrs,
            depth: 1,
            scan_size: physical_size,
        };

        let commands = self.commands.clone();
        for command in commands {
            match command {
                // Sequencing point between a writing stage and its readers;
                // the reference kernels run strictly in command order.
                PassCmd::Barrier => {}
                PassCmd::Dispatch(StageId::GenRays) => {
                    gen_rays_kernel(&uniforms, &mut self.ray_pos, &mut self.ray_dir);
                }
                PassCmd::Dispatch(StageId::Raymarch) => {
                    raymarch_kernel(
                        &uniforms, scan, luts,
                        &mut self.ray_pos, &mut self.ray_dir, &mut self.accum,
                    );
                }
                PassCmd::Dispatch(StageId::ConeTrace) => {
                    cone_trace_kernel(
                        &uniforms, &self.baked, cubemap,
                        &self.ray_pos, &self.ray_dir, &mut self.accum,
                    );
                }
                PassCmd::Dispatch(other) => {
                    return Err(PipelineError::DispatchFailure(format!(
                        "unexpected stage in raytrace pass: {:?}", other
                    )));
                }
            }
        }

        self.itrs += 1;
        self.state = PassState::Accumulating;
        Ok(())
    }
}

/// One camera ray per output texel (pixel x sample), jittered through the
/// pixel by an iteration-seeded stream so each progressive pass draws a
/// fresh anti-aliasing offset.
fn gen_rays_kernel(
    uniforms: &Uniforms,
    ray_pos: &mut Buffer2D<Vector4f>,
    ray_dir: &mut Buffer2D<Vector4f>,
) {
    let width = ray_pos.width();
    let height = ray_pos.height();
    let pixels = width / uniforms.num_samples as usize;
    let aspect = pixels as Float / height as Float;
    let camera = Transform::new(uniforms.view);

    for y in 0..height {
        for xs in 0..width {
            let pixel_x = xs / uniforms.num_samples as usize;
            let mut rng = LcgRng::from_texel(xs, y, uniforms.itrs);

            let u = 2.0 * ((pixel_x as Float + rng.next_f32()) / pixels as Float) - 1.0;
            let v = 1.0 - 2.0 * ((y as Float + rng.next_f32()) / height as Float);

            let origin = camera.inv_apply_point(Vector3f::zeros());
            let dir_camera = Vector3f::new(u * aspect, v, -CAMERA_FOCAL);
            let dir = camera.inv_apply_vector(dir_camera).normalize();

            ray_pos[(xs, y)] = Vector4f::new(origin.x, origin.y, origin.z, 1.0);
            ray_dir[(xs, y)] = Vector4f::new(dir.x, dir.y, dir.z, 1.0);
        }
    }
}

/// Fixed-step front-to-back march through the raw volume. Emission color and
/// extinction come from the transfer tables; masked voxels are tinted by
/// their label. Leaves the exit position and remaining transmittance behind
/// for the indirect stage and blends the radiance estimate into the
/// accumulation buffer with weight 1/itrs.
fn raymarch_kernel(
    uniforms: &Uniforms,
    scan: &ScanVolume,
    luts: &TransferTables,
    ray_pos: &mut Buffer2D<Vector4f>,
    ray_dir: &mut Buffer2D<Vector4f>,
    accum: &mut Buffer2D<Vector4f>,
) {
    let lower = uniforms.lower_bound;
    let upper = -uniforms.lower_bound;
    let extent = uniforms.scan_size.amax();
    let dt = extent / MARCH_STEPS as Float;
    let blend = 1.0 / uniforms.itrs as Float;

    for y in 0..accum.height() {
        for xs in 0..accum.width() {
            let origin = ray_pos[(xs, y)].xyz();
            let dir = ray_dir[(xs, y)].xyz();

            let mut radiance = Vector3f::zeros();
            let mut beta: Float = 1.0;
            let mut exit = origin;

            if let Some((t0, t1)) = intersect_box(origin, dir, lower, upper) {
                let mut t = t0.max(0.0);
                exit = origin + dir * t1;
                while t < t1 {
                    let p = origin + dir * t;
                    let p_norm = (p - lower).component_mul(&uniforms.scale_factor);
                    let density = scan.sample_density(p_norm);
                    let opacity = luts.opacity.sample(density);

                    if opacity > 0.0 {
                        let color4 = luts.color.sample(density);
                        let coat = luts.clearcoat.sample(density);
                        let mut color = color4.xyz() * (1.0 - coat)
                            + Vector3f::new(coat, coat, coat);

                        let voxel = scan.fetch_norm(p_norm);
                        if voxel.is_mask() {
                            color = color.component_mul(&label_tint(voxel.label()));
                        }

                        let alpha = 1.0 - (-opacity * SIGMA_SCALE * dt).exp();
                        radiance += color * (beta * alpha);
                        beta *= 1.0 - alpha;

                        if beta < BETA_CUTOFF {
                            exit = p;
                            break;
                        }
                    }

                    t += dt;
                }
            }

            ray_pos[(xs, y)] = Vector4f::new(exit.x, exit.y, exit.z, beta);
            ray_dir[(xs, y)] = Vector4f::new(dir.x, dir.y, dir.z, beta);

            // Progressive refinement: 1/itrs fully overwrites stale content
            // on the first iteration after an invalidation.
            let old = accum[(xs, y)];
            let sample = Vector4f::new(radiance.x, radiance.y, radiance.z, 1.0 - beta);
            accum[(xs, y)] = old * (1.0 - blend) + sample * blend;
        }
    }
}

/// Indirect gather along the recorded exit ray: cone-march the baked mip
/// chain with a footprint that widens with distance, then fall through to
/// the environment map. Added on top of this iteration's primary estimate,
/// scaled by the surviving transmittance.
fn cone_trace_kernel(
    uniforms: &Uniforms,
    baked: &BakedVolume,
    cubemap: &Cubemap,
    ray_pos: &Buffer2D<Vector4f>,
    ray_dir: &Buffer2D<Vector4f>,
    accum: &mut Buffer2D<Vector4f>,
) {
    let lower = uniforms.lower_bound;
    let upper = -uniforms.lower_bound;
    let extent = uniforms.scan_size.amax();
    let base_dt = extent / CONE_STEPS as Float;
    let (base_res, _, _) = baked.level(0).dims();
    let blend = 1.0 / uniforms.itrs as Float;

    for y in 0..accum.height() {
        for xs in 0..accum.width() {
            let beta_primary = ray_pos[(xs, y)].w;
            if beta_primary < BETA_CUTOFF {
                continue;
            }

            let origin = ray_pos[(xs, y)].xyz();
            let dir = ray_dir[(xs, y)].xyz();

            let mut indirect = Vector3f::zeros();
            let mut beta: Float = 1.0;
            let mut t = base_dt;

            for _ in 0..CONE_STEPS {
                let p = origin + dir * t;
                if p.x < lower.x || p.y < lower.y || p.z < lower.z
                    || p.x > upper.x || p.y > upper.y || p.z > upper.z {
                    break;
                }

                // Footprint grows linearly with distance; pick the mip whose
                // texel pitch matches it.
                let footprint = t * CONE_SPREAD;
                let lod = (footprint * base_res as Float / extent).max(1.0).log2();

                let p_norm = (p - lower).component_mul(&uniforms.scale_factor);
                let baked_sample = baked.sample_lod(p_norm, lod);

                let dt = base_dt * (1.0 + footprint / extent);
                let alpha = 1.0 - (-baked_sample.w * SIGMA_SCALE * dt).exp();
                indirect += baked_sample.xyz() * (beta * alpha);
                beta *= 1.0 - alpha;
                if beta < BETA_CUTOFF {
                    break;
                }

                t += dt;
            }

            indirect += cubemap.sample(dir) * beta;

            let contribution = indirect * (beta_primary * blend);
            let old = accum[(xs, y)];
            accum[(xs, y)] = Vector4f::new(
                old.x + contribution.x,
                old.y + contribution.y,
                old.z + contribution.z,
                old.w,
            );
        }
    }
}

fn intersect_box(
    origin: Vector3f,
    dir: Vector3f,
    lower: Vector3f,
    upper: Vector3f,
) -> Option<(Float, Float)> {
    let mut t0 = Float::MIN;
    let mut t1 = Float::MAX;
    for axis in 0..3 {
        if dir[axis].abs() < 1e-12 {
            if origin[axis] < lower[axis] || origin[axis] > upper[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let mut near = (lower[axis] - origin[axis]) * inv;
        let mut far = (upper[axis] - origin[axis]) * inv;
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t0 = t0.max(near);
        t1 = t1.min(far);
        if t0 > t1 {
            return None;
        }
    }
    if t1 < 0.0 {
        return None;
    }
    Some((t0, t1))
}

fn label_tint(label: u8) -> Vector3f {
    let t = label as Float / 127.0;
    let phase = t * 2.0 * crate::math::constants::PI;
    Vector3f::new(
        0.55 + 0.45 * phase.cos(),
        0.55 + 0.45 * (phase + 2.094).cos(),
        0.55 + 0.45 * (phase + 4.188).cos(),
    )
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
        color.add_stop(1.0, Vector4f::new(1.0, 0.5, 0.25, 1.0));
        let mut opacity = PiecewiseFunction::new(Interpolation::Linear);
        opacity.add_stop(0.0, 0.0);
        opacity.add_stop(1.0, 1.0);
        TransferTables::new(&color, &opacity, 100)
    }

    fn small_pass(scan: &ScanVolume, luts: &TransferTables) -> RaytracePass {
        RaytracePass::new(Vector2i::new(16, 16), 1, scan, luts, 8).expect("construct pass")
    }

    fn back_view() -> Matrix4f {
        Matrix4f::new_translation(&Vector3f::new(0.0, 0.0, -0.5))
    }

    #[test]
    fn test_construction_validates_dispatch_geometry() {
        let scan = uniform_scan(30000);
        let luts = ramp_tables();
        assert!(matches!(
            RaytracePass::new(Vector2i::new(15, 16), 1, &scan, &luts, 8),
            Err(PipelineError::BadDispatchSize(_))
        ));
        assert!(matches!(
            RaytracePass::new(Vector2i::new(16, 16), 0, &scan, &luts, 8),
            Err(PipelineError::BadDispatchSize(_))
        ));
        assert!(RaytracePass::new(Vector2i::new(16, 16), 2, &scan, &luts, 8).is_ok());
    }

    #[test]
    fn test_progressive_iterations_count_up() {
        let scan = uniform_scan(30000);
        let luts = ramp_tables();
        let cubemap = Cubemap::constant(Vector3f::new(0.5, 0.5, 0.5));
        let mut pass = small_pass(&scan, &luts);
        let view = back_view();

        assert_eq!(pass.itrs(), 1);
        for k in 1..=4 {
            pass.execute(&scan, &luts, &cubemap, &view).expect("execute");
            assert_eq!(pass.itrs(), k + 1);
        }
    }

    #[test]
    fn test_invalidation_resets_iteration() {
        let scan = uniform_scan(30000);
        let luts = ramp_tables();
        let cubemap = Cubemap::constant(Vector3f::new(0.5, 0.5, 0.5));
        let mut pass = small_pass(&scan, &luts);
        let view = back_view();

        pass.execute(&scan, &luts, &cubemap, &view).expect("execute");
        pass.execute(&scan, &luts, &cubemap, &view).expect("execute");
        assert_eq!(pass.itrs(), 3);

        pass.invalidate();
        // The reset happens on the next execute, not at invalidation time.
        assert_eq!(pass.itrs(), 3);
        pass.execute(&scan, &luts, &cubemap, &view).expect("execute");
        assert_eq!(pass.itrs(), 2);
    }

    #[test]
    fn test_first_iteration_overwrites_stale_content() {
        let scan = uniform_scan(30000);
        let luts = ramp_tables();
        let bright = Cubemap::constant(Vector3f::new(1.0, 1.0, 1.0));
        let dark = Cubemap::constant(Vector3f::zeros());
        let mut pass = small_pass(&scan, &luts);
        let view = back_view();

        // Accumulate against a bright environment, then invalidate and
        // render a dark one: no brightness may leak through.
        for _ in 0..3 {
            pass.execute(&scan, &luts, &bright, &view).expect("execute");
        }
        pass.invalidate();
        pass.execute(&scan, &luts, &dark, &view).expect("execute");

        let mut pass_fresh = small_pass(&scan, &luts);
        pass_fresh.execute(&scan, &luts, &dark, &view).expect("execute");

        let a = pass.accum()[(8, 8)];
        let b = pass_fresh.accum()[(8, 8)];
        assert!((a - b).norm() < 1e-5);
    }

    #[test]
    fn test_singular_view_is_a_dispatch_failure() {
        let scan = uniform_scan(30000);
        let luts = ramp_tables();
        let cubemap = Cubemap::constant(Vector3f::zeros());
        let mut pass = small_pass(&scan, &luts);

        let singular = Matrix4f::zeros();
        assert!(matches!(
            pass.execute(&scan, &luts, &cubemap, &singular),
            Err(PipelineError::DispatchFailure(_))
        ));
    }

    #[test]
    fn test_rays_through_dense_volume_accumulate_opacity() {
        let scan = uniform_scan(60000);
        let mut opacity = PiecewiseFunction::new(Interpolation::Linear);
        opacity.add_stop(0.0, 1.0);
        opacity.add_stop(1.0, 1.0);
        let mut color = PiecewiseFunction::new(Interpolation::Linear);
        color.add_stop(0.0, Vector4f::new(1.0, 1.0, 1.0, 1.0));
        color.add_stop(1.0, Vector4f::new(1.0, 1.0, 1.0, 1.0));
        let luts = TransferTables::new(&color, &opacity, 100);

        let cubemap = Cubemap::constant(Vector3f::zeros());
        let mut pass = small_pass(&scan, &luts);
        pass.execute(&scan, &luts, &cubemap, &back_view()).expect("execute");

        // The center ray points straight into an opaque block.
        let center = pass.accum()[(8, 8)];
        assert!(center.w > 0.99, "expected opaque alpha, got {}", center.w);
        assert!(center.x > 0.5);
    }

    #[test]
    fn test_box_intersection() {
        let lower = Vector3f::new(-1.0, -1.0, -1.0);
        let upper = Vector3f::new(1.0, 1.0, 1.0);

        let hit = intersect_box(
            Vector3f::new(0.0, 0.0, -3.0), Vector3f::new(0.0, 0.0, 1.0), lower, upper);
        let (t0, t1) = hit.expect("ray hits box");
        assert!((t0 - 2.0).abs() < 1e-5);
        assert!((t1 - 4.0).abs() < 1e-5);

        let miss = intersect_box(
            Vector3f::new(0.0, 5.0, -3.0), Vector3f::new(0.0, 0.0, 1.0), lower, upper);
        assert!(miss.is_none());

        let behind = intersect_box(
            Vector3f::new(0.0, 0.0, 3.0), Vector3f::new(0.0, 0.0, 1.0), lower, upper);
        assert!(behind.is_none());
    }
}
