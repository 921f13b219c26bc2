// Copyright @yucwang 2026

use std::cmp::Ordering;
use std::path::{ Path, PathBuf };

use crate::io::mask_reader::read_mask_stack;
use crate::io::slice_reader::{ read_slice_directory, Slice };
use crate::math::constants::{ Float, Vector3f, MM_TO_M };
use super::scan::ScanVolume;
use super::voxel::{ CuttingPlane, MaskMode, PackedVoxel };

/// Density forced onto carved or isolated voxels. Nonzero so the voxel stays
/// distinguishable from the black border.
const MIN_DENSITY: u16 = 1;

#[derive(Debug)]
pub enum IngestError {
    SourceNotFound(PathBuf),
    InconsistentGeometry {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },
    BadMaskIndex(String),
    DimensionMismatch {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::SourceNotFound(path) => {
                write!(f, "no readable slices at {}", path.display())
            }
            IngestError::InconsistentGeometry { path, expected, found } => {
                write!(f, "slice {} is {}x{}, scan is {}x{}",
                       path.display(), found.0, found.1, expected.0, expected.1)
            }
            IngestError::BadMaskIndex(path) => {
                write!(f, "mask filename does not parse as a z index: {}", path)
            }
            IngestError::DimensionMismatch { path, expected, found } => {
                write!(f, "mask {} is {}x{}, scan is {}x{}",
                       path.display(), found.0, found.1, expected.0, expected.1)
            }
        }
    }
}

impl std::error::Error for IngestError {}

/// Build the packed scan volume from a folder of slices plus an optional
/// `mask/` sibling stack.
///
/// Slices that fail to decode are skipped (already logged by the reader);
/// everything geometric is strict: one slice with a different size, one mask
/// layer that does not line up, and the whole ingestion aborts.
pub fn load_scan(
    folder: &Path,
    cutting_plane: Option<CuttingPlane>,
    mask_mode: MaskMode,
) -> Result<ScanVolume, IngestError> {
    let mut slices = read_slice_directory(folder)?;
    if slices.is_empty() {
        return Err(IngestError::SourceNotFound(folder.to_path_buf()));
    }

    slices.sort_by(|a, b| {
        a.location.partial_cmp(&b.location).unwrap_or(Ordering::Equal)
    });

    let width = slices[0].width;
    let height = slices[0].height;
    let depth = slices.len();
    for slice in &slices {
        if slice.width != width || slice.height != height {
            return Err(IngestError::InconsistentGeometry {
                path: slice.source.clone(),
                expected: (width, height),
                found: (slice.width, slice.height),
            });
        }
    }

    let physical_size = physical_size_mm(&slices) * MM_TO_M;
    log::info!(
        "ingested {} slices, {}x{}x{}, physical size {:.4}x{:.4}x{:.4} m",
        depth, width, height, depth,
        physical_size.x, physical_size.y, physical_size.z
    );

    let mask = read_mask_stack(&folder.join("mask"), width, height, depth)?;

    let mut data = Vec::with_capacity(width * height * depth);
    for (k, slice) in slices.iter().enumerate() {
        for j in 0..height {
            for i in 0..width {
                let mut density = slice.pixels[i + width * j];

                if let Some(plane) = &cutting_plane {
                    let pos_norm = Vector3f::new(
                        i as Float / width as Float,
                        j as Float / height as Float,
                        k as Float / depth as Float,
                    );
                    if plane.cuts(pos_norm) {
                        density = MIN_DENSITY;
                    }
                }

                let label = match (&mask, mask_mode) {
                    (Some(mask), MaskMode::Body) | (Some(mask), MaskMode::Isolate) => {
                        mask[i + width * (j + height * k)]
                    }
                    _ => 0,
                };

                let voxel = if label > 0 {
                    PackedVoxel::pack_lowp(density, label)
                } else {
                    // Isolate flattens every unmasked voxel, with or without
                    // a mask stack; an absent stack leaves nothing visible.
                    if mask_mode == MaskMode::Isolate {
                        density = MIN_DENSITY;
                    }
                    PackedVoxel::pack_highp(density)
                };
                data.push(voxel);
            }
        }
    }

    Ok(ScanVolume::new(data, width, height, depth, physical_size))
}

/// In-plane extent comes from the coarsest pixel pitch seen anywhere in the
/// stack; the depth extent spans from the bottom of the lowest slice to the
/// top of the highest, thickness included.
fn physical_size_mm(slices: &[Slice]) -> Vector3f {
    let mut max_spacing = Vector3f::zeros();
    let mut lo = slices[0].location;
    let mut hi = slices[0].location;
    for slice in slices {
        max_spacing.x = max_spacing.x.max(slice.spacing.x);
        max_spacing.y = max_spacing.y.max(slice.spacing.y);
        lo = lo.min(slice.location - slice.spacing.z * 0.5);
        hi = hi.max(slice.location + slice.spacing.z * 0.5);
    }

    Vector3f::new(
        max_spacing.x * slices[0].width as Float,
        max_spacing.y * slices[0].height as Float,
        hi - lo,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::slice_reader::write_test_slice;

    fn test_dir(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        dir
    }

    fn write_stack(dir: &Path, locations: &[f32], pixels: &[u16]) {
        for (i, location) in locations.iter().enumerate() {
            write_test_slice(
                &dir.join(format!("{}.slc", i)),
                2, 2, [0.5, 0.5, 2.0], *location, pixels,
            );
        }
    }

    #[test]
    fn test_slices_sort_by_location() {
        let dir = test_dir("cinevol_ingest_sort");
        // Written out of order on purpose; pixel value encodes the location.
        write_test_slice(&dir.join("a.slc"), 2, 2, [0.5, 0.5, 2.0], 3.0, &[300; 4]);
        write_test_slice(&dir.join("b.slc"), 2, 2, [0.5, 0.5, 2.0], -3.0, &[100; 4]);
        write_test_slice(&dir.join("c.slc"), 2, 2, [0.5, 0.5, 2.0], 1.0, &[200; 4]);

        let scan = load_scan(&dir, None, MaskMode::None).expect("load scan");
        assert_eq!(scan.dims().z, 3);
        let d0 = scan.fetch(0, 0, 0).density();
        let d1 = scan.fetch(0, 0, 1).density();
        let d2 = scan.fetch(0, 0, 2).density();
        assert!(d0 < d1 && d1 < d2);
    }

    #[test]
    fn test_physical_size_example() {
        let dir = test_dir("cinevol_ingest_size");
        write_stack(&dir, &[-3.0, -1.0, 1.0, 3.0], &[500; 4]);

        let scan = load_scan(&dir, None, MaskMode::None).expect("load scan");
        assert_eq!(scan.dims().z, 4);
        let size = scan.physical_size();
        assert!((size.x - 0.001).abs() < 1e-7);
        assert!((size.y - 0.001).abs() < 1e-7);
        assert!((size.z - 0.008).abs() < 1e-7);
    }

    #[test]
    fn test_inconsistent_geometry_is_fatal() {
        let dir = test_dir("cinevol_ingest_geometry");
        write_test_slice(&dir.join("0.slc"), 2, 2, [0.5, 0.5, 2.0], 0.0, &[1; 4]);
        write_test_slice(&dir.join("1.slc"), 3, 2, [0.5, 0.5, 2.0], 2.0, &[1; 6]);

        let result = load_scan(&dir, None, MaskMode::None);
        assert!(matches!(result, Err(IngestError::InconsistentGeometry { .. })));
    }

    #[test]
    fn test_empty_folder_is_source_not_found() {
        let dir = test_dir("cinevol_ingest_empty");
        assert!(matches!(
            load_scan(&dir, None, MaskMode::None),
            Err(IngestError::SourceNotFound(_))
        ));
        assert!(matches!(
            load_scan(Path::new("/definitely/not/here"), None, MaskMode::None),
            Err(IngestError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_cutting_plane_overrides_density() {
        let dir = test_dir("cinevol_ingest_cut");
        write_stack(&dir, &[0.0, 2.0], &[40000; 4]);

        // Carve away everything in the upper half along z.
        let plane = CuttingPlane::new(
            Vector3f::new(0.0, 0.0, 0.45),
            Vector3f::new(0.0, 0.0, 1.0),
        );
        for mode in [MaskMode::None, MaskMode::Body, MaskMode::Isolate].iter() {
            let scan = load_scan(&dir, Some(plane), *mode).expect("load scan");
            assert_eq!(scan.fetch(0, 0, 1).density(), 0);
            assert_eq!(scan.fetch(0, 0, 1).0, PackedVoxel::pack_highp(MIN_DENSITY).0);
            // The uncut half keeps its density unless Isolate flattens it.
            if *mode == MaskMode::Isolate {
                assert_eq!(scan.fetch(0, 0, 0).0, PackedVoxel::pack_highp(MIN_DENSITY).0);
            } else {
                assert!(scan.fetch(0, 0, 0).density() > 1);
            }
        }
    }

    #[test]
    fn test_isolate_without_mask_flattens_unmasked() {
        let dir = test_dir("cinevol_ingest_isolate_nomask");
        write_stack(&dir, &[0.0, 2.0], &[40000; 4]);

        // No mask stack means no labelled voxels, so Isolate leaves only the
        // sentinel density everywhere.
        let scan = load_scan(&dir, None, MaskMode::Isolate).expect("load scan");
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    let voxel = scan.fetch(x, y, z);
                    assert!(!voxel.is_mask());
                    assert_eq!(voxel.0, PackedVoxel::pack_highp(MIN_DENSITY).0);
                }
            }
        }
    }

    fn write_mask_layer(dir: &Path, layer: usize, value: u8) {
        let mask_dir = dir.join("mask");
        std::fs::create_dir_all(&mask_dir).expect("create mask dir");
        let buffer = image::GrayImage::from_pixel(2, 2, image::Luma([value]));
        buffer.save(mask_dir.join(format!("{}.png", layer))).expect("save mask");
    }

    #[test]
    fn test_mask_mode_packing_table() {
        let dir = test_dir("cinevol_ingest_mask_modes");
        write_stack(&dir, &[0.0, 2.0], &[40000; 4]);
        write_mask_layer(&dir, 1, 5);

        // None: mask ignored, both layers high precision.
        let scan = load_scan(&dir, None, MaskMode::None).expect("load scan");
        assert!(!scan.fetch(0, 0, 0).is_mask());
        assert!(!scan.fetch(0, 0, 1).is_mask());
        assert_eq!(scan.fetch(0, 0, 1).density(), 40000);

        // Body: unmasked tissue keeps full density, masked voxels carry the
        // label at reduced precision.
        let scan = load_scan(&dir, None, MaskMode::Body).expect("load scan");
        let body = scan.fetch(0, 0, 0);
        assert!(!body.is_mask());
        assert_eq!(body.density(), 40000);
        let masked = scan.fetch(0, 0, 1);
        assert!(masked.is_mask());
        assert_eq!(masked.label(), 5);
        assert_eq!(masked.density(), 40000 & 0xFF00);

        // Isolate: unmasked tissue collapses to the sentinel density.
        let scan = load_scan(&dir, None, MaskMode::Isolate).expect("load scan");
        let isolated = scan.fetch(0, 0, 0);
        assert!(!isolated.is_mask());
        assert_eq!(isolated.0, PackedVoxel::pack_highp(MIN_DENSITY).0);
        let masked = scan.fetch(0, 0, 1);
        assert!(masked.is_mask());
        assert_eq!(masked.label(), 5);
    }
}
