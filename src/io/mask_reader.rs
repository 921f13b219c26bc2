// Copyright @yucwang 2026

use std::fs;
use std::path::Path;

use crate::volume::ingest::IngestError;

/// Read an optional segmentation mask stack. Each file in `folder` is an
/// 8-bit label image whose stem is the z index of the layer it fills; the
/// returned buffer is `width * height * depth` labels, zero where no mask
/// layer exists.
///
/// A missing folder means no mask. An unreadable image is logged and
/// skipped, but an unparsable stem or mismatched geometry is fatal.
pub fn read_mask_stack(
    folder: &Path,
    width: usize,
    height: usize,
    depth: usize,
) -> Result<Option<Vec<u8>>, IngestError> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(_) => return Ok(None),
    };

    let mut mask = vec![0u8; width * height * depth];
    let mut any_layer = false;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let stem = path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let layer: usize = stem.parse()
            .map_err(|_| IngestError::BadMaskIndex(path.display().to_string()))?;
        if layer >= depth {
            return Err(IngestError::BadMaskIndex(path.display().to_string()));
        }

        let image = match image::open(&path) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("skipping mask {}: {}", path.display(), err);
                continue;
            }
        };

        let (img_w, img_h) = (image.width() as usize, image.height() as usize);
        if img_w != width || img_h != height {
            return Err(IngestError::DimensionMismatch {
                path,
                expected: (width, height),
                found: (img_w, img_h),
            });
        }

        let offset = layer * width * height;
        match image {
            image::DynamicImage::ImageLuma8(buffer) => {
                mask[offset..offset + width * height].copy_from_slice(buffer.as_raw());
            }
            other => {
                // Multi-channel labels carry the value in every channel;
                // every third byte of the RGB buffer is enough.
                let rgb = other.to_rgb8();
                let raw = rgb.as_raw();
                for i in 0..width * height {
                    mask[offset + i] = raw[i * 3];
                }
            }
        }
        any_layer = true;
    }

    if any_layer {
        Ok(Some(mask))
    } else {
        Ok(None)
    }
}
