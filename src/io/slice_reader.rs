// Copyright @yucwang 2026

use std::fs;
use std::path::{ Path, PathBuf };

use crate::math::constants::{ Float, Vector3f };
use crate::volume::ingest::IngestError;

/// One decoded cross-sectional slice. `spacing` is the pixel pitch in
/// millimeters (x/y in-plane, z the slice thickness), `location` the slice
/// position along the scan axis in millimeters.
#[derive(Debug, Clone)]
pub struct Slice {
    pub source: PathBuf,
    pub width: usize,
    pub height: usize,
    pub spacing: Vector3f,
    pub location: Float,
    pub pixels: Vec<u16>,
}

/// Binary slice format:
///
/// ```text
/// magic "SLC", version u8 (= 1),
/// width i32, height i32,
/// spacing f32 x3 (mm), location f32 (mm),
/// width * height density samples, u16 little endian
/// ```
///
/// Scanner-native formats (DICOM et al.) are external collaborators; this is
/// the interchange format the ingestor consumes.
pub fn read_slice(path: &Path) -> Result<Slice, String> {
    let bytes = fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    if bytes.len() < 4 {
        return Err("slice file too small".to_string());
    }
    if &bytes[0..3] != b"SLC" {
        return Err("invalid slice header".to_string());
    }
    let version = bytes[3];
    if version != 1 {
        return Err(format!("unsupported slice version: {}", version));
    }

    let mut cursor = 4usize;
    let width = read_i32(&bytes, &mut cursor)?;
    let height = read_i32(&bytes, &mut cursor)?;
    if width <= 0 || height <= 0 {
        return Err("slice dimensions must be positive".to_string());
    }
    let width = width as usize;
    let height = height as usize;

    let sx = read_f32(&bytes, &mut cursor)?;
    let sy = read_f32(&bytes, &mut cursor)?;
    let sz = read_f32(&bytes, &mut cursor)?;
    let location = read_f32(&bytes, &mut cursor)?;

    let expected = width
        .checked_mul(height)
        .ok_or_else(|| "slice dimensions overflow".to_string())?;
    let mut pixels = Vec::with_capacity(expected);
    for _ in 0..expected {
        pixels.push(read_u16(&bytes, &mut cursor)?);
    }

    Ok(Slice {
        source: path.to_path_buf(),
        width,
        height,
        spacing: Vector3f::new(sx, sy, sz),
        location,
        pixels,
    })
}

/// Enumerate and decode a slice folder. A file that fails to decode is
/// logged and skipped; the mask subdirectory is left for the mask reader.
pub fn read_slice_directory(folder: &Path) -> Result<Vec<Slice>, IngestError> {
    let entries = fs::read_dir(folder)
        .map_err(|_| IngestError::SourceNotFound(folder.to_path_buf()))?;

    let mut slices = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        match read_slice(&path) {
            Ok(slice) => slices.push(slice),
            Err(err) => log::warn!("skipping slice {}: {}", path.display(), err),
        }
    }

    Ok(slices)
}

fn read_i32(bytes: &[u8], cursor: &mut usize) -> Result<i32, String> {
    if *cursor + 4 > bytes.len() {
        return Err("unexpected eof while reading i32".to_string());
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32(bytes: &[u8], cursor: &mut usize) -> Result<Float, String> {
    if *cursor + 4 > bytes.len() {
        return Err("unexpected eof while reading f32".to_string());
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(Float::from_le_bytes(buf))
}

fn read_u16(bytes: &[u8], cursor: &mut usize) -> Result<u16, String> {
    if *cursor + 2 > bytes.len() {
        return Err("unexpected eof while reading u16".to_string());
    }
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 2]);
    *cursor += 2;
    Ok(u16::from_le_bytes(buf))
}

#[cfg(test)]
pub(crate) fn write_test_slice(
    path: &Path,
    width: i32,
    height: i32,
    spacing: [f32; 3],
    location: f32,
    pixels: &[u16],
) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"SLC");
    bytes.push(1u8);
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    for v in spacing.iter() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&location.to_le_bytes());
    for v in pixels {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(path, bytes).expect("write slice");
}
