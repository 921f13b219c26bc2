// Copyright @yucwang 2026

use crate::math::constants::{ Float, Vector3f };

/// How segmentation mask labels influence voxel packing.
///
/// `None` ignores the mask entirely, `Body` keeps unmasked tissue at full
/// density precision, `Isolate` additionally flattens unmasked tissue to the
/// minimal density so only labelled structures remain visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    None,
    Body,
    Isolate,
}

/// Half-space carve in normalized grid coordinates. Voxels strictly on the
/// positive side of the plane are forced to the minimal density sentinel
/// before packing, whatever the mask mode.
#[derive(Debug, Clone, Copy)]
pub struct CuttingPlane {
    pub point: Vector3f,
    pub normal: Vector3f,
}

impl CuttingPlane {
    pub fn new(point: Vector3f, normal: Vector3f) -> Self {
        Self { point, normal }
    }

    pub fn cuts(&self, pos_norm: Vector3f) -> bool {
        (pos_norm - self.point).dot(&self.normal) > 0.0
    }
}

/// One packed voxel, 16 bits:
///
/// ```text
/// | density (15)           | isMask (1) |   unmasked
/// | density (8) | mask (7) | isMask (1) |   masked
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedVoxel(pub u16);

impl PackedVoxel {
    /// Unmasked encoding: 15-bit density, flag clear.
    pub fn pack_highp(density: u16) -> Self {
        PackedVoxel(density & 0xFFFE)
    }

    /// Masked encoding: 8-bit density in the top byte, 7-bit label, flag set.
    pub fn pack_lowp(density: u16, label: u8) -> Self {
        let density_bits = density & 0xFF00;
        let label_bits = ((label as u16) << 1) & 0x00FE;
        PackedVoxel(density_bits | label_bits | 0x0001)
    }

    pub fn is_mask(&self) -> bool {
        self.0 & 0x0001 != 0
    }

    pub fn label(&self) -> u8 {
        ((self.0 >> 1) & 0x7F) as u8
    }

    /// Density re-expanded to the full 16-bit range. Truncation error is at
    /// most 1 for the unmasked encoding and 255 for the masked one.
    pub fn density(&self) -> u16 {
        if self.is_mask() {
            self.0 & 0xFF00
        } else {
            self.0 & 0xFFFE
        }
    }

    pub fn density_norm(&self) -> Float {
        self.density() as Float / u16::MAX as Float
    }
}
