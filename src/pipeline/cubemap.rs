// Copyright @yucwang 2026

use std::path::Path;

use crate::math::bitmap::Bitmap;
use crate::math::constants::{ Float, Vector3f };

const FACE_STEMS: [&str; 6] = ["posx", "negx", "posy", "negy", "posz", "negz"];

/// Six-face environment map sampled by direction. Face order follows the
/// usual +x/-x/+y/-y/+z/-z convention.
pub struct Cubemap {
    faces: [Bitmap; 6],
    size: usize,
}

impl Cubemap {
    /// Uniform environment, used headless and in tests.
    pub fn constant(color: Vector3f) -> Self {
        let mut face = Bitmap::new(1, 1);
        face[(0, 0)] = color;
        Self {
            faces: [
                face.clone(), face.clone(), face.clone(),
                face.clone(), face.clone(), face,
            ],
            size: 1,
        }
    }

    /// Load `posx`/`negx`/`posy`/`negy`/`posz`/`negz` images from a folder.
    /// Any format the image decoder accepts works; all faces must be square
    /// and the same size.
    pub fn from_folder(folder: &Path) -> Result<Self, String> {
        let mut faces: Vec<Bitmap> = Vec::with_capacity(6);
        let mut size = 0usize;

        for stem in FACE_STEMS.iter() {
            let path = find_face_file(folder, stem)
                .ok_or_else(|| format!("cubemap face {} not found in {}", stem, folder.display()))?;
            let decoded = image::open(&path)
                .map_err(|e| format!("failed to decode {}: {}", path.display(), e))?
                .to_rgb32f();

            let (w, h) = decoded.dimensions();
            if w != h {
                return Err(format!("cubemap face {} is not square: {}x{}", stem, w, h));
            }
            if size == 0 {
                size = w as usize;
            } else if size != w as usize {
                return Err(format!("cubemap face {} size differs: {} vs {}", stem, w, size));
            }

            let mut face = Bitmap::new(w as usize, h as usize);
            for y in 0..h as usize {
                for x in 0..w as usize {
                    let pixel = decoded.get_pixel(x as u32, y as u32);
                    face[(x, y)] = Vector3f::new(pixel[0], pixel[1], pixel[2]);
                }
            }
            faces.push(face);
        }

        use std::convert::TryInto;
        let faces: [Bitmap; 6] = faces.try_into()
            .map_err(|_| "expected 6 cubemap faces".to_string())?;
        Ok(Self { faces, size })
    }

    pub fn sample(&self, dir: Vector3f) -> Vector3f {
        let ax = dir.x.abs();
        let ay = dir.y.abs();
        let az = dir.z.abs();

        // Major-axis face selection with the standard (sc, tc, ma) mapping.
        let (face, sc, tc, ma) = if ax >= ay && ax >= az {
            if dir.x > 0.0 {
                (0, -dir.z, -dir.y, ax)
            } else {
                (1, dir.z, -dir.y, ax)
            }
        } else if ay >= az {
            if dir.y > 0.0 {
                (2, dir.x, dir.z, ay)
            } else {
                (3, dir.x, -dir.z, ay)
            }
        } else {
            if dir.z > 0.0 {
                (4, dir.x, -dir.y, az)
            } else {
                (5, -dir.x, -dir.y, az)
            }
        };

        if ma <= 0.0 {
            return Vector3f::zeros();
        }

        let u = 0.5 * (sc / ma + 1.0);
        let v = 0.5 * (tc / ma + 1.0);
        let x = ((u * self.size as Float) as usize).min(self.size - 1);
        let y = ((v * self.size as Float) as usize).min(self.size - 1);
        self.faces[face][(x, y)]
    }
}

fn find_face_file(folder: &Path, stem: &str) -> Option<std::path::PathBuf> {
    let entries = std::fs::read_dir(folder).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let matches = path.file_stem()
            .map(|s| s.to_string_lossy().eq_ignore_ascii_case(stem))
            .unwrap_or(false);
        if matches {
            return Some(path);
        }
    }
    None
}
