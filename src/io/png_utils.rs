// Copyright @yucwang 2026

use crate::math::bitmap::Bitmap;

// Display transform applied at export: clamp, gamma encode, quantize.
const GAMMA: f32 = 2.2;

pub fn write_png_to_file(image: &Bitmap, file_path: &str) {
    log::info!("Starting writing png image: {}.", file_path);

    let width = image.width();
    let height = image.height();
    let mut bytes = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let pixel = image[(x, y)];
            for c in 0..3 {
                let v = pixel[c].clamp(0.0, 1.0).powf(1.0 / GAMMA);
                bytes.push((v * 255.0 + 0.5) as u8);
            }
        }
    }

    let write_result = image::save_buffer(
        file_path,
        &bytes,
        width as u32,
        height as u32,
        image::ColorType::Rgb8,
    );
    match write_result {
        Ok(()) => println!("PNG written to: {}.", file_path),
        Err(e) => println!("PNG written error: {}.", e.to_string())
    }
}
