use image::{GrayImage, Luma};

/// Affine contrast/brightness remap: `v' = clamp(round(alpha * v + beta), 0, 255)`
/// Saturates at the 0-255 bounds instead of wrapping
pub fn apply(image: &GrayImage, alpha: f32, beta: f32) -> GrayImage {
    let lut = build_lut(alpha, beta);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([lut[image.get_pixel(x, y).0[0] as usize]])
    })
}

/// Intensity lookup table, one entry per input level
fn build_lut(alpha: f32, beta: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        *slot = scale_level(v as u8, alpha, beta);
    }
    lut
}

/// Remap a single intensity level
pub fn scale_level(v: u8, alpha: f32, beta: f32) -> u8 {
    let scaled = (alpha * v as f32 + beta).round();
    // NaN falls through both comparisons; treat it as black
    if scaled >= 255.0 {
        255
    } else if scaled > 0.0 {
        scaled as u8
    } else {
        0
    }
}
