use image::{DynamicImage, GrayImage, Luma, RgbImage};

/// Fixed-point BT.601 weights scaled by 2^14 (sum is exactly 16384)
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;

/// Convert image to single-channel intensity
/// Alpha is dropped first, then `0.299 R + 0.587 G + 0.114 B` is applied
pub fn apply(image: &DynamicImage) -> GrayImage {
    match image {
        // Already single channel: nothing to weight
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        _ => from_rgb(&image.to_rgb8()),
    }
}

/// BT.601 luma with rounding, matching the usual RGB-to-gray convention of
/// document tooling (not the Rec. 709 weights `image` uses by default)
pub fn from_rgb(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let weighted =
            r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT + (1 << (SHIFT - 1));
        Luma([(weighted >> SHIFT) as u8])
    })
}
