use image::{GrayImage, Luma};

/// Maximum intensity, used for foreground pixels
pub const MAX_VALUE: u8 = 255;

/// Fixed global threshold: `v > thresh` becomes 255, everything else 0
pub fn apply(image: &GrayImage, thresh: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > thresh {
            Luma([MAX_VALUE])
        } else {
            Luma([0])
        }
    })
}

/// Inverted binary threshold: `v > thresh` becomes 0, everything else 255
pub fn apply_inverted(image: &GrayImage, thresh: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > thresh {
            Luma([0])
        } else {
            Luma([MAX_VALUE])
        }
    })
}
