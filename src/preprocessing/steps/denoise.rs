use image::GrayImage;
use imageproc::filter::median_filter;

/// Apply a `kernel x kernel` median filter to reduce noise
/// Median filter preserves edges better than a mean filter; borders use
/// the nearest edge pixel. `kernel` must already be odd.
pub fn apply(image: &GrayImage, kernel: u32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let radius = kernel / 2;
    median_filter(image, radius, radius)
}
