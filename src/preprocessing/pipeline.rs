use crate::error::PrepError;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder};
use serde::Serialize;
use std::time::Instant;

use super::config::StageConfig;
use super::steps;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed single-channel image (not serialized)
    #[serde(skip)]
    pub image: GrayImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Value of the cosmetic grayscale flag; conversion ran regardless
    pub grayscale_requested: bool,
    /// Deskew correction in degrees, when deskew ran and found ink
    pub deskew_angle: Option<f32>,
    /// Individual step timings, in execution order
    pub steps: Vec<StepTiming>,
}

/// Preprocessing pipeline: grayscale -> denoise -> contrast -> binarize -> deskew
///
/// The stage order is fixed; the config only switches optional stages on
/// and off. A `Pipeline` holds no per-run state and can be shared across
/// threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: StageConfig,
}

impl Pipeline {
    /// Validate the config once and build a pipeline around it
    pub fn new(config: StageConfig) -> Result<Self, PrepError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Process an image according to the configured stages
    pub fn process(&self, image: &DynamicImage) -> PreprocessingResult {
        let start = Instant::now();
        let mut steps_timing = Vec::new();
        let config = &self.config;

        // Always runs: every later stage needs single-channel input
        let mut img = run_step("grayscale", &mut steps_timing, || {
            steps::grayscale::apply(image)
        });

        if img.width() == 0 || img.height() == 0 {
            tracing::debug!("Zero-area image, skipping remaining stages");
            return PreprocessingResult {
                image: img,
                total_time_ms: start.elapsed().as_millis() as u64,
                grayscale_requested: config.use_grayscale,
                deskew_angle: None,
                steps: steps_timing,
            };
        }

        if config.use_denoise {
            let kernel = config.effective_denoise_kernel();
            if kernel != config.denoise_kernel {
                tracing::debug!(
                    "Denoise kernel {} promoted to {}",
                    config.denoise_kernel,
                    kernel
                );
            }
            img = run_step("denoise", &mut steps_timing, || {
                steps::denoise::apply(&img, kernel)
            });
        }

        if config.use_contrast {
            img = run_step("contrast", &mut steps_timing, || {
                steps::contrast::apply(&img, config.contrast_alpha, config.contrast_beta)
            });
        }

        if config.use_binarize {
            img = run_step("binarize", &mut steps_timing, || {
                steps::threshold::apply(&img, config.threshold)
            });
        }

        let mut deskew_angle = None;
        if config.use_deskew {
            let deskewed = run_step("deskew", &mut steps_timing, || steps::deskew::apply(&img));
            deskew_angle = deskewed.angle;
            img = deskewed.image;
        }

        PreprocessingResult {
            image: img,
            total_time_ms: start.elapsed().as_millis() as u64,
            grayscale_requested: config.use_grayscale,
            deskew_angle,
            steps: steps_timing,
        }
    }
}

fn run_step<T, F>(name: &str, timings: &mut Vec<StepTiming>, step_fn: F) -> T
where
    F: FnOnce() -> T,
{
    let step_start = Instant::now();
    let result = step_fn();
    let time_ms = step_start.elapsed().as_millis() as u64;
    tracing::debug!("Step {} took {}ms", name, time_ms);
    timings.push(StepTiming {
        name: name.to_string(),
        time_ms,
    });
    result
}

/// Run the pipeline once: validate `config`, then process `image`
pub fn run(image: &DynamicImage, config: &StageConfig) -> Result<GrayImage, PrepError> {
    Ok(Pipeline::new(config.clone())?.process(image).image)
}

/// Decode encoded image bytes (PNG, JPEG, BMP, ...) into a color image
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PrepError> {
    if bytes.is_empty() {
        return Err(PrepError::InputDecodeError(
            "input image data is empty".to_string(),
        ));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Encode a single-channel image as 8-bit grayscale PNG
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, PrepError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| PrepError::EncodeError(e.to_string()))?;
    Ok(buf)
}

/// Decode `bytes` and run the pipeline on the result
pub fn process_bytes(bytes: &[u8], pipeline: &Pipeline) -> Result<PreprocessingResult, PrepError> {
    let image = decode(bytes)?;
    Ok(pipeline.process(&image))
}
