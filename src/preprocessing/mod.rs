//! Document image preprocessing for OCR readiness
//!
//! A fixed-order stage pipeline (grayscale, denoise, contrast, binarize,
//! deskew) driven by a validated [`StageConfig`].

pub mod config;
pub mod pipeline;
pub mod steps;

pub use config::StageConfig;
pub use pipeline::{decode, encode_png, process_bytes, run, Pipeline, PreprocessingResult, StepTiming};
