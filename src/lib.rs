//! Document image preprocessing for OCR, plus the photo archive glue
//!
//! The [`preprocessing`] pipeline is pure and synchronous; [`server`]
//! exposes it over HTTP.

pub mod archive;
pub mod config;
pub mod error;
pub mod preprocessing;
pub mod server;

pub use error::PrepError;
pub use preprocessing::{Pipeline, PreprocessingResult, StageConfig};
