use crate::error::PrepError;
use serde::{Deserialize, Serialize};

/// Smallest effective median kernel
pub const MIN_DENOISE_KERNEL: u32 = 3;
/// Largest accepted median kernel (keeps the window well inside u8 images)
pub const MAX_DENOISE_KERNEL: u32 = 255;

/// Stage selection and per-stage parameters for one pipeline run.
///
/// Built once per request and validated at the boundary with
/// [`StageConfig::validate`]; the pipeline never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Cosmetic: grayscale conversion always runs because every later
    /// stage needs single-channel input. Echoed back in the result.
    pub use_grayscale: bool,
    pub use_denoise: bool,
    /// Median window side. Even values are promoted to the next odd value.
    pub denoise_kernel: u32,
    pub use_contrast: bool,
    /// Contrast gain, must be positive
    pub contrast_alpha: f32,
    /// Brightness offset added after the gain
    pub contrast_beta: f32,
    pub use_binarize: bool,
    /// Pixels strictly above this value become 255, the rest 0
    pub threshold: u8,
    pub use_deskew: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            use_grayscale: true,
            use_denoise: true,
            denoise_kernel: 5,
            use_contrast: true,
            contrast_alpha: 1.5,
            contrast_beta: 0.0,
            use_binarize: true,
            threshold: 160,
            use_deskew: true,
        }
    }
}

impl StageConfig {
    /// Config with every optional stage switched off (grayscale still runs)
    pub fn passthrough() -> Self {
        Self {
            use_denoise: false,
            use_contrast: false,
            use_binarize: false,
            use_deskew: false,
            ..Self::default()
        }
    }

    /// Kernel actually handed to the median filter
    pub fn effective_denoise_kernel(&self) -> u32 {
        effective_kernel(self.denoise_kernel)
    }

    /// Reject parameters outside their documented domain
    pub fn validate(&self) -> Result<(), PrepError> {
        if self.effective_denoise_kernel() < MIN_DENOISE_KERNEL {
            return Err(PrepError::ConfigurationError(format!(
                "denoise_kernel must be at least {} (got {})",
                MIN_DENOISE_KERNEL - 1,
                self.denoise_kernel
            )));
        }
        if self.denoise_kernel > MAX_DENOISE_KERNEL {
            return Err(PrepError::ConfigurationError(format!(
                "denoise_kernel must be at most {} (got {})",
                MAX_DENOISE_KERNEL, self.denoise_kernel
            )));
        }
        if !self.contrast_alpha.is_finite() || self.contrast_alpha <= 0.0 {
            return Err(PrepError::ConfigurationError(format!(
                "contrast_alpha must be a positive number (got {})",
                self.contrast_alpha
            )));
        }
        if !self.contrast_beta.is_finite() {
            return Err(PrepError::ConfigurationError(format!(
                "contrast_beta must be finite (got {})",
                self.contrast_beta
            )));
        }
        Ok(())
    }

    /// Apply a single `name=value` override, as sent by form-based clients.
    ///
    /// Parsing failures and unknown names are configuration errors; range
    /// checks are left to [`StageConfig::validate`].
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), PrepError> {
        let value = value.trim();
        match name {
            "use_grayscale" => self.use_grayscale = parse_flag(name, value)?,
            "use_denoise" => self.use_denoise = parse_flag(name, value)?,
            "denoise_kernel" => {
                let kernel: i64 = parse_number(name, value)?;
                self.denoise_kernel = u32::try_from(kernel).map_err(|_| {
                    PrepError::ConfigurationError(format!(
                        "denoise_kernel must be a positive integer (got {})",
                        kernel
                    ))
                })?;
            }
            "use_contrast" => self.use_contrast = parse_flag(name, value)?,
            "contrast_alpha" => self.contrast_alpha = parse_number(name, value)?,
            "contrast_beta" => self.contrast_beta = parse_number(name, value)?,
            "use_binarize" => self.use_binarize = parse_flag(name, value)?,
            "threshold" => {
                let thresh: i64 = parse_number(name, value)?;
                self.threshold = u8::try_from(thresh).map_err(|_| {
                    PrepError::ConfigurationError(format!(
                        "threshold must be in 0..=255 (got {})",
                        thresh
                    ))
                })?;
            }
            "use_deskew" => self.use_deskew = parse_flag(name, value)?,
            _ => {
                return Err(PrepError::ConfigurationError(format!(
                    "unknown configuration field '{}'",
                    name
                )))
            }
        }
        Ok(())
    }

    /// Names accepted by [`StageConfig::set_field`]
    pub const FIELDS: [&'static str; 9] = [
        "use_grayscale",
        "use_denoise",
        "denoise_kernel",
        "use_contrast",
        "contrast_alpha",
        "contrast_beta",
        "use_binarize",
        "threshold",
        "use_deskew",
    ];
}

/// Promote even kernel sizes to the next odd value
pub fn effective_kernel(kernel: u32) -> u32 {
    if kernel % 2 == 0 {
        kernel.saturating_add(1)
    } else {
        kernel
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, PrepError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(PrepError::ConfigurationError(format!(
            "{} must be a boolean (got '{}')",
            name, value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, PrepError> {
    value.parse().map_err(|_| {
        PrepError::ConfigurationError(format!("{} must be a number (got '{}')", name, value))
    })
}
