//! Model Variant Selection
//!
//! Picks between a full-precision model and a reduced (quantized) one based
//! on what the host can run. Constrained hosts are mobile targets and 32-bit
//! targets; everything else gets the full variant unless overridden.

use serde::{Deserialize, Serialize};

/// Default full-precision model tag.
pub const DEFAULT_FULL_MODEL: &str = "qwen3:0.6b-fp16";

/// Default reduced (4-bit quantized) model tag.
pub const DEFAULT_REDUCED_MODEL: &str = "qwen3:0.6b-q4_K_M";

/// Operating systems treated as constrained execution environments.
const CONSTRAINED_OS: &[&str] = &["ios", "android"];

/// Which model variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Full,
    Reduced,
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelVariant::Full => f.write_str("full"),
            ModelVariant::Reduced => f.write_str("reduced"),
        }
    }
}

/// User preference for the variant; `Auto` defers to the capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VariantPreference {
    #[default]
    Auto,
    Full,
    Reduced,
}

impl std::str::FromStr for VariantPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(VariantPreference::Auto),
            "full" => Ok(VariantPreference::Full),
            "reduced" => Ok(VariantPreference::Reduced),
            other => Err(format!("unknown model variant: {}", other)),
        }
    }
}

/// Model identifiers for each variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub full: String,
    pub reduced: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            full: DEFAULT_FULL_MODEL.to_string(),
            reduced: DEFAULT_REDUCED_MODEL.to_string(),
        }
    }
}

impl ModelCatalog {
    pub fn model_for(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Full => &self.full,
            ModelVariant::Reduced => &self.reduced,
        }
    }
}

/// What the current host looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCapabilities {
    pub os: &'static str,
    pub arch: &'static str,
    pub pointer_width: u32,
}

impl RuntimeCapabilities {
    /// Probe the running process.
    pub fn detect() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            pointer_width: usize::BITS,
        }
    }

    /// Whether only the reduced variant should be attempted.
    pub fn is_constrained(&self) -> bool {
        CONSTRAINED_OS.contains(&self.os) || self.pointer_width < 64
    }
}

/// Resolve a preference against host capabilities.
pub fn select_variant(preference: VariantPreference, caps: &RuntimeCapabilities) -> ModelVariant {
    match preference {
        VariantPreference::Full => ModelVariant::Full,
        VariantPreference::Reduced => ModelVariant::Reduced,
        VariantPreference::Auto => {
            if caps.is_constrained() {
                ModelVariant::Reduced
            } else {
                ModelVariant::Full
            }
        }
    }
}
