// Pipeline configuration
// Tunables for every stage, loadable from TOML

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::timeline::MidiExportOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub tiling: TilingConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub staff: StaffConfig,

    #[serde(default)]
    pub export: MidiExportOptions,
}

/// Patch geometry for the symbol detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Patch width and height in pixels (detector input size)
    pub patch_width: u32,
    pub patch_height: u32,

    /// Step between patch origins; smaller than the patch for overlap
    pub stride_x: u32,
    pub stride_y: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        TilingConfig {
            patch_width: 640,
            patch_height: 640,
            stride_x: 480,
            stride_y: 480,
        }
    }
}

/// External detector invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum confidence passed to the symbol detector [0.0, 1.0]
    pub confidence_floor: f32,

    /// Minimum confidence passed to the note-head sub-detector [0.0, 1.0]
    pub head_confidence_floor: f32,

    /// Per-patch detector timeout in milliseconds
    pub timeout_ms: u64,

    /// Upper bound on concurrent patch inferences
    pub max_concurrent_patches: usize,

    /// Fraction of patches that must succeed for the page to be usable [0.0, 1.0]
    pub min_patch_coverage: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            confidence_floor: 0.25,
            head_confidence_floor: 0.01,
            timeout_ms: 30_000,
            max_concurrent_patches: 4,
            min_patch_coverage: 0.5,
        }
    }
}

/// Box merging (NMS) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Boxes overlapping a kept box by more than this IoU are dropped
    pub iou_threshold: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig { iou_threshold: 0.5 }
    }
}

/// Staff-line detection and clustering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffConfig {
    /// Gray level at or below which a pixel counts as ink
    pub binarize_threshold: u8,

    /// Horizontal line element is page_width / opening_divisor pixels long
    pub opening_divisor: u32,

    /// A row is a staff-line candidate when its ink count exceeds this share of the width
    pub row_fill_ratio: f32,

    /// Maximum gap between consecutive candidate rows of the same staff
    pub cluster_threshold: u32,

    /// Lines per staff
    pub group_size: usize,
}

impl Default for StaffConfig {
    fn default() -> Self {
        StaffConfig {
            binarize_threshold: 127,
            opening_divisor: 15,
            row_fill_ratio: 0.5,
            cluster_threshold: 12,
            group_size: 5,
        }
    }
}

impl PipelineConfig {
    /// Load a TOML config file, validating it
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load config from disk or fall back to defaults
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config {}: {}", path.display(), e);
                }
            }
        }

        Self::default()
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save config to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tiling;
        if t.patch_width == 0 || t.patch_height == 0 {
            return Err(ConfigError::Invalid("patch size must be non-zero".to_string()));
        }
        if t.stride_x == 0 || t.stride_y == 0 {
            return Err(ConfigError::Invalid("stride must be non-zero".to_string()));
        }

        let d = &self.detection;
        for (name, value) in [
            ("confidence_floor", d.confidence_floor),
            ("head_confidence_floor", d.head_confidence_floor),
            ("min_patch_coverage", d.min_patch_coverage),
            ("iou_threshold", self.merge.iou_threshold),
            ("row_fill_ratio", self.staff.row_fill_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if d.max_concurrent_patches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_patches must be at least 1".to_string(),
            ));
        }
        if d.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be non-zero".to_string()));
        }

        if self.staff.group_size == 0 {
            return Err(ConfigError::Invalid("group_size must be at least 1".to_string()));
        }
        if self.staff.opening_divisor == 0 {
            return Err(ConfigError::Invalid(
                "opening_divisor must be non-zero".to_string(),
            ));
        }

        if self.export.ppq == 0 || self.export.bpm <= 0.0 {
            return Err(ConfigError::Invalid(
                "export ppq and bpm must be positive".to_string(),
            ));
        }
        if self.export.velocity > 127 || self.export.program > 127 {
            return Err(ConfigError::Invalid(
                "export velocity and program must be 7-bit values".to_string(),
            ));
        }

        Ok(())
    }
}
