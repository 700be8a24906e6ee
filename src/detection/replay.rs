// Replay detector
// Serves recorded page-space detections back through the patch interface

use std::path::Path;

use crate::detection::backend::{DetectorError, SymbolDetector};
use crate::detection::types::RawDetection;
use crate::page::tiler::Patch;

/// Symbol detector backed by a fixed list of page-space boxes
///
/// Each patch is answered with the boxes lying fully inside its window,
/// translated to patch coordinates. Overlapping windows therefore report the
/// same symbol more than once, exactly like a real model would.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    detections: Vec<RawDetection>,
}

impl ReplayDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        ReplayDetector { detections }
    }

    /// Parse a JSON array of `{class_id, confidence, bbox: {x1, y1, x2, y2}}`
    pub fn from_json_str(json: &str) -> Result<Self, DetectorError> {
        let detections: Vec<RawDetection> = serde_json::from_str(json)
            .map_err(|e| DetectorError::ModelLoadError(format!("invalid detections JSON: {}", e)))?;
        Ok(ReplayDetector { detections })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DetectorError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DetectorError::ModelLoadError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let detector = Self::from_json_str(&contents)?;
        log::info!(
            "Loaded {} recorded detections from {}",
            detector.len(),
            path.display()
        );
        Ok(detector)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl SymbolDetector for ReplayDetector {
    fn detect(
        &self,
        patch: &Patch,
        confidence_floor: f32,
    ) -> Result<Vec<RawDetection>, DetectorError> {
        let window = &patch.window;
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= confidence_floor)
            .filter(|d| window.contains(d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2))
            .map(|d| RawDetection {
                class_id: d.class_id,
                confidence: d.confidence,
                bbox: d.bbox.translate(-(window.x as i32), -(window.y as i32)),
            })
            .collect())
    }
}
