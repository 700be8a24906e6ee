// Detector backend abstraction
// The symbol detector and note-head sub-detector are external models; the
// pipeline only sees them through these traits

use image::GrayImage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::detection::types::{BoundingBox, RawDetection};
use crate::page::tiler::Patch;

/// Errors reported by a detector backend
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector unavailable: {0}")]
    Unavailable(String),

    #[error("Detector timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Inference failed: {0}")]
    InferenceError(String),
}

/// Symbol detector run on a single patch
///
/// Boxes are returned in patch-local pixel coordinates. The patch carries its
/// page window for backends that need it; model backends only read the pixels.
/// Implementations must be deterministic for identical input so pipeline runs
/// are reproducible.
pub trait SymbolDetector: Send + Sync {
    fn detect(
        &self,
        patch: &Patch,
        confidence_floor: f32,
    ) -> Result<Vec<RawDetection>, DetectorError>;
}

/// Note-head sub-detector run inside a note's crop
///
/// Returns the first head box above the floor in crop coordinates, or `None`.
pub trait HeadDetector: Send + Sync {
    fn detect_head(
        &self,
        crop: &GrayImage,
        confidence_floor: f32,
    ) -> Result<Option<BoundingBox>, DetectorError>;
}

/// Detector handles injected into a pipeline run
#[derive(Clone)]
pub struct Detectors {
    pub symbols: Arc<dyn SymbolDetector>,
    pub heads: Arc<dyn HeadDetector>,
}

impl Detectors {
    pub fn new(symbols: Arc<dyn SymbolDetector>, heads: Arc<dyn HeadDetector>) -> Self {
        Detectors { symbols, heads }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::tiler::PatchWindow;

    struct Fixed(Vec<RawDetection>);

    impl SymbolDetector for Fixed {
        fn detect(&self, _: &Patch, floor: f32) -> Result<Vec<RawDetection>, DetectorError> {
            Ok(self.0.iter().filter(|d| d.confidence >= floor).cloned().collect())
        }
    }

    struct NoHead;

    impl HeadDetector for NoHead {
        fn detect_head(&self, _: &GrayImage, _: f32) -> Result<Option<BoundingBox>, DetectorError> {
            Ok(None)
        }
    }

    #[test]
    fn test_trait_objects_are_shareable() {
        let detectors = Detectors::new(
            Arc::new(Fixed(vec![
                RawDetection {
                    class_id: 4,
                    confidence: 0.9,
                    bbox: BoundingBox::new(0, 0, 5, 5),
                },
                RawDetection {
                    class_id: 4,
                    confidence: 0.1,
                    bbox: BoundingBox::new(0, 0, 5, 5),
                },
            ])),
            Arc::new(NoHead),
        );

        let patch = Patch {
            window: PatchWindow {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
            },
            pixels: GrayImage::new(8, 8),
        };
        let found = detectors.symbols.detect(&patch, 0.25).unwrap();
        assert_eq!(found.len(), 1);
        assert!(detectors
            .heads
            .detect_head(&patch.pixels, 0.01)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = DetectorError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
        let err = DetectorError::Unavailable("model server down".to_string());
        assert_eq!(err.to_string(), "Detector unavailable: model server down");
    }
}
