// Symbol detection module
// Detector traits, decoded detections, patch aggregation and duplicate merging

pub mod aggregate;
pub mod backend;
pub mod heuristic;
pub mod nms;
pub mod replay;
pub mod types;

pub use aggregate::{aggregate_detections, AggregateError, AggregatedDetections};
pub use backend::{DetectorError, Detectors, HeadDetector, SymbolDetector};
pub use heuristic::InkHeadDetector;
pub use nms::{apply_nms, DEFAULT_IOU_THRESHOLD};
pub use replay::ReplayDetector;
pub use types::{BoundingBox, Detection, RawDetection, SymbolClass};
