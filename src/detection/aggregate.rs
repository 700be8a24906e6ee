// Detection aggregator
// Runs the symbol detector over every patch and restores boxes to page coordinates

use image::GrayImage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::config::{DetectionConfig, TilingConfig};
use crate::detection::backend::{DetectorError, SymbolDetector};
use crate::detection::types::{Detection, RawDetection, SymbolClass};
use crate::page::tiler::{split_into_patches, Patch, PatchGrid, PatchWindow, TilingError};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Tiling failed: {0}")]
    Tiling(#[from] TilingError),

    #[error("Page {width}x{height} is smaller than one {patch_width}x{patch_height} patch")]
    NoPatches {
        width: u32,
        height: u32,
        patch_width: u32,
        patch_height: u32,
    },

    #[error("Detector unavailable: {failed} of {total} patches failed (last error: {last_error})")]
    DetectorUnavailable {
        failed: usize,
        total: usize,
        last_error: String,
    },
}

/// Page-space detections plus per-patch bookkeeping
#[derive(Debug, Clone, Default)]
pub struct AggregatedDetections {
    /// Decoded detections in patch order, duplicates included
    pub detections: Vec<Detection>,

    pub patches_total: usize,
    pub patches_failed: usize,

    /// Raw boxes returned by the detector before decoding
    pub raw_detections: usize,

    /// Boxes whose class id the model table does not know
    pub unknown_classes: usize,

    /// Boxes with x1 >= x2 or y1 >= y2
    pub invalid_boxes: usize,
}

impl AggregatedDetections {
    pub fn is_degraded(&self) -> bool {
        self.patches_failed > 0
    }
}

/// Run the detector over every patch of the page
///
/// Patches are inferred concurrently (bounded by `max_concurrent_patches`),
/// each under the configured timeout. A failed or timed-out patch contributes
/// no detections. Results are assembled in patch order so the output does not
/// depend on completion order.
pub async fn aggregate_detections(
    page: &GrayImage,
    detector: Arc<dyn SymbolDetector>,
    tiling: &TilingConfig,
    detection: &DetectionConfig,
) -> Result<AggregatedDetections, AggregateError> {
    let patch_size = (tiling.patch_width, tiling.patch_height);
    let stride = (tiling.stride_x, tiling.stride_y);

    let total = PatchGrid::new(page.width(), page.height(), patch_size, stride)?.patch_count();
    if total == 0 {
        return Err(AggregateError::NoPatches {
            width: page.width(),
            height: page.height(),
            patch_width: tiling.patch_width,
            patch_height: tiling.patch_height,
        });
    }

    let semaphore = Arc::new(Semaphore::new(detection.max_concurrent_patches.max(1)));
    let timeout = Duration::from_millis(detection.timeout_ms);
    let floor = detection.confidence_floor;

    let mut tasks = JoinSet::new();
    for (index, patch) in split_into_patches(page, patch_size, stride)?.enumerate() {
        let detector = Arc::clone(&detector);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let permit = semaphore.acquire_owned().await.ok();
            let window = patch.window;
            let result = detect_patch(detector, patch, permit, floor, timeout).await;
            (index, window, result)
        });
    }

    let mut per_patch: Vec<Option<(PatchWindow, Vec<RawDetection>)>> = vec![None; total];
    let mut failed = 0usize;
    let mut last_error = String::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, window, Ok(raw))) => {
                per_patch[index] = Some((window, raw));
            }
            Ok((index, window, Err(e))) => {
                log::warn!(
                    "Patch {} at ({}, {}) failed: {}",
                    index,
                    window.x,
                    window.y,
                    e
                );
                failed += 1;
                last_error = e.to_string();
            }
            Err(e) => {
                log::warn!("Patch task aborted: {}", e);
                failed += 1;
                last_error = e.to_string();
            }
        }
    }

    let succeeded = total - failed;
    let coverage = succeeded as f32 / total as f32;
    if succeeded == 0 || coverage < detection.min_patch_coverage {
        return Err(AggregateError::DetectorUnavailable {
            failed,
            total,
            last_error,
        });
    }

    let mut aggregated = AggregatedDetections {
        patches_total: total,
        patches_failed: failed,
        ..Default::default()
    };

    for (window, raw) in per_patch.into_iter().flatten() {
        aggregated.raw_detections += raw.len();
        for r in &raw {
            if SymbolClass::from_class_id(r.class_id).is_none() {
                aggregated.unknown_classes += 1;
                continue;
            }
            match Detection::from_raw(r, window.x as i32, window.y as i32) {
                Some(d) => aggregated.detections.push(d),
                None => aggregated.invalid_boxes += 1,
            }
        }
    }

    log::info!(
        "Aggregated {} detections from {}/{} patches ({} unknown classes, {} invalid boxes)",
        aggregated.detections.len(),
        succeeded,
        total,
        aggregated.unknown_classes,
        aggregated.invalid_boxes
    );

    Ok(aggregated)
}

/// Run one blocking detector call under a timeout
///
/// The permit moves into the blocking call and is released only when the
/// detector returns, so a timed-out call still counts against the bound.
async fn detect_patch(
    detector: Arc<dyn SymbolDetector>,
    patch: Patch,
    permit: Option<OwnedSemaphorePermit>,
    confidence_floor: f32,
    timeout: Duration,
) -> Result<Vec<RawDetection>, DetectorError> {
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        detector.detect(&patch, confidence_floor)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(DetectorError::InferenceError(join_error.to_string())),
        Err(_) => Err(DetectorError::Timeout(timeout)),
    }
}
