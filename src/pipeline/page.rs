// Page pipeline
// Runs one score page from pixels to a monophonic note timeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, PipelineConfig};
use crate::detection::{aggregate_detections, apply_nms, AggregateError, Detection, Detectors};
use crate::page::{ingest_page, PageImage, PageImageError, PatchGrid};
use crate::pipeline::explainability::DetectionDecision;
use crate::pipeline::trace::{PageStage, TraceBuilder, TraceEntry, TraceWriter};
use crate::pitch::{PitchResolver, ResolvedNote, Unresolved};
use crate::staff::{locate_staves, StaffBlock};
use crate::timeline::{build_timeline, timeline_length, TimelineEvent};

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Page image error: {0}")]
    Image(#[from] PageImageError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Detection failed: {0}")]
    Detection(#[from] AggregateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Every patch was inferred and at least one staff was found
    Complete,
    /// Some patches failed; the timeline may be missing notes
    Degraded,
    /// No staff was found; no note could be pitched
    NoStaff,
}

/// Counters for everything the pipeline dropped or substituted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    pub patches_total: usize,
    pub patches_failed: usize,
    pub raw_detections: usize,
    pub merged_detections: usize,
    pub unknown_classes: usize,
    pub invalid_boxes: usize,
    pub rests_skipped: usize,
    pub heads_not_found: usize,
    pub undecodable_no_staff: usize,
    pub pitch_fallbacks: usize,
    pub notes_resolved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub page_id: Uuid,
    pub processed_at: DateTime<Utc>,
    pub source_sha256: String,
    pub width: u32,
    pub height: u32,
    pub status: PageStatus,
    pub staff_blocks: Vec<StaffBlock>,

    /// Detections after duplicate merging, in merge order
    pub detections: Vec<Detection>,

    /// Resolved notes in merge order
    pub notes: Vec<ResolvedNote>,

    pub timeline: Vec<TimelineEvent>,
    pub report: PageReport,

    /// One entry per merged detection
    pub decisions: Vec<DetectionDecision>,
}

fn record(trace: Option<&TraceWriter>, entry: TraceEntry) {
    if let Some(writer) = trace {
        writer.record(entry);
    }
}

/// Decode an encoded page image and process it
pub async fn process_page_bytes(
    data: &[u8],
    detectors: &Detectors,
    config: &PipelineConfig,
    trace: Option<&TraceWriter>,
) -> Result<PageResult, PageError> {
    let page = ingest_page(data)?;
    process_page(&page, detectors, config, trace).await
}

/// Process one page: tile, detect, merge, locate staves, resolve, sequence
///
/// Fails only when the configuration is unusable, the page is smaller than a
/// patch, or too few patches could be inferred. Everything dropped along the
/// way is counted in the report and explained in the decisions.
pub async fn process_page(
    page: &PageImage,
    detectors: &Detectors,
    config: &PipelineConfig,
    trace: Option<&TraceWriter>,
) -> Result<PageResult, PageError> {
    config.validate()?;

    let page_id = Uuid::new_v4();
    let pixels = &page.pixels;
    log::info!(
        "Processing page {} ({}x{}, sha256 {})",
        page_id,
        page.width(),
        page.height(),
        page.source_sha256
    );

    // Tiling
    let tiling = &config.tiling;
    let grid = PatchGrid::new(
        page.width(),
        page.height(),
        (tiling.patch_width, tiling.patch_height),
        (tiling.stride_x, tiling.stride_y),
    )
    .map_err(AggregateError::from)?;
    record(
        trace,
        TraceBuilder::stage(page_id, PageStage::Tiling).complete_with(
            format!("{} patches", grid.patch_count()),
            serde_json::json!({
                "patches": grid.patch_count(),
                "patch_size": [tiling.patch_width, tiling.patch_height],
                "stride": [tiling.stride_x, tiling.stride_y],
            }),
        ),
    );

    // Detection
    record(
        trace,
        TraceBuilder::stage(page_id, PageStage::Detection).start("Running symbol detector"),
    );
    let aggregated = aggregate_detections(
        pixels,
        detectors.symbols.clone(),
        &config.tiling,
        &config.detection,
    )
    .await?;
    record(
        trace,
        TraceBuilder::stage(page_id, PageStage::Detection).complete_with(
            format!("{} detections", aggregated.detections.len()),
            serde_json::json!({
                "patches_failed": aggregated.patches_failed,
                "raw_detections": aggregated.raw_detections,
                "unknown_classes": aggregated.unknown_classes,
            }),
        ),
    );

    let mut report = PageReport {
        patches_total: aggregated.patches_total,
        patches_failed: aggregated.patches_failed,
        raw_detections: aggregated.raw_detections,
        unknown_classes: aggregated.unknown_classes,
        invalid_boxes: aggregated.invalid_boxes,
        ..Default::default()
    };

    // Merge
    let detections = apply_nms(&aggregated.detections, config.merge.iou_threshold);
    report.merged_detections = detections.len();
    record(
        trace,
        TraceBuilder::stage(page_id, PageStage::Merge)
            .complete(format!("{} -> {} detections", aggregated.detections.len(), detections.len())),
    );

    // Staff
    let staff_blocks = locate_staves(pixels, &config.staff);
    record(
        trace,
        TraceBuilder::stage(page_id, PageStage::Staff).complete_with(
            format!("{} staff blocks", staff_blocks.len()),
            serde_json::json!({
                "rows": staff_blocks.iter().map(|b| b.rows().to_vec()).collect::<Vec<_>>(),
            }),
        ),
    );

    // Resolve
    let resolver = PitchResolver::new(&staff_blocks, page.height());
    let mut notes = Vec::new();
    let mut decisions = Vec::with_capacity(detections.len());

    for (index, detection) in detections.iter().enumerate() {
        let resolution = resolver.resolve(
            pixels,
            detection,
            detectors.heads.as_ref(),
            config.detection.head_confidence_floor,
        );

        match &resolution {
            Ok(note) => {
                if note.pitch_fallback {
                    report.pitch_fallbacks += 1;
                }
                notes.push(note.clone());
            }
            Err(Unresolved::NotANote) => report.rests_skipped += 1,
            Err(Unresolved::HeadNotFound) => report.heads_not_found += 1,
            Err(Unresolved::NoStaff) => report.undecodable_no_staff += 1,
        }

        decisions.push(DetectionDecision::from_resolution(index, detection, &resolution));
    }
    report.notes_resolved = notes.len();
    record(
        trace,
        TraceBuilder::stage(page_id, PageStage::Resolve).complete_with(
            format!("{} notes resolved", notes.len()),
            serde_json::json!({
                "rests_skipped": report.rests_skipped,
                "heads_not_found": report.heads_not_found,
                "undecodable_no_staff": report.undecodable_no_staff,
                "pitch_fallbacks": report.pitch_fallbacks,
            }),
        ),
    );

    // Timeline
    let timeline = build_timeline(&notes);
    record(
        trace,
        TraceBuilder::stage(page_id, PageStage::Timeline).complete(format!(
            "{} events, length {}",
            timeline.len(),
            timeline_length(&timeline)
        )),
    );

    let status = if staff_blocks.is_empty() {
        PageStatus::NoStaff
    } else if aggregated.is_degraded() {
        PageStatus::Degraded
    } else {
        PageStatus::Complete
    };

    log::info!(
        "Page {} {:?}: {} notes from {} detections ({} rests, {} without head, {} without staff)",
        page_id,
        status,
        report.notes_resolved,
        report.merged_detections,
        report.rests_skipped,
        report.heads_not_found,
        report.undecodable_no_staff
    );

    Ok(PageResult {
        page_id,
        processed_at: Utc::now(),
        source_sha256: page.source_sha256.clone(),
        width: page.width(),
        height: page.height(),
        status,
        staff_blocks,
        detections,
        notes,
        timeline,
        report,
        decisions,
    })
}
