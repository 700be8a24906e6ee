// Greedy non-max suppression
// Collapses duplicate detections from overlapping patches into one box per symbol

use crate::detection::types::Detection;

/// Default IoU above which two boxes are treated as the same symbol
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Greedy NMS over page-space detections
///
/// Algorithm:
/// 1. Stable sort by confidence, highest first
/// 2. Keep the first remaining detection
/// 3. Drop every remaining detection whose IoU with it exceeds `iou_threshold`
/// 4. Repeat until nothing remains
///
/// Equal confidences keep their input order. The result is in keep order.
pub fn apply_nms(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    let mut remaining: Vec<&Detection> = detections.iter().collect();
    remaining.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = Vec::new();
    while !remaining.is_empty() {
        let chosen = remaining.remove(0);
        remaining.retain(|other| chosen.bbox.iou(&other.bbox) <= iou_threshold);
        kept.push(chosen.clone());
    }

    if kept.len() < detections.len() {
        log::debug!(
            "NMS merged {} detections into {}",
            detections.len(),
            kept.len()
        );
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{BoundingBox, SymbolClass};

    fn det(confidence: f32, x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(
            SymbolClass::QuarterNote,
            confidence,
            BoundingBox::new(x1, y1, x2, y2),
        )
    }

    #[test]
    fn test_higher_confidence_survives_heavy_overlap() {
        // 100x10 boxes shifted by 5px: IoU = 95*10 / (2*1000 - 950) ~ 0.9
        let low = det(0.6, 5, 0, 104, 9);
        let high = det(0.9, 0, 0, 99, 9);
        assert!(high.bbox.iou(&low.bbox) > 0.9);

        let kept = apply_nms(&[low, high.clone()], DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept, vec![high]);
    }

    #[test]
    fn test_disjoint_boxes_all_kept() {
        let boxes = vec![
            det(0.3, 0, 0, 10, 10),
            det(0.9, 50, 0, 60, 10),
            det(0.5, 100, 0, 110, 10),
        ];
        let kept = apply_nms(&boxes, DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept.len(), 3);
        // Keep order is confidence order
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.5);
        assert_eq!(kept[2].confidence, 0.3);
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        let first = det(0.7, 0, 0, 20, 20);
        let second = det(0.7, 1, 1, 21, 21);
        let kept = apply_nms(&[first.clone(), second], DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept, vec![first]);
    }

    #[test]
    fn test_cross_patch_duplicates_collapse() {
        // Same symbol reported by two overlapping patches
        let a = det(0.8, 500, 100, 520, 140);
        let b = det(0.75, 500, 100, 520, 140);
        let kept = apply_nms(&[a.clone(), b], DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept, vec![a]);
    }

    #[test]
    fn test_idempotent() {
        let boxes = vec![
            det(0.9, 0, 0, 30, 30),
            det(0.8, 10, 10, 40, 40),
            det(0.7, 2, 2, 31, 31),
            det(0.6, 100, 100, 130, 130),
            det(0.5, 105, 100, 135, 130),
            det(0.4, 200, 0, 210, 10),
        ];

        let once = apply_nms(&boxes, DEFAULT_IOU_THRESHOLD);
        let twice = apply_nms(&once, DEFAULT_IOU_THRESHOLD);
        assert_eq!(once, twice);

        for (i, a) in once.iter().enumerate() {
            for b in &once[i + 1..] {
                assert!(a.bbox.iou(&b.bbox) <= DEFAULT_IOU_THRESHOLD);
            }
        }
    }

    #[test]
    fn test_nan_confidence_keeps_order_total() {
        let boxes: Vec<Detection> = (0..200)
            .map(|i| {
                let x = i * 20;
                let mut d = det((i % 97) as f32 / 100.0, x, 0, x + 10, 10);
                if i % 3 == 0 {
                    d.confidence = f32::NAN;
                }
                d
            })
            .collect();

        let kept = apply_nms(&boxes, DEFAULT_IOU_THRESHOLD);
        assert_eq!(kept.len(), boxes.len());

        let finite: Vec<f32> = kept
            .iter()
            .map(|d| d.confidence)
            .filter(|c| !c.is_nan())
            .collect();
        assert!(finite.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_empty_input() {
        assert!(apply_nms(&[], DEFAULT_IOU_THRESHOLD).is_empty());
    }
}
