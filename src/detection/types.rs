// Detection types
// Symbol classes, bounding boxes and page-space detections

use serde::{Deserialize, Serialize};

/// Classification of detected score symbols
/// Decoded once from the detector's numeric class id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolClass {
    EighthNote,
    EighthRest,
    HalfNote,
    HalfRest,
    QuarterNote,
    QuarterRest,
    SixteenthNote,
    WholeNote,
    WholeRest,
}

impl SymbolClass {
    /// All classes in detector id order
    pub const ALL: [SymbolClass; 9] = [
        SymbolClass::EighthNote,
        SymbolClass::EighthRest,
        SymbolClass::HalfNote,
        SymbolClass::HalfRest,
        SymbolClass::QuarterNote,
        SymbolClass::QuarterRest,
        SymbolClass::SixteenthNote,
        SymbolClass::WholeNote,
        SymbolClass::WholeRest,
    ];

    /// Decode a detector class id, `None` for ids the model does not emit
    pub fn from_class_id(class_id: u32) -> Option<Self> {
        Self::ALL.get(class_id as usize).copied()
    }

    /// Detector class id for this class
    pub fn class_id(&self) -> u32 {
        Self::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or_default() as u32
    }

    /// Parse the snake_case label used by the detector's dataset
    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "eighth_note" => Some(SymbolClass::EighthNote),
            "eighth_rest" => Some(SymbolClass::EighthRest),
            "half_note" => Some(SymbolClass::HalfNote),
            "half_rest" => Some(SymbolClass::HalfRest),
            "quarter_note" => Some(SymbolClass::QuarterNote),
            "quarter_rest" => Some(SymbolClass::QuarterRest),
            "sixteenth_note" => Some(SymbolClass::SixteenthNote),
            "whole_note" => Some(SymbolClass::WholeNote),
            "whole_rest" => Some(SymbolClass::WholeRest),
            _ => None,
        }
    }

    /// Dataset label (snake_case)
    pub fn label(&self) -> &'static str {
        match self {
            SymbolClass::EighthNote => "eighth_note",
            SymbolClass::EighthRest => "eighth_rest",
            SymbolClass::HalfNote => "half_note",
            SymbolClass::HalfRest => "half_rest",
            SymbolClass::QuarterNote => "quarter_note",
            SymbolClass::QuarterRest => "quarter_rest",
            SymbolClass::SixteenthNote => "sixteenth_note",
            SymbolClass::WholeNote => "whole_note",
            SymbolClass::WholeRest => "whole_rest",
        }
    }

    /// Rests are never pitched and never reach the timeline
    pub fn is_rest(&self) -> bool {
        matches!(
            self,
            SymbolClass::EighthRest
                | SymbolClass::HalfRest
                | SymbolClass::QuarterRest
                | SymbolClass::WholeRest
        )
    }

    /// Note duration in quarter-note table units, `None` for rests
    pub fn duration(&self) -> Option<f64> {
        match self {
            SymbolClass::WholeNote => Some(2.0),
            SymbolClass::HalfNote => Some(1.0),
            SymbolClass::QuarterNote => Some(0.5),
            SymbolClass::EighthNote => Some(0.25),
            SymbolClass::SixteenthNote => Some(0.125),
            _ => None,
        }
    }
}

/// Axis-aligned pixel rectangle, corners inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        BoundingBox { x1, y1, x2, y2 }
    }

    /// True when x1 < x2 and y1 < y2
    pub fn is_valid(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Shift all four corners by an offset
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        BoundingBox {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Inclusive pixel-count area
    pub fn area(&self) -> i64 {
        let w = (self.x2 - self.x1 + 1).max(0) as i64;
        let h = (self.y2 - self.y1 + 1).max(0) as i64;
        w * h
    }

    /// Intersection over union with inclusive pixel-count rectangles
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let xa = self.x1.max(other.x1);
        let ya = self.y1.max(other.y1);
        let xb = self.x2.min(other.x2);
        let yb = self.y2.min(other.y2);

        let inter = (xb - xa + 1).max(0) as i64 * (yb - ya + 1).max(0) as i64;
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }

    /// Horizontal center, truncated like the detector's pixel grid
    pub fn x_center(&self) -> i32 {
        (self.x1 + self.x2) / 2
    }

    pub fn y_center(&self) -> i32 {
        (self.y1 + self.y2) / 2
    }

    /// Clamp the box to an image of the given size
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = width as i32;
        let h = height as i32;
        BoundingBox {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
        }
    }
}

/// Detector output in patch-local coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A decoded detection in page coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Decoded symbol class
    pub class: SymbolClass,

    /// Detector confidence [0.0, 1.0]
    pub confidence: f32,

    /// Box in page pixel coordinates
    pub bbox: BoundingBox,
}

impl Detection {
    /// Confidence is clamped to [0, 1]; NaN becomes 0
    pub fn new(class: SymbolClass, confidence: f32, bbox: BoundingBox) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Detection {
            class,
            confidence,
            bbox,
        }
    }

    /// Decode a raw detection and move it into page coordinates
    /// Returns `None` for unknown class ids, degenerate boxes or non-finite confidences
    pub fn from_raw(raw: &RawDetection, offset_x: i32, offset_y: i32) -> Option<Self> {
        let class = SymbolClass::from_class_id(raw.class_id)?;
        if !raw.bbox.is_valid() || !raw.confidence.is_finite() {
            return None;
        }
        Some(Detection::new(
            class,
            raw.confidence,
            raw.bbox.translate(offset_x, offset_y),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_mapping() {
        assert_eq!(SymbolClass::from_class_id(0), Some(SymbolClass::EighthNote));
        assert_eq!(SymbolClass::from_class_id(4), Some(SymbolClass::QuarterNote));
        assert_eq!(SymbolClass::from_class_id(8), Some(SymbolClass::WholeRest));
        assert_eq!(SymbolClass::from_class_id(9), None);
        assert_eq!(SymbolClass::QuarterNote.class_id(), 4);
    }

    #[test]
    fn test_label_round_trip() {
        for class in SymbolClass::ALL {
            assert_eq!(SymbolClass::from_label(class.label()), Some(class));
        }
        assert_eq!(SymbolClass::from_label("treble_clef"), None);
    }

    #[test]
    fn test_durations_and_rests() {
        assert_eq!(SymbolClass::WholeNote.duration(), Some(2.0));
        assert_eq!(SymbolClass::SixteenthNote.duration(), Some(0.125));
        assert_eq!(SymbolClass::HalfRest.duration(), None);
        assert!(SymbolClass::EighthRest.is_rest());
        assert!(!SymbolClass::EighthNote.is_rest());
    }

    #[test]
    fn test_iou_inclusive_pixels() {
        let a = BoundingBox::new(0, 0, 9, 9);
        assert_eq!(a.area(), 100);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        // Half overlap horizontally: 50 shared pixels of 150 total
        let b = BoundingBox::new(5, 0, 14, 9);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);

        let far = BoundingBox::new(100, 100, 110, 110);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn test_from_raw_translates_and_filters() {
        let raw = RawDetection {
            class_id: 4,
            confidence: 0.8,
            bbox: BoundingBox::new(10, 20, 30, 60),
        };
        let det = Detection::from_raw(&raw, 480, 960).unwrap();
        assert_eq!(det.bbox, BoundingBox::new(490, 980, 510, 1020));
        assert_eq!(det.class, SymbolClass::QuarterNote);

        let unknown = RawDetection { class_id: 42, ..raw.clone() };
        assert!(Detection::from_raw(&unknown, 0, 0).is_none());

        let flat = RawDetection {
            bbox: BoundingBox::new(10, 20, 10, 60),
            ..raw
        };
        assert!(Detection::from_raw(&flat, 0, 0).is_none());
    }

    #[test]
    fn test_non_finite_confidence() {
        let raw = RawDetection {
            class_id: 4,
            confidence: f32::NAN,
            bbox: BoundingBox::new(10, 20, 30, 60),
        };
        assert!(Detection::from_raw(&raw, 0, 0).is_none());

        let inf = RawDetection {
            confidence: f32::INFINITY,
            ..raw
        };
        assert!(Detection::from_raw(&inf, 0, 0).is_none());

        let det = Detection::new(SymbolClass::HalfNote, f32::NAN, BoundingBox::new(0, 0, 5, 5));
        assert_eq!(det.confidence, 0.0);
        assert_eq!(Detection::new(SymbolClass::HalfNote, 1.7, det.bbox).confidence, 1.0);
    }
}
