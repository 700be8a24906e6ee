// Pitch resolver
// Maps a note detection and its head position to clef, pitch and duration

use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};

use crate::detection::backend::HeadDetector;
use crate::detection::types::{Detection, SymbolClass};
use crate::pitch::tables::{lookup_pitch_name, midi_or_fallback, Clef};
use crate::staff::locator::{find_nearest_staff_block, StaffBlock};

/// A note with a resolved pitch, ready for sequencing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNote {
    /// Horizontal center of the detection box (page px)
    pub x_center: i32,

    /// Vertical center of the note head (page px)
    pub head_y: i32,

    pub midi_pitch: u8,

    /// Scientific pitch name from the clef table (e.g. "D5")
    pub pitch_name: String,

    /// Duration in quarter-note table units
    pub duration: f64,

    pub clef: Clef,

    /// Index of the staff block the note was assigned to
    pub staff_index: usize,

    pub class: SymbolClass,

    /// True when the pitch name could not be parsed and middle C was substituted
    pub pitch_fallback: bool,
}

/// Why a detection did not produce a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unresolved {
    /// Rests and other unpitched classes
    NotANote,
    /// The page has no staff blocks
    NoStaff,
    /// The head sub-detector found nothing (or failed) in the crop
    HeadNotFound,
}

/// Treble for staves in the upper half of the page, bass otherwise
///
/// Assumes a grand-staff layout; single-staff or multi-system pages will get
/// bass clefs for every staff below the page's middle.
pub fn infer_clef(block: &StaffBlock, page_height: u32) -> Clef {
    if block.mean_row() < page_height as f64 / 2.0 {
        Clef::G
    } else {
        Clef::F
    }
}

/// Half-line steps from the bottom staff line up to `head_y`, unclamped
///
/// Rounds half to even.
pub fn estimate_step_index(head_y: i32, block: &StaffBlock) -> i64 {
    let half_step = block.line_spacing() / 2.0;
    if half_step <= 0.0 {
        return 0;
    }
    let steps = (block.bottom_row() as f64 - head_y as f64) / half_step;
    steps.round_ties_even() as i64
}

/// Pitch name for a head position on a staff
pub fn estimate_pitch(head_y: i32, block: &StaffBlock, clef: Clef) -> &'static str {
    lookup_pitch_name(clef.pitch_table(), estimate_step_index(head_y, block))
}

/// Resolves note detections against the staves of one page
pub struct PitchResolver<'a> {
    blocks: &'a [StaffBlock],
    page_height: u32,
}

impl<'a> PitchResolver<'a> {
    pub fn new(blocks: &'a [StaffBlock], page_height: u32) -> Self {
        PitchResolver {
            blocks,
            page_height,
        }
    }

    pub fn has_staff(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Resolve a note given its head's vertical position in page coordinates
    pub fn resolve_at(&self, detection: &Detection, head_y: i32) -> Result<ResolvedNote, Unresolved> {
        let duration = match detection.class.duration() {
            Some(d) if !detection.class.is_rest() => d,
            _ => return Err(Unresolved::NotANote),
        };

        let (staff_index, block) =
            find_nearest_staff_block(head_y as f64, self.blocks).ok_or(Unresolved::NoStaff)?;

        let clef = infer_clef(block, self.page_height);
        let pitch_name = estimate_pitch(head_y, block, clef);
        let (midi_pitch, pitch_fallback) = midi_or_fallback(pitch_name);

        Ok(ResolvedNote {
            x_center: detection.bbox.x_center(),
            head_y,
            midi_pitch,
            pitch_name: pitch_name.to_string(),
            duration,
            clef,
            staff_index,
            class: detection.class,
            pitch_fallback,
        })
    }

    /// Run the head sub-detector inside the detection's crop
    ///
    /// The box is clamped to the page first. Returns the vertical center of
    /// the first head box in page coordinates.
    pub fn locate_head(
        &self,
        page: &GrayImage,
        detection: &Detection,
        heads: &dyn HeadDetector,
        confidence_floor: f32,
    ) -> Result<i32, Unresolved> {
        let clamped = detection.bbox.clamp_to(page.width(), page.height());
        if clamped.x2 <= clamped.x1 || clamped.y2 <= clamped.y1 {
            return Err(Unresolved::HeadNotFound);
        }

        let crop = imageops::crop_imm(
            page,
            clamped.x1 as u32,
            clamped.y1 as u32,
            (clamped.x2 - clamped.x1) as u32,
            (clamped.y2 - clamped.y1) as u32,
        )
        .to_image();

        match heads.detect_head(&crop, confidence_floor) {
            Ok(Some(head)) => Ok(clamped.y1 + head.y_center()),
            Ok(None) => {
                log::debug!(
                    "No note head in box ({}, {}, {}, {})",
                    clamped.x1,
                    clamped.y1,
                    clamped.x2,
                    clamped.y2
                );
                Err(Unresolved::HeadNotFound)
            }
            Err(e) => {
                log::warn!("Head detector failed for box at x={}: {}", clamped.x1, e);
                Err(Unresolved::HeadNotFound)
            }
        }
    }

    /// Locate the head and resolve the note in one step
    pub fn resolve(
        &self,
        page: &GrayImage,
        detection: &Detection,
        heads: &dyn HeadDetector,
        confidence_floor: f32,
    ) -> Result<ResolvedNote, Unresolved> {
        if detection.class.is_rest() || detection.class.duration().is_none() {
            return Err(Unresolved::NotANote);
        }
        if !self.has_staff() {
            return Err(Unresolved::NoStaff);
        }
        let head_y = self.locate_head(page, detection, heads, confidence_floor)?;
        self.resolve_at(detection, head_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::backend::DetectorError;
    use crate::detection::types::BoundingBox;

    fn staff() -> StaffBlock {
        StaffBlock::new(vec![100, 110, 120, 130, 140])
    }

    fn quarter(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(SymbolClass::QuarterNote, 0.9, BoundingBox::new(x1, y1, x2, y2))
    }

    /// Reports a 6px head centered on a fixed crop row
    struct HeadAt(i32);

    impl HeadDetector for HeadAt {
        fn detect_head(
            &self,
            _: &GrayImage,
            _: f32,
        ) -> Result<Option<BoundingBox>, DetectorError> {
            Ok(Some(BoundingBox::new(0, self.0 - 3, 8, self.0 + 3)))
        }
    }

    struct Broken;

    impl HeadDetector for Broken {
        fn detect_head(
            &self,
            _: &GrayImage,
            _: f32,
        ) -> Result<Option<BoundingBox>, DetectorError> {
            Err(DetectorError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_clef_from_page_half() {
        assert_eq!(infer_clef(&staff(), 400), Clef::G);
        assert_eq!(infer_clef(&staff(), 200), Clef::F);
        // Exactly on the middle is not the upper half
        assert_eq!(infer_clef(&staff(), 240), Clef::F);
    }

    #[test]
    fn test_middle_line_on_treble_staff() {
        assert_eq!(estimate_step_index(120, &staff()), 4);
        assert_eq!(estimate_pitch(120, &staff(), Clef::G), "D5");
        assert_eq!(estimate_pitch(140, &staff(), Clef::G), "A5");
        assert_eq!(estimate_pitch(140, &staff(), Clef::F), "C4");
    }

    #[test]
    fn test_step_index_clamps_off_staff() {
        // Far below the staff: negative index clamps to the first entry
        assert!(estimate_step_index(200, &staff()) < 0);
        assert_eq!(estimate_pitch(200, &staff(), Clef::G), "A5");

        // Far above: index past 14 clamps to the last entry
        assert!(estimate_step_index(20, &staff()) > 14);
        assert_eq!(estimate_pitch(20, &staff(), Clef::G), "A3");
    }

    #[test]
    fn test_half_steps_round_to_even() {
        let block = staff();
        assert_eq!(estimate_step_index(127, &block), 3); // 2.6
        let wide = StaffBlock::new(vec![0, 20, 40, 60, 80]);
        assert_eq!(estimate_step_index(55, &wide), 2); // 2.5
        assert_eq!(estimate_step_index(45, &wide), 4); // 3.5
    }

    #[test]
    fn test_resolve_at() {
        let blocks = vec![staff()];
        let resolver = PitchResolver::new(&blocks, 400);
        let note = resolver.resolve_at(&quarter(200, 90, 216, 150), 120).unwrap();

        assert_eq!(note.x_center, 208);
        assert_eq!(note.midi_pitch, 74);
        assert_eq!(note.pitch_name, "D5");
        assert_eq!(note.duration, 0.5);
        assert_eq!(note.clef, Clef::G);
        assert_eq!(note.staff_index, 0);
        assert!(!note.pitch_fallback);
    }

    #[test]
    fn test_rests_and_missing_staff() {
        let blocks = vec![staff()];
        let resolver = PitchResolver::new(&blocks, 400);
        let rest = Detection::new(SymbolClass::QuarterRest, 0.9, BoundingBox::new(0, 0, 5, 5));
        assert_eq!(resolver.resolve_at(&rest, 120), Err(Unresolved::NotANote));

        let empty = PitchResolver::new(&[], 400);
        assert_eq!(
            empty.resolve_at(&quarter(0, 0, 5, 5), 120),
            Err(Unresolved::NoStaff)
        );
    }

    #[test]
    fn test_resolve_with_head_detector() {
        let blocks = vec![staff()];
        let resolver = PitchResolver::new(&blocks, 400);
        let page = GrayImage::new(400, 400);

        // Crop starts at y=90, head center 30px into the crop -> page y 120
        let note = resolver
            .resolve(&page, &quarter(200, 90, 216, 150), &HeadAt(30), 0.01)
            .unwrap();
        assert_eq!(note.head_y, 120);
        assert_eq!(note.midi_pitch, 74);
    }

    #[test]
    fn test_head_failures_drop_note() {
        let blocks = vec![staff()];
        let resolver = PitchResolver::new(&blocks, 400);
        let page = GrayImage::new(400, 400);

        let result = resolver.resolve(&page, &quarter(200, 90, 216, 150), &Broken, 0.01);
        assert_eq!(result, Err(Unresolved::HeadNotFound));

        // Box entirely off the page has no crop to search
        let off_page = quarter(500, 500, 520, 540);
        let result = resolver.resolve(&page, &off_page, &HeadAt(10), 0.01);
        assert_eq!(result, Err(Unresolved::HeadNotFound));
    }
}
