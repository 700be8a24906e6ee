// Explainability module
// Records what happened to each merged detection on its way to the timeline

use serde::{Deserialize, Serialize};

use crate::detection::{BoundingBox, Detection, SymbolClass};
use crate::pitch::{Clef, ResolvedNote, Unresolved};

/// Final outcome for one merged detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionOutcome {
    Resolved {
        pitch_name: String,
        midi_pitch: u8,
        clef: Clef,
        duration: f64,
        staff_index: usize,
        head_y: i32,
        pitch_fallback: bool,
    },
    Rest,
    HeadNotFound,
    NoStaff,
}

impl DecisionOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, DecisionOutcome::Resolved { .. })
    }
}

/// How one detection moved through the resolve stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionDecision {
    /// Index into the page's merged detections
    pub detection_index: usize,

    // --- Detection ---
    pub class: SymbolClass,
    pub confidence: f32,
    pub bbox: BoundingBox,

    // --- Resolution ---
    pub outcome: DecisionOutcome,

    // --- Explainability ---
    pub reasoning: String,
}

impl DetectionDecision {
    pub fn from_resolution(
        detection_index: usize,
        detection: &Detection,
        resolution: &Result<ResolvedNote, Unresolved>,
    ) -> Self {
        let mut reason_parts = vec![format!(
            "Detected {} ({}% confidence) at x={}.",
            detection.class.label(),
            (detection.confidence * 100.0) as u32,
            detection.bbox.x_center()
        )];

        let outcome = match resolution {
            Ok(note) => {
                reason_parts.push(format!(
                    "Head at y={} on staff {} read with the {} clef as {} (MIDI {}).",
                    note.head_y,
                    note.staff_index,
                    note.clef.symbol(),
                    note.pitch_name,
                    note.midi_pitch
                ));
                if note.pitch_fallback {
                    reason_parts.push("Pitch name was unreadable; middle C substituted.".to_string());
                }
                reason_parts.push(format!("Sounds for {} units.", note.duration));

                DecisionOutcome::Resolved {
                    pitch_name: note.pitch_name.clone(),
                    midi_pitch: note.midi_pitch,
                    clef: note.clef,
                    duration: note.duration,
                    staff_index: note.staff_index,
                    head_y: note.head_y,
                    pitch_fallback: note.pitch_fallback,
                }
            }
            Err(Unresolved::NotANote) => {
                reason_parts.push("Rests are not sequenced.".to_string());
                DecisionOutcome::Rest
            }
            Err(Unresolved::HeadNotFound) => {
                reason_parts.push("No note head found inside the box; dropped.".to_string());
                DecisionOutcome::HeadNotFound
            }
            Err(Unresolved::NoStaff) => {
                reason_parts.push("Page has no staff to read the pitch from; dropped.".to_string());
                DecisionOutcome::NoStaff
            }
        };

        DetectionDecision {
            detection_index,
            class: detection.class,
            confidence: detection.confidence,
            bbox: detection.bbox,
            outcome,
            reasoning: reason_parts.join(" "),
        }
    }
}
