// Timeline builder
// Sequences resolved notes left to right into one monophonic voice

use serde::{Deserialize, Serialize};

use crate::pitch::ResolvedNote;

/// One note in the output timeline, times in quarter-note table units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub pitch: u8,
    pub start: f64,
    pub end: f64,
}

impl TimelineEvent {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Build a contiguous timeline from a page's notes
///
/// Notes are ordered by `x_center` (stable, so equal positions keep input
/// order). The first note starts at 0 and every later note starts exactly where
/// the previous one ended. Chords and multiple staves collapse into one voice.
pub fn build_timeline(notes: &[ResolvedNote]) -> Vec<TimelineEvent> {
    let mut ordered: Vec<&ResolvedNote> = notes.iter().collect();
    ordered.sort_by_key(|n| n.x_center);

    let mut time = 0.0;
    ordered
        .into_iter()
        .map(|note| {
            let start = time;
            let end = start + note.duration;
            time = end;
            TimelineEvent {
                pitch: note.midi_pitch,
                start,
                end,
            }
        })
        .collect()
}

/// Total length of a timeline
pub fn timeline_length(events: &[TimelineEvent]) -> f64 {
    events.last().map(|e| e.end).unwrap_or(0.0)
}
