// Timeline module
// Left-to-right note sequencing and MIDI export

pub mod builder;
pub mod midi;

pub use builder::{build_timeline, timeline_length, TimelineEvent};
pub use midi::{export_midi, MidiExportError, MidiExportOptions};
