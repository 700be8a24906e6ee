// Pitch module
// Clef tables, note-name parsing and per-note pitch resolution

pub mod resolver;
pub mod tables;

pub use resolver::{estimate_pitch, estimate_step_index, infer_clef, PitchResolver, ResolvedNote, Unresolved};
pub use tables::{note_name_to_midi, Clef, FALLBACK_MIDI_PITCH};
