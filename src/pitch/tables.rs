// Pitch tables
// Clef step tables and scientific pitch notation parsing

use serde::{Deserialize, Serialize};

/// Fallback MIDI number for names that cannot be parsed (middle C)
pub const FALLBACK_MIDI_PITCH: u8 = 60;

/// Staff clef inferred from the staff's position on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clef {
    /// Treble clef, upper staff of a grand staff
    G,
    /// Bass clef, lower staff of a grand staff
    F,
}

impl Clef {
    /// Pitch names per half-line step
    pub fn pitch_table(&self) -> &'static PitchTable {
        match self {
            Clef::G => &G_CLEF_PITCHES,
            Clef::F => &F_CLEF_PITCHES,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Clef::G => 'G',
            Clef::F => 'F',
        }
    }
}

pub type PitchTable = [&'static str; 15];

/// Indexed by half-line steps above the staff's bottom line
pub static G_CLEF_PITCHES: PitchTable = [
    "A5", "G5", "F5", "E5", "D5", "C5", "B4", "A4", "G4", "F4", "E4", "D4", "C4", "B3", "A3",
];

pub static F_CLEF_PITCHES: PitchTable = [
    "C4", "B3", "A3", "G3", "F3", "E3", "D3", "C3", "B2", "A2", "G2", "F2", "E2", "D2", "C2",
];

/// Table entry for a possibly out-of-range step index
///
/// Indices below zero clamp to the first entry and indices past the end clamp
/// to the last; out-of-range positions are lossy, never an error.
pub fn lookup_pitch_name(table: &PitchTable, idx: i64) -> &'static str {
    let clamped = idx.clamp(0, table.len() as i64 - 1) as usize;
    table[clamped]
}

/// Parse scientific pitch notation (C4 = 60) into a MIDI note number
///
/// Accepts a letter, any number of `#` or `b` accidentals and a signed octave,
/// e.g. `A5`, `F#3`, `Bb-1`. Returns `None` for anything else or for results
/// outside 0..=127.
pub fn note_name_to_midi(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars().peekable();

    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut offset = 0i32;
    while let Some(&c) = chars.peek() {
        match c {
            '#' => offset += 1,
            'b' => offset -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: i32 = chars.collect::<String>().parse().ok()?;
    let midi = (octave + 1) * 12 + base + offset;
    u8::try_from(midi).ok().filter(|&m| m <= 127)
}

/// MIDI number for a table name, falling back to middle C
///
/// Returns the number and whether the fallback was used so callers can count it.
pub fn midi_or_fallback(name: &str) -> (u8, bool) {
    match note_name_to_midi(name) {
        Some(midi) => (midi, false),
        None => {
            log::warn!(
                "Unparseable pitch name {:?}, substituting MIDI {}",
                name,
                FALLBACK_MIDI_PITCH
            );
            (FALLBACK_MIDI_PITCH, true)
        }
    }
}
