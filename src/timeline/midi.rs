// MIDI export - Convert a page timeline to a MIDI file using the midly crate
// Timeline units are rendered as seconds at the configured tempo

use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::builder::TimelineEvent;

#[derive(Debug, Error)]
pub enum MidiExportError {
    #[error("Failed to write MIDI: {0}")]
    WriteError(String),

    #[error("Invalid export options: {0}")]
    InvalidOptions(String),
}

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ) - typically 480 or 960
    pub ppq: u16,

    /// Tempo written to the file; one timeline unit lasts one second
    pub bpm: f64,

    /// Note-on velocity for every note
    pub velocity: u8,

    /// General MIDI program for the instrument track (0 = acoustic grand piano)
    pub program: u8,

    /// Include tempo metadata
    pub include_tempo: bool,

    /// Name written on the instrument track, empty to omit
    pub track_name: String,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            bpm: 120.0,
            velocity: 100,
            program: 0,
            include_tempo: true,
            track_name: "Piano".to_string(),
        }
    }
}

/// Export a timeline to MIDI file bytes
///
/// Produces a parallel (format 1) file with a tempo track and one instrument
/// track on channel 1.
pub fn export_midi(
    events: &[TimelineEvent],
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiExportError> {
    if options.ppq == 0 || options.bpm <= 0.0 {
        return Err(MidiExportError::InvalidOptions(format!(
            "ppq {} / bpm {}",
            options.ppq, options.bpm
        )));
    }

    let header = Header {
        format: midly::Format::Parallel,
        timing: Timing::Metrical(options.ppq.into()),
    };

    let ticks_per_second = calculate_ticks_per_second(options.bpm, options.ppq);

    let mut meta_track = Track::new();
    if options.include_tempo {
        add_tempo(&mut meta_track, 0, options.bpm);
    }
    add_end_of_track(&mut meta_track, 0);

    let note_track = create_note_track(events, ticks_per_second, options);

    let smf = Smf {
        header,
        tracks: vec![meta_track, note_track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiExportError::WriteError(e.to_string()))?;

    log::debug!("Exported {} notes as {} MIDI bytes", events.len(), bytes.len());
    Ok(bytes)
}

/// Create the instrument track holding every timeline note
fn create_note_track<'a>(
    events: &[TimelineEvent],
    ticks_per_second: f64,
    options: &'a MidiExportOptions,
) -> Track<'a> {
    let mut track = Track::new();
    let mut timed: Vec<(u32, TrackEventKind<'a>)> = Vec::new();

    if !options.track_name.is_empty() {
        timed.push((
            0,
            TrackEventKind::Meta(MetaMessage::TrackName(options.track_name.as_bytes())),
        ));
    }

    timed.push((
        0,
        TrackEventKind::Midi {
            channel: 0.into(),
            message: MidiMessage::ProgramChange {
                program: options.program.into(),
            },
        },
    ));

    for event in events {
        let tick_on = to_ticks(event.start, ticks_per_second);
        let tick_off = to_ticks(event.end, ticks_per_second);

        timed.push((
            tick_on,
            TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: event.pitch.into(),
                    vel: options.velocity.into(),
                },
            },
        ));
        timed.push((
            tick_off,
            TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff {
                    key: event.pitch.into(),
                    vel: 0.into(),
                },
            },
        ));
    }

    // Stable sort keeps a note-off ahead of the next note-on at the same tick
    timed.sort_by_key(|(tick, _)| *tick);

    let mut last_tick = 0;
    for (tick, kind) in timed {
        track.push(TrackEvent {
            delta: tick.saturating_sub(last_tick).into(),
            kind,
        });
        last_tick = tick;
    }

    add_end_of_track(&mut track, 0);
    track
}

/// Calculate ticks per second
fn calculate_ticks_per_second(bpm: f64, ppq: u16) -> f64 {
    ppq as f64 * bpm / 60.0
}

fn to_ticks(seconds: f64, ticks_per_second: f64) -> u32 {
    (seconds * ticks_per_second).round().max(0.0) as u32
}

/// Add tempo meta message
fn add_tempo(track: &mut Track<'_>, delta: u32, bpm: f64) {
    // Microseconds per quarter note
    let us_per_quarter = (60_000_000.0 / bpm) as u32;

    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.into())),
    });
}

/// Add end of track message
fn add_end_of_track(track: &mut Track<'_>, delta: u32) {
    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
}
