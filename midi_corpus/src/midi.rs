// MIDI input: Standard MIDI Files to note events.
//
// Reads an SMF (format 0, 1 or 2, metrical timing) with the `midly` crate and
// flattens every track into a single `Piece`:
// - Delta times are accumulated per track into absolute ticks.
// - A note starts at NoteOn with non-zero velocity and ends at the matching
//   NoteOff (or NoteOn with velocity 0) on the same track, channel and key.
//   Re-strikes of a key that is still sounding pair first-in, first-out.
// - Notes still open when their track ends are closed at the track's last
//   tick.
// - The MIDI channel picks the voice via `RunConfig::voice_for_channel`;
//   notes on channels with no voice are dropped.
//
// Events come out sorted by (onset, voice, pitch). The grid encoder applies
// them in that order, so when two notes claim the same cell the later onset
// wins. The total duration is the latest track end or note end.

use crate::error::SourceError;
use crate::event::{NoteEvent, Piece};
use midly::{MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroU32;
use std::path::Path;

/// Read and parse a MIDI file.
pub fn read_midi(
    path: &Path,
    voice_for_channel: impl Fn(u8) -> Option<usize>,
) -> Result<Piece, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_midi(&bytes, voice_for_channel)
}

/// Parse an in-memory MIDI file.
pub fn parse_midi(
    bytes: &[u8],
    voice_for_channel: impl Fn(u8) -> Option<usize>,
) -> Result<Piece, SourceError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) => {
            NonZeroU32::new(u32::from(tpq.as_int())).ok_or(SourceError::ZeroResolution)?
        }
        Timing::Timecode(..) => return Err(SourceError::UnsupportedTiming),
    };

    let mut events = Vec::new();
    let mut total_duration = 0u64;

    for track in &smf.tracks {
        // Start ticks of sounding notes, keyed by (channel, key).
        let mut open: BTreeMap<(u8, u8), VecDeque<u64>> = BTreeMap::new();
        let mut tick = 0u64;

        for event in track {
            tick += u64::from(event.delta.as_int());
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    open.entry((channel, key.as_int()))
                        .or_default()
                        .push_back(tick);
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    let start = open
                        .get_mut(&(channel, key.as_int()))
                        .and_then(VecDeque::pop_front);
                    if let Some(start) = start {
                        push_note(&mut events, &voice_for_channel, channel, key.as_int(), start, tick);
                    }
                }
                _ => {}
            }
        }

        for ((channel, key), starts) in open {
            for start in starts {
                push_note(&mut events, &voice_for_channel, channel, key, start, tick);
            }
        }
        total_duration = total_duration.max(tick);
    }

    events.sort_by_key(|e| (e.onset, e.voice, e.pitch));
    if let Some(end) = events.iter().map(|e| e.onset + e.duration).max() {
        total_duration = total_duration.max(end);
    }

    Ok(Piece::new(ticks_per_quarter, total_duration, events))
}

fn push_note(
    events: &mut Vec<NoteEvent>,
    voice_for_channel: &impl Fn(u8) -> Option<usize>,
    channel: u8,
    key: u8,
    start: u64,
    end: u64,
) {
    if let Some(voice) = voice_for_channel(channel) {
        events.push(NoteEvent {
            pitch: i32::from(key),
            onset: start,
            duration: end - start,
            voice,
        });
    }
}
