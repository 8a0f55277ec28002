// Note events: the input to the grid encoder.
//
// A `Piece` is what a note source (see midi.rs) hands to the encoders: the
// note events of one score plus its total length. Times are kept exactly as
// integer ticks with the piece's ticks-per-quarter resolution, so
// quantization onto a grid of `sample_freq` steps per quarter note is exact
// integer arithmetic: `floor(ticks / tpq * sample_freq)`.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// One sounding note (one pitch of a chord counts as its own note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch number. Signed so that offset arithmetic can go negative.
    pub pitch: i32,
    /// Start time in ticks.
    pub onset: u64,
    /// Length in ticks.
    pub duration: u64,
    /// Voice id, an index into the run's voice table.
    pub voice: usize,
}

/// The note content of one score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    /// Ticks per quarter note.
    pub ticks_per_quarter: NonZeroU32,
    /// Total length of the score in ticks.
    pub total_duration: u64,
    /// Notes in source order. The grid encoder applies them in this order,
    /// so a later note wins when two notes claim the same cell.
    pub events: Vec<NoteEvent>,
}

impl Piece {
    pub fn new(ticks_per_quarter: NonZeroU32, total_duration: u64, events: Vec<NoteEvent>) -> Self {
        Piece {
            ticks_per_quarter,
            total_duration,
            events,
        }
    }

    /// Quantize a tick count onto a grid with `sample_freq` steps per
    /// quarter note, rounding down. `None` when the step count does not fit
    /// in a `usize`.
    pub fn to_steps(&self, ticks: u64, sample_freq: u32) -> Option<usize> {
        let steps = u128::from(ticks) * u128::from(sample_freq)
            / u128::from(self.ticks_per_quarter.get());
        usize::try_from(steps).ok()
    }

    /// Number of grid timesteps needed to cover the piece.
    pub fn max_time_step(&self, sample_freq: u32) -> Option<usize> {
        self.to_steps(self.total_duration, sample_freq)?.checked_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
