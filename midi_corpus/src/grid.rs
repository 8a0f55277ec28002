// The piano-roll grid: quantized note content of one piece.
//
// The grid is a dense 3D array indexed `[timestep][voice][pitch]`, stored
// flat. Each cell is silent, a strike (note onset) or a hold (note still
// sounding). Timesteps run over `0..=floor(total_duration * sample_freq)`;
// pitches over the configured window `0..note_range`.
//
// Building a grid from note events (`Grid::from_piece`):
// 1. Shift the pitch by `note_offset`, then fold it into the window by whole
//    octaves (`wrap_pitch`). Pitches are never dropped; distinct MIDI pitches
//    may land on the same index.
// 2. Quantize onset and duration independently, rounding down.
// 3. Write a strike at the onset step and holds on the following
//    `duration_steps - 1` steps. Events are written in the order given and a
//    later write overwrites an earlier one.
//
// A grid never exceeds `MAX_GRID_CELLS`; longer pieces fail with
// `GridTooLarge` before anything is allocated.
//
// The grid serializes to chordwise rows (`to_rows`) and can be rebuilt from
// them (`from_rows`); rebuilding then re-serializing reproduces the rows.

use crate::chordwise::{self, ChordwiseRow};
use crate::config::{EncodingConfig, VoiceTable};
use crate::error::EncodeError;
use crate::event::Piece;

/// Largest grid (timesteps x voices x pitches) a piece may occupy. About
/// three hours of music at 12 steps per quarter and 120 bpm in a 62-pitch
/// window. Larger pieces are rejected per piece instead of allocated.
pub const MAX_GRID_CELLS: usize = 1 << 24;

/// State of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Silent,
    Strike,
    Hold,
}

impl Cell {
    pub fn digit(self) -> char {
        match self {
            Cell::Silent => '0',
            Cell::Strike => '1',
            Cell::Hold => '2',
        }
    }

    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '0' => Some(Cell::Silent),
            '1' => Some(Cell::Strike),
            '2' => Some(Cell::Hold),
            _ => None,
        }
    }
}

/// Dense `[timestep][voice][pitch]` grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    steps: usize,
    voices: usize,
    note_range: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create an all-silent grid of at most `MAX_GRID_CELLS` cells.
    pub fn new(steps: usize, voices: usize, note_range: usize) -> Result<Self, EncodeError> {
        let cells = steps
            .checked_mul(voices)
            .and_then(|n| n.checked_mul(note_range))
            .filter(|&n| n <= MAX_GRID_CELLS)
            .ok_or(EncodeError::GridTooLarge {
                steps,
                voices,
                note_range,
                limit: MAX_GRID_CELLS,
            })?;
        Ok(Grid {
            steps,
            voices,
            note_range,
            cells: vec![Cell::Silent; cells],
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn voices(&self) -> usize {
        self.voices
    }

    pub fn note_range(&self) -> usize {
        self.note_range
    }

    fn index(&self, step: usize, voice: usize, pitch: usize) -> usize {
        (step * self.voices + voice) * self.note_range + pitch
    }

    /// Cell at (step, voice, pitch), or `None` out of bounds.
    pub fn cell(&self, step: usize, voice: usize, pitch: usize) -> Option<Cell> {
        if step < self.steps && voice < self.voices && pitch < self.note_range {
            Some(self.cells[self.index(step, voice, pitch)])
        } else {
            None
        }
    }

    /// The pitch vector of one voice at one timestep.
    pub fn pitch_vector(&self, step: usize, voice: usize) -> &[Cell] {
        let start = self.index(step, voice, 0);
        &self.cells[start..start + self.note_range]
    }

    /// Write one note: a strike at `onset` followed by holds up to (not
    /// including) `onset + duration`. Holds past the end of the grid are
    /// clipped; an onset past the end is an error.
    pub fn place(
        &mut self,
        onset: usize,
        duration: usize,
        voice: usize,
        pitch: usize,
    ) -> Result<(), EncodeError> {
        if onset >= self.steps {
            return Err(EncodeError::EventOutsideGrid {
                step: onset,
                steps: self.steps,
            });
        }
        if voice >= self.voices {
            return Err(EncodeError::VoiceOutOfRange {
                voice,
                voice_count: self.voices,
            });
        }
        if pitch >= self.note_range {
            return Err(EncodeError::PitchOutOfWindow {
                pitch: pitch as i64,
                note_range: self.note_range,
            });
        }
        let i = self.index(onset, voice, pitch);
        self.cells[i] = Cell::Strike;
        let hold_end = onset.saturating_add(duration).min(self.steps);
        for step in onset + 1..hold_end {
            let i = self.index(step, voice, pitch);
            self.cells[i] = Cell::Hold;
        }
        Ok(())
    }

    /// Quantize a piece onto a fresh grid.
    pub fn from_piece(piece: &Piece, config: &EncodingConfig) -> Result<Self, EncodeError> {
        config.validate()?;
        let overflow = |ticks| EncodeError::TimeOverflow {
            ticks,
            sample_freq: config.sample_freq,
        };
        let steps = piece
            .max_time_step(config.sample_freq)
            .ok_or_else(|| overflow(piece.total_duration))?;
        let mut grid = Grid::new(steps, config.voices.len(), config.note_range)?;
        for event in &piece.events {
            let pitch = wrap_pitch(
                i64::from(event.pitch) - i64::from(config.note_offset),
                config.note_range,
            )?;
            let onset = piece
                .to_steps(event.onset, config.sample_freq)
                .ok_or_else(|| overflow(event.onset))?;
            let duration = piece
                .to_steps(event.duration, config.sample_freq)
                .ok_or_else(|| overflow(event.duration))?;
            grid.place(onset, duration, event.voice, pitch)?;
        }
        Ok(grid)
    }

    /// Serialize to chordwise rows: timestep-ascending, voice-descending.
    pub fn to_rows(&self, voices: &VoiceTable) -> Result<Vec<ChordwiseRow>, EncodeError> {
        let mut rows = Vec::with_capacity(self.steps * self.voices);
        for step in 0..self.steps {
            for voice in (0..self.voices).rev() {
                let tag = voices.tag(voice).ok_or(EncodeError::VoiceOutOfRange {
                    voice,
                    voice_count: voices.len(),
                })?;
                rows.push(ChordwiseRow::from_cells(tag, self.pitch_vector(step, voice)));
            }
        }
        Ok(rows)
    }

    /// Rebuild a grid from chordwise rows laid out as `to_rows` lays them out.
    pub fn from_rows(rows: &[ChordwiseRow], voices: &VoiceTable) -> Result<Self, EncodeError> {
        let note_range = chordwise::uniform_width(rows)?;
        let voice_count = voices.len();
        if rows.len() % voice_count != 0 {
            return Err(EncodeError::MalformedRow(format!(
                "{} rows do not divide into timesteps of {} voices",
                rows.len(),
                voice_count
            )));
        }
        let mut grid = Grid::new(rows.len() / voice_count, voice_count, note_range)?;
        for (step, chunk) in rows.chunks(voice_count).enumerate() {
            for (slot, row) in chunk.iter().enumerate() {
                let voice = voice_count - 1 - slot;
                let expected = voices.tag(voice).unwrap_or_default();
                if row.tag() != expected {
                    return Err(EncodeError::UnexpectedVoiceTag {
                        found: row.tag(),
                        expected,
                    });
                }
                for (pitch, &digit) in row.digits().iter().enumerate() {
                    let cell = Cell::from_digit(char::from(digit))
                        .ok_or_else(|| EncodeError::MalformedRow(row.to_string()))?;
                    let i = grid.index(step, voice, pitch);
                    grid.cells[i] = cell;
                }
            }
        }
        Ok(grid)
    }
}

/// Fold a pitch (already shifted by the window offset) into `0..note_range`
/// by whole octaves: raise negatives until non-negative, then lower until
/// inside the window.
///
/// Windows narrower than an octave cannot hold every pitch class; a pitch
/// with no home in the window is an error rather than being clamped.
pub fn wrap_pitch(pitch: i64, note_range: usize) -> Result<usize, EncodeError> {
    let range = i64::try_from(note_range).unwrap_or(i64::MAX);
    let mut p = pitch;
    if p < 0 {
        p = p.rem_euclid(12);
    }
    if p >= range {
        p -= ((p - range) / 12 + 1) * 12;
    }
    if (0..range).contains(&p) {
        Ok(p as usize)
    } else {
        Err(EncodeError::PitchOutOfWindow { pitch, note_range })
    }
}

/// Encode a piece as chordwise rows. An empty event list yields no rows at
/// all (not a grid of silent rows), which callers treat as "no content".
pub fn encode(piece: &Piece, config: &EncodingConfig) -> Result<Vec<ChordwiseRow>, EncodeError> {
    config.validate()?;
    if piece.is_empty() {
        return Ok(Vec::new());
    }
    Grid::from_piece(piece, config)?.to_rows(&config.voices)
}
