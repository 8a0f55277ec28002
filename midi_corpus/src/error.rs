// Error taxonomy for the encoding pipeline.
//
// Errors are split by blast radius:
// - ConfigError: invalid run configuration. Fatal to the whole run, checked
//   before any piece is touched.
// - SourceError: the MIDI source for one piece could not be read. The batch
//   reports it as "source unavailable" and moves on.
// - EncodeError: raised by the encoders. `EmptyEncoding` and the size limits
//   (`exceeds_limits`) are per-piece outcomes; every other variant is an
//   internal invariant violation and aborts the run.
// - PieceError / RunError: what the batch layer (pipeline.rs) reports per
//   piece and for the run as a whole.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample_freq must be positive")]
    ZeroSampleFreq,
    #[error("note_range must be positive")]
    ZeroNoteRange,
    #[error("note_range {0} is narrower than one octave")]
    NarrowWindow(usize),
    #[error("at least one voice tag is required")]
    NoVoices,
    #[error("voice tag {0:?} is not a lowercase ASCII letter")]
    InvalidVoiceTag(char),
    #[error("voice tag {0:?} is assigned to more than one voice")]
    DuplicateVoiceTag(char),
    #[error("MIDI channel {0} is out of range (0-15)")]
    ChannelOutOfRange(u8),
    #[error("MIDI channel {channel} maps to voice {voice}, but only {voice_count} voices are configured")]
    UnknownVoice {
        channel: u8,
        voice: usize,
        voice_count: usize,
    },
    #[error("no sample frequencies configured")]
    NoSampleFreqs,
    #[error("no note ranges configured")]
    NoNoteRanges,
    #[error("sample_freq {0} is configured more than once")]
    DuplicateSampleFreq(u32),
    #[error("note_range {0} is configured more than once (windows share an output directory per range)")]
    DuplicateNoteRange(usize),
    #[error("invalid note range {0:?} (expected RANGE:OFFSET, e.g. 38:45)")]
    BadNoteWindow(String),
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed MIDI data: {0}")]
    Malformed(#[from] midly::Error),
    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,
    #[error("MIDI header declares zero ticks per quarter note")]
    ZeroResolution,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("no note content to encode")]
    EmptyEncoding,
    #[error("invalid encoding configuration: {0}")]
    Config(String),
    #[error("pitch {pitch} has no octave equivalent inside the window 0..{note_range}")]
    PitchOutOfWindow { pitch: i64, note_range: usize },
    #[error("grid of {steps} steps x {voices} voices x {note_range} pitches exceeds the budget of {limit} cells")]
    GridTooLarge {
        steps: usize,
        voices: usize,
        note_range: usize,
        limit: usize,
    },
    #[error("{ticks} ticks at sample_freq {sample_freq} is not a representable step count")]
    TimeOverflow { ticks: u64, sample_freq: u32 },
    #[error("note at step {step} lies outside a grid of {steps} steps")]
    EventOutsideGrid { step: usize, steps: usize },
    #[error("voice {voice} has no tag ({voice_count} voices configured)")]
    VoiceOutOfRange { voice: usize, voice_count: usize },
    #[error("malformed chordwise row {0:?}")]
    MalformedRow(String),
    #[error("chordwise row {row:?} has {width} pitches, expected {expected}")]
    RaggedRows {
        row: String,
        width: usize,
        expected: usize,
    },
    #[error("unexpected voice tag {found:?} (expected {expected:?})")]
    UnexpectedVoiceTag { found: char, expected: char },
    #[error("malformed notewise token {0:?}")]
    MalformedToken(String),
}

impl EncodeError {
    /// The piece is valid but too long to encode at this resolution.
    pub fn exceeds_limits(&self) -> bool {
        matches!(
            self,
            EncodeError::GridTooLarge { .. } | EncodeError::TimeOverflow { .. }
        )
    }
}

impl From<ConfigError> for EncodeError {
    fn from(err: ConfigError) -> Self {
        EncodeError::Config(err.to_string())
    }
}

/// Why a piece (or one configuration of a piece) produced no output.
#[derive(Debug, Error)]
pub enum PieceError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
    #[error("empty encoding at sample_freq {sample_freq}, note_range {note_range}")]
    EmptyEncoding { sample_freq: u32, note_range: usize },
    #[error("too large at sample_freq {sample_freq}, note_range {note_range}: {source}")]
    TooLarge {
        sample_freq: u32,
        note_range: usize,
        source: EncodeError,
    },
    #[error("output paths collide with {}", .other.display())]
    OutputCollision { other: PathBuf },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("encoding invariant violated in {}: {source}", .piece.display())]
    Invariant { piece: PathBuf, source: EncodeError },
    #[error("cannot scan input {}: {source}", .path.display())]
    Discover {
        path: PathBuf,
        source: std::io::Error,
    },
}
