// Run configuration for corpus encoding.
//
// `RunConfig` is the JSON-loadable description of a whole run: which sample
// frequencies and note windows to encode at, which voice tags exist, how MIDI
// channels map onto voices, and how the notewise lookahead treats
// transposition block boundaries. `RunConfig::encodings()` expands it into
// one immutable `EncodingConfig` per (sample_freq, note_range) pair; the
// encoders only ever see an `EncodingConfig`.
//
// Defaults reproduce the reference corpus: sample frequencies 4 and 12, note
// windows 38 (offset 45) and 62 (offset 33), a single voice tagged "p", and
// every MIDI channel merged into that voice.
//
// Validation happens once, up front, in `RunConfig::validate()`. The run
// level is stricter than the encoder level: encoders accept any positive
// window, while a run requires at least one octave so that every pitch class
// has a home in the window.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Tag of the single voice in the reference encoding.
pub const REFERENCE_VOICE_TAG: char = 'p';

/// Highest MIDI channel number (channels are 0-based).
const MAX_CHANNEL: u8 = 15;

/// Scope of the "next row for this voice" lookahead in the notewise encoder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Lookahead {
    /// Lookahead stops at the end of each transposition block, so the last
    /// timestep of a block always ends its sounding notes.
    #[default]
    Scoped,
    /// Lookahead runs across the concatenated blocks, reproducing the
    /// reference corpus's cross-block lookahead (and its artifacts).
    Legacy,
}

/// Mapping from voice id (index) to its single-letter tag.
///
/// Voice 0 is the base voice: its row is emitted last within a timestep and
/// closes the timestep in the notewise stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<char>", into = "Vec<char>")]
pub struct VoiceTable {
    tags: Vec<char>,
}

impl VoiceTable {
    pub fn new(tags: Vec<char>) -> Result<Self, ConfigError> {
        if tags.is_empty() {
            return Err(ConfigError::NoVoices);
        }
        for (i, &tag) in tags.iter().enumerate() {
            if !tag.is_ascii_lowercase() {
                return Err(ConfigError::InvalidVoiceTag(tag));
            }
            if tags[..i].contains(&tag) {
                return Err(ConfigError::DuplicateVoiceTag(tag));
            }
        }
        Ok(VoiceTable { tags })
    }

    /// The single-voice table used by the reference corpus.
    pub fn reference() -> Self {
        VoiceTable {
            tags: vec![REFERENCE_VOICE_TAG],
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[char] {
        &self.tags
    }

    pub fn tag(&self, voice: usize) -> Option<char> {
        self.tags.get(voice).copied()
    }

    pub fn voice_of(&self, tag: char) -> Option<usize> {
        self.tags.iter().position(|&t| t == tag)
    }

    /// Tag of voice 0. The constructor guarantees the table is non-empty.
    pub fn base_tag(&self) -> char {
        self.tags.first().copied().unwrap_or(REFERENCE_VOICE_TAG)
    }
}

impl Default for VoiceTable {
    fn default() -> Self {
        VoiceTable::reference()
    }
}

impl TryFrom<Vec<char>> for VoiceTable {
    type Error = ConfigError;

    fn try_from(tags: Vec<char>) -> Result<Self, Self::Error> {
        VoiceTable::new(tags)
    }
}

impl From<VoiceTable> for Vec<char> {
    fn from(table: VoiceTable) -> Self {
        table.tags
    }
}

/// Immutable configuration for encoding one piece at one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Grid steps per quarter note.
    pub sample_freq: u32,
    /// Width of the pitch window.
    pub note_range: usize,
    /// MIDI pitch mapped to window index 0 (before octave wrapping).
    pub note_offset: i32,
    pub voices: VoiceTable,
    pub lookahead: Lookahead,
}

impl EncodingConfig {
    /// Single-voice configuration with the default lookahead.
    pub fn new(sample_freq: u32, note_range: usize, note_offset: i32) -> Self {
        EncodingConfig {
            sample_freq,
            note_range,
            note_offset,
            voices: VoiceTable::reference(),
            lookahead: Lookahead::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_freq == 0 {
            return Err(ConfigError::ZeroSampleFreq);
        }
        if self.note_range == 0 {
            return Err(ConfigError::ZeroNoteRange);
        }
        Ok(())
    }

    /// Longest run of timesteps a single wait token may cover.
    pub fn wait_cap(&self) -> usize {
        2 * self.sample_freq as usize
    }
}

/// A pitch window: its width and the MIDI pitch at index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteWindow {
    pub range: usize,
    pub offset: i32,
}

impl FromStr for NoteWindow {
    type Err = ConfigError;

    /// Parses `RANGE:OFFSET`, e.g. `38:45`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::BadNoteWindow(s.to_string());
        let (range, offset) = s.split_once(':').ok_or_else(bad)?;
        Ok(NoteWindow {
            range: range.trim().parse().map_err(|_| bad())?,
            offset: offset.trim().parse().map_err(|_| bad())?,
        })
    }
}

/// Everything a batch run needs to know, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub sample_freqs: Vec<u32>,
    pub note_ranges: Vec<NoteWindow>,
    pub voices: VoiceTable,
    /// MIDI channel (0-15) to voice id. Empty means every channel plays
    /// voice 0; otherwise notes on unmapped channels are dropped.
    pub channel_voices: BTreeMap<u8, usize>,
    pub lookahead: Lookahead,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            sample_freqs: vec![4, 12],
            note_ranges: vec![
                NoteWindow {
                    range: 38,
                    offset: 45,
                },
                NoteWindow {
                    range: 62,
                    offset: 33,
                },
            ],
            voices: VoiceTable::reference(),
            channel_voices: BTreeMap::new(),
            lookahead: Lookahead::default(),
        }
    }
}

impl RunConfig {
    /// Load a run configuration from a JSON file. Missing fields take their
    /// reference defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_freqs.is_empty() {
            return Err(ConfigError::NoSampleFreqs);
        }
        if self.note_ranges.is_empty() {
            return Err(ConfigError::NoNoteRanges);
        }
        if self.sample_freqs.contains(&0) {
            return Err(ConfigError::ZeroSampleFreq);
        }
        for (i, &sample_freq) in self.sample_freqs.iter().enumerate() {
            if self.sample_freqs[..i].contains(&sample_freq) {
                return Err(ConfigError::DuplicateSampleFreq(sample_freq));
            }
        }
        // Output directories are keyed by range alone.
        for (i, window) in self.note_ranges.iter().enumerate() {
            if self.note_ranges[..i].iter().any(|w| w.range == window.range) {
                return Err(ConfigError::DuplicateNoteRange(window.range));
            }
            if window.range == 0 {
                return Err(ConfigError::ZeroNoteRange);
            }
            if window.range < 12 {
                return Err(ConfigError::NarrowWindow(window.range));
            }
        }
        for (&channel, &voice) in &self.channel_voices {
            if channel > MAX_CHANNEL {
                return Err(ConfigError::ChannelOutOfRange(channel));
            }
            if voice >= self.voices.len() {
                return Err(ConfigError::UnknownVoice {
                    channel,
                    voice,
                    voice_count: self.voices.len(),
                });
            }
        }
        Ok(())
    }

    /// One `EncodingConfig` per (sample_freq, note window) pair, frequencies
    /// outermost.
    pub fn encodings(&self) -> Vec<EncodingConfig> {
        let mut out = Vec::with_capacity(self.sample_freqs.len() * self.note_ranges.len());
        for &sample_freq in &self.sample_freqs {
            for window in &self.note_ranges {
                out.push(EncodingConfig {
                    sample_freq,
                    note_range: window.range,
                    note_offset: window.offset,
                    voices: self.voices.clone(),
                    lookahead: self.lookahead,
                });
            }
        }
        out
    }

    /// Voice that notes on `channel` belong to, or `None` to drop them.
    pub fn voice_for_channel(&self, channel: u8) -> Option<usize> {
        if self.channel_voices.is_empty() {
            Some(0)
        } else {
            self.channel_voices.get(&channel).copied()
        }
    }
}
