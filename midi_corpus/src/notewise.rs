// Notewise encoding: chordwise rows to an event-token stream.
//
// Each row contributes, pitch by pitch (ascending):
// - a strike token `<tag><pitch>` for a '1' digit ('2' continues a note and
//   emits nothing);
// - an end token `end<tag><pitch>` for a '1' or '2' digit whose pitch is
//   silent in the next row of the same voice, or when that voice has no
//   further row.
// Every row of the base voice (voice 0, the last row of each timestep) is
// followed by one elementary wait. Runs of elementary waits are then
// collapsed into `wait<n>` tokens of at most `2 * sample_freq` steps each.
//
// "Next row of the same voice" comes from a per-voice successor index built
// in one backward pass, so lookahead is O(1) per row. For augmented input the
// lookahead scope is configurable (see `Lookahead`): scoped lookahead stops
// at the end of each transposition block, legacy lookahead runs on into the
// next block the way the reference corpus does.

use crate::augment::AugmentedRows;
use crate::chordwise::{self, ChordwiseRow};
use crate::config::{EncodingConfig, Lookahead, VoiceTable};
use crate::error::EncodeError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One notewise token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Strike { voice: char, pitch: usize },
    End { voice: char, pitch: usize },
    /// Silence lasting this many timesteps.
    Wait(usize),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Strike { voice, pitch } => write!(f, "{voice}{pitch}"),
            Token::End { voice, pitch } => write!(f, "end{voice}{pitch}"),
            Token::Wait(n) => write!(f, "wait{n}"),
        }
    }
}

/// Parse a decimal without superfluous leading zeros.
fn parse_index(s: &str) -> Option<usize> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s.len() == 1 || !s.starts_with('0'));
    if canonical { s.parse().ok() } else { None }
}

/// Parse `<tag><pitch>`.
fn parse_note(s: &str) -> Option<(char, usize)> {
    let mut chars = s.chars();
    let voice = chars.next().filter(char::is_ascii_lowercase)?;
    Some((voice, parse_index(chars.as_str())?))
}

impl FromStr for Token {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || EncodeError::MalformedToken(s.to_string());
        if let Some(n) = s.strip_prefix("wait").and_then(parse_index) {
            return if n == 0 { Err(bad()) } else { Ok(Token::Wait(n)) };
        }
        if let Some((voice, pitch)) = s.strip_prefix("end").and_then(parse_note) {
            return Ok(Token::End { voice, pitch });
        }
        parse_note(s)
            .map(|(voice, pitch)| Token::Strike { voice, pitch })
            .ok_or_else(bad)
    }
}

/// For each row, the index of the next row with the same voice tag.
fn next_rows_by_voice(rows: &[ChordwiseRow]) -> Vec<Option<usize>> {
    let mut next = vec![None; rows.len()];
    let mut seen: BTreeMap<char, usize> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate().rev() {
        next[i] = seen.insert(row.tag(), i);
    }
    next
}

/// Append the raw tokens of `rows` (elementary waits uncollapsed) to `out`.
/// Lookahead never leaves `rows`.
fn tokenize_into(rows: &[ChordwiseRow], base_tag: char, out: &mut Vec<Token>) {
    let next = next_rows_by_voice(rows);
    for (row, next) in rows.iter().zip(next) {
        let voice = row.tag();
        let next_digits = next.map(|k| rows[k].digits());
        for (pitch, &digit) in row.digits().iter().enumerate() {
            if digit == b'0' {
                continue;
            }
            if digit == b'1' {
                out.push(Token::Strike { voice, pitch });
            }
            let ends = match next_digits {
                None => true,
                Some(digits) => digits.get(pitch).is_none_or(|&d| d == b'0'),
            };
            if ends {
                out.push(Token::End { voice, pitch });
            }
        }
        if voice == base_tag {
            out.push(Token::Wait(1));
        }
    }
}

/// Collapse every run of consecutive waits into as few waits as possible,
/// each at most `cap` long; the run's total length is preserved.
pub fn compress_waits(tokens: Vec<Token>, cap: usize) -> Vec<Token> {
    let cap = cap.max(1);
    let mut out = Vec::with_capacity(tokens.len());
    let mut run = 0;
    for token in tokens {
        match token {
            Token::Wait(n) => run += n,
            other => {
                flush_waits(&mut out, &mut run, cap);
                out.push(other);
            }
        }
    }
    flush_waits(&mut out, &mut run, cap);
    out
}

fn flush_waits(out: &mut Vec<Token>, run: &mut usize, cap: usize) {
    while *run > 0 {
        let n = (*run).min(cap);
        out.push(Token::Wait(n));
        *run -= n;
    }
}

/// Serialize tokens as space-joined text.
pub fn to_text(tokens: &[Token]) -> String {
    let mut out = String::with_capacity(tokens.len() * 5);
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&token.to_string());
    }
    out
}

/// Parse space-joined notewise text.
pub fn parse_text(text: &str) -> Result<Vec<Token>, EncodeError> {
    text.split_whitespace().map(str::parse).collect()
}

/// Converts chordwise rows to notewise tokens for one encoding configuration.
#[derive(Debug, Clone)]
pub struct NotewiseEncoder {
    wait_cap: usize,
    base_tag: char,
    lookahead: Lookahead,
}

impl NotewiseEncoder {
    pub fn new(config: &EncodingConfig) -> Result<Self, EncodeError> {
        config.validate()?;
        Ok(NotewiseEncoder {
            wait_cap: config.wait_cap(),
            base_tag: config.voices.base_tag(),
            lookahead: config.lookahead,
        })
    }

    /// Encode one contiguous row sequence.
    pub fn encode_rows(&self, rows: &[ChordwiseRow]) -> Result<Vec<Token>, EncodeError> {
        chordwise::uniform_width(rows)?;
        let mut raw = Vec::with_capacity(rows.len() * 2);
        tokenize_into(rows, self.base_tag, &mut raw);
        Ok(compress_waits(raw, self.wait_cap))
    }

    /// Encode the twelve transposed copies as one stream, honoring the
    /// configured lookahead scope.
    pub fn encode_augmented(&self, augmented: &AugmentedRows) -> Result<Vec<Token>, EncodeError> {
        match self.lookahead {
            Lookahead::Scoped => {
                let mut raw = Vec::with_capacity(augmented.len() * 2);
                for block in augmented.blocks() {
                    chordwise::uniform_width(block)?;
                    tokenize_into(block, self.base_tag, &mut raw);
                }
                Ok(compress_waits(raw, self.wait_cap))
            }
            Lookahead::Legacy => self.encode_rows(&augmented.to_rows()),
        }
    }
}

/// Encode a row sequence to notewise text in one call.
pub fn encode(
    rows: &[ChordwiseRow],
    sample_freq: u32,
    voices: &VoiceTable,
) -> Result<String, EncodeError> {
    let mut config = EncodingConfig::new(sample_freq, chordwise::uniform_width(rows)?.max(1), 0);
    config.voices = voices.clone();
    let tokens = NotewiseEncoder::new(&config)?.encode_rows(rows)?;
    Ok(to_text(&tokens))
}
