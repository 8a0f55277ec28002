// Chordwise rows: the serialized form of one (timestep, voice) slice of the
// grid.
//
// A row is a single lowercase voice tag followed by one digit per pitch in
// the window: '0' silent, '1' strike, '2' hold. Example with a four-pitch
// window: "p0120". A piece's chordwise encoding is its rows joined by single
// spaces, timestep-ascending, voice-descending within a timestep.
//
// Rows are pure ASCII, so byte offsets and character offsets coincide.

use crate::error::EncodeError;
use crate::grid::Cell;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChordwiseRow(String);

impl ChordwiseRow {
    /// Build a row from a voice tag and that voice's pitch vector.
    /// The tag comes from a validated `VoiceTable`.
    pub(crate) fn from_cells(tag: char, cells: &[Cell]) -> Self {
        let mut row = String::with_capacity(cells.len() + 1);
        row.push(tag);
        row.extend(cells.iter().map(|c| c.digit()));
        ChordwiseRow(row)
    }

    /// Build a row from a tag and an already-valid digit payload.
    pub(crate) fn from_parts(tag: char, body: &str) -> Self {
        let mut row = String::with_capacity(body.len() + 1);
        row.push(tag);
        row.push_str(body);
        ChordwiseRow(row)
    }

    /// Parse and validate a single row.
    pub fn parse(s: &str) -> Result<Self, EncodeError> {
        let mut chars = s.chars();
        let tag_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let body_ok = chars.all(|c| Cell::from_digit(c).is_some());
        if tag_ok && body_ok {
            Ok(ChordwiseRow(s.to_string()))
        } else {
            Err(EncodeError::MalformedRow(s.to_string()))
        }
    }

    pub fn tag(&self) -> char {
        // Validated non-empty ASCII.
        char::from(self.0.as_bytes()[0])
    }

    /// The digit payload without the voice tag.
    pub fn body(&self) -> &str {
        &self.0[1..]
    }

    /// Digit payload as bytes (`b'0'`, `b'1'` or `b'2'`).
    pub fn digits(&self) -> &[u8] {
        &self.0.as_bytes()[1..]
    }

    /// Number of pitches in the row.
    pub fn width(&self) -> usize {
        self.0.len() - 1
    }

    pub fn cell(&self, pitch: usize) -> Option<Cell> {
        self.digits()
            .get(pitch)
            .and_then(|&d| Cell::from_digit(char::from(d)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChordwiseRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChordwiseRow {
    type Error = EncodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ChordwiseRow::parse(&s)
    }
}

impl From<ChordwiseRow> for String {
    fn from(row: ChordwiseRow) -> Self {
        row.0
    }
}

/// Serialize rows as the space-joined chordwise text.
pub fn join(rows: &[ChordwiseRow]) -> String {
    let mut out = String::with_capacity(rows.iter().map(|r| r.0.len() + 1).sum());
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&row.0);
    }
    out
}

/// Parse chordwise text back into rows. Any whitespace separates rows.
pub fn split(text: &str) -> Result<Vec<ChordwiseRow>, EncodeError> {
    text.split_whitespace().map(ChordwiseRow::parse).collect()
}

/// Check that every row has the same width and return it (0 for no rows).
pub fn uniform_width(rows: &[ChordwiseRow]) -> Result<usize, EncodeError> {
    let Some(first) = rows.first() else {
        return Ok(0);
    };
    let expected = first.width();
    for row in rows {
        if row.width() != expected {
            return Err(EncodeError::RaggedRows {
                row: row.0.clone(),
                width: row.width(),
                expected,
            });
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accessors() {
        let row = ChordwiseRow::parse("p0120").unwrap();
        assert_eq!(row.tag(), 'p');
        assert_eq!(row.body(), "0120");
        assert_eq!(row.width(), 4);
        assert_eq!(row.cell(1), Some(Cell::Strike));
        assert_eq!(row.cell(2), Some(Cell::Hold));
        assert_eq!(row.cell(4), None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "0120", "P0120", "p0130", "p01 2", "pé"] {
            assert!(
                matches!(ChordwiseRow::parse(bad), Err(EncodeError::MalformedRow(_))),
                "{bad:?} should be rejected"
            );
        }
        // A tag with an empty payload is a valid (zero-width) row.
        assert_eq!(ChordwiseRow::parse("p").unwrap().width(), 0);
    }

    #[test]
    fn test_from_cells() {
        let row = ChordwiseRow::from_cells('v', &[Cell::Silent, Cell::Strike, Cell::Hold]);
        assert_eq!(row.as_str(), "v012");
    }

    #[test]
    fn test_join_and_split() {
        let text = "p0100 p0200";
        let rows = split(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(join(&rows), text);
        assert_eq!(join(&[]), "");
        assert!(split("  ").unwrap().is_empty());
    }

    #[test]
    fn test_uniform_width() {
        let rows = split("p01 p20").unwrap();
        assert_eq!(uniform_width(&rows), Ok(2));
        let ragged = split("p01 p200").unwrap();
        assert!(matches!(
            uniform_width(&ragged),
            Err(EncodeError::RaggedRows { width: 3, expected: 2, .. })
        ));
        assert_eq!(uniform_width(&[]), Ok(0));
    }

    #[test]
    fn test_serde_validates() {
        let row: ChordwiseRow = serde_json::from_str("\"p012\"").unwrap();
        assert_eq!(row.as_str(), "p012");
        assert!(serde_json::from_str::<ChordwiseRow>("\"p019\"").is_err());
    }
}
