// Transposition augmentation of chordwise rows.
//
// Each row's digit payload is padded with six silent pitches on both sides
// and a window of the original width is cut from the padded string at
// offsets 0 through 11. Offset 6 reproduces the input; offset 0 moves every
// pitch up six semitones, offset 11 moves it down five. Pitches pushed past
// either edge of the window are lost, and the vacated side is silent.
//
// The output keeps the twelve shifted copies as separate blocks in shift
// order. Callers that want the flat reference layout (all rows of shift 0,
// then all rows of shift 1, ...) use `AugmentedRows::to_rows`; the notewise
// encoder uses the blocks to keep its lookahead inside one copy.

use crate::chordwise::{self, ChordwiseRow};
use crate::error::EncodeError;

/// Number of transposed copies.
pub const SHIFTS: usize = 12;

/// Silent pitches padded onto each side of the payload before slicing.
/// Twice this is the largest slice offset, so every slice stays in bounds.
pub const PADDING: usize = SHIFTS / 2;

/// Twelve transposed copies of a row sequence, one block per shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedRows {
    blocks: Vec<Vec<ChordwiseRow>>,
}

impl AugmentedRows {
    pub fn blocks(&self) -> &[Vec<ChordwiseRow>] {
        &self.blocks
    }

    pub fn block(&self, shift: usize) -> Option<&[ChordwiseRow]> {
        self.blocks.get(shift).map(Vec::as_slice)
    }

    /// Total number of rows across all blocks.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows in shift order, blocks concatenated end to end.
    pub fn iter(&self) -> impl Iterator<Item = &ChordwiseRow> {
        self.blocks.iter().flatten()
    }

    /// Flatten into the concatenated reference layout.
    pub fn to_rows(&self) -> Vec<ChordwiseRow> {
        self.blocks.concat()
    }
}

/// Cut the width-preserving window at `offset` from the padded payload.
fn transpose_row(row: &ChordwiseRow, offset: usize, padding: &str) -> ChordwiseRow {
    let width = row.width();
    let mut padded = String::with_capacity(width + 2 * PADDING);
    padded.push_str(padding);
    padded.push_str(row.body());
    padded.push_str(padding);
    ChordwiseRow::from_parts(row.tag(), &padded[offset..offset + width])
}

/// Produce the twelve transposed copies of `rows`. All rows must share one
/// width.
pub fn augment(rows: &[ChordwiseRow]) -> Result<AugmentedRows, EncodeError> {
    chordwise::uniform_width(rows)?;
    let padding = "0".repeat(PADDING);
    let blocks = (0..SHIFTS)
        .map(|offset| {
            rows.iter()
                .map(|row| transpose_row(row, offset, &padding))
                .collect()
        })
        .collect();
    Ok(AugmentedRows { blocks })
}
