// MIDI Corpus Encoder
//
// Turns a collection of MIDI files into two plain-text training corpora for
// sequence models. The "chordwise" corpus is one token per voice per timestep,
// each a voice tag followed by a digit per pitch (0 silent, 1 strike, 2 hold).
// The "notewise" corpus is a stream of strike, end and wait events. Every
// piece is encoded at several time resolutions and pitch windows, and the
// notewise corpus carries twelve transposed copies of each piece.
//
// Architecture:
// - config.rs: Voice tags, per-encoding configuration, JSON-loadable run
//   configuration and its validation
// - error.rs: Error types per layer (config, source, encoder, piece, run)
// - event.rs: Note events and pieces, with exact tick-to-step quantization
// - midi.rs: Standard MIDI File reader producing a `Piece` (via midly)
// - grid.rs: Piece -> time x voice x pitch grid -> chordwise rows, plus the
//   octave-wrapping rule for pitches outside the window
// - chordwise.rs: The chordwise row token and its text form
// - augment.rs: Twelve-way transposition of chordwise rows
// - notewise.rs: Chordwise rows -> notewise tokens with wait compression
// - pipeline.rs: Batch driver: file discovery, output layout, parallel
//   per-piece processing and the skip report
//
// Encoding is deterministic: the same piece and configuration always yield
// byte-identical corpora.

pub mod augment;
pub mod chordwise;
pub mod config;
pub mod error;
pub mod event;
pub mod grid;
pub mod midi;
pub mod notewise;
pub mod pipeline;
