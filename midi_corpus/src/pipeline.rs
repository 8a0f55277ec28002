// Batch pipeline: MIDI files in, chordwise and notewise corpora out.
//
// For each piece the MIDI source is parsed once. Then, for every
// (sample_freq, note window) configuration, the piece goes through
// grid encoding -> transposition augmentation -> notewise encoding, strictly
// in that order. The chordwise corpus gets the rows before augmentation; the
// notewise corpus gets the token stream of all twelve transpositions.
//
// Output paths are derived from an explicit root (`OutputLayout`), never from
// the process working directory:
//   <root>/chordwise/note_range<R>/sample_freq<F>/<composer>/<stem>.txt
//   <root>/notewise/note_range<R>/sample_freq<F>/<composer>/<stem>.txt
// where <composer> is the name of the directory holding the MIDI file.
//
// Pieces are independent and run in parallel on the rayon pool. Two pieces
// with the same composer and stem would share output files, so only the first
// in path order is encoded. A piece that collides, cannot be read, has no
// note content, exceeds the grid budget or cannot be written is logged and
// recorded in the `BatchReport`; the batch carries on. Encoder invariant
// violations abort the run.

use crate::augment::augment;
use crate::chordwise;
use crate::config::{EncodingConfig, RunConfig};
use crate::error::{EncodeError, PieceError, RunError};
use crate::event::Piece;
use crate::grid;
use crate::midi::read_midi;
use crate::notewise::{self, NotewiseEncoder};
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Composer name for files with no enclosing directory.
const UNKNOWN_COMPOSER: &str = "unknown";

/// Both encodings of one piece at one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub chordwise: String,
    pub notewise: String,
}

/// Run the full encoding pipeline for one piece and configuration.
pub fn encode_piece(piece: &Piece, config: &EncodingConfig) -> Result<Encoded, EncodeError> {
    let rows = grid::encode(piece, config)?;
    if rows.is_empty() {
        return Err(EncodeError::EmptyEncoding);
    }
    let augmented = augment(&rows)?;
    let tokens = NotewiseEncoder::new(config)?.encode_augmented(&augmented)?;
    Ok(Encoded {
        chordwise: chordwise::join(&rows),
        notewise: notewise::to_text(&tokens),
    })
}

/// Which of the two corpora a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corpus {
    Chordwise,
    Notewise,
}

impl Corpus {
    pub fn dir_name(self) -> &'static str {
        match self {
            Corpus::Chordwise => "chordwise",
            Corpus::Notewise => "notewise",
        }
    }
}

/// One MIDI file to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceJob {
    pub path: PathBuf,
    pub composer: String,
    pub stem: String,
}

impl PieceJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let composer = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNKNOWN_COMPOSER.to_string());
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        PieceJob {
            path,
            composer,
            stem,
        }
    }
}

/// Where output files go.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, corpus: Corpus, config: &EncodingConfig, job: &PieceJob) -> PathBuf {
        self.root
            .join(corpus.dir_name())
            .join(format!("note_range{}", config.note_range))
            .join(format!("sample_freq{}", config.sample_freq))
            .join(&job.composer)
            .join(format!("{}.txt", job.stem))
    }
}

/// Write `text` to `path`, creating parent directories.
pub fn write_text(path: &Path, text: &str) -> Result<(), PieceError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)
    };
    write().map_err(|source| PieceError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn is_midi(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
}

fn collect_midi(path: &Path, top_level: bool, out: &mut Vec<PathBuf>) -> Result<(), RunError> {
    let err = |source| RunError::Discover {
        path: path.to_path_buf(),
        source,
    };
    if fs::metadata(path).map_err(err)?.is_dir() {
        for entry in fs::read_dir(path).map_err(err)? {
            collect_midi(&entry.map_err(err)?.path(), false, out)?;
        }
    } else if top_level || is_midi(path) {
        out.push(path.to_path_buf());
    }
    Ok(())
}

/// Expand inputs into piece jobs. Directories are walked recursively for
/// `.mid`/`.midi` files; files named directly are taken as they are.
pub fn discover(inputs: &[PathBuf]) -> Result<Vec<PieceJob>, RunError> {
    let mut files = Vec::new();
    for input in inputs {
        collect_midi(input, true, &mut files)?;
    }
    files.sort();
    files.dedup();
    Ok(files.into_iter().map(PieceJob::new).collect())
}

/// A piece (or one configuration of it) that produced no output.
#[derive(Debug)]
pub struct Skipped {
    pub piece: PathBuf,
    pub reason: PieceError,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
}

impl BatchReport {
    fn skip(&mut self, job: &PieceJob, reason: PieceError) {
        warn!(piece = %job.path.display(), %reason, "skipping");
        self.skipped.push(Skipped {
            piece: job.path.clone(),
            reason,
        });
    }

    fn merge(&mut self, other: BatchReport) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
    }
}

fn write_encoded(
    layout: &OutputLayout,
    config: &EncodingConfig,
    job: &PieceJob,
    encoded: &Encoded,
) -> Result<Vec<PathBuf>, PieceError> {
    let mut written = Vec::with_capacity(2);
    for (corpus, text) in [
        (Corpus::Chordwise, &encoded.chordwise),
        (Corpus::Notewise, &encoded.notewise),
    ] {
        let path = layout.path(corpus, config, job);
        write_text(&path, text)?;
        written.push(path);
    }
    Ok(written)
}

/// Encode one piece at every configuration and write its files.
pub fn process_piece(
    job: &PieceJob,
    run: &RunConfig,
    encodings: &[EncodingConfig],
    layout: &OutputLayout,
) -> Result<BatchReport, RunError> {
    let mut report = BatchReport::default();
    let piece = match read_midi(&job.path, |channel| run.voice_for_channel(channel)) {
        Ok(piece) => piece,
        Err(err) => {
            report.skip(job, err.into());
            return Ok(report);
        }
    };
    debug!(piece = %job.path.display(), notes = piece.events.len(), "parsed");

    for config in encodings {
        match encode_piece(&piece, config) {
            Ok(encoded) => match write_encoded(layout, config, job, &encoded) {
                Ok(paths) => {
                    debug!(
                        piece = %job.path.display(),
                        sample_freq = config.sample_freq,
                        note_range = config.note_range,
                        chordwise_len = encoded.chordwise.len(),
                        notewise_len = encoded.notewise.len(),
                        "encoded"
                    );
                    report.written.extend(paths);
                }
                Err(err) => report.skip(job, err),
            },
            Err(EncodeError::EmptyEncoding) => report.skip(
                job,
                PieceError::EmptyEncoding {
                    sample_freq: config.sample_freq,
                    note_range: config.note_range,
                },
            ),
            Err(source) if source.exceeds_limits() => report.skip(
                job,
                PieceError::TooLarge {
                    sample_freq: config.sample_freq,
                    note_range: config.note_range,
                    source,
                },
            ),
            Err(source) => {
                return Err(RunError::Invariant {
                    piece: job.path.clone(),
                    source,
                });
            }
        }
    }

    if !report.written.is_empty() {
        info!(piece = %job.path.display(), files = report.written.len(), "done");
    }
    Ok(report)
}

/// Split jobs into those that own their output paths and those whose
/// (composer, stem) was already claimed by an earlier job. The later job of a
/// colliding pair is skipped.
fn claim_outputs<'a>(jobs: &'a [PieceJob], report: &mut BatchReport) -> Vec<&'a PieceJob> {
    let mut owners: HashMap<(&str, &str), &Path> = HashMap::new();
    let mut claimed = Vec::with_capacity(jobs.len());
    for job in jobs {
        match owners.entry((job.composer.as_str(), job.stem.as_str())) {
            Entry::Occupied(owner) => {
                let other = owner.get().to_path_buf();
                report.skip(job, PieceError::OutputCollision { other });
            }
            Entry::Vacant(slot) => {
                slot.insert(&job.path);
                claimed.push(job);
            }
        }
    }
    claimed
}

/// Encode every job in parallel. The configuration is validated before any
/// piece is read.
pub fn run_batch(
    jobs: &[PieceJob],
    run: &RunConfig,
    layout: &OutputLayout,
) -> Result<BatchReport, RunError> {
    run.validate()?;
    let encodings = run.encodings();
    let mut report = BatchReport::default();
    let claimed = claim_outputs(jobs, &mut report);
    let reports = claimed
        .par_iter()
        .map(|job| process_piece(job, run, &encodings, layout))
        .collect::<Result<Vec<_>, _>>()?;

    for piece_report in reports {
        report.merge(piece_report);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoteEvent;
    use std::num::NonZeroU32;

    fn quarters(total: u64, events: Vec<NoteEvent>) -> Piece {
        Piece::new(NonZeroU32::new(1).unwrap(), total, events)
    }

    #[test]
    fn test_encode_piece_outputs() {
        let config = EncodingConfig::new(1, 12, 60);
        let piece = quarters(
            1,
            vec![NoteEvent {
                pitch: 66,
                onset: 0,
                duration: 2,
                voice: 0,
            }],
        );
        let encoded = encode_piece(&piece, &config).unwrap();
        // Chordwise output is the untransposed grid.
        assert_eq!(encoded.chordwise, "p000000100000 p000000200000");
        // Twelve copies of a two-step note: offset 0 pushes pitch 6 out of
        // the window, offsets 1..=11 place it at 11 down to 1.
        let tokens = notewise::parse_text(&encoded.notewise).unwrap();
        let strikes = tokens
            .iter()
            .filter(|t| matches!(t, notewise::Token::Strike { .. }))
            .count();
        let ends = tokens
            .iter()
            .filter(|t| matches!(t, notewise::Token::End { .. }))
            .count();
        assert_eq!(strikes, 11);
        assert_eq!(ends, 11);
        assert!(encoded.notewise.starts_with("wait2 p11 wait1 endp11 wait1 p10"));
        assert!(encoded.notewise.ends_with("p1 wait1 endp1 wait1"));
    }

    #[test]
    fn test_empty_piece_is_empty_encoding() {
        let config = EncodingConfig::new(4, 38, 45);
        assert_eq!(
            encode_piece(&quarters(16, vec![]), &config),
            Err(EncodeError::EmptyEncoding)
        );
    }

    #[test]
    fn test_job_naming_and_layout() {
        let job = PieceJob::new("corpus/abba/dancing_queen.mid");
        assert_eq!(job.composer, "abba");
        assert_eq!(job.stem, "dancing_queen");
        let loose = PieceJob::new("song.midi");
        assert_eq!(loose.composer, UNKNOWN_COMPOSER);

        let layout = OutputLayout::new("/out");
        let config = EncodingConfig::new(12, 62, 33);
        assert_eq!(
            layout.path(Corpus::Notewise, &config, &job),
            Path::new("/out/notewise/note_range62/sample_freq12/abba/dancing_queen.txt")
        );
        assert_eq!(
            layout.path(Corpus::Chordwise, &config, &job),
            Path::new("/out/chordwise/note_range62/sample_freq12/abba/dancing_queen.txt")
        );
    }

    #[test]
    fn test_is_midi() {
        assert!(is_midi(Path::new("a/b.mid")));
        assert!(is_midi(Path::new("a/b.MIDI")));
        assert!(!is_midi(Path::new("a/b.txt")));
        assert!(!is_midi(Path::new("a/mid")));
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let mut run = RunConfig::default();
        run.sample_freqs = vec![0];
        let jobs = vec![PieceJob::new("does/not/exist.mid")];
        let result = run_batch(&jobs, &run, &OutputLayout::new("unused"));
        assert!(matches!(result, Err(RunError::Config(_))));
    }
}
