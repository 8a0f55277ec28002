// End-to-end batch runs over MIDI files written to a scratch directory.

use midi_corpus::config::{Lookahead, NoteWindow, RunConfig};
use midi_corpus::error::{EncodeError, PieceError};
use midi_corpus::notewise;
use midi_corpus::pipeline::{OutputLayout, discover, run_batch};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u28},
};
use std::fs;
use std::path::{Path, PathBuf};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("midi_corpus_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// One quarter note of `key` at 480 ticks per quarter, or an empty track.
fn smf(key: Option<u8>) -> Vec<u8> {
    let mut track = Vec::new();
    if let Some(key) = key {
        let channel = u4::new(0);
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(80),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(480),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        });
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))));
    smf.tracks.push(track);
    let mut buf = Vec::new();
    smf.write(&mut buf).unwrap();
    buf
}

/// A single note at one tick per quarter, followed by the longest delta a
/// track event can carry before the end of the track.
fn very_long_smf() -> Vec<u8> {
    let channel = u4::new(0);
    let track = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(80),
                },
            },
        },
        TrackEvent {
            delta: u28::new(1),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(60),
                    vel: u7::new(0),
                },
            },
        },
        TrackEvent {
            delta: u28::max_value(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(1))));
    smf.tracks.push(track);
    let mut buf = Vec::new();
    smf.write(&mut buf).unwrap();
    buf
}

fn write(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn small_run() -> RunConfig {
    RunConfig {
        sample_freqs: vec![4],
        note_ranges: vec![NoteWindow {
            range: 38,
            offset: 45,
        }],
        ..RunConfig::default()
    }
}

#[test]
fn test_batch_writes_corpora_and_reports_skips() {
    let dir = scratch("batch");
    let input = dir.join("in");
    write(&input.join("bach/prelude.mid"), &smf(Some(60)));
    write(&input.join("bach/silence.mid"), &smf(None));
    write(&input.join("bach/broken.MID"), b"definitely not midi");
    write(&input.join("bach/notes.txt"), b"ignored");

    let jobs = discover(&[input]).unwrap();
    let stems: Vec<&str> = jobs.iter().map(|j| j.stem.as_str()).collect();
    assert_eq!(stems, ["broken", "prelude", "silence"]);
    assert!(jobs.iter().all(|j| j.composer == "bach"));

    let out = dir.join("out");
    let report = run_batch(&jobs, &small_run(), &OutputLayout::new(&out)).unwrap();

    let chordwise_path = out.join("chordwise/note_range38/sample_freq4/bach/prelude.txt");
    let notewise_path = out.join("notewise/note_range38/sample_freq4/bach/prelude.txt");
    assert_eq!(report.written, [chordwise_path.clone(), notewise_path.clone()]);

    // Middle C sits at index 15 of the 45-based window: a strike, three
    // holds, then the final silent step.
    let row = |digit: char| {
        let mut body = vec!['0'; 38];
        body[15] = digit;
        format!("p{}", body.into_iter().collect::<String>())
    };
    let silent = format!("p{}", "0".repeat(38));
    let expected = [row('1'), row('2'), row('2'), row('2'), silent].join(" ");
    assert_eq!(fs::read_to_string(&chordwise_path).unwrap(), expected);

    let notewise_text = fs::read_to_string(&notewise_path).unwrap();
    assert!(notewise_text.starts_with("p21 wait3 endp21 wait2 p20 wait3 endp20 wait2"));
    assert!(notewise_text.ends_with("p10 wait3 endp10 wait2"));
    assert_eq!(notewise::parse_text(&notewise_text).unwrap().len(), 12 * 4);

    assert_eq!(report.skipped.len(), 2);
    let broken = &report.skipped[0];
    assert!(broken.piece.ends_with("broken.MID"));
    assert!(matches!(broken.reason, PieceError::SourceUnavailable(_)));
    let silence = &report.skipped[1];
    assert!(silence.piece.ends_with("silence.mid"));
    assert!(matches!(
        silence.reason,
        PieceError::EmptyEncoding {
            sample_freq: 4,
            note_range: 38
        }
    ));
    assert!(!out.join("chordwise/note_range38/sample_freq4/bach/silence.txt").exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_every_configuration_gets_its_own_files() {
    let dir = scratch("configs");
    let piece = dir.join("in/anon/tune.mid");
    write(&piece, &smf(Some(67)));

    let jobs = discover(std::slice::from_ref(&piece)).unwrap();
    let out = dir.join("out");
    let report = run_batch(&jobs, &RunConfig::default(), &OutputLayout::new(&out)).unwrap();
    assert_eq!(report.written.len(), 8);
    assert!(report.skipped.is_empty());
    for (range, freq) in [(38, 4), (62, 4), (38, 12), (62, 12)] {
        for corpus in ["chordwise", "notewise"] {
            let path = out.join(format!(
                "{corpus}/note_range{range}/sample_freq{freq}/anon/tune.txt"
            ));
            assert!(path.exists(), "missing {}", path.display());
        }
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_output_is_deterministic_and_lookahead_configurable() {
    let dir = scratch("determinism");
    let piece = dir.join("in/anon/tune.mid");
    write(&piece, &smf(Some(60)));
    let jobs = discover(std::slice::from_ref(&piece)).unwrap();

    let notewise_of = |run: &RunConfig, tag: &str| {
        let out = dir.join(tag);
        run_batch(&jobs, run, &OutputLayout::new(&out)).unwrap();
        fs::read_to_string(out.join("notewise/note_range38/sample_freq4/anon/tune.txt")).unwrap()
    };

    let scoped = notewise_of(&small_run(), "a");
    assert_eq!(scoped, notewise_of(&small_run(), "b"));

    // A single note that ends before the last timestep never reaches the
    // block boundary, so both lookahead scopes agree here.
    let legacy_run = RunConfig {
        lookahead: Lookahead::Legacy,
        ..small_run()
    };
    assert_eq!(scoped, notewise_of(&legacy_run, "legacy"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_oversized_piece_is_skipped_and_batch_continues() {
    let dir = scratch("oversized");
    let input = dir.join("in/x");
    write(&input.join("a_good.mid"), &smf(Some(60)));
    write(&input.join("b_huge.mid"), &very_long_smf());

    let jobs = discover(&[dir.join("in")]).unwrap();
    let run = RunConfig {
        sample_freqs: vec![12],
        note_ranges: vec![NoteWindow {
            range: 62,
            offset: 33,
        }],
        ..RunConfig::default()
    };
    let out = dir.join("out");
    let report = run_batch(&jobs, &run, &OutputLayout::new(&out)).unwrap();

    assert_eq!(report.written.len(), 2);
    assert!(report.written.iter().all(|p| p.ends_with("x/a_good.txt")));
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].piece.ends_with("b_huge.mid"));
    assert!(matches!(
        report.skipped[0].reason,
        PieceError::TooLarge {
            sample_freq: 12,
            note_range: 62,
            source: EncodeError::GridTooLarge { .. }
        }
    ));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_colliding_outputs_keep_first_piece() {
    let dir = scratch("collision");
    let first = dir.join("a/x/song.mid");
    let second = dir.join("b/x/song.mid");
    write(&first, &smf(Some(60)));
    write(&second, &smf(Some(64)));

    let jobs = discover(&[dir.join("a"), dir.join("b")]).unwrap();
    assert_eq!(jobs.len(), 2);
    let out = dir.join("out");
    let report = run_batch(&jobs, &small_run(), &OutputLayout::new(&out)).unwrap();

    assert_eq!(report.written.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].piece, second);
    match &report.skipped[0].reason {
        PieceError::OutputCollision { other } => assert_eq!(other, &first),
        other => panic!("unexpected skip reason {other}"),
    }
    // The file holds the first piece: middle C at index 15.
    let text =
        fs::read_to_string(out.join("chordwise/note_range38/sample_freq4/x/song.txt")).unwrap();
    assert_eq!(text.as_bytes()[16], b'1');

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_input_fails_discovery() {
    let dir = scratch("missing");
    assert!(discover(&[dir.join("nope")]).is_err());
    let _ = fs::remove_dir_all(&dir);
}
