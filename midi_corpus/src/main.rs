// MIDI Corpus Encoder: CLI entry point.
//
// Encodes every MIDI file under the given inputs into chordwise and notewise
// text corpora, at each configured sample frequency and note window.
//
// Usage:
//   cargo run -p midi_corpus --bin encode -- [INPUTS]... --output DIR
//     [--config FILE] [--sample-freq N]... [--note-range RANGE:OFFSET]...
//     [--lookahead scoped|legacy] [--jobs N] [--verbose] [--print-config]
//
// Command-line values override the config file, which overrides the built-in
// defaults. Log verbosity follows RUST_LOG when it is set.

use anyhow::Context;
use clap::Parser;
use midi_corpus::config::{Lookahead, NoteWindow, RunConfig};
use midi_corpus::pipeline::{OutputLayout, discover, run_batch};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Encode MIDI files into chordwise and notewise text corpora
#[derive(Parser)]
#[command(name = "encode")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// MIDI files or directories to scan recursively
    inputs: Vec<PathBuf>,

    /// Root directory for the corpora
    #[arg(short, long, required_unless_present = "print_config")]
    output: Option<PathBuf>,

    /// JSON run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Grid steps per quarter note (repeatable)
    #[arg(long = "sample-freq")]
    sample_freqs: Vec<u32>,

    /// Pitch window as RANGE:OFFSET, e.g. 38:45 (repeatable)
    #[arg(long = "note-range")]
    note_ranges: Vec<NoteWindow>,

    /// Notewise lookahead scope across transposition blocks
    #[arg(long, value_enum)]
    lookahead: Option<Lookahead>,

    /// Worker threads (defaults to one per core)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Log per-configuration detail
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

/// Filter used when RUST_LOG is unset: this binary and the library at the
/// same level.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{}={level},midi_corpus={level}", env!("CARGO_CRATE_NAME"))
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    let mut run = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if !cli.sample_freqs.is_empty() {
        run.sample_freqs = cli.sample_freqs.clone();
    }
    if !cli.note_ranges.is_empty() {
        run.note_ranges = cli.note_ranges.clone();
    }
    if let Some(lookahead) = cli.lookahead {
        run.lookahead = lookahead;
    }
    run.validate()?;
    Ok(run)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let run = run_config(&cli)?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }
    let Some(output) = cli.output.clone() else {
        anyhow::bail!("--output is required");
    };
    if cli.inputs.is_empty() {
        anyhow::bail!("no input files or directories given");
    }

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("cannot configure worker pool")?;
    }

    let jobs = discover(&cli.inputs)?;
    tracing::info!(
        pieces = jobs.len(),
        encodings = run.encodings().len(),
        output = %output.display(),
        "starting"
    );

    let report = run_batch(&jobs, &run, &OutputLayout::new(output))?;
    tracing::info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        "finished"
    );
    Ok(())
}
