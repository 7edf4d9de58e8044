use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use log::{debug, info, LevelFilter};

use jobstats::{
    compare_frontend_stats, incrementality_rows, load_paired_stats_dirs, load_stats_dir,
    paired_incrementality, JobStats, Thresholds, TraceEvent,
};

mod report;
use report::{write_trace, TsvRow, TsvWriter};

/// Summarize one or more compiler -stats-output-dir directories
#[derive(Debug, Parser)]
#[command(name = "process-stats-dir")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["catapult", "incrementality", "compare_frontend_stats"])
))]
struct Cli {
    /// Report activity verbosely
    #[arg(short, long)]
    verbose: bool,

    /// Write output to file ("-" for stdout)
    #[arg(long, default_value = "-")]
    output: PathBuf,

    /// Process two dirs-of-stats-dirs, pairwise
    #[arg(long, requires = "incrementality")]
    paired: bool,

    /// Percentage change required to report
    #[arg(long, default_value_t = 0.01)]
    delta_pct_thresh: f64,

    /// Absolute delta on times required to report, in microseconds
    #[arg(long, default_value_t = 100_000)]
    delta_usec_thresh: u64,

    /// Emit a catapult-compatible trace of events
    #[arg(long)]
    catapult: bool,

    /// Summarize the incrementality of a build
    #[arg(long)]
    incrementality: bool,

    /// Compare frontend stats from two stats-dirs
    #[arg(long)]
    compare_frontend_stats: bool,

    /// Stats directories to process
    dirs: Vec<PathBuf>,
}

enum Mode<'a> {
    Catapult,
    Incrementality,
    PairedIncrementality { old: &'a Path, new: &'a Path },
    CompareFrontendStats { old: &'a Path, new: &'a Path },
}

impl Cli {
    /// Resolves the selected mode, exiting with a usage error when a
    /// two-directory mode was not given exactly two directories
    fn mode(&self) -> Mode<'_> {
        if self.catapult {
            Mode::Catapult
        } else if self.compare_frontend_stats {
            let (old, new) = self.old_and_new();
            Mode::CompareFrontendStats { old, new }
        } else if self.paired {
            let (old, new) = self.old_and_new();
            Mode::PairedIncrementality { old, new }
        } else {
            Mode::Incrementality
        }
    }

    fn thresholds(&self) -> Thresholds {
        Thresholds {
            delta_pct: self.delta_pct_thresh,
            delta_usec: self.delta_usec_thresh,
        }
    }

    fn old_and_new(&self) -> (&Path, &Path) {
        match self.dirs.as_slice() {
            [old, new] => (old.as_path(), new.as_path()),
            dirs => Cli::command()
                .error(
                    ErrorKind::WrongNumberOfValues,
                    format!("expected an old and a new directory, got {}", dirs.len()),
                )
                .exit(),
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn load(dir: &Path) -> Result<Vec<JobStats>> {
    load_stats_dir(dir).with_context(|| format!("Failed to load stats from {}", dir.display()))
}

fn write_table<R: TsvRow>(out: &mut dyn Write, rows: &[R]) -> Result<()> {
    let mut writer = TsvWriter::<_, R>::new(out)?;
    writer.write_rows(rows)?;
    writer.into_inner()?;
    Ok(())
}

fn write_catapult_trace(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let mut events = Vec::new();
    for dir in &cli.dirs {
        events.extend(load(dir)?.iter().map(TraceEvent::from));
    }

    info!("Writing {} trace events", events.len());
    write_trace(out, &events).with_context(|| "Failed to write trace")?;
    Ok(())
}

fn show_incrementality(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let mut rows = Vec::new();
    for dir in &cli.dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        rows.extend(incrementality_rows(&name, &load(dir)?));
    }

    write_table(out, &rows)
}

fn show_paired_incrementality(old: &Path, new: &Path, out: &mut dyn Write) -> Result<()> {
    let paired = load_paired_stats_dirs(old, new).with_context(|| {
        format!(
            "Failed to pair stats dirs {} and {}",
            old.display(),
            new.display()
        )
    })?;

    let rows: Vec<_> = paired
        .iter()
        .filter_map(|p| paired_incrementality(&p.name, &p.old, &p.new))
        .collect();
    debug!("{} of {} paired dirs have incrementality", rows.len(), paired.len());

    write_table(out, &rows)
}

/// Returns the number of regressions found
fn compare_stats_dirs(
    old: &Path,
    new: &Path,
    thresholds: &Thresholds,
    out: &mut dyn Write,
) -> Result<usize> {
    let comparison = compare_frontend_stats(&load(old)?, &load(new)?, thresholds);

    info!(
        "{} frontend stats changed, {} regressed",
        comparison.rows.len(),
        comparison.regressions
    );
    write_table(out, &comparison.rows)?;
    Ok(comparison.regressions)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.dirs.is_empty() {
        Cli::command().print_help()?;
        return Ok(ExitCode::from(1));
    }

    // Usage errors must surface before the output file is truncated
    let mode = cli.mode();
    let mut out = open_output(&cli.output)?;

    let status = match mode {
        Mode::Catapult => {
            write_catapult_trace(&cli, &mut out)?;
            ExitCode::SUCCESS
        }
        Mode::Incrementality => {
            show_incrementality(&cli, &mut out)?;
            ExitCode::SUCCESS
        }
        Mode::PairedIncrementality { old, new } => {
            show_paired_incrementality(old, new, &mut out)?;
            ExitCode::SUCCESS
        }
        Mode::CompareFrontendStats { old, new } => {
            let regressions = compare_stats_dirs(old, new, &cli.thresholds(), &mut out)?;
            // Clamp so that a multiple of 256 regressions still reads as failure
            ExitCode::from(u8::try_from(regressions).unwrap_or(u8::MAX))
        }
    };

    out.flush().with_context(|| "Failed to flush output")?;
    Ok(status)
}
