//! Firebird Trajectory Writer CLI Application
//!
//! Command-line host for the firebird-writer library:
//! - `stream` replays step records through the streaming writer
//! - `batch` replays whole events through the batch writer
//! - `inspect` validates and summarizes a written document
//!
//! Several inputs are processed in parallel, one writer and one output file
//! per input.

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use firebird_writer::{derive_output_name, load_document, FilterConfig, RunSummary};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

mod config;
mod input;

use config::{AppConfig, WriterOverrides};

/// Firebird Trajectory Writer - Convert simulated tracks to firebird-dex-json
#[derive(Parser, Debug)]
#[command(name = "firebird-writer")]
#[command(about = "Convert simulated particle tracks to firebird-dex-json", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay step records (JSON Lines) through the streaming writer
    Stream(RunArgs),
    /// Replay whole events (JSON Lines) through the batch writer
    Batch(RunArgs),
    /// Validate and summarize a firebird document
    Inspect {
        /// Document to inspect
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Input files (default: [input] files from the configuration)
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Output file (single input only)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Group name shown by the event display
    #[arg(long, value_name = "NAME")]
    component_name: Option<String>,

    /// Keep only primary tracks (`--only-primary=false` to keep all)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    only_primary: Option<bool>,

    /// Keep every optical photon (`--save-optical=false` to filter them)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    save_optical: Option<bool>,

    /// Vertex z window in mm
    #[arg(long, num_args = 2, value_names = ["Z_MIN", "Z_MAX"], allow_negative_numbers = true)]
    vertex_cut: Option<Vec<f64>>,

    /// Step window in mm
    #[arg(long, num_args = 3, value_names = ["Z_MIN", "Z_MAX", "R_MAX"], allow_negative_numbers = true)]
    step_cut: Option<Vec<f64>>,

    /// Minimum momentum in MeV/c
    #[arg(long, value_name = "MEV")]
    momentum_min: Option<f64>,

    /// Maximum momentum in MeV/c
    #[arg(long, value_name = "MEV")]
    momentum_max: Option<f64>,

    /// Minimum track length in mm
    #[arg(long, value_name = "MM")]
    track_length_min: Option<f64>,

    /// PDG codes to keep (can be repeated)
    #[arg(long = "particle", value_name = "PDG", allow_negative_numbers = true)]
    particles: Vec<i32>,

    /// Accept trajectories without per-point times (batch)
    #[arg(long)]
    no_rich_timing: bool,

    /// Log every time extraction
    #[arg(long)]
    verbose_time: bool,

    /// Worker threads for parallel inputs
    #[arg(short = 'j', long, value_name = "COUNT")]
    threads: Option<usize>,
}

impl RunArgs {
    /// Writer options given on the command line
    fn overrides(&self) -> WriterOverrides {
        let mut overrides = WriterOverrides {
            component_name: self.component_name.clone(),
            only_primary: self.only_primary,
            save_optical: self.save_optical,
            momentum_min: self.momentum_min,
            momentum_max: self.momentum_max,
            track_length_min: self.track_length_min,
            ..WriterOverrides::default()
        };

        if self.no_rich_timing {
            overrides.require_rich_trajectory = Some(false);
        }
        if self.verbose_time {
            overrides.verbose_time_extraction = Some(true);
        }
        if !self.particles.is_empty() {
            overrides.save_particles = Some(self.particles.clone());
        }
        if let Some([z_min, z_max]) = self.vertex_cut.as_deref() {
            overrides.vertex_cut = Some(true);
            overrides.vertex_z_min = Some(*z_min);
            overrides.vertex_z_max = Some(*z_max);
        }
        if let Some([z_min, z_max, r_max]) = self.step_cut.as_deref() {
            overrides.step_cut = Some(true);
            overrides.step_z_min = Some(*z_min);
            overrides.step_z_max = Some(*z_max);
            overrides.step_r_max = Some(*r_max);
        }
        overrides
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Stream,
    Batch,
}

impl Mode {
    fn preset(self) -> FilterConfig {
        match self {
            Mode::Stream => FilterConfig::stepping_defaults(),
            Mode::Batch => FilterConfig::default(),
        }
    }

    fn run(self, input: &Path, config: FilterConfig) -> Result<RunSummary> {
        match self {
            Mode::Stream => input::run_stream(input, config),
            Mode::Batch => input::run_batch(input, config),
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Firebird Trajectory Writer CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using writer library v{}", firebird_writer::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    match &args.command {
        Command::Stream(run) => run_mode(Mode::Stream, run, app_config),
        Command::Batch(run) => run_mode(Mode::Batch, run, app_config),
        Command::Inspect { file } => inspect(file),
    }
}

/// Run one writer per input, in parallel
fn run_mode(mode: Mode, run: &RunArgs, app_config: AppConfig) -> Result<()> {
    let inputs = if run.inputs.is_empty() {
        app_config.input.files.clone()
    } else {
        run.inputs.clone()
    };
    if inputs.is_empty() {
        bail!("No input files given (pass them on the command line or in [input] files)");
    }
    if run.output.is_some() && inputs.len() > 1 {
        bail!("--output can only be used with a single input");
    }

    let overrides = app_config.writer.clone().merged_with(run.overrides());
    let base = overrides.apply(mode.preset());
    base.validate()?;

    if let Some(threads) = run.threads.or(app_config.input.threads) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let jobs: Vec<(PathBuf, FilterConfig)> = inputs
        .iter()
        .map(|input| {
            let output = match &run.output {
                Some(path) => path.clone(),
                None => output_for(input, app_config.input.output_dir.as_deref()),
            };
            (input.clone(), base.clone().with_output_file(output))
        })
        .collect();

    let results: Vec<(PathBuf, Result<RunSummary>)> = jobs
        .into_par_iter()
        .map(|(input, config)| {
            let result = mode.run(&input, config);
            (input, result)
        })
        .collect();

    let mut failures = 0;
    for (input, result) in &results {
        match result {
            Ok(summary) => print_summary(input, summary),
            Err(e) => {
                failures += 1;
                log::error!("{:?}: {:#}", input, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} inputs failed", failures, results.len());
    }
    Ok(())
}

/// Output path derived from an input path
fn output_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = derive_output_name(&file_name);

    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn print_summary(input: &Path, summary: &RunSummary) {
    let stats = &summary.stats;
    match &summary.output {
        Some(output) => println!("{} -> {}", input.display(), output.display()),
        None => println!("{} -> (no output)", input.display()),
    }
    println!(
        "  events: {} seen, {} written | tracks: {} total, {} saved, {} filtered ({:.1}%)",
        stats.events_seen,
        stats.events_written,
        stats.total,
        stats.saved,
        stats.filtered,
        stats.filtered_percent()
    );
    if stats.steps_filtered > 0 || stats.no_time > 0 {
        println!(
            "  steps filtered: {} | without time: {}",
            stats.steps_filtered, stats.no_time
        );
    }
}

/// Validate a document and print its content summary
fn inspect(path: &Path) -> Result<()> {
    let document = load_document(path)
        .with_context(|| format!("{:?} is not a valid firebird document", path))?;

    println!("═══════════════════════════════════════════════");
    println!("  {}", path.display());
    println!("═══════════════════════════════════════════════");
    println!("  Format:       {} {}", document.format_type, document.version);
    println!("  Origin:       {}", document.origin.file);
    println!("  Events:       {}", document.events.len());
    println!("  Trajectories: {}", document.trajectory_count());
    println!("  Points:       {}", document.point_count());

    for event in &document.events {
        for group in &event.groups {
            log::debug!(
                "Event {}: group '{}' with {} trajectories",
                event.id,
                group.name,
                group.trajectories.len()
            );
        }
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
