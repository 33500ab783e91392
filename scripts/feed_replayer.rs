//! Slow data feed replay binary.
//!
//! Reads a header-prefixed text file and re-emits its data lines to an
//! output path in small increments, pacing batches with a fixed delay or
//! with a file-presence handshake so an external consumer can pick each
//! batch up and delete it. Intended for exercising consumers of slowly
//! arriving feeds without the real upstream.

use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use feed_config::{apply_run_file, FeedConfig};
use feed_emitter::{emit, EmitOptions};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Replay a .dat text feed in small increments")]
struct Args {
    /// .dat input file.
    input: String,

    /// Write output to a specific file (same as input by default).
    #[arg(short, long = "out_file", default_value = "")]
    out_file: String,

    /// Folder to write output to (current folder by default).
    #[arg(short, long, default_value = "")]
    folder: String,

    /// Number of lines to consider header lines.
    #[arg(short = 'H', long = "header_lines", default_value_t = 4)]
    header_lines: usize,

    /// Number of seconds to wait between trying to write output.
    #[arg(short, long, default_value_t = 1.0)]
    delay: f64,

    /// Level of messages to log (1 = error, 2 = warning, 3 = info, 4 = debug).
    #[arg(short, long = "log_level", default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=4))]
    log_level: u8,

    /// Skip empty lines in the source file.
    #[arg(short, long = "skip_empty")]
    skip_empty: bool,

    /// OVERWRITE the output file instead of waiting for its removal.
    #[arg(short = 'w', long)]
    overwrite: bool,

    /// Number of lines to write to output per batch.
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    increment: u64,

    /// Run file whose settings override the command line arguments.
    #[arg(short, long = "run_file", default_value = "")]
    run_file: String,
}

impl Args {
    fn into_config(self) -> FeedConfig {
        FeedConfig {
            input: self.input,
            out_file: self.out_file,
            folder: self.folder,
            header_lines: self.header_lines,
            delay: self.delay,
            log_level: self.log_level,
            skip_empty: self.skip_empty,
            overwrite: self.overwrite,
            increment: self.increment as usize,
            run_file: self.run_file,
            ..FeedConfig::default()
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = args.into_config();
    let overlay = if config.run_file.is_empty() {
        Ok(())
    } else {
        let run_file = PathBuf::from(&config.run_file);
        apply_run_file(&mut config, &run_file)
    };
    init_logging(config.log_level);

    // Run-file problems end the run normally, with only the logged error.
    if let Err(err) = overlay {
        error!("{err}");
        return Ok(());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "feed_replayer starting");

    let Some((input, output, delay)) = resolve_paths(&config)? else {
        return Ok(());
    };
    warn!(
        input = %input.display(),
        output = %output.display(),
        delay = %humantime::format_duration(delay),
        "starting replay"
    );

    let summary = emit(&EmitOptions {
        input,
        output,
        header_lines: config.header_lines,
        delay: config.delay,
        skip_empty: config.skip_empty,
        overwrite: config.overwrite,
        increment: config.increment,
    })?;
    info!(
        lines_written = summary.lines_written,
        empty_skipped = summary.empty_skipped,
        "replay finished"
    );
    Ok(())
}

/// Checks the run preconditions and resolves the input/output paths.
///
/// A failed precondition is logged at error level and reported as `None`
/// so the process can end normally without touching the output.
fn resolve_paths(config: &FeedConfig) -> Result<Option<(PathBuf, PathBuf, Duration)>> {
    if !(config.delay.is_finite() && config.delay >= 0.0) {
        error!(delay = config.delay, "delay must be a non-negative number of seconds");
        return Ok(None);
    }
    let delay = Duration::from_secs_f64(config.delay);

    let input = PathBuf::from(&config.input);
    if !input.is_file() {
        error!(input = %input.display(), "input file not found");
        return Ok(None);
    }

    let folder = if config.folder.is_empty() {
        env::current_dir().context("resolving current directory")?
    } else {
        PathBuf::from(&config.folder)
    };
    if !folder.is_dir() {
        error!(folder = %folder.display(), "output folder not found");
        return Ok(None);
    }

    let out_name = if config.out_file.is_empty() {
        input
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| input.clone())
    } else {
        PathBuf::from(&config.out_file)
    };
    let output = folder.join(out_name);

    // The output file may not exist yet, so resolve its folder and rejoin
    // instead of canonicalizing the file itself.
    let resolved_input = input
        .canonicalize()
        .with_context(|| format!("resolving {}", input.display()))?;
    let resolved_output = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .with_context(|| format!("resolving {}", parent.display()))?
            .join(output.file_name().unwrap_or_default()),
        _ => output.clone(),
    };
    if resolved_input == resolved_output {
        error!(path = %resolved_input.display(), "refusing to overwrite input with output");
        return Ok(None);
    }

    Ok(Some((input, output, delay)))
}

fn init_logging(log_level: u8) {
    let default_directive = match log_level {
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "error",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() {
    if let Err(err) = run(Args::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
