//! Incremental line-batch emitter with a file-presence handshake.
//!
//! Replays the data lines of a header-prefixed text file to an output
//! path in small batches, pacing itself either with a fixed sleep
//! (overwrite mode) or by waiting for the consumer to delete the
//! previous batch. The file-presence handshake is deliberately informal:
//! one writer, one external reader/deleter, no locking and no atomic
//! rename.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Number of leading lines captured once and rewritten before every
    /// batch. Reads past end-of-stream pad the header with empty lines.
    pub header_lines: usize,
    /// Seconds slept per handshake iteration.
    pub delay: f64,
    pub skip_empty: bool,
    /// Sleep once instead of waiting for the previous batch to be removed.
    pub overwrite: bool,
    /// Data lines per batch.
    pub increment: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub lines_written: u64,
    pub empty_skipped: u64,
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("delay must be a non-negative number of seconds, got {0}")]
    Delay(f64),
}

impl EmitError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Replays `options.input` to `options.output`, one batch of
/// `options.increment` data lines at a time, each batch preceded by the
/// verbatim header. Returns the counters accumulated over the whole run.
pub fn emit(options: &EmitOptions) -> Result<EmitSummary, EmitError> {
    if !(options.delay.is_finite() && options.delay >= 0.0) {
        return Err(EmitError::Delay(options.delay));
    }
    let delay = Duration::from_secs_f64(options.delay);
    let mut reader = BufReader::new(
        File::open(&options.input).map_err(|source| EmitError::io(&options.input, source))?,
    );
    let mut summary = EmitSummary::default();

    let mut header = Vec::with_capacity(options.header_lines);
    for _ in 0..options.header_lines {
        header.push(read_raw(&mut reader, &options.input)?);
    }

    let mut line = read_data(&mut reader, options, &mut summary)?;
    while !line.is_empty() {
        // Handshake before every batch, the first one included.
        if options.overwrite {
            info!(delay_secs = options.delay, "waiting before overwriting target");
            thread::sleep(delay);
        } else {
            while options.output.is_file() {
                info!(delay_secs = options.delay, "waiting for output file to be removed");
                thread::sleep(delay);
            }
        }

        let mut output = File::create(&options.output)
            .map_err(|source| EmitError::io(&options.output, source))?;
        for captured in &header {
            output
                .write_all(captured.as_bytes())
                .map_err(|source| EmitError::io(&options.output, source))?;
        }
        for _ in 0..options.increment {
            if line.is_empty() {
                break;
            }
            output
                .write_all(line.as_bytes())
                .map_err(|source| EmitError::io(&options.output, source))?;
            summary.lines_written += 1;
            line = read_data(&mut reader, options, &mut summary)?;
        }
        info!(lines_written = summary.lines_written, "batch written");
        // Dropping the handle closes the batch and hands it to the consumer.
    }

    warn!(
        lines_written = summary.lines_written,
        empty_skipped = summary.empty_skipped,
        "completed writing data, no more lines"
    );
    Ok(summary)
}

/// Reads one line, newline terminator included. End-of-stream yields an
/// empty string.
fn read_raw(reader: &mut impl BufRead, path: &Path) -> Result<String, EmitError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|source| EmitError::io(path, source))?;
    Ok(line)
}

/// Reads the next data line, discarding empty-line terminators when
/// `skip_empty` is set and counting each one skipped.
fn read_data(
    reader: &mut impl BufRead,
    options: &EmitOptions,
    summary: &mut EmitSummary,
) -> Result<String, EmitError> {
    loop {
        let line = read_raw(reader, &options.input)?;
        if options.skip_empty && (line == "\n" || line == "\r\n") {
            summary.empty_skipped += 1;
            continue;
        }
        return Ok(line);
    }
}
