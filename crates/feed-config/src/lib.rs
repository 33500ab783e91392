//! Run-file configuration overlay for feed replay runs.
//!
//! A run file is a plain text file with one `name = value` assignment per
//! line. Assignments overlay an already-populated [`FeedConfig`], coercing
//! each value to the type of the field it names. Anything that does not
//! match the assignment grammar (comments, blank lines, malformed lines)
//! is ignored, so `!` and `#` lines double as comment syntax.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Resolved settings for one replay run.
///
/// Populated from command-line defaults first, then selectively overwritten
/// by [`apply_run_file`]. Assignments whose name matches no field land in
/// `extras` as plain strings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub input: String,
    pub out_file: String,
    pub folder: String,
    pub header_lines: usize,
    pub delay: f64,
    pub log_level: u8,
    pub skip_empty: bool,
    pub overwrite: bool,
    pub increment: usize,
    pub run_file: String,
    pub extras: BTreeMap<String, String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            input: String::new(),
            out_file: String::new(),
            folder: String::new(),
            header_lines: 4,
            delay: 1.0,
            log_level: 1,
            skip_empty: false,
            overwrite: false,
            increment: 1,
            run_file: String::new(),
            extras: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("run file not found: {}", .0.display())]
    RunFileMissing(PathBuf),
    #[error("reading run file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("value {value:?} for {key} is not a valid {target}")]
    Coercion {
        key: String,
        value: String,
        target: &'static str,
    },
}

/// The five escape sequences a run-file value may contain. `!` and `#`
/// terminate a bare value, so escaping is the only way to get them into one.
const ESCAPES: [(&str, &str); 5] = [
    ("\\\\", "\\"),
    ("\\!", "!"),
    ("\\#", "#"),
    ("\\'", "'"),
    ("\\\"", "\""),
];

/// Overlays every recognized assignment in the run file at `path` onto
/// `config`.
///
/// Fields keep the type they already have: booleans treat `true`, `yes`
/// and `1` as true and anything else as false, numeric fields use their
/// standard parse, strings are stored verbatim. An unknown name is kept
/// as a string in `config.extras`.
pub fn apply_run_file(config: &mut FeedConfig, path: &Path) -> Result<(), ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::RunFileMissing(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let assignment = Regex::new(r"^\s*([^\s!#=]+)\s*==?\s*(.*)$").expect("static pattern");
    for line in content.lines() {
        let Some(captures) = assignment.captures(line) else {
            continue;
        };
        let key = &captures[1];
        let value = strip_quotes(&unescape(&take_value(&captures[2]))).to_string();
        debug!(key, value = value.as_str(), "run file assignment");
        assign(config, key, value)?;
    }
    Ok(())
}

/// Extracts the value span from everything after the separator.
///
/// The value is a sequence of quoted runs (`'...'` or `"..."`, escapes
/// honored inside) and bare runs; an unescaped `!` or `#` outside quotes
/// starts a comment tail and ends the value. The returned span is trimmed
/// but still carries its quotes and escape sequences.
fn take_value(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(current) = chars.next() {
        match quote {
            Some(open) => {
                out.push(current);
                if current == '\\' {
                    if let Some(&next) = chars.peek() {
                        if matches!(next, '\\' | '\'' | '"') {
                            out.push(next);
                            chars.next();
                        }
                    }
                } else if current == open {
                    quote = None;
                }
            }
            None => match current {
                '!' | '#' => break,
                '\\' => {
                    out.push(current);
                    if let Some(&next) = chars.peek() {
                        if matches!(next, '!' | '#' | '\\' | '\'' | '"') {
                            out.push(next);
                            chars.next();
                        }
                    }
                }
                '\'' | '"' => {
                    quote = Some(current);
                    out.push(current);
                }
                _ => out.push(current),
            },
        }
    }
    out.trim().to_string()
}

/// Decodes the documented escape sequences, and nothing else.
fn unescape(value: &str) -> String {
    // Every pattern in ESCAPES is two bytes, so trying them in declaration
    // order can never let a shorter prefix pre-empt a longer sequence.
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    'scan: while !rest.is_empty() {
        for (pattern, replacement) in &ESCAPES {
            if let Some(remainder) = rest.strip_prefix(pattern) {
                out.push_str(replacement);
                rest = remainder;
                continue 'scan;
            }
        }
        if let Some(current) = rest.chars().next() {
            out.push(current);
            rest = &rest[current.len_utf8()..];
        }
    }
    out
}

/// Strips one outer pair of matching quotes, if present.
fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0]
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn assign(config: &mut FeedConfig, key: &str, value: String) -> Result<(), ConfigError> {
    match key {
        "input" => config.input = value,
        "out_file" => config.out_file = value,
        "folder" => config.folder = value,
        "header_lines" => config.header_lines = coerce_int(key, &value)?,
        "delay" => config.delay = coerce_float(key, &value)?,
        "log_level" => config.log_level = coerce_int(key, &value)?,
        "skip_empty" => config.skip_empty = coerce_bool(&value),
        "overwrite" => config.overwrite = coerce_bool(&value),
        "increment" => config.increment = coerce_int(key, &value)?,
        "run_file" => config.run_file = value,
        _ => {
            config.extras.insert(key.to_string(), value);
        }
    }
    Ok(())
}

fn coerce_bool(value: &str) -> bool {
    matches!(value, "true" | "yes" | "1")
}

fn coerce_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Coercion {
        key: key.to_string(),
        value: value.to_string(),
        target: "integer",
    })
}

fn coerce_float(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse().map_err(|_| ConfigError::Coercion {
        key: key.to_string(),
        value: value.to_string(),
        target: "float",
    })
}
