//! The configuration record the scheduler is built from, plus the CLI
//! parser that produces it. Grounded on the `clap`-derived `Args` convention
//! used throughout the retrieval pack (e.g. `yonch-memory-collector`), with
//! a hand-rolled suffix parser for the size/time shorthand accepted on the
//! command line.

use clap::Parser;

use crate::chunk::CHUNK_MAX;
use crate::error::{Error, Result};

/// The configuration record the scheduler is built from: a delay in
/// milliseconds and a ring capacity in bytes.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub delay_ms: i64,
    pub capacity_bytes: usize,
}

#[derive(Parser, Debug)]
#[command(
    name = "tapedelay",
    about = "Relay stdin to stdout after a fixed wall-clock delay"
)]
struct Cli {
    /// Delay before a byte read on stdin is written to stdout. Accepts a
    /// bare millisecond count or a suffixed value (500ms-equivalent as
    /// `500`, `2s`, `1h`).
    #[arg(short, long, value_parser = parse_duration_ms)]
    delay: i64,

    /// Ring buffer capacity. Accepts a bare byte count or a suffixed value
    /// (`64k`, `8m`, `1g`).
    #[arg(short, long, value_parser = parse_size_bytes, default_value = "1m")]
    capacity: usize,
}

impl Config {
    /// Parses a configuration from process-style arguments (argv[0]
    /// included), mapping clap's own failures onto the CLI-syntax exit code
    /// and this module's suffix-parser failures onto the numeric-parse exit
    /// code.
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(classify_clap_error)?;
        if cli.delay < 0 {
            return Err(Error::CliSyntax {
                inner: "delay must not be negative".into(),
            });
        }
        if cli.capacity < CHUNK_MAX {
            return Err(Error::CliSyntax {
                inner: format!("capacity must be at least {} bytes", CHUNK_MAX),
            });
        }
        Ok(Config {
            delay_ms: cli.delay,
            capacity_bytes: cli.capacity,
        })
    }
}

fn classify_clap_error(e: clap::Error) -> Error {
    use clap::error::ErrorKind;
    match e.kind() {
        ErrorKind::ValueValidation => Error::NumericParse {
            inner: e.to_string(),
        },
        _ => Error::CliSyntax {
            inner: e.to_string(),
        },
    }
}

/// Parses `500`, `2s`, or `1h` into a millisecond count. The `h` suffix
/// multiplies by the correct `60 * 60 * 1000`.
fn parse_duration_ms(s: &str) -> std::result::Result<i64, String> {
    let s = s.trim();
    let (digits, mult) = if let Some(d) = s.strip_suffix('h') {
        (d, 60 * 60 * 1000)
    } else if let Some(d) = s.strip_suffix('s') {
        (d, 1000)
    } else {
        (s, 1)
    };
    digits
        .parse::<i64>()
        .map(|n| n * mult)
        .map_err(|e| e.to_string())
}

/// Parses `4000`, `64k`, `8m`, or `1g` into a byte count, using 1024-based
/// multipliers.
fn parse_size_bytes(s: &str) -> std::result::Result<usize, String> {
    let s = s.trim();
    let (digits, mult) = if let Some(d) = s.strip_suffix('g') {
        (d, 1024 * 1024 * 1024)
    } else if let Some(d) = s.strip_suffix('m') {
        (d, 1024 * 1024)
    } else if let Some(d) = s.strip_suffix('k') {
        (d, 1024)
    } else {
        (s, 1)
    };
    digits
        .parse::<usize>()
        .map(|n| n * mult)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_suffixed_durations() {
        assert_eq!(parse_duration_ms("500").unwrap(), 500);
        assert_eq!(parse_duration_ms("2s").unwrap(), 2000);
        assert_eq!(parse_duration_ms("1h").unwrap(), 3_600_000);
    }

    #[test]
    fn parses_bare_and_suffixed_sizes() {
        assert_eq!(parse_size_bytes("4000").unwrap(), 4000);
        assert_eq!(parse_size_bytes("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_size_bytes("8m").unwrap(), 8 * 1024 * 1024);
        assert_eq!(parse_size_bytes("1g").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_garbage_numerics() {
        assert!(parse_duration_ms("soon").is_err());
        assert!(parse_size_bytes("big").is_err());
    }

    #[test]
    fn config_rejects_undersized_capacity() {
        let err = Config::from_args(["tapedelay", "--delay", "0", "--capacity", "4"])
            .expect_err("capacity below CHUNK_MAX must be rejected");
        assert_eq!(err.exit_code(), 9);
    }

    #[test]
    fn config_maps_bad_numeric_to_exit_10() {
        let err = Config::from_args(["tapedelay", "--delay", "soon"]).unwrap_err();
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn config_maps_missing_required_arg_to_exit_9() {
        let err = Config::from_args(["tapedelay"]).unwrap_err();
        assert_eq!(err.exit_code(), 9);
    }

    #[test]
    fn config_accepts_well_formed_args() {
        let cfg = Config::from_args(["tapedelay", "--delay", "500", "--capacity", "64k"]).unwrap();
        assert_eq!(cfg.delay_ms, 500);
        assert_eq!(cfg.capacity_bytes, 64 * 1024);
    }
}
