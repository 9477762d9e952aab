//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;

use crate::{estimator::DEFAULT_THRESHOLD, sample::Radix};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// A RegMon trace file, or a directory tree of experiments (folders with a config.json)
    pub path: PathBuf,
    /// Fraction of foreign energy above which an interval counts as interfered
    #[clap(short, long, default_value_t = DEFAULT_THRESHOLD, value_parser = valid_threshold)]
    pub threshold: f64,
    /// Radix of the register columns in the trace (hex or dec)
    #[clap(short, long, default_value = "hex", value_parser = valid_radix)]
    pub radix: Radix,
    /// Number of experiments processed in parallel
    #[clap(short, long, default_value_t = 4)]
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn valid_radix(s: &str) -> Result<Radix, String> {
    s.parse()
}

fn valid_threshold(s: &str) -> Result<f64, String> {
    let t: f64 = s.parse().map_err(|_| "Invalid number".to_string())?;
    if t > 0.0 && t < 1.0 {
        Ok(t)
    } else {
        Err("Threshold must be between 0 and 1 (exclusive)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["regmon_airtime", "traces/"]).unwrap();
        assert_eq!(args.path, PathBuf::from("traces/"));
        assert_eq!(args.threshold, 0.1);
        assert_eq!(args.radix, Radix::Hex);
        assert_eq!(args.workers, 4);
    }

    #[test]
    fn test_bad_threshold() {
        assert!(Args::try_parse_from(["regmon_airtime", "-t", "1.5", "x"]).is_err());
        assert!(Args::try_parse_from(["regmon_airtime", "-t", "abc", "x"]).is_err());
        let args = Args::try_parse_from(["regmon_airtime", "-t", "0.3", "-r", "dec", "x"]).unwrap();
        assert_eq!(args.threshold, 0.3);
        assert_eq!(args.radix, Radix::Decimal);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Args::try_parse_from(["regmon_airtime", "-w", "0", "x"]).is_err());
    }
}
