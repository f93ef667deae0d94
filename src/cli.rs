//! CLI argument parsing for Centinela

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::spike::SpikePolicy;

/// Output format for tick reports
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable log lines (default)
    Text,
    /// One JSON object per reporting tick
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "centinela")]
#[command(version)]
#[command(about = "CPU spike detector with top-process attribution", long_about = None)]
pub struct Cli {
    /// Sampling interval in milliseconds
    #[arg(short = 'i', long = "interval", value_name = "MS", default_value = "1000")]
    pub interval_ms: u64,

    /// Number of ticks to run before exiting (default: run until interrupted)
    #[arg(short = 'n', long = "ticks", value_name = "COUNT")]
    pub ticks: Option<u64>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Spike threshold as a multiple of the rolling average
    #[arg(
        long = "spike-threshold",
        value_name = "RATIO",
        default_value = "1.5"
    )]
    pub spike_threshold: f32,

    /// Absolute usage floor (percent) a spike must also exceed
    #[arg(
        long = "spike-floor",
        value_name = "PERCENT",
        default_value = "10.0"
    )]
    pub spike_floor: f32,

    /// Alternate procfs root (containers, tests)
    #[arg(long = "proc-root", value_name = "PATH")]
    pub proc_root: Option<PathBuf>,

    /// Log the free-memory percentage on every tick
    #[arg(long = "memory")]
    pub memory: bool,

    /// Enable debug logging to stderr
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    pub fn spike_policy(&self) -> SpikePolicy {
        SpikePolicy {
            ratio: self.spike_threshold,
            floor: self.spike_floor,
        }
    }
}
