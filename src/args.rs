// Commandline argument parser using clap for soundwalk

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Runs an installation against a ranging feed and writes what the
/// listener hears to a WAV file.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct SoundwalkArgs {
    #[command(subcommand, long_about)]
    /// Where the ranging samples come from
    pub command: FeedCommand,

    /// Installation file, in RON. The built-in installation is used when omitted
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Filename for the binaural audio to be written to
    #[arg(short = 'o', long = "out")]
    pub outfile: PathBuf,

    /// How long to run for, in seconds
    #[arg(short = 'd', long = "duration", default_value_t = 60.0)]
    pub duration: f64,

    /// How fast the listener turns on the spot, in degrees per second
    #[arg(long = "spin-rate", default_value_t = 0.0)]
    pub spin_rate: f64,

    /// Start with the room reverb filters instead of the virtual ones
    #[arg(long)]
    pub reverb: bool,

    /// Also write the installation in use to this file, as RON
    #[arg(long = "save-config")]
    pub save_config: Option<PathBuf>,
}

#[allow(missing_docs)]
#[derive(Debug, Subcommand, Clone)]
pub enum FeedCommand {
    /// Walk a simulated listener back and forth past the beacons
    #[command(about)]
    Simulate(SimulateCommand),

    /// Replay scan reports recorded from a beacon scanner
    #[command(about)]
    Replay(ReplayCommand),
}

/// Options of the simulated scanner
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct SimulateCommand {
    /// Uniform noise added to every distance, in metres
    #[arg(short, long, default_value_t = 0.3)]
    pub noise: f64,

    /// Seconds between two scans
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// Probability that a beacon is missed during a scan
    #[arg(long, default_value_t = 0.05)]
    pub dropout: f64,

    /// Seconds the walk takes to go out and come back
    #[arg(short, long, default_value_t = 40.0)]
    pub period: f64,
}

/// Options of the scan report replay
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ReplayCommand {
    /// File of `+RANGE:` scan report lines
    #[arg(short, long)]
    pub input: PathBuf,
}
