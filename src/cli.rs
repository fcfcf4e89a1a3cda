//! Command-line argument parsing.
//!
//! Grounded on `examples/nethercore-systems-nethercore/tools/nether-export`'s
//! `clap::Parser` derive shape; logger init follows
//! `examples/dataO1-Mesh/crates/mesh-cue/src/main.rs`'s
//! `env_logger::Builder::from_env` pattern.

use std::path::PathBuf;

use clap::Parser;

/// Blends two tracks into one continuous offline mix.
#[derive(Parser, Debug)]
#[command(name = "seamix")]
#[command(about = "Offline DJ mix engine: blends two tracks into one continuous recording")]
#[command(version)]
pub struct Cli {
    /// First input track
    pub song1: PathBuf,

    /// Second input track
    pub song2: PathBuf,

    /// Output directory (default: "output")
    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    /// Path to a YAML config file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write the source reference cuts the assembly pulled from
    #[arg(long)]
    pub keep_reference_cuts: bool,
}
