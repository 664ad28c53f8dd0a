//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run parallel jobs and aggregate named accumulators across their tasks
#[derive(Parser, Debug)]
#[command(name = "accumulators")]
#[command(about = "accumulators - Named accumulators merged across parallel tasks", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute line statistics of a file with a parallel job
    #[command(name = "run")]
    Run {
        /// Text file to analyze
        input: PathBuf,

        /// Number of parallel tasks (overrides the job configuration)
        #[arg(short = 't', long)]
        tasks: Option<usize>,

        /// Job configuration file (TOML)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Make the first attempt of this task fail, to exercise retries
        #[arg(long, value_name = "TASK")]
        fail_first_attempt: Vec<u32>,

        /// Pretty-print the result JSON
        #[arg(long)]
        pretty: bool,
    },

    /// List the accumulator kinds the coordinator can decode
    #[command(name = "kinds")]
    Kinds,
}
