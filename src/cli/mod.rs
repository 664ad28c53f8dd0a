//! Command-line interface of the `accumulators` binary

pub mod args;
pub mod line_stats;

pub use args::{Cli, Commands};
pub use line_stats::{LineStats, LineStatsPlan};
