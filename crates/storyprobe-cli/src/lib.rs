//! Storyprobe CLI library
//!
//! Command-line tooling around the Storyprobe baseline store: inspect the
//! resolved configuration, list and prune baselines, and run the pixel and
//! structural comparisons offline.

#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;

pub use commands::{
    selected_kinds, BaselinesCommand, Cli, ColorArg, Commands, ConfigArgs, DiffCommand,
    ImageDiffArgs, KindArg, ListArgs, ListFormat, OutputFormat, RemoveArgs, SnapshotDiffArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
