//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API:
//! generating every target, post-processing an existing tree, or listing the
//! configured targets.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Generate protobuf sources usable from both CommonJS and ES modules.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Print additional diagnostics to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the generator for every target, then post-process the output.
    Generate {
        /// Proto files search pattern.
        #[arg(long, default_value = "./proto/**/*.proto")]
        proto_pattern: String,

        /// Proto include paths used in generation.
        #[arg(long, num_args = 1.., default_values_t = [String::from("proto")])]
        includes: Vec<String>,

        /// Generator executable.
        #[arg(long, default_value = "protoc")]
        protoc: String,

        /// JSON file defining targets. Defaults to the built-in ts/node, ts/web and go targets.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only run the named targets (repeatable).
        #[arg(short, long)]
        target: Vec<String>,

        /// Skip renaming and import rewriting for every target.
        #[arg(long)]
        no_post_process: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Rename generated files and rewrite imports in an existing tree.
    Normalize {
        /// Root of the generated tree.
        root: PathBuf,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// List configured targets.
    Targets {
        /// JSON file defining targets.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
