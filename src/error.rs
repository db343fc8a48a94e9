//! Error types for the normalizer, target configuration and generator steps.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the walk, rename and rewrite passes.
///
/// None of these are recovered locally: each aborts the owning target's
/// pipeline.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("failed to read directory {}: {source}", path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to rename {} -> {}: target already exists", from.display(), to.display())]
    RenameCollision { from: PathBuf, to: PathBuf },

    #[error("{} and {} would both be renamed to {}", first.display(), second.display(), to.display())]
    DuplicateTarget {
        first: PathBuf,
        second: PathBuf,
        to: PathBuf,
    },

    #[error("failed to rename {} -> {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures loading or rendering target configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read target config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid target config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown placeholder '{{{name}}}' in argument '{template}'")]
    UnknownPlaceholder { name: String, template: String },

    #[error("unterminated placeholder in argument '{template}'")]
    UnterminatedPlaceholder { template: String },
}

/// Failures of the upstream generator step.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("invalid proto pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("no proto files match '{pattern}'")]
    NoProtoFiles { pattern: String },

    #[error("failed to prepare output directory {}: {source}", path.display())]
    PrepareOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Any failure that ends a target's pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}
