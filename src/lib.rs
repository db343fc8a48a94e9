//! protogen library for generating protobuf sources that load under both
//! CommonJS and ES modules.
//!
//! The generator emits CommonJS files (`*_pb.js`, `*_pb.d.ts`). For targets
//! with dual-module post-processing, a run has three phases:
//!
//! 1. **Generation**: Recreate the output directory and run `protoc`
//! 2. **Renaming**: Move generated files to `*_pb.cjs` / `*_pb.d.cts`
//! 3. **Rewriting**: Point relative import specifiers at the renamed files
//!
//! # Example
//!
//! ```no_run
//! use protogen::{pipeline, target::{PostProcess, TargetConfig}};
//! use std::path::PathBuf;
//!
//! # async fn run() {
//! // Post-process a tree that has already been generated
//! let target = TargetConfig {
//!     name: "node".to_string(),
//!     out: PathBuf::from("./ts/node"),
//!     invocations: vec![],
//!     post_process: Some(PostProcess::DualModule),
//! };
//! let report = pipeline::run_target(&target, None).await;
//! println!("{} finished at {:?}", report.target, report.stage);
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod pipeline;
pub mod renamer;
pub mod rewriter;
pub mod target;
pub mod walker;

// Re-export commonly used types at crate root
pub use error::{ConfigError, GenerateError, NormalizeError, PipelineError};
pub use pipeline::{Stage, TargetReport};
pub use renamer::{RenameMapping, RenameRule};
pub use target::{PostProcess, TargetConfig};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise this crate logs at `info`, or
/// `debug` when `verbose` is set.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "protogen=debug" } else { "protogen=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
