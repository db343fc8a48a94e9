//! Upstream generator invocation.
//!
//! Expands the proto search pattern, recreates a target's output directory
//! and runs `protoc` once per argument group. Arguments are passed to the
//! process directly; no shell is involved.

use crate::error::GenerateError;
use crate::target::TargetConfig;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

/// Settings shared by every target's generator run.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub protoc: String,
    pub includes: Vec<PathBuf>,
    pub proto_files: Vec<PathBuf>,
}

/// Expands `pattern` into a sorted list of proto files.
///
/// Fails if the pattern is malformed or matches nothing. Unreadable entries
/// encountered while globbing are skipped.
pub fn find_proto_files(pattern: &str) -> Result<Vec<PathBuf>, GenerateError> {
    let paths = glob::glob(pattern).map_err(|source| GenerateError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    files.sort();

    if files.is_empty() {
        return Err(GenerateError::NoProtoFiles {
            pattern: pattern.to_string(),
        });
    }
    Ok(files)
}

/// Removes `out` if it exists and creates it afresh, parents included.
pub async fn prepare_output(out: &Path) -> Result<(), GenerateError> {
    let to_error = |source: std::io::Error| GenerateError::PrepareOutput {
        path: out.to_path_buf(),
        source,
    };

    if fs::try_exists(out).await.map_err(to_error)? {
        fs::remove_dir_all(out).await.map_err(to_error)?;
    }
    fs::create_dir_all(out).await.map_err(to_error)
}

/// Builds the argument list for one generator run.
pub fn build_args(settings: &GeneratorSettings, group: &[String]) -> Vec<String> {
    settings
        .includes
        .iter()
        .map(|inc| format!("-I{}", inc.display()))
        .chain(group.iter().cloned())
        .chain(
            settings
                .proto_files
                .iter()
                .map(|f| f.to_string_lossy().into_owned()),
        )
        .collect()
}

/// Populates `target.out` by running the generator for each argument group
/// in order.
pub async fn generate(
    target: &TargetConfig,
    settings: &GeneratorSettings,
) -> Result<(), GenerateError> {
    let groups = target.render_invocations()?;
    prepare_output(&target.out).await?;

    for group in &groups {
        let args = build_args(settings, group);
        debug!(name = %target.name, program = %settings.protoc, ?args, "running generator");

        let output = Command::new(&settings.protoc)
            .args(&args)
            .output()
            .await
            .map_err(|source| GenerateError::Spawn {
                program: settings.protoc.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GenerateError::Failed {
                program: settings.protoc.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
    }

    info!(name = %target.name, out = %target.out.display(), runs = groups.len(), "generated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_sorted_proto_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("proto/b")).unwrap();
        std::fs::write(dir.path().join("proto/z.proto"), "").unwrap();
        std::fs::write(dir.path().join("proto/b/a.proto"), "").unwrap();
        std::fs::write(dir.path().join("proto/readme.md"), "").unwrap();

        let pattern = format!("{}/proto/**/*.proto", dir.path().display());
        let files = find_proto_files(&pattern).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("proto/b/a.proto"),
                dir.path().join("proto/z.proto"),
            ]
        );
    }

    #[test]
    fn empty_match_is_an_error() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/**/*.proto", dir.path().display());
        assert!(matches!(
            find_proto_files(&pattern),
            Err(GenerateError::NoProtoFiles { .. })
        ));
    }

    #[test]
    fn malformed_pattern_is_an_error() {
        assert!(matches!(
            find_proto_files("proto/[*.proto"),
            Err(GenerateError::Pattern { .. })
        ));
    }

    #[test]
    fn args_are_includes_then_group_then_files() {
        let settings = GeneratorSettings {
            protoc: "protoc".to_string(),
            includes: vec![PathBuf::from("proto"), PathBuf::from("third_party")],
            proto_files: vec![PathBuf::from("proto/a.proto")],
        };
        let group = vec!["--go_out=go".to_string()];
        assert_eq!(
            build_args(&settings, &group),
            vec!["-Iproto", "-Ithird_party", "--go_out=go", "proto/a.proto"]
        );
    }

    #[tokio::test]
    async fn prepare_output_clears_previous_contents() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("ts/node");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("stale_pb.js"), "old").unwrap();

        prepare_output(&out).await.unwrap();

        assert!(out.is_dir());
        assert!(!out.join("stale_pb.js").exists());
    }

    #[tokio::test]
    async fn missing_generator_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let target = TargetConfig {
            name: "go".to_string(),
            out: dir.path().join("go"),
            invocations: vec![vec!["--go_out={out}".to_string()]],
            post_process: None,
        };
        let settings = GeneratorSettings {
            protoc: "protogen-test-no-such-binary".to_string(),
            includes: vec![],
            proto_files: vec![PathBuf::from("a.proto")],
        };
        let err = generate(&target, &settings).await.unwrap_err();
        assert!(matches!(err, GenerateError::Spawn { .. }));
    }
}
