//! Output target configuration.
//!
//! Each target names an output directory, the generator argument groups that
//! populate it, and whether its tree is post-processed for dual CommonJS/ESM
//! consumption. Arguments are plain templates: `{out}` is substituted, `{{`
//! and `}}` are literal braces, nothing is evaluated.

use crate::error::ConfigError;
use crate::renamer::RenameRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional post-processing applied after generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcess {
    /// Rename CommonJS output to `.cjs`/`.d.cts` and fix imports to match.
    DualModule,
}

impl PostProcess {
    pub fn rules(&self) -> &'static [RenameRule] {
        match self {
            PostProcess::DualModule => &RenameRule::DUAL_MODULE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub out: PathBuf,
    /// Argument groups; each group is one generator run.
    pub invocations: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<PostProcess>,
}

#[derive(Debug, Deserialize)]
struct TargetFile {
    targets: Vec<TargetConfig>,
}

impl TargetConfig {
    /// Renders every argument group with this target's values.
    pub fn render_invocations(&self) -> Result<Vec<Vec<String>>, ConfigError> {
        self.invocations
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|arg| render_argument(arg, &self.out))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The targets generated when no config file is given.
pub fn builtin_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig {
            name: "ts/node".to_string(),
            out: PathBuf::from("ts/node"),
            invocations: vec![
                args(&[
                    "--js_out=import_style=commonjs,binary:{out}",
                    "--grpc_out=grpc_js:{out}",
                    "--plugin=protoc-gen-grpc=./node_modules/.bin/grpc_tools_node_protoc_plugin",
                ]),
                args(&[
                    "--plugin=protoc-gen-ts=./node_modules/.bin/protoc-gen-ts",
                    "--ts_out=grpc_js:{out}",
                ]),
            ],
            post_process: Some(PostProcess::DualModule),
        },
        TargetConfig {
            name: "ts/web".to_string(),
            out: PathBuf::from("ts/web"),
            invocations: vec![args(&[
                "--js_out=import_style=commonjs:{out}",
                "--plugin=protoc-gen-grpc=./node_modules/.bin/",
                "--grpc-web_out=import_style=commonjs+dts,mode=grpcwebtext:{out}",
            ])],
            post_process: Some(PostProcess::DualModule),
        },
        TargetConfig {
            name: "go".to_string(),
            out: PathBuf::from("go"),
            invocations: vec![args(&[
                "--go_out={out}",
                "--go_opt=paths=source_relative",
                "--go-grpc_out={out}",
                "--go-grpc_opt=paths=source_relative",
            ])],
            post_process: None,
        },
    ]
}

/// Loads targets from a JSON file of the form `{ "targets": [...] }`.
pub fn load_targets(path: &Path) -> Result<Vec<TargetConfig>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_targets(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_targets(raw: &str) -> Result<Vec<TargetConfig>, serde_json::Error> {
    serde_json::from_str::<TargetFile>(raw).map(|file| file.targets)
}

/// Substitutes `{out}` in a single argument template.
pub fn render_argument(template: &str, out: &Path) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                result.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                result.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(ConfigError::UnterminatedPlaceholder {
                                template: template.to_string(),
                            });
                        }
                    }
                }
                match name.as_str() {
                    "out" => result.push_str(&out.to_string_lossy()),
                    _ => {
                        return Err(ConfigError::UnknownPlaceholder {
                            name,
                            template: template.to_string(),
                        });
                    }
                }
            }
            _ => result.push(c),
        }
    }

    Ok(result)
}
