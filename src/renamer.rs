//! Suffix-based renaming of generated files.
//!
//! The whole plan is computed and checked for collisions before the first
//! rename happens, so a collision leaves the tree untouched. Content is never
//! modified here; fixing references is the rewriter's job.

use crate::error::NormalizeError;
use crate::walker;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// A fixed rename for one family of generated artifacts.
///
/// `old_extension`/`new_extension` are stripped from the file name to get the
/// module stem an importer refers to; `old_specifier_extension` and
/// `new_specifier_extension` are what an importer writes after that stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenameRule {
    pub match_suffix: &'static str,
    pub replacement_suffix: &'static str,
    pub old_extension: &'static str,
    pub new_extension: &'static str,
    pub old_specifier_extension: &'static str,
    pub new_specifier_extension: &'static str,
}

impl RenameRule {
    /// CommonJS modules emitted by `--js_out` and the grpc plugins.
    pub const IMPLEMENTATION: RenameRule = RenameRule {
        match_suffix: "_pb.js",
        replacement_suffix: "_pb.cjs",
        old_extension: ".js",
        new_extension: ".cjs",
        old_specifier_extension: ".js",
        new_specifier_extension: ".cjs",
    };

    /// Type declarations describing those modules.
    pub const DECLARATION: RenameRule = RenameRule {
        match_suffix: "_pb.d.ts",
        replacement_suffix: "_pb.d.cts",
        old_extension: ".d.ts",
        new_extension: ".d.cts",
        old_specifier_extension: ".js",
        new_specifier_extension: ".cjs",
    };

    pub const DUAL_MODULE: [RenameRule; 2] = [Self::IMPLEMENTATION, Self::DECLARATION];

    /// Returns the renamed file name, or `None` if `file_name` does not end
    /// with this rule's suffix.
    pub fn rename_file_name(&self, file_name: &str) -> Option<String> {
        file_name
            .strip_suffix(self.match_suffix)
            .map(|base| format!("{}{}", base, self.replacement_suffix))
    }
}

/// One realized rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameMapping {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub rule: RenameRule,
}

impl RenameMapping {
    /// The old path as an extension-less module stem.
    pub fn old_stem(&self) -> PathBuf {
        strip_name_suffix(&self.old_path, self.rule.old_extension)
    }

    /// The new path as an extension-less module stem.
    pub fn new_stem(&self) -> PathBuf {
        strip_name_suffix(&self.new_path, self.rule.new_extension)
    }
}

fn strip_name_suffix(path: &Path, suffix: &str) -> PathBuf {
    match path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(suffix))
    {
        Some(stem) => path.with_file_name(stem),
        None => path.to_path_buf(),
    }
}

/// Computes the renames `rules` imply for `files`. The first matching rule
/// wins; files matching no rule are left out. File names that are not valid
/// UTF-8 never match.
pub fn plan_renames(files: &[PathBuf], rules: &[RenameRule]) -> Vec<RenameMapping> {
    let mut plan: Vec<RenameMapping> = files
        .iter()
        .filter_map(|file| {
            let name = file.file_name()?.to_str()?;
            rules.iter().find_map(|rule| {
                rule.rename_file_name(name).map(|new_name| RenameMapping {
                    old_path: file.clone(),
                    new_path: file.with_file_name(new_name),
                    rule: *rule,
                })
            })
        })
        .collect();
    plan.sort_by(|a, b| a.old_path.cmp(&b.old_path));
    plan
}

/// Fails if any planned target already exists or is claimed twice.
async fn check_plan(plan: &[RenameMapping]) -> Result<(), NormalizeError> {
    let mut claimed: HashMap<&Path, &Path> = HashMap::new();
    for mapping in plan {
        if let Some(first) = claimed.insert(&mapping.new_path, &mapping.old_path) {
            return Err(NormalizeError::DuplicateTarget {
                first: first.to_path_buf(),
                second: mapping.old_path.clone(),
                to: mapping.new_path.clone(),
            });
        }
        ensure_vacant(mapping).await?;
    }
    Ok(())
}

async fn ensure_vacant(mapping: &RenameMapping) -> Result<(), NormalizeError> {
    let exists = fs::try_exists(&mapping.new_path)
        .await
        .map_err(|source| NormalizeError::Rename {
            from: mapping.old_path.clone(),
            to: mapping.new_path.clone(),
            source,
        })?;
    if exists {
        return Err(NormalizeError::RenameCollision {
            from: mapping.old_path.clone(),
            to: mapping.new_path.clone(),
        });
    }
    Ok(())
}

/// Renames every file under `root` matched by `rules` and returns the
/// combined mapping set.
///
/// Each rename is done as a hard link followed by removal of the old name,
/// so a target created after the plan was checked fails the pass instead of
/// being overwritten.
pub async fn rename_generated(
    root: &Path,
    rules: &[RenameRule],
) -> Result<Vec<RenameMapping>, NormalizeError> {
    let files = walker::collect_files(root).await?;
    let plan = plan_renames(&files, rules);
    check_plan(&plan).await?;

    for mapping in &plan {
        rename_no_clobber(mapping).await?;
        debug!(
            from = %mapping.old_path.display(),
            to = %mapping.new_path.display(),
            "renamed"
        );
    }

    info!(root = %root.display(), renamed = plan.len(), "rename pass complete");
    Ok(plan)
}

async fn rename_no_clobber(mapping: &RenameMapping) -> Result<(), NormalizeError> {
    let rename_error = |source: std::io::Error| NormalizeError::Rename {
        from: mapping.old_path.clone(),
        to: mapping.new_path.clone(),
        source,
    };

    match fs::hard_link(&mapping.old_path, &mapping.new_path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(NormalizeError::RenameCollision {
                from: mapping.old_path.clone(),
                to: mapping.new_path.clone(),
            });
        }
        Err(err) => return Err(rename_error(err)),
    }

    if let Err(err) = fs::remove_file(&mapping.old_path).await {
        // Undo the link so the file keeps exactly one name.
        let _ = fs::remove_file(&mapping.new_path).await;
        return Err(rename_error(err));
    }
    Ok(())
}
