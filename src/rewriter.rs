//! Import specifier rewriting for renamed files.
//!
//! This is a textual rewrite, not module resolution. For every file, each
//! rename mapping yields the quoted specifiers a file in that directory would
//! have used for the old path (with and without the old extension), and any
//! literal occurrence is replaced by the specifier for the new path.
//! Specifiers that are aliased, built at runtime or quoted with backticks are
//! not recognised, and an unrelated string equal to a candidate is rewritten
//! too.

use crate::error::NormalizeError;
use crate::renamer::RenameMapping;
use crate::walker;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Upper bound on files being read or written at once.
const MAX_CONCURRENT_REWRITES: usize = 64;

const QUOTES: [char; 2] = ['"', '\''];

/// A literal quoted specifier and its substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub needle: String,
    pub new_text: String,
}

/// Result of rewriting a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub replacements: usize,
}

/// Totals for one rewrite pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteSummary {
    pub files_visited: usize,
    pub files_changed: usize,
    pub replacements: usize,
}

/// Builds the specifier a file in `from_dir` would use to import `to`.
///
/// Both paths must be absolute. Separators are always `/`, and a target in
/// the same directory or below it gets an explicit `./` prefix.
pub fn relative_specifier(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let target: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    let joined = parts.join("/");
    if joined.starts_with("../") {
        joined
    } else {
        format!("./{}", joined)
    }
}

/// Computes every replacement that applies to files located in `dir`.
///
/// Earlier mappings win when two produce the same needle.
pub fn replacements_for(dir: &Path, mappings: &[RenameMapping]) -> Vec<Replacement> {
    let mut replacements: Vec<Replacement> = Vec::new();

    for mapping in mappings {
        let old = relative_specifier(dir, &mapping.old_stem());
        let new = format!(
            "{}{}",
            relative_specifier(dir, &mapping.new_stem()),
            mapping.rule.new_specifier_extension
        );
        let candidates = [
            format!("{}{}", old, mapping.rule.old_specifier_extension),
            old,
        ];

        for quote in QUOTES {
            for candidate in &candidates {
                let needle = format!("{quote}{candidate}{quote}");
                if replacements.iter().any(|r| r.needle == needle) {
                    continue;
                }
                replacements.push(Replacement {
                    needle,
                    new_text: format!("{quote}{new}{quote}"),
                });
            }
        }
    }

    replacements
}

/// Applies replacements line by line, returning the new content and the
/// number of substitutions made.
///
/// Each quote character is a possible specifier start; the line is scanned
/// once, so replaced text is never matched again. Line terminators are kept
/// as they were.
pub fn apply_replacements(content: &str, replacements: &[Replacement]) -> (String, usize) {
    let mut result = String::with_capacity(content.len());
    let mut count = 0;

    for line in content.split_inclusive('\n') {
        count += rewrite_line(line, replacements, &mut result);
    }

    (result, count)
}

fn rewrite_line(line: &str, replacements: &[Replacement], out: &mut String) -> usize {
    let mut count = 0;
    let mut rest = line;

    while let Some(pos) = rest.find(|c: char| QUOTES.contains(&c)) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match replacements.iter().find(|r| tail.starts_with(&r.needle)) {
            Some(rep) => {
                out.push_str(&rep.new_text);
                rest = &tail[rep.needle.len()..];
                count += 1;
            }
            None => {
                // Quotes are ASCII, so one byte is a full char.
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    count
}

/// Reads `file`, rewrites specifiers pointing at renamed files and writes the
/// result back unconditionally.
///
/// Content that is not valid UTF-8 is written back byte-for-byte.
pub async fn rewrite_file(
    file: PathBuf,
    mappings: &[RenameMapping],
) -> Result<FileOutcome, NormalizeError> {
    let bytes = fs::read(&file).await.map_err(|source| NormalizeError::Read {
        path: file.clone(),
        source,
    })?;

    let (output, replacements) = match String::from_utf8(bytes) {
        Ok(text) => {
            let dir = file.parent().unwrap_or(Path::new("/"));
            let (rewritten, count) = apply_replacements(&text, &replacements_for(dir, mappings));
            (rewritten.into_bytes(), count)
        }
        Err(err) => {
            warn!(file = %file.display(), "not UTF-8, leaving content as is");
            (err.into_bytes(), 0)
        }
    };

    fs::write(&file, output)
        .await
        .map_err(|source| NormalizeError::Write {
            path: file.clone(),
            source,
        })?;

    if replacements > 0 {
        debug!(file = %file.display(), replacements, "rewrote imports");
    }
    Ok(FileOutcome {
        path: file,
        replacements,
    })
}

/// Rewrites imports in every file under `root`, renamed files included.
///
/// Files are processed concurrently; the first failure aborts the pass and
/// may leave the tree partially rewritten.
pub async fn rewrite_imports(
    root: &Path,
    mappings: &[RenameMapping],
) -> Result<RewriteSummary, NormalizeError> {
    let files = walker::collect_files(root).await?;

    let outcomes: Vec<FileOutcome> = stream::iter(files)
        .map(|file| rewrite_file(file, mappings))
        .buffer_unordered(MAX_CONCURRENT_REWRITES)
        .try_collect()
        .await?;

    let summary = RewriteSummary {
        files_visited: outcomes.len(),
        files_changed: outcomes.iter().filter(|o| o.replacements > 0).count(),
        replacements: outcomes.iter().map(|o| o.replacements).sum(),
    };
    info!(
        root = %root.display(),
        files = summary.files_visited,
        changed = summary.files_changed,
        replacements = summary.replacements,
        "rewrite pass complete"
    );
    Ok(summary)
}
