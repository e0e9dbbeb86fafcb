//! Source discovery and context assembly
//!
//! Walks the target tree through the [`Workspace`] collaborator, collects
//! analyzable Python files (test files and tooling directories excluded),
//! and concatenates their contents into the context string handed to
//! agents. Per-file read failures are skipped, not fatal. The assembled
//! context is truncated at a line boundary to the configured limit so a
//! large target cannot blow past the transport's window.

use crate::error::PipelineError;
use crate::traits::Workspace;
use std::path::{Path, PathBuf};
use testforge_model::RunConfig;

/// Directories never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    "__pycache__",
    "venv",
    ".venv",
    "node_modules",
    ".pytest_cache",
    "tests",
    "test",
    "__tests__",
];

/// Discovered sources plus the assembled agent context.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    /// Concatenated, truncated file contents with `# File:` headers
    pub content: String,
    /// The files that contributed, in discovery order
    pub files: Vec<PathBuf>,
}

impl SourceSet {
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_test_file(name: &str) -> bool {
    name.starts_with("test_") || name.ends_with("_test.py") || name == "conftest.py"
}

fn is_source_file(name: &str) -> bool {
    name.ends_with(".py") && !is_test_file(name)
}

fn is_excluded_dir(name: &str) -> bool {
    name.starts_with('.') || EXCLUDED_DIRS.contains(&name)
}

/// Find analyzable source files under `root`, depth-first, excluding
/// hidden directories, tooling directories and test files.
pub async fn discover_files(
    workspace: &dyn Workspace,
    root: &Path,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match workspace.list_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries {
            let path = dir.join(&entry.name);
            if entry.is_dir {
                if !is_excluded_dir(&entry.name) {
                    pending.push(path);
                }
            } else if is_source_file(&entry.name) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Gather sources for a run: discover (or take the configured subset),
/// read each file through the workspace, and assemble the truncated
/// context string.
pub async fn gather_sources(
    workspace: &dyn Workspace,
    config: &RunConfig,
) -> Result<SourceSet, PipelineError> {
    let candidates = match &config.target_files {
        Some(files) => files.clone(),
        None => discover_files(workspace, &config.target_path).await?,
    };

    let mut files = Vec::new();
    let mut chunks = Vec::new();
    for path in candidates {
        match workspace.read_file(&path).await {
            Ok(contents) => {
                chunks.push(format!("# File: {}\n{}", path.display(), contents));
                files.push(path);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
            }
        }
    }

    let content = truncate_at_boundary(&chunks.join("\n\n"), config.max_context_chars);
    Ok(SourceSet { content, files })
}

/// Truncate `text` to at most `max_chars` characters, cutting at the last
/// line break before the limit when one exists.
#[must_use]
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    let byte_limit = match text.char_indices().nth(max_chars) {
        Some((idx, _)) => idx,
        None => return text.to_string(),
    };
    let head = &text[..byte_limit];
    match head.rfind('\n') {
        Some(pos) => head[..pos].to_string(),
        None => head.to_string(),
    }
}
