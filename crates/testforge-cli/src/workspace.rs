//! Real-filesystem workspace

use async_trait::async_trait;
use std::path::Path;
use testforge_core::{DirEntry, PipelineError, Workspace};

/// [`Workspace`] over the local filesystem via `tokio::fs`.
///
/// Writes create missing parent directories so the generated test artifact
/// can land in a `tests/` directory that does not exist yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWorkspace;

#[async_trait]
impl Workspace for FsWorkspace {
    async fn read_file(&self, path: &Path) -> Result<String, PipelineError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, PipelineError> {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(path).await?;
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }
        Ok(entries)
    }
}
