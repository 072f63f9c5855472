//! Local filesystem access: upload staging and service env files.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::application::ports::LocalFiles;

/// Production implementation of `LocalFiles`.
#[derive(Debug, Default)]
pub struct LocalFs;

/// A staged upload; the local file is deleted on drop.
pub struct StagedFile(NamedTempFile);

impl AsRef<Path> for StagedFile {
    fn as_ref(&self) -> &Path {
        self.0.path()
    }
}

impl LocalFiles for LocalFs {
    type Staged = StagedFile;

    fn stage(&self, content: &[u8]) -> Result<StagedFile> {
        let mut file = tempfile::Builder::new()
            .prefix("hostprep-")
            .tempfile()
            .context("creating staging file")?;
        file.write_all(content).context("writing staging file")?;
        file.flush().context("flushing staging file")?;
        Ok(StagedFile(file))
    }

    fn env_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("cannot list {}", dir.display()))?;
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "env"))
            .collect();
        files.sort();
        Ok(files)
    }
}
