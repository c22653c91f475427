//! Write files under temporary names and move them into place together.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, TabulaError};

/// A set of files written to temporary paths, renamed in order on commit.
///
/// A commit either moves every file into place or none: existing targets are
/// set aside first and restored if any rename fails. Dropping an uncommitted
/// staging removes its temporary files.
#[derive(Debug, Default)]
pub(crate) struct Staging {
    files: Vec<(PathBuf, PathBuf)>,
    committed: bool,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a temporary path that will become `target` on commit.
    pub fn stage(&mut self, target: PathBuf) -> PathBuf {
        let temp = temp_path(&target);
        self.files.push((temp.clone(), target));
        temp
    }

    /// Rename every staged file to its target, in staging order.
    pub fn commit(mut self) -> Result<()> {
        let mut backups: Vec<(PathBuf, &PathBuf)> = Vec::new();
        let mut placed: Vec<&PathBuf> = Vec::new();

        let result = self.files.iter().try_for_each(|(temp, target)| -> Result<()> {
            if target.is_file() {
                let backup = backup_path(target);
                fs::rename(target, &backup).map_err(|e| TabulaError::io(target, e))?;
                backups.push((backup, target));
            }
            debug!("Committing {}", target.display());
            fs::rename(temp, target).map_err(|e| TabulaError::io(target, e))?;
            placed.push(target);
            Ok(())
        });

        if let Err(e) = result {
            warn!("Commit failed, restoring {} files: {}", placed.len(), e);
            for target in placed.into_iter().rev() {
                let _ = fs::remove_file(target);
            }
            for (backup, target) in backups.into_iter().rev() {
                let _ = fs::rename(&backup, target);
            }
            return Err(e);
        }

        for (backup, _) in &backups {
            let _ = fs::remove_file(backup);
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (temp, _) in &self.files {
            if temp.exists() {
                let _ = fs::remove_file(temp);
            }
        }
    }
}

fn hidden_sibling(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{:08x}.{}", name, fastrand::u32(..), suffix))
}

fn temp_path(target: &Path) -> PathBuf {
    hidden_sibling(target, "tmp")
}

fn backup_path(target: &Path) -> PathBuf {
    hidden_sibling(target, "bak")
}

/// Replace `path` with `bytes` via a temporary file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut staging = Staging::new();
    let temp = staging.stage(path.to_path_buf());
    fs::write(&temp, bytes).map_err(|e| TabulaError::io(&temp, e))?;
    staging.commit()
}
