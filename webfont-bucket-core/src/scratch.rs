//! Run-scoped scratch storage.
//!
//! Every run gets its own directory `<scratch_root>/<run-id>`, so two runs in one
//! process never see each other's files.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::PipelineError;

#[derive(Debug)]
pub struct ScratchDir {
    run_id: Uuid,
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh, empty run directory under `root`.
    pub async fn create(root: &Path) -> Result<Self, PipelineError> {
        let run_id = Uuid::new_v4();
        let path = root.join(run_id.to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| PipelineError::Scratch {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), %run_id, "Created run scratch directory");
        Ok(Self { run_id, path })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every entry, whatever its extension or origin, then the run directory itself.
    /// The first deletion that fails aborts the reclaim.
    pub async fn reclaim(&self) -> Result<usize, PipelineError> {
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(reclaim_failed(&self.path))?;
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(reclaim_failed(&self.path))?
        {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(reclaim_failed(&path))?;
            let result = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            result.map_err(reclaim_failed(&path))?;
            debug!(path = %path.display(), "Deleted scratch entry");
            removed += 1;
        }
        tokio::fs::remove_dir(&self.path)
            .await
            .map_err(reclaim_failed(&self.path))?;
        info!(path = %self.path.display(), removed, "Reclaimed scratch directory");
        Ok(removed)
    }

    /// Best-effort removal after a failed run. Errors are only logged.
    pub async fn discard(&self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Discarded scratch directory"),
            Err(e) => warn!(
                error = ?e,
                path = %self.path.display(),
                "Failed to discard scratch directory after failed run"
            ),
        }
    }
}

fn reclaim_failed(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError {
    let path = path.to_path_buf();
    move |source| PipelineError::ReclaimFailed { path, source }
}
