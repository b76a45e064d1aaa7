//! Filesystem recipe store
//!
//! Layout: `{root}/{model}/{session}/{upload|current}/{program}`. The program
//! id is reduced to its basename before it touches a path.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::errors::RecipeError;
use crate::ports::outbound::{RecipeKey, RecipeSlot, RecipeStore};

/// Recipe store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsRecipeStore {
    root: PathBuf,
}

impl FsRecipeStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a program file.
    pub fn path_for(&self, key: &RecipeKey, slot: RecipeSlot) -> Result<PathBuf, RecipeError> {
        let file = sanitize_program_id(&key.program_id)?;
        let session = sanitize_program_id(&key.session)?;
        Ok(self
            .root
            .join(key.model.as_str())
            .join(session)
            .join(slot.as_str())
            .join(file))
    }
}

/// Basename of `id`, with both separator styles treated as separators.
pub fn sanitize_program_id(id: &str) -> Result<String, RecipeError> {
    let normalized = id.trim().replace('\\', "/");
    let base = normalized.rsplit('/').next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return Err(RecipeError::InvalidProgramId(id.to_string()));
    }
    Ok(base.to_string())
}

/// `{path}.partial`; the program id's own extension is kept.
fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_os_string();
    staging.push(".partial");
    PathBuf::from(staging)
}

fn io_error(path: &Path, e: std::io::Error) -> RecipeError {
    RecipeError::Io(format!("{}: {e}", path.display()))
}

#[async_trait]
impl RecipeStore for FsRecipeStore {
    async fn read(&self, key: &RecipeKey, slot: RecipeSlot) -> Result<Option<Vec<u8>>, RecipeError> {
        let path = self.path_for(key, slot)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn write(&self, key: &RecipeKey, slot: RecipeSlot, body: &[u8]) -> Result<(), RecipeError> {
        let path = self.path_for(key, slot)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))?;
        }

        // write-then-rename so readers never see a partial program
        let staging = staging_path(&path);
        tokio::fs::write(&staging, body)
            .await
            .map_err(|e| io_error(&staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!(path = %path.display(), bytes = body.len(), "recipe stored");
        Ok(())
    }
}
