//! Filesystem-based staging store.
//!
//! Stores payloads as files in one directory per container:
//! ```text
//! {base_path}/
//!   {container}/
//!     {blob name}
//! ```
//!
//! Blobs are written to a temp file and hard-linked into place, so a
//! blob name only ever refers to complete content.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::debug;
use uuid::Uuid;

use super::{Result, StagingError, StagingStore};

/// Removes a temp file when dropped, including when the write future is
/// abandoned partway.
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Filesystem-based staging store.
pub struct FilesystemStagingStore {
    container: String,
    dir: PathBuf,
    created: OnceCell<()>,
}

impl FilesystemStagingStore {
    /// Create a store rooted at `base_path`.
    ///
    /// The container directory is created lazily on first write.
    pub fn new(base_path: impl AsRef<Path>, container: impl Into<String>) -> Self {
        let container = container.into();
        let dir = base_path.as_ref().join(&container);
        Self {
            container,
            dir,
            created: OnceCell::new(),
        }
    }

    /// Path of a blob within the container.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[async_trait]
impl StagingStore for FilesystemStagingStore {
    async fn ensure_container(&self) -> Result<()> {
        self.created
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.dir).await.map_err(|e| {
                    StagingError::ContainerFailed {
                        container: self.container.clone(),
                        message: e.to_string(),
                    }
                })?;
                debug!(path = %self.dir.display(), "Staging directory ready");
                Ok::<(), StagingError>(())
            })
            .await?;
        Ok(())
    }

    async fn write_blob(&self, name: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(name);
        let temp = TempFile(self.dir.join(format!("{}.tmp-{}", name, Uuid::new_v4())));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp.0)
            .await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);

        // hard_link refuses to clobber an existing blob
        match fs::hard_link(&temp.0, &path).await {
            Ok(()) => {
                debug!(path = %path.display(), size = content.len(), "Staged blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StagingError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn container(&self) -> &str {
        &self.container
    }

    fn backend(&self) -> &'static str {
        "filesystem"
    }
}
