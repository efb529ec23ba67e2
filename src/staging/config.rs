//! Staging store configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Staging store type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingStoreType {
    /// Process-local storage, lost on restart.
    #[default]
    Memory,
    /// Filesystem-based storage (local or mounted).
    Filesystem,
    /// Amazon S3 (requires `s3` feature).
    #[cfg(feature = "s3")]
    S3,
}

/// Access level applied when the container is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAccess {
    /// Only authenticated principals can read blobs.
    #[default]
    Private,
    /// Anonymous read access to the container and its blobs.
    Container,
}

/// Configuration for the staging store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Staging store type.
    #[serde(rename = "type")]
    pub store_type: StagingStoreType,

    /// Container name (directory for filesystem, bucket for S3).
    pub container: String,

    /// Access level for a newly created container.
    pub access: ContainerAccess,

    /// Base directory for the filesystem store.
    /// Blobs are written to `{base_path}/{container}/{name}`.
    pub base_path: PathBuf,

    /// AWS region for S3. Uses the default provider chain if not set.
    pub region: Option<String>,

    /// Custom S3 endpoint (MinIO, LocalStack).
    pub endpoint: Option<String>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            store_type: StagingStoreType::default(),
            container: "order-staging".to_string(),
            access: ContainerAccess::default(),
            base_path: PathBuf::from("./data/staging"),
            region: None,
            endpoint: None,
        }
    }
}
