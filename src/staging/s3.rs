//! Amazon S3 staging store.
//!
//! Stores payloads as objects in a bucket named after the container:
//! ```text
//! s3://{container}/{blob name}
//! ```

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::BucketCannedAcl;
use aws_sdk_s3::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{ContainerAccess, Result, StagingError, StagingStore};

/// S3-based staging store.
pub struct S3StagingStore {
    client: Client,
    bucket: String,
    access: ContainerAccess,
    created: OnceCell<()>,
}

impl S3StagingStore {
    /// Create a new S3 staging store.
    ///
    /// Uses default credentials from the environment (AWS_ACCESS_KEY_ID,
    /// AWS_SECRET_ACCESS_KEY, or IAM role). A custom endpoint switches to
    /// path-style addressing for S3-compatible services like MinIO.
    pub async fn new(
        bucket: impl Into<String>,
        access: ContainerAccess,
        region: Option<&str>,
        endpoint: Option<&str>,
    ) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region.to_string()));
        }

        let config = config_loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&config);
        if let Some(endpoint) = endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        Self::with_client(Client::from_conf(s3_config.build()), bucket, access)
    }

    /// Create with explicit client (for testing).
    pub fn with_client(client: Client, bucket: impl Into<String>, access: ContainerAccess) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            access,
            created: OnceCell::new(),
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            debug!(bucket = %self.bucket, "Staging bucket exists");
            return Ok(());
        }

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.access == ContainerAccess::Container {
            request = request.acl(BucketCannedAcl::PublicRead);
        }

        match request.send().await {
            Ok(_) => {
                info!(bucket = %self.bucket, access = ?self.access, "Created staging bucket");
                Ok(())
            }
            Err(e) => {
                // Lost a creation race with another instance
                let message = format!("{:?}", e);
                if message.contains("BucketAlreadyOwnedByYou") {
                    Ok(())
                } else {
                    Err(StagingError::ContainerFailed {
                        container: self.bucket.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl StagingStore for S3StagingStore {
    async fn ensure_container(&self) -> Result<()> {
        self.created
            .get_or_try_init(|| self.create_bucket())
            .await?;
        Ok(())
    }

    async fn write_blob(&self, name: &str, content: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type("application/json")
            .if_none_match("*")
            .body(ByteStream::from(content.to_vec()))
            .send()
            .await
            .map_err(|e| {
                let message = format!("{:?}", e);
                if message.contains("PreconditionFailed") {
                    StagingError::AlreadyExists(name.to_string())
                } else {
                    StagingError::WriteFailed(format!("S3 upload failed: {}", e))
                }
            })?;

        debug!(bucket = %self.bucket, key = %name, size = content.len(), "Stored blob in S3");
        Ok(())
    }

    fn container(&self) -> &str {
        &self.bucket
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
