use crate::domain::ports::Storage;
use crate::utils::error::{PortalError, Result};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;

/// Blob storage in an S3 bucket, keys optionally under a prefix.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    /// 依區域建立 client (path-style，相容 MinIO 等)
    pub async fn from_region(bucket: String, prefix: String, region: String) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let config = aws_sdk_s3::config::Builder::from(&config)
            .region(aws_sdk_s3::config::Region::new(region))
            .force_path_style(true)
            .build();
        Self::new(S3Client::from_conf(config), bucket, prefix)
    }

    fn key(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let key = self.key(path);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| PortalError::StorageError {
                message: format!("Failed to read s3://{}/{}: {}", self.bucket, key, DisplayErrorContext(&e)),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| PortalError::StorageError {
                message: format!("Failed to collect S3 object body: {}", e),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let key = self.key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| PortalError::StorageError {
                message: format!("Failed to write s3://{}/{}: {}", self.bucket, key, DisplayErrorContext(&e)),
            })?;
        tracing::debug!("Uploaded s3://{}/{} ({} bytes)", self.bucket, key, data.len());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| PortalError::StorageError {
                message: format!("Failed to delete s3://{}/{}: {}", self.bucket, key, DisplayErrorContext(&e)),
            })?;
        Ok(())
    }
}
