//! S3-compatible storage backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::instrument;

fn map_s3_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::S3(Box::new(err))
}

/// S3-compatible object store.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// `endpoint` and `force_path_style` support S3-compatible stores such
    /// as MinIO. When no static credentials are given, the ambient AWS
    /// credential chain is used.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if bucket.is_empty() {
            return Err(StorageError::Config("s3 bucket must not be empty".to_string()));
        }
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 credentials must provide both access_key_id and secret_access_key".to_string(),
            ));
        }

        let region = aws_config::Region::new(region.unwrap_or_else(|| "us-east-1".to_string()));
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if let (Some(access_key_id), Some(secret_access_key)) =
            (access_key_id, secret_access_key)
        {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "modelvault-static",
            ));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(force_path_style);

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix.filter(|p| !p.is_empty()),
        })
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{key}", prefix.trim_end_matches('/')),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                if let aws_sdk_s3::error::SdkError::ServiceError(service_err) = &err {
                    if service_err.err().is_not_found() {
                        return Ok(false);
                    }
                }
                Err(map_s3_error(err))
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                if let aws_sdk_s3::error::SdkError::ServiceError(service_err) = &err {
                    if service_err.err().is_no_such_key() {
                        return Err(StorageError::NotFound(key.to_string()));
                    }
                }
                return Err(map_s3_error(err));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;
        Ok(data.into_bytes())
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put_if_not_exists(&self, key: &str, data: Bytes) -> StorageResult<bool> {
        // Same advisory check-then-write as the filesystem backend; the
        // orchestration-layer lock serializes writers of the same key.
        if self.exists(key).await? {
            return Ok(false);
        }
        self.put(key, data).await?;
        Ok(true)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
