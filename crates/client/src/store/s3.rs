//! S3-compatible storage backend using AWS SDK.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use bytes::Bytes;
use chordium_core::config::ObjectStoreConfig;
use tracing::instrument;

use super::{ObjectInfo, ObjectStore, StoreError, StoreResult};

/// S3-compatible object store with static credentials.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Prepend `http://` to bare `host:port` endpoints.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err
        && service_err.raw().status().as_u16() == 404
    {
        return StoreError::NotFound(key.to_string());
    }
    StoreError::Backend(err.to_string())
}

impl S3ObjectStore {
    /// Build a client from configuration.
    ///
    /// Fails with `Config` when the bucket or either credential half is missing.
    pub fn new(config: &ObjectStoreConfig) -> StoreResult<Self> {
        let creds = config
            .credentials()
            .ok_or_else(|| StoreError::Config("bucket, access_key_id and secret_access_key are required".into()))?;

        let credentials =
            Credentials::new(creds.access_key_id, creds.secret_access_key, None, None, "chordium-config");

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        let endpoint = match config.endpoint.as_deref() {
            Some(endpoint) => {
                let endpoint = normalize_endpoint(endpoint);
                builder = builder.endpoint_url(&endpoint);
                endpoint
            }
            None => format!("s3.{}.amazonaws.com", config.region),
        };

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self { client: Client::from_conf(builder.build()), bucket: creds.bucket.to_string(), endpoint })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .into_bytes();

        Ok(bytes)
    }

    #[instrument(skip(self, body, metadata), fields(backend = "s3", size = body.len()))]
    async fn put(
        &self, key: &str, body: Bytes, content_type: &str, metadata: &HashMap<String, String>,
    ) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()))
            .body(body.into())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head(&self, key: &str) -> StoreResult<ObjectInfo> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let last_modified = output
            .last_modified()
            .and_then(|dt| chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()));

        Ok(ObjectInfo {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(|s| s.to_string()),
            last_modified,
            metadata: output.metadata().cloned().unwrap_or_default(),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| map_sdk_error(e, prefix))?;

            results.extend(output.contents().iter().filter_map(|obj| obj.key().map(str::to_string)));

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(results)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        // delete_object succeeds on missing keys, so check first to report NotFound.
        self.head(key).await?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
