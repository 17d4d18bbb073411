//! Amazon S3 bucket.
//!
//! Coupons are objects in a single bucket:
//! ```text
//! s3://{bucket}/new/{id}
//! s3://{bucket}/used/{id}
//! ```

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::ObjectBucket;
use crate::core::error::BackendError;

/// Content type of stored coupon records
const RECORD_CONTENT_TYPE: &str = "application/json";

/// [`ObjectBucket`] over an S3 (or S3-compatible) bucket.
pub struct S3Bucket {
    client: Client,
    bucket: String,
}

impl S3Bucket {
    /// Connect using the default AWS credential chain.
    ///
    /// `region` overrides the region from the environment. `endpoint` points
    /// the client at an S3-compatible service (MinIO, LocalStack) and switches
    /// to path-style addressing.
    pub async fn connect(bucket: impl Into<String>, region: Option<&str>, endpoint: Option<&str>) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region.to_string()));
        }

        let config = config_loader.load().await;

        let client = match endpoint {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&config),
        };

        Self::with_client(client, bucket)
    }

    /// Create with explicit client (for testing).
    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    /// `CopySource` value for `key` in this bucket.
    fn copy_source(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }
}

fn object_store_error<E>(op: &str, key: &str, err: E) -> BackendError
where
    E: std::error::Error,
{
    BackendError::ObjectStore(format!("S3 {} {} failed: {}", op, key, DisplayErrorContext(&err)))
}

#[async_trait]
impl ObjectBucket for S3Bucket {
    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(object_store_error("head", key, e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let response = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => return Ok(None),
            Err(e) => return Err(object_store_error("get", key, e)),
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| object_store_error("read body of", key, e))?
            .into_bytes()
            .to_vec();

        Ok(Some(body))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(RECORD_CONTENT_TYPE)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| object_store_error("put", key, e))?;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(from))
            .key(to)
            .send()
            .await
            .map_err(|e| object_store_error("copy", from, e))?;
        log::debug!("Copied s3://{}/{} to {}", self.bucket, from, to);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        // S3 answers 204 for missing keys too
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| object_store_error("delete", key, e))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| object_store_error("list", prefix, e))?;

            keys.extend(response.contents().iter().filter_map(|object| object.key()).map(str::to_owned));

            continuation_token = response.next_continuation_token().map(|s| s.to_string());
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_bucket(name: &str) -> S3Bucket {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("eu-west-1"))
            .build();
        S3Bucket::with_client(Client::from_conf(config), name)
    }

    #[test]
    fn test_copy_source_includes_bucket() {
        let bucket = offline_bucket("coupons");
        assert_eq!(bucket.copy_source("new/cid1"), "coupons/new/cid1");
    }

    #[test]
    fn test_describe() {
        let bucket = offline_bucket("coupons");
        assert_eq!(bucket.describe(), "s3://coupons");
        assert_eq!(bucket.bucket_name(), "coupons");
    }
}
