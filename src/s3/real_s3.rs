use crate::config::S3Config;
use crate::s3::error::StorageError;
use crate::s3::storage::{BucketObject, Storage};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::{config::Region, Client};
use bytes::Bytes;
use tracing::{debug, info};

/// S3 implementation of the Storage trait.
///
/// Works against AWS and any S3-compatible gateway (MinIO, Supabase storage)
/// when `endpoint` is set.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Storage {
    pub async fn new(config: &S3Config) -> Result<Self, StorageError> {
        let config_loader = aws_config::from_env().region(Region::new(config.region.clone()));

        let aws_config = if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "StaticCredentialsProvider",
            );

            config_loader.credentials_provider(credentials).load().await
        } else {
            config_loader.load().await
        };

        let mut client_builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint {
            // S3-compatible gateways generally do not support virtual-hosted buckets
            client_builder = client_builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(client_builder.build());

        info!(
            "Connected to S3 bucket {} in region {}",
            config.bucket, config.region
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
        })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list_objects(&self) -> Result<Vec<BucketObject>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(prefix) = &self.prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                StorageError::ListError(self.bucket.clone(), DisplayErrorContext(&e).to_string())
            })?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    objects.push(BucketObject::new(key, object.size().unwrap_or(0)));
                }
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("Listed {} objects in bucket {}", objects.len(), self.bucket);
        Ok(objects)
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        debug!("Fetching object from S3: {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                match e.as_service_error() {
                    Some(service) if service.is_no_such_key() => {
                        StorageError::ObjectNotFound(key.to_string())
                    }
                    _ if message.contains("AccessDenied") => {
                        StorageError::AccessDenied(key.to_string(), message)
                    }
                    _ => StorageError::ReadError(key.to_string(), message),
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::ReadError(key.to_string(), e.to_string()))?
            .into_bytes();

        debug!("Fetched {} bytes for {}", data.len(), key);
        Ok(data)
    }

    #[cfg(test)]
    async fn add_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(data.into())
            .send()
            .await
            .map_err(|e| StorageError::Other(anyhow::anyhow!("Failed to put object: {}", e)))?;
        Ok(())
    }

    #[cfg(test)]
    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Other(anyhow::anyhow!("Failed to delete object: {}", e)))?;
        Ok(())
    }
}
