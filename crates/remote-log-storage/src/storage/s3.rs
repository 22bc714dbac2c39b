//! S3 object storage (feature-gated).

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Region},
    error::{DisplayErrorContext, SdkError},
    operation::{get_object::GetObjectError, head_object::HeadObjectError},
    primitives::ByteStream,
    types::ServerSideEncryption,
};
use remote_log_core::traits::{ClientError, ClientFactory, ObjectClient, StoredObject};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const S3_SCHEME: &str = "s3://";

/// Settings for one named S3 connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3ConnectionConfig {
    pub region: String,
    /// Custom endpoint, e.g. a MinIO server.
    pub endpoint_url: Option<String>,
    /// Bucket used for locations given as bare keys.
    pub default_bucket: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3ConnectionConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint_url: None,
            default_bucket: None,
            force_path_style: false,
        }
    }
}

/// Split a location into `(bucket, key)`.
///
/// Accepts `s3://bucket/key` URLs, or bare keys resolved against `default_bucket`.
///
/// # Errors
/// Returns `ClientError::InvalidLocation` if no bucket or key can be determined.
pub fn parse_location(
    location: &str,
    default_bucket: Option<&str>,
) -> Result<(String, String), ClientError> {
    let invalid = || ClientError::InvalidLocation(location.to_string());

    let (bucket, key) = match location.strip_prefix(S3_SCHEME) {
        Some(rest) => rest.split_once('/').ok_or_else(invalid)?,
        None => (
            default_bucket.ok_or_else(invalid)?,
            location.trim_start_matches('/'),
        ),
    };

    if bucket.is_empty() || key.is_empty() {
        return Err(invalid());
    }
    Ok((bucket.to_string(), key.to_string()))
}

fn error_string<E>(err: &SdkError<E>) -> String
where
    E: std::error::Error + 'static,
{
    DisplayErrorContext(err).to_string()
}

/// Object client backed by an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3ObjectClient {
    client: Client,
    default_bucket: Option<String>,
}

impl S3ObjectClient {
    /// Wrap an already configured SDK client.
    #[must_use]
    pub const fn from_client(client: Client, default_bucket: Option<String>) -> Self {
        Self {
            client,
            default_bucket,
        }
    }

    /// Build a client from connection settings.
    pub async fn connect(config: &S3ConnectionConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(endpoint_url) = &config.endpoint_url {
            info!("The S3 endpoint url for remote logs is {}", endpoint_url);
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Self::from_client(Client::from_conf(s3_config), config.default_bucket.clone())
    }

    fn locate(&self, location: &str) -> Result<(String, String), ClientError> {
        parse_location(location, self.default_bucket.as_deref())
    }

    async fn key_exists(&self, bucket: &str, key: &str) -> Result<bool, ClientError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_error))
                if matches!(service_error.err(), HeadObjectError::NotFound(_)) =>
            {
                Ok(false)
            }
            Err(err) => Err(ClientError::Backend(error_string(&err))),
        }
    }
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, ClientError> {
        let (bucket, object_key) = self.locate(key)?;

        let result = self
            .client
            .get_object()
            .bucket(&bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let body = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| ClientError::Backend(e.to_string()))?
                    .into_bytes();
                Ok(Some(StoredObject::new(key, body)))
            }
            Err(SdkError::ServiceError(service_error)) => match service_error.err() {
                GetObjectError::NoSuchKey(_) => Ok(None),
                err => Err(ClientError::Backend(err.to_string())),
            },
            Err(err) => Err(ClientError::Backend(error_string(&err))),
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool, ClientError> {
        let (bucket, object_key) = self.locate(key)?;
        self.key_exists(&bucket, &object_key).await
    }

    async fn load_string(
        &self,
        content: &str,
        key: &str,
        replace: bool,
        encrypt: bool,
    ) -> Result<(), ClientError> {
        let (bucket, object_key) = self.locate(key)?;

        if !replace && self.key_exists(&bucket, &object_key).await? {
            return Err(ClientError::AlreadyExists(key.to_string()));
        }

        let mut request = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&object_key)
            .body(ByteStream::from(content.as_bytes().to_vec()));
        if encrypt {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request
            .send()
            .await
            .map_err(|err| ClientError::Backend(error_string(&err)))?;

        debug!(
            bucket = %bucket,
            key = %object_key,
            bytes = content.len(),
            "Uploaded log object"
        );
        Ok(())
    }
}

/// Factory resolving connection ids against a table of S3 connections.
#[derive(Debug, Clone, Default)]
pub struct S3ClientFactory {
    connections: HashMap<String, S3ConnectionConfig>,
}

impl S3ClientFactory {
    /// Create a factory from a connection table.
    #[must_use]
    pub const fn new(connections: HashMap<String, S3ConnectionConfig>) -> Self {
        Self { connections }
    }
}

#[async_trait]
impl ClientFactory for S3ClientFactory {
    async fn create(&self, conn_id: &str) -> Result<Arc<dyn ObjectClient>, ClientError> {
        let config = self
            .connections
            .get(conn_id)
            .ok_or_else(|| ClientError::ConnectionNotFound(conn_id.to_string()))?;

        Ok(Arc::new(S3ObjectClient::connect(config).await) as Arc<dyn ObjectClient>)
    }
}
