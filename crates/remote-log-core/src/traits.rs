//! Core traits for object storage clients.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// An object fetched from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Key the object was fetched from.
    pub key: String,
    /// Raw object body.
    pub body: Bytes,
}

impl StoredObject {
    /// Create a stored object.
    #[must_use]
    pub fn new(key: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
        }
    }

    /// Decode the body as UTF-8 text.
    ///
    /// # Errors
    /// Returns `ClientError::Decode` if the body is not valid UTF-8.
    pub fn decode(&self) -> Result<String, ClientError> {
        std::str::from_utf8(&self.body)
            .map(ToOwned::to_owned)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Object client error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection not found: {0:?}")]
    ConnectionNotFound(String),
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Trait for object storage clients.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Fetch an object. `Ok(None)` means the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, ClientError>;

    /// Check whether `key` exists.
    ///
    /// Defaults to fetching the object. Backends that can answer from
    /// metadata alone should override this.
    async fn object_exists(&self, key: &str) -> Result<bool, ClientError> {
        Ok(self.get_object(key).await?.is_some())
    }

    /// Store `content` under `key`.
    ///
    /// With `replace == false` an existing object must not be overwritten.
    async fn load_string(
        &self,
        content: &str,
        key: &str,
        replace: bool,
        encrypt: bool,
    ) -> Result<(), ClientError>;
}

/// Trait for building clients from a connection id.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Create a client for `conn_id`. An empty id selects the default connection.
    async fn create(&self, conn_id: &str) -> Result<Arc<dyn ObjectClient>, ClientError>;
}

#[async_trait]
impl<F: ClientFactory + ?Sized> ClientFactory for Arc<F> {
    async fn create(&self, conn_id: &str) -> Result<Arc<dyn ObjectClient>, ClientError> {
        (**self).create(conn_id).await
    }
}
