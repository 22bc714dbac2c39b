//! In-memory object storage.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use bytes::Bytes;
use remote_log_core::traits::{ClientError, ClientFactory, ObjectClient, StoredObject};

#[derive(Debug, Clone)]
struct Entry {
    body: Bytes,
    encrypted: bool,
}

/// In-memory object client.
///
/// Useful for development and tests.
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryObjectClient {
    objects: RwLock<HashMap<String, Entry>>,
}

impl MemoryObjectClient {
    /// Create an empty in-memory client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing `load_string`.
    ///
    /// # Errors
    /// Returns error if the object map lock is poisoned.
    pub fn insert(
        &self,
        key: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        self.objects
            .write()
            .map_err(|e| ClientError::Backend(e.to_string()))?
            .insert(
                key.into(),
                Entry {
                    body: body.into(),
                    encrypted: false,
                },
            );
        Ok(())
    }

    /// Whether the object at `key` was stored with encryption requested.
    #[must_use]
    pub fn is_encrypted(&self, key: &str) -> Option<bool> {
        self.objects
            .read()
            .ok()?
            .get(key)
            .map(|entry| entry.encrypted)
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, ClientError> {
        Ok(self
            .objects
            .read()
            .map_err(|e| ClientError::Backend(e.to_string()))?
            .get(key)
            .map(|entry| StoredObject::new(key, entry.body.clone())))
    }

    async fn object_exists(&self, key: &str) -> Result<bool, ClientError> {
        Ok(self
            .objects
            .read()
            .map_err(|e| ClientError::Backend(e.to_string()))?
            .contains_key(key))
    }

    async fn load_string(
        &self,
        content: &str,
        key: &str,
        replace: bool,
        encrypt: bool,
    ) -> Result<(), ClientError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|e| ClientError::Backend(e.to_string()))?;

        if !replace && objects.contains_key(key) {
            return Err(ClientError::AlreadyExists(key.to_string()));
        }

        objects.insert(
            key.to_string(),
            Entry {
                body: Bytes::copy_from_slice(content.as_bytes()),
                encrypted: encrypt,
            },
        );

        Ok(())
    }
}

/// Factory handing out one shared in-memory client.
///
/// By default every connection id resolves to the shared client. After
/// `with_connections`, only the listed ids do.
#[derive(Debug, Default)]
pub struct MemoryClientFactory {
    client: Arc<MemoryObjectClient>,
    connections: Option<HashSet<String>>,
}

impl MemoryClientFactory {
    /// Create a factory around `client`.
    #[must_use]
    pub fn new(client: Arc<MemoryObjectClient>) -> Self {
        Self {
            client,
            connections: None,
        }
    }

    /// Restrict the factory to the given connection ids.
    #[must_use]
    pub fn with_connections<I, S>(mut self, conn_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connections = Some(conn_ids.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl ClientFactory for MemoryClientFactory {
    async fn create(&self, conn_id: &str) -> Result<Arc<dyn ObjectClient>, ClientError> {
        if let Some(ref connections) = self.connections {
            if !connections.contains(conn_id) {
                return Err(ClientError::ConnectionNotFound(conn_id.to_string()));
            }
        }
        Ok(Arc::clone(&self.client) as Arc<dyn ObjectClient>)
    }
}
