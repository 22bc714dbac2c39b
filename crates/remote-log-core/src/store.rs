//! Remote log store with a lazily created, memoized object client.
//!
//! Log delivery must never take down the process producing the logs, so
//! none of the operations here return errors. Backend failures end up as a
//! log line plus a safe default (`false`, `None`, or a skipped upload).

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::OnceCell;
use tracing::error;

use crate::{
    RemoteLogConfig,
    traits::{ClientError, ClientFactory, ObjectClient},
};

/// Task log store backed by object storage.
pub struct RemoteLogStore<F>
where
    F: ClientFactory,
{
    local_base: PathBuf,
    remote_base: String,
    filename_template: String,
    conn_id: String,
    encrypt: bool,
    factory: F,
    /// `Some` holds the live client, `None` a cached construction failure.
    client: OnceCell<Option<Arc<dyn ObjectClient>>>,
}

impl<F> RemoteLogStore<F>
where
    F: ClientFactory,
{
    /// Create a store using the default (empty) connection id.
    #[must_use]
    pub fn new(
        local_base: impl Into<PathBuf>,
        remote_base: impl Into<String>,
        filename_template: impl Into<String>,
        factory: F,
    ) -> Self {
        Self {
            local_base: local_base.into(),
            remote_base: remote_base.into(),
            filename_template: filename_template.into(),
            conn_id: String::new(),
            encrypt: false,
            factory,
            client: OnceCell::new(),
        }
    }

    /// Create a store from a handler configuration.
    #[must_use]
    pub fn from_config(config: &RemoteLogConfig, factory: F) -> Self {
        Self {
            local_base: config.local_base_log_folder.clone(),
            remote_base: config.remote_base_log_folder.clone(),
            filename_template: config.log_filename_template.clone(),
            conn_id: config.remote_log_conn_id.clone(),
            encrypt: config.encrypt_logs,
            factory,
            client: OnceCell::new(),
        }
    }

    /// Set the connection id. Only meaningful before the first client access.
    #[must_use]
    pub fn with_conn_id(mut self, conn_id: impl Into<String>) -> Self {
        self.conn_id = conn_id.into();
        self
    }

    #[must_use]
    pub fn local_base(&self) -> &Path {
        &self.local_base
    }

    #[must_use]
    pub fn remote_base(&self) -> &str {
        &self.remote_base
    }

    #[must_use]
    pub fn filename_template(&self) -> &str {
        &self.filename_template
    }

    #[must_use]
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Get the storage client, building it on first access.
    ///
    /// The outcome of the first attempt is kept for the lifetime of the
    /// store: a failed construction is logged once and never retried.
    pub async fn hook(&self) -> Option<Arc<dyn ObjectClient>> {
        self.client
            .get_or_init(|| async {
                match self.factory.create(&self.conn_id).await {
                    Ok(client) => Some(client),
                    Err(e) => {
                        error!(
                            error = %e,
                            "Could not create an S3Hook with connection id \"{}\". Please make sure that airflow[s3] is installed and the S3 connection exists.",
                            self.conn_id
                        );
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Check whether a log object exists at `remote_location`.
    ///
    /// Missing client and backend errors both count as "does not exist".
    pub async fn exists(&self, remote_location: &str) -> bool {
        let Some(client) = self.hook().await else {
            return false;
        };
        matches!(client.object_exists(remote_location).await, Ok(true))
    }

    /// Read the log at `remote_location`.
    ///
    /// Returns `None` when there is no object or no client. On a backend
    /// error, returns `None`, or with `return_error` set, logs and returns
    /// the error message in place of the content.
    pub async fn read(&self, remote_location: &str, return_error: bool) -> Option<String> {
        match self.fetch(remote_location).await {
            Ok(content) => content,
            Err(e) if return_error => {
                let msg = format!("Could not read logs from {remote_location}");
                error!(error = %e, "{msg}");
                Some(msg)
            }
            Err(_) => None,
        }
    }

    /// Append `log` to the object at `remote_location`.
    pub async fn write(&self, log: &str, remote_location: &str) {
        self.write_with(log, remote_location, true).await;
    }

    /// Upload `log` to `remote_location`, appending to existing content when
    /// `append` is set and replacing it otherwise.
    pub async fn write_with(&self, log: &str, remote_location: &str, append: bool) {
        let content = if append {
            let old = self.read(remote_location, false).await.unwrap_or_default();
            if old.is_empty() {
                log.to_string()
            } else {
                format!("{old}\n{log}")
            }
        } else {
            log.to_string()
        };

        let result = match self.hook().await {
            Some(client) => {
                client
                    .load_string(&content, remote_location, true, self.encrypt)
                    .await
            }
            None => Err(ClientError::Backend("no storage client available".to_string())),
        };

        if let Err(e) = result {
            error!(error = %e, "Could not write logs to {}", remote_location);
        }
    }

    async fn fetch(&self, remote_location: &str) -> Result<Option<String>, ClientError> {
        let Some(client) = self.hook().await else {
            return Ok(None);
        };
        client
            .get_object(remote_location)
            .await?
            .map(|object| object.decode())
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::traits::StoredObject;

    const REMOTE_LOG_LOCATION: &str = "remote/log/location";

    enum GetBehavior {
        Content(&'static [u8]),
        Missing,
        Fail,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct LoadCall {
        content: String,
        key: String,
        replace: bool,
        encrypt: bool,
    }

    struct MockClient {
        get: GetBehavior,
        fail_load: bool,
        loads: Mutex<Vec<LoadCall>>,
    }

    impl MockClient {
        fn new(get: GetBehavior) -> Arc<Self> {
            Arc::new(Self {
                get,
                fail_load: false,
                loads: Mutex::new(Vec::new()),
            })
        }

        fn failing_load(get: GetBehavior) -> Arc<Self> {
            Arc::new(Self {
                get,
                fail_load: true,
                loads: Mutex::new(Vec::new()),
            })
        }

        fn loads(&self) -> Vec<LoadCall> {
            self.loads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectClient for MockClient {
        async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, ClientError> {
            match self.get {
                GetBehavior::Content(body) => Ok(Some(StoredObject::new(key, body))),
                GetBehavior::Missing => Ok(None),
                GetBehavior::Fail => Err(ClientError::Backend("error".to_string())),
            }
        }

        async fn load_string(
            &self,
            content: &str,
            key: &str,
            replace: bool,
            encrypt: bool,
        ) -> Result<(), ClientError> {
            self.loads.lock().unwrap().push(LoadCall {
                content: content.to_string(),
                key: key.to_string(),
                replace,
                encrypt,
            });
            if self.fail_load {
                return Err(ClientError::Backend("error".to_string()));
            }
            Ok(())
        }
    }

    struct MockFactory {
        client: Option<Arc<MockClient>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockFactory {
        fn with_client(client: Arc<MockClient>) -> Arc<Self> {
            Arc::new(Self {
                client: Some(client),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                client: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClientFactory for MockFactory {
        async fn create(&self, conn_id: &str) -> Result<Arc<dyn ObjectClient>, ClientError> {
            self.calls.lock().unwrap().push(conn_id.to_string());
            match &self.client {
                Some(client) => Ok(Arc::clone(client) as Arc<dyn ObjectClient>),
                None => Err(ClientError::Backend("Failed to connect".to_string())),
            }
        }
    }

    fn store(factory: &Arc<MockFactory>) -> RemoteLogStore<Arc<MockFactory>> {
        RemoteLogStore::new("local/log/location", "s3/log/location", "", Arc::clone(factory))
    }

    fn content_store() -> (RemoteLogStore<Arc<MockFactory>>, Arc<MockClient>) {
        let client = MockClient::new(GetBehavior::Content(b"content"));
        let factory = MockFactory::with_client(Arc::clone(&client));
        (store(&factory), client)
    }

    #[tokio::test]
    async fn test_init() {
        let factory = MockFactory::with_client(MockClient::new(GetBehavior::Missing));
        let store = store(&factory);
        assert!(store.hook().await.is_some());
        assert_eq!(factory.calls(), vec![String::new()]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_init_raises() {
        let factory = MockFactory::failing();
        let store = store(&factory);
        assert!(store.hook().await.is_none());
        assert!(logs_contain(
            "Could not create an S3Hook with connection id \"\". Please make sure that airflow[s3] is installed and the S3 connection exists."
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_init_raises_names_connection() {
        let factory = MockFactory::failing();
        let store = store(&factory).with_conn_id("aws_logs");
        assert!(!store.exists(REMOTE_LOG_LOCATION).await);
        assert!(logs_contain("connection id \"aws_logs\""));
        assert_eq!(factory.calls(), vec!["aws_logs".to_string()]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_hook_is_cached() {
        let factory = MockFactory::failing();
        let store = store(&factory);

        assert!(!store.exists(REMOTE_LOG_LOCATION).await);
        assert_eq!(store.read(REMOTE_LOG_LOCATION, false).await, None);
        assert!(store.hook().await.is_none());

        assert_eq!(factory.calls().len(), 1);
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("Could not create an S3Hook"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one hook error, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_hook_is_memoized() {
        let client = MockClient::new(GetBehavior::Content(b"content"));
        let factory = MockFactory::with_client(Arc::clone(&client));
        let store = store(&factory);

        assert!(store.exists(REMOTE_LOG_LOCATION).await);
        assert_eq!(store.read(REMOTE_LOG_LOCATION, false).await.as_deref(), Some("content"));
        store.write("text", REMOTE_LOG_LOCATION).await;

        assert_eq!(factory.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_log_exists() {
        let (store, _) = content_store();
        assert!(store.exists(REMOTE_LOG_LOCATION).await);
    }

    #[tokio::test]
    async fn test_log_exists_none() {
        let factory = MockFactory::with_client(MockClient::new(GetBehavior::Missing));
        assert!(!store(&factory).exists(REMOTE_LOG_LOCATION).await);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_log_exists_raises() {
        let factory = MockFactory::with_client(MockClient::new(GetBehavior::Fail));
        assert!(!store(&factory).exists(REMOTE_LOG_LOCATION).await);
        assert!(!logs_contain("Could not"));
    }

    #[tokio::test]
    async fn test_log_exists_no_hook() {
        let factory = MockFactory::failing();
        assert!(!store(&factory).exists(REMOTE_LOG_LOCATION).await);
    }

    #[tokio::test]
    async fn test_read() {
        let (store, _) = content_store();
        assert_eq!(
            store.read(REMOTE_LOG_LOCATION, false).await.as_deref(),
            Some("content")
        );
    }

    #[tokio::test]
    async fn test_read_key_empty() {
        let factory = MockFactory::with_client(MockClient::new(GetBehavior::Missing));
        assert_eq!(store(&factory).read(REMOTE_LOG_LOCATION, false).await, None);
    }

    #[tokio::test]
    async fn test_read_no_hook() {
        let factory = MockFactory::failing();
        assert_eq!(store(&factory).read(REMOTE_LOG_LOCATION, true).await, None);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_read_raises() {
        let factory = MockFactory::with_client(MockClient::new(GetBehavior::Fail));
        assert_eq!(store(&factory).read(REMOTE_LOG_LOCATION, false).await, None);
        assert!(!logs_contain("Could not read logs"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_read_raises_return_error() {
        let factory = MockFactory::with_client(MockClient::new(GetBehavior::Fail));
        let result = store(&factory).read(REMOTE_LOG_LOCATION, true).await;

        let msg = format!("Could not read logs from {REMOTE_LOG_LOCATION}");
        assert_eq!(result.as_deref(), Some(msg.as_str()));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains(&msg)).count() {
                1 => Ok(()),
                n => Err(format!("expected one read error, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_read_invalid_utf8_return_error() {
        let factory =
            MockFactory::with_client(MockClient::new(GetBehavior::Content(&[0xff, 0xfe])));
        let store = store(&factory);
        assert_eq!(store.read(REMOTE_LOG_LOCATION, false).await, None);
        assert_eq!(
            store.read(REMOTE_LOG_LOCATION, true).await.as_deref(),
            Some("Could not read logs from remote/log/location")
        );
    }

    #[tokio::test]
    async fn test_write() {
        let (store, client) = content_store();
        store.write("text", REMOTE_LOG_LOCATION).await;
        assert_eq!(
            client.loads(),
            vec![LoadCall {
                content: "content\ntext".to_string(),
                key: REMOTE_LOG_LOCATION.to_string(),
                replace: true,
                encrypt: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_write_to_missing_object() {
        let client = MockClient::new(GetBehavior::Missing);
        let factory = MockFactory::with_client(Arc::clone(&client));
        store(&factory).write("text", REMOTE_LOG_LOCATION).await;
        assert_eq!(client.loads()[0].content, "text");
    }

    #[tokio::test]
    async fn test_write_after_read_failure_uploads_text() {
        let client = MockClient::new(GetBehavior::Fail);
        let factory = MockFactory::with_client(Arc::clone(&client));
        store(&factory).write("text", REMOTE_LOG_LOCATION).await;
        assert_eq!(client.loads()[0].content, "text");
    }

    #[tokio::test]
    async fn test_write_without_append() {
        let (store, client) = content_store();
        store.write_with("text", REMOTE_LOG_LOCATION, false).await;
        assert_eq!(client.loads()[0].content, "text");
    }

    #[tokio::test]
    async fn test_write_encrypt_from_config() {
        let client = MockClient::new(GetBehavior::Missing);
        let factory = MockFactory::with_client(Arc::clone(&client));
        let config = RemoteLogConfig {
            encrypt_logs: true,
            ..RemoteLogConfig::new("local", "s3://bucket/logs")
        };
        let store = RemoteLogStore::from_config(&config, factory);
        store.write("text", REMOTE_LOG_LOCATION).await;

        let load = &client.loads()[0];
        assert!(load.replace);
        assert!(load.encrypt);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_write_raises() {
        let factory = MockFactory::with_client(MockClient::failing_load(GetBehavior::Missing));
        store(&factory).write("text", REMOTE_LOG_LOCATION).await;
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("Could not write logs to remote/log/location"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one write error, got {n}")),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_write_no_hook() {
        let factory = MockFactory::failing();
        store(&factory).write("text", REMOTE_LOG_LOCATION).await;
        assert!(logs_contain("Could not write logs to remote/log/location"));
    }
}
