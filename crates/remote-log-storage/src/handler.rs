//! Task log handler shipping local task logs to remote storage.

use std::{io::ErrorKind, path::PathBuf};

use remote_log_core::{
    ClientFactory, RemoteLogConfig, RemoteLogStore, TaskInstanceKey, task::join_location,
};
use tracing::{debug, warn};

/// Handler for one task's log stream.
///
/// The task writes its log locally. On `close` the local file is appended to
/// the matching remote object, and `read` serves the remote copy when present.
pub struct TaskLogHandler<F>
where
    F: ClientFactory,
{
    store: RemoteLogStore<F>,
    log_relative_path: Option<String>,
    upload_on_close: bool,
    closed: bool,
}

impl<F> TaskLogHandler<F>
where
    F: ClientFactory,
{
    /// Create a handler around a store.
    #[must_use]
    pub const fn new(store: RemoteLogStore<F>) -> Self {
        Self {
            store,
            log_relative_path: None,
            upload_on_close: true,
            closed: false,
        }
    }

    /// Create a handler from configuration.
    #[must_use]
    pub fn from_config(config: &RemoteLogConfig, factory: F) -> Self {
        Self::new(RemoteLogStore::from_config(config, factory))
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &RemoteLogStore<F> {
        &self.store
    }

    /// Relative path of the current task try's log, once a context is set.
    #[must_use]
    pub fn log_relative_path(&self) -> Option<&str> {
        self.log_relative_path.as_deref()
    }

    /// Bind the handler to a task try.
    ///
    /// Raw runs log straight to their parent process and are never uploaded.
    pub fn set_context(&mut self, ti: &TaskInstanceKey, raw: bool) {
        self.log_relative_path =
            Some(ti.render_filename(self.store.filename_template(), ti.try_number));
        self.upload_on_close = !raw;
    }

    /// Upload the local log file, if any. Calling `close` again is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }

        if let (true, Some(relative)) =
            (self.upload_on_close, self.log_relative_path.as_deref())
        {
            let local = self.local_path(relative);
            let remote = join_location(self.store.remote_base(), relative);

            match tokio::fs::read_to_string(&local).await {
                Ok(log) => self.store.write(&log, &remote).await,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %local.display(), "No local log to upload");
                }
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "Could not read local log for upload"
                    );
                }
            }
        }

        self.closed = true;
    }

    /// Read the log of `ti`'s given try, preferring the remote copy.
    pub async fn read(&self, ti: &TaskInstanceKey, try_number: u32) -> String {
        let relative = ti.render_filename(self.store.filename_template(), try_number);
        let remote = join_location(self.store.remote_base(), &relative);

        if self.store.exists(&remote).await {
            let remote_log = self.store.read(&remote, true).await.unwrap_or_default();
            return format!("*** Reading remote log from {remote}.\n{remote_log}\n");
        }

        self.read_local(&relative).await
    }

    async fn read_local(&self, relative: &str) -> String {
        let path = self.local_path(relative);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => format!("*** Reading local log.\n{content}"),
            Err(e) => format!("*** Failed to load local log file: {}. {e}\n", path.display()),
        }
    }

    fn local_path(&self, relative: &str) -> PathBuf {
        self.store.local_base().join(relative)
    }
}
