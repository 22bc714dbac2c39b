//! Core abstractions for persisting task logs to object storage.
//!
//! This crate provides the fundamental building blocks:
//! - `RemoteLogStore` - Existence check, read and append-write against a lazily created client
//! - `RemoteLogConfig` - Serde-backed handler configuration
//! - `TaskInstanceKey` - Identifies one task try and renders its log path
//! - Object client and client factory traits

pub mod config;
pub mod store;
pub mod task;
pub mod traits;

pub use config::RemoteLogConfig;
pub use store::RemoteLogStore;
pub use task::TaskInstanceKey;
pub use traits::{ClientError, ClientFactory, ObjectClient, StoredObject};
