//! Object storage clients and the task log handler.
//!
//! Provides:
//! - `TaskLogHandler` - Upload a task's local log on close and read it back
//! - Client implementations (memory, S3)

pub mod handler;
pub mod storage;

pub use handler::TaskLogHandler;
