//! Object client implementations.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "memory")]
pub use memory::{MemoryClientFactory, MemoryObjectClient};

#[cfg(feature = "s3")]
pub use s3::{S3ClientFactory, S3ConnectionConfig, S3ObjectClient};
