//! Capstan Storage - Storage abstraction and redb backend
//!
//! This crate provides:
//! - KVStore trait for storage abstraction
//! - redb-based implementation (file or in-memory)
//! - Key encoding and the cluster-name index
//! - The RecordStore used by the scheduler for clusters and deployments

pub mod encoding;
pub mod error;
pub mod kv;
pub mod records;
pub mod redb_backend;

// Re-export commonly used types
pub use encoding::{IndexKey, KeyEncoder};
pub use error::{Result, StorageError};
pub use kv::{KVStore, Transaction};
pub use records::{KvRecordStore, RecordStore};
pub use redb_backend::RedbBackend;
