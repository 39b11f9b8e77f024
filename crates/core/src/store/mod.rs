//! Persisted handle store.
//!
//! The store maps a service name to the handle of the process or container
//! the supervisor started for it. Records outlive the supervisor process, so
//! a later `stop` can find what an earlier `start` launched.
//!
//! A record's presence is the only thing that makes a service "ours": the
//! supervisor never touches a service it holds no record for.

pub mod file;

pub use file::FileHandleStore;

use ds_protocol::ServiceHandle;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing handle records.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The service name cannot be used as a record key.
    #[error("Invalid service name '{0}'")]
    InvalidName(String),

    /// A record could not be read, written or removed.
    #[error("Failed to access handle record {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A record exists but does not describe a handle for its service.
    #[error("Malformed handle record {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// A handle could not be encoded.
    #[error("Failed to encode handle for {name}: {source}")]
    Encode {
        name: String,
        source: serde_json::Error,
    },

    /// The record directory could not be listed.
    #[error("Failed to traverse handle directory {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

impl StoreError {
    /// Whether this error means the record itself is unusable.
    ///
    /// Callers discard such records and treat the service as not running.
    pub fn is_malformed(&self) -> bool {
        matches!(self, StoreError::Malformed { .. })
    }
}

/// Type alias for Result with StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store of service handles, keyed by service name.
///
/// Implementations must keep at most one record per name and must persist
/// records beyond the lifetime of the current process.
pub trait HandleStore: Send + Sync {
    /// Look up the handle recorded for `name`.
    fn get(&self, name: &str) -> StoreResult<Option<ServiceHandle>>;

    /// Record `handle`, replacing any previous record for the same name.
    fn put(&self, handle: &ServiceHandle) -> StoreResult<()>;

    /// Remove the record for `name`. Removing a missing record succeeds.
    fn delete(&self, name: &str) -> StoreResult<()>;

    /// All readable records. Malformed records are skipped.
    fn list(&self) -> StoreResult<Vec<ServiceHandle>>;
}
