//! Association Registry Error Hierarchy
//!
//! Defines the error types for the accounting cache, categorized by the
//! failure classes callers have to react to: connectivity to the accounting
//! database, per-record data integrity, persisted snapshot format, caller
//! contract violations and file storage.

use std::path::PathBuf;

use crate::model::CacheTable;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Accounting database fetch failures and enforcement outcomes
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// Per-record problems discovered while linking or merging caches
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    /// Unsupported or corrupt persisted snapshot files
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Caller contract violations
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// File-level failures while persisting or recovering state
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The accounting database could not deliver a table.
///
/// A fetch that returns an error and a fetch that returns nothing are the
/// same condition here; recovery is a last-known-good cache (refresh) or an
/// empty cache (initial load), surfaced only when enforcement demands a
/// non-empty result.
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error("fetching the {table} table from the accounting database failed")]
    FetchFailed { table: CacheTable },

    #[error("the {table} table is empty but enforcement requires it")]
    EmptyRequired { table: CacheTable },
}

/// A single cached record is inconsistent.
///
/// These never abort the surrounding load or merge; individual records are
/// skipped with a log and only the aggregate outcome is reported.
#[derive(Debug, thiserror::Error)]
pub enum DataIntegrityError {
    #[error("association {id} names itself as its parent")]
    SelfParent { id: u32 },

    #[error("association {id} references parent {parent_id} which is not in the table")]
    MissingParent { id: u32, parent_id: u32 },

    #[error("association id {id} is not known to the cache")]
    UnknownAssociationId { id: u32 },

    #[error("no {table} record matches {key}")]
    TargetMissing { table: CacheTable, key: String },

    /// Aggregate outcome of a merge in which at least one modify/remove had
    /// no target; every other change in the batch was still applied.
    #[error("{missing} update object(s) targeted records that no longer exist")]
    PartialMerge { missing: usize },
}

/// The persisted snapshot cannot be read.
///
/// Fatal to that single load call; no partial cache is installed.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("state file version {found} outside supported range [{min}, {max}]")]
    UnsupportedVersion { found: u16, min: u16, max: u16 },

    #[error("unknown block type tag {tag} in state file")]
    UnknownBlockTag { tag: u16 },

    #[error("state file truncated while reading {section}")]
    Truncated { section: &'static str },
}

/// The caller violated an operation's contract.
///
/// Returned immediately, with no side effects.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("the {table} cache is disabled by the cache-level flags")]
    TableDisabled { table: CacheTable },

    #[error("refresh is only valid in disconnected-cache mode")]
    NotDisconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during snapshot dump/load
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// I/O failure carrying the path that produced it
    #[error("error occurred at path: {path:?}")]
    Path {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Serialization failures for persisted table blocks
    #[error(transparent)]
    Serialize(#[from] bincode::Error),
}

// ============== Conversion Implementations ============== //
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(StorageError::Io(e))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Storage(StorageError::Serialize(e))
    }
}
