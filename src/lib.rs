//! In-process hierarchical accounting and entitlement cache for cluster job
//! schedulers.
//!
//! The [`AssociationRegistry`] caches four related tables fetched from an
//! external accounting database: associations (a tree of entitlement nodes),
//! QOS policy bundles, users and workload charge keys. It resolves the
//! tree's parent/child linkage, computes hierarchical fair-share weights,
//! rolls usage up the tree, merges incremental add/modify/remove deltas and
//! persists a versioned binary snapshot so a restart survives an
//! unreachable database.

mod config;
mod connector;
mod constants;
mod errors;
mod merge;
mod model;
mod query;
mod registry;
mod storage;
mod tree;
mod usage;

pub use config::*;
pub use connector::*;
pub use errors::*;
pub use merge::*;
pub use model::*;
pub use query::*;
pub use registry::*;
pub use storage::*;
pub use usage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
