//! Record model for the four accounting caches.
//!
//! Plain serde-derived data: associations (the entitlement tree), QOS
//! policy bundles, users and workload charge keys, plus the update-object
//! envelope the accounting database sends for incremental changes.
//! Derived linkage fields (parent references, children lists, share
//! normalization products) are never serialized; they are rebuilt by the
//! linkage resolver after every full install.

mod association;
mod limits;
mod qos;
mod update;
mod user;
mod wckey;

pub use association::*;
pub use limits::*;
pub use qos::*;
pub use update::*;
pub use user::*;
pub use wckey::*;


use std::fmt;

/// The four cache tables held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTable {
    Associations,
    Qos,
    Users,
    Wckeys,
}

impl fmt::Display for CacheTable {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            CacheTable::Associations => "association",
            CacheTable::Qos => "qos",
            CacheTable::Users => "user",
            CacheTable::Wckeys => "wckey",
        };
        write!(f, "{}", name)
    }
}
