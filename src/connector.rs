//! Collaborator boundaries injected into the registry.
//!
//! The registry never speaks a wire protocol itself: fetching tables from
//! the accounting database, resolving user names to numeric ids and
//! observing association removals all happen behind these traits, supplied
//! by the host process at construction time.

#[cfg(test)]
use mockall::automock;

use crate::model::Association;
use crate::model::Qos;
use crate::model::User;
use crate::model::Wckey;
use crate::Result;

/// Filter handed to every full-table fetch.
#[derive(Debug, Default, Clone)]
pub struct AcctQuery {
    /// Restrict the fetch to one cluster; None fetches every scope
    pub cluster: Option<String>,
}

/// Client for the external accounting database.
///
/// An `Err` from any fetch is treated identically to an unreachable
/// database; the registry falls back to its last-known-good or empty cache
/// and never retries on its own.
#[cfg_attr(test, automock)]
pub trait AcctConnector: Send + Sync {
    fn get_associations(
        &self,
        uid: u32,
        query: &AcctQuery,
    ) -> Result<Vec<Association>>;

    fn get_qos(
        &self,
        uid: u32,
        query: &AcctQuery,
    ) -> Result<Vec<Qos>>;

    fn get_users(
        &self,
        uid: u32,
        query: &AcctQuery,
    ) -> Result<Vec<User>>;

    fn get_wckeys(
        &self,
        uid: u32,
        query: &AcctQuery,
    ) -> Result<Vec<Wckey>>;
}

/// Maps user names to numeric identifiers.
///
/// The system user database belongs to the host process; records whose
/// names cannot be resolved stay "unknown" and are re-resolved on demand.
pub trait UidResolver: Send + Sync {
    fn uid_for(
        &self,
        user_name: &str,
    ) -> Option<u32>;
}

/// Observer invoked synchronously, under the association lock, immediately
/// before a "remove" delta detaches an association from the cache.
pub trait RemovedAssocNotifier: Send + Sync {
    fn notify(
        &self,
        assoc: &Association,
    );
}
