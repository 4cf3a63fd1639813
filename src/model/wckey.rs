//! Workload charge keys: accounting labels independent of the account tree.

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wckey {
    /// Unique id; 0 means unassigned/new
    pub id: u32,
    pub name: String,
    pub user: String,
    pub cluster: String,
    /// Resolved numeric user identifier; None when unknown
    pub uid: Option<u32>,
}

impl Wckey {
    /// Composite natural-key match: resolved uid + name, plus cluster when
    /// the cache is not already scoped to a single cluster.
    pub(crate) fn matches_composite(
        &self,
        uid: Option<u32>,
        name: Option<&str>,
        cluster: Option<&str>,
    ) -> bool {
        if self.uid != uid {
            return false;
        }
        if let Some(n) = name {
            if self.name != n {
                return false;
            }
        }
        if let Some(cl) = cluster {
            if self.cluster != cl {
                return false;
            }
        }
        true
    }

    /// Copy every cached field the caller did not supply.
    pub(crate) fn fill_missing_from(
        &mut self,
        cached: &Wckey,
    ) {
        if self.id == 0 {
            self.id = cached.id;
        }
        if self.name.is_empty() {
            self.name = cached.name.clone();
        }
        if self.user.is_empty() {
            self.user = cached.user.clone();
        }
        if self.cluster.is_empty() {
            self.cluster = cached.cluster.clone();
        }
        if self.uid.is_none() {
            self.uid = cached.uid;
        }
    }
}
