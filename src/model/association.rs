//! The association record: one (cluster, account, [user], [partition])
//! entitlement node of the accounting tree.

use serde::Deserialize;
use serde::Serialize;

use super::ResourceLimits;
use super::UsedResources;
use crate::constants::ROOT_PARENT_ID;

/// Usage counters accumulated against one association.
///
/// `usage_raw` is the long-lived fair-share accumulator: an ordinary clear
/// leaves it untouched, only the explicit raw reset (decay windows) zeroes
/// it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssocUsage {
    pub used_jobs: u32,
    pub used_submit_jobs: u32,
    pub usage_raw: f64,
    pub grp_used: UsedResources,
}

/// One node of the accounting tree.
///
/// Tree linkage is stored as id references resolved through the table index
/// (`parent_ref`, `children`), never as pointers into the table, so a cache
/// swap can never leave a stale reference behind. All derived fields are
/// rebuilt by the linkage resolver and skipped during serialization.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Unique id; 0 means unassigned/new
    pub id: u32,
    /// Parent id as delivered by the accounting database; 0 marks the root
    pub parent_id: u32,
    /// Nested-set left index; ascending order visits parents before children
    pub lft: u32,
    pub cluster: String,
    pub account: String,
    /// User name; account-level records carry none
    pub user: Option<String>,
    pub partition: Option<String>,
    /// Resolved numeric user identifier; None when unknown
    pub uid: Option<u32>,
    /// Configured share weight
    pub shares_raw: u32,
    /// Group-wide ceilings
    pub grp: ResourceLimits,
    /// Per-job ceilings
    pub max_per_job: ResourceLimits,
    /// Ordered allowed-QOS tokens (stringified QOS ids)
    pub qos_list: Vec<String>,
    pub usage: AssocUsage,

    /// Resolved parent id reference; None for roots and broken links
    #[serde(skip)]
    pub parent_ref: Option<u32>,
    /// Child id references; populated only on fair-share builds
    #[serde(skip)]
    pub children: Vec<u32>,
    /// Sum of `shares_raw` across this node and its siblings
    #[serde(skip)]
    pub level_shares: u64,
    /// Product of raw/level ratios walking up to the root; root is 1.0
    #[serde(skip)]
    pub shares_norm: f64,
}

impl Association {
    /// User-level records are the leaves usage is charged against.
    pub fn is_user_record(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }

    /// Composite natural-key match used when a record carries no id yet:
    /// resolved uid + account + partition, plus cluster when the cache is
    /// not already scoped to a single cluster.
    pub(crate) fn matches_composite(
        &self,
        uid: Option<u32>,
        account: Option<&str>,
        partition: Option<&str>,
        cluster: Option<&str>,
    ) -> bool {
        if self.uid != uid {
            return false;
        }
        if let Some(acct) = account {
            if self.account != acct {
                return false;
            }
        }
        if self.partition.as_deref() != partition {
            return false;
        }
        if let Some(cl) = cluster {
            if self.cluster != cl {
                return false;
            }
        }
        true
    }

    /// Wipe every derived linkage field ahead of a resolver pass.
    pub(crate) fn reset_linkage(&mut self) {
        self.parent_ref = None;
        self.children.clear();
        self.level_shares = 0;
        self.shares_norm = 0.0;
    }

    /// Copy every limit, share and linkage value the caller did not supply.
    /// Identity fields the caller already set are left as given.
    pub(crate) fn fill_missing_from(
        &mut self,
        cached: &Association,
    ) {
        if self.id == 0 {
            self.id = cached.id;
        }
        self.parent_id = cached.parent_id;
        self.parent_ref = cached.parent_ref;
        self.lft = cached.lft;
        if self.cluster.is_empty() {
            self.cluster = cached.cluster.clone();
        }
        if self.account.is_empty() {
            self.account = cached.account.clone();
        }
        if self.user.is_none() {
            self.user = cached.user.clone();
        }
        if self.partition.is_none() {
            self.partition = cached.partition.clone();
        }
        if self.uid.is_none() {
            self.uid = cached.uid;
        }
        if self.shares_raw == 0 {
            self.shares_raw = cached.shares_raw;
        }
        self.level_shares = cached.level_shares;
        self.shares_norm = cached.shares_norm;
        self.grp.fill_missing_from(&cached.grp);
        self.max_per_job.fill_missing_from(&cached.max_per_job);
        if self.qos_list.is_empty() {
            self.qos_list = cached.qos_list.clone();
        }
    }
}

