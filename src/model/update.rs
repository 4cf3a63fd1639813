//! Update-object envelopes: the typed deltas the accounting database sends
//! when tables change.
//!
//! Every modifiable field is an `Option` (or a `Limit`, whose `Unset`
//! variant is the same sentinel): a merge only overwrites cached fields the
//! incoming delta actually carries. Envelopes are consumed by value — an
//! applied object is gone from the batch, and an "add" transfers ownership
//! of the record into the cache.

use serde::Deserialize;
use serde::Serialize;

use super::AdminLevel;
use super::Association;
use super::Qos;
use super::ResourceLimits;
use super::User;
use super::Wckey;
use crate::constants::DEFAULT_RAW_SHARES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AssocDelta {
    /// 0 means "not yet assigned": match by the composite natural key
    pub id: u32,
    pub cluster: Option<String>,
    pub account: Option<String>,
    pub user: Option<String>,
    pub partition: Option<String>,
    pub parent_id: Option<u32>,
    pub lft: Option<u32>,
    pub shares_raw: Option<u32>,
    pub grp: ResourceLimits,
    pub max_per_job: ResourceLimits,
    /// QOS-list edit instructions in the `+`/`-`/`=` mini-language.
    /// `None` leaves the list alone; `Some` but empty makes the target
    /// inherit its parent's list.
    pub qos: Option<Vec<String>>,
}

impl AssocDelta {
    /// Build the cached record an "add" installs. Identity fields move in
    /// as carried; derived linkage stays blank until the next resolver pass.
    pub(crate) fn into_record(self) -> Association {
        Association {
            id: self.id,
            parent_id: self.parent_id.unwrap_or_default(),
            lft: self.lft.unwrap_or_default(),
            cluster: self.cluster.unwrap_or_default(),
            account: self.account.unwrap_or_default(),
            user: self.user,
            partition: self.partition,
            uid: None,
            shares_raw: self.shares_raw.unwrap_or(DEFAULT_RAW_SHARES),
            grp: self.grp,
            max_per_job: self.max_per_job,
            qos_list: self.qos.unwrap_or_default(),
            ..Association::default()
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QosDelta {
    pub id: u32,
    pub name: Option<String>,
    pub priority: Option<u32>,
    pub grp: ResourceLimits,
    pub max_per_user: ResourceLimits,
    pub max_per_account: ResourceLimits,
    pub preempt: Option<Vec<String>>,
}

impl QosDelta {
    pub(crate) fn into_record(self) -> Qos {
        Qos {
            id: self.id,
            name: self.name.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            grp: self.grp,
            max_per_user: self.max_per_user,
            max_per_account: self.max_per_account,
            preempt: self.preempt.unwrap_or_default(),
            ..Qos::default()
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UserDelta {
    /// The natural key; user names match case-insensitively
    pub name: String,
    pub default_account: Option<String>,
    pub default_wckey: Option<String>,
    pub admin_level: Option<AdminLevel>,
    pub coord_accounts: Option<Vec<String>>,
}

impl UserDelta {
    pub(crate) fn into_record(self) -> User {
        User {
            uid: None,
            name: self.name,
            default_account: self.default_account,
            default_wckey: self.default_wckey,
            admin_level: self.admin_level.unwrap_or_default(),
            coord_accounts: self.coord_accounts.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WckeyDelta {
    /// 0 means "not yet assigned": match by resolved uid + name [+ cluster]
    pub id: u32,
    pub name: Option<String>,
    pub user: Option<String>,
    pub cluster: Option<String>,
}

impl WckeyDelta {
    pub(crate) fn into_record(self) -> Wckey {
        Wckey {
            id: self.id,
            name: self.name.unwrap_or_default(),
            user: self.user.unwrap_or_default(),
            cluster: self.cluster.unwrap_or_default(),
            uid: None,
        }
    }
}

/// The ordered payload of one envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UpdateRecords {
    Assocs(Vec<AssocDelta>),
    Qos(Vec<QosDelta>),
    Users(Vec<UserDelta>),
    Wckeys(Vec<WckeyDelta>),
}

/// One add/modify/remove envelope as observed from the accounting database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateObject {
    pub op: UpdateOp,
    pub records: UpdateRecords,
}

impl UpdateObject {
    pub fn new(
        op: UpdateOp,
        records: UpdateRecords,
    ) -> Self {
        Self { op, records }
    }
}
