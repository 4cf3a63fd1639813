//! QOS records: named policy bundles with their own priority, ceilings and
//! enforcement usage sub-records.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::ResourceLimits;
use super::UsedResources;

/// Per-account / per-user usage tracked inside one QOS for enforcement
/// reporting.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosUsageRecord {
    pub used_jobs: u32,
    pub used_submit_jobs: u32,
    pub used: UsedResources,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qos {
    pub id: u32,
    pub name: String,
    /// Raw scheduling priority
    pub priority: u32,
    /// Group-wide ceilings
    pub grp: ResourceLimits,
    /// Ceilings applied per user inside this QOS
    pub max_per_user: ResourceLimits,
    /// Ceilings applied per account inside this QOS
    pub max_per_account: ResourceLimits,
    /// Names of QOS this one may preempt
    pub preempt: Vec<String>,
    /// Usage keyed by account name
    pub usage_by_account: HashMap<String, QosUsageRecord>,
    /// Usage keyed by resolved user id
    pub usage_by_user: HashMap<u32, QosUsageRecord>,

    /// Raw priority divided by the highest raw priority in the table;
    /// recomputed whenever that maximum changes
    #[serde(skip)]
    pub norm_priority: f64,
}

impl Qos {
    /// Copy every cached field the caller did not supply.
    pub(crate) fn fill_missing_from(
        &mut self,
        cached: &Qos,
    ) {
        if self.id == 0 {
            self.id = cached.id;
        }
        if self.name.is_empty() {
            self.name = cached.name.clone();
        }
        if self.priority == 0 {
            self.priority = cached.priority;
        }
        self.norm_priority = cached.norm_priority;
        self.grp.fill_missing_from(&cached.grp);
        self.max_per_user.fill_missing_from(&cached.max_per_user);
        self.max_per_account.fill_missing_from(&cached.max_per_account);
        if self.preempt.is_empty() {
            self.preempt = cached.preempt.clone();
        }
    }

    pub(crate) fn clear_used_info(&mut self) {
        for rec in self.usage_by_account.values_mut() {
            rec.used_jobs = 0;
            rec.used_submit_jobs = 0;
            rec.used.clear();
        }
        for rec in self.usage_by_user.values_mut() {
            rec.used_jobs = 0;
            rec.used_submit_jobs = 0;
            rec.used.clear();
        }
    }
}

/// Recompute every record's normalized priority against the table maximum.
/// A table whose maximum is zero normalizes to all zeros.
pub(crate) fn normalize_priorities(list: &mut [Qos]) {
    let max = list.iter().map(|q| q.priority).max().unwrap_or(0);
    for qos in list.iter_mut() {
        qos.norm_priority = if max == 0 {
            0.0
        } else {
            f64::from(qos.priority) / f64::from(max)
        };
    }
}
