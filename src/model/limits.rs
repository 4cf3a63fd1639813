//! Resource ceilings and usage counters shared by associations and QOS
//! records.

use serde::Deserialize;
use serde::Serialize;

/// A single resource ceiling.
///
/// `Unset` is the wire sentinel for "not carried by this record": a merge
/// only overwrites a cached field when the incoming one is set, and a
/// fill-in only copies a cached field when the caller's one is unset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    #[default]
    Unset,
    Unlimited,
    Max(u64),
}

impl Limit {
    pub fn is_set(&self) -> bool {
        !matches!(self, Limit::Unset)
    }

    /// Overwrite with `incoming` when it carries a value.
    pub(crate) fn merge_from(
        &mut self,
        incoming: Limit,
    ) {
        if incoming.is_set() {
            *self = incoming;
        }
    }

    /// Copy `cached` in when this side carries nothing.
    pub(crate) fn fill_missing_from(
        &mut self,
        cached: Limit,
    ) {
        if !self.is_set() {
            *self = cached;
        }
    }
}

/// The fixed set of named ceilings carried by associations and QOS records:
/// job counts, submitted-job counts, wall time, cpus, cpu-minutes and nodes.
/// Used both as group-wide ("grp") and per-job ("max") ceilings.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub jobs: Limit,
    pub submit_jobs: Limit,
    pub wall: Limit,
    pub cpus: Limit,
    pub cpu_mins: Limit,
    pub nodes: Limit,
}

impl ResourceLimits {
    /// Overwrite every field the incoming side carries.
    pub(crate) fn merge_from(
        &mut self,
        incoming: &ResourceLimits,
    ) {
        self.jobs.merge_from(incoming.jobs);
        self.submit_jobs.merge_from(incoming.submit_jobs);
        self.wall.merge_from(incoming.wall);
        self.cpus.merge_from(incoming.cpus);
        self.cpu_mins.merge_from(incoming.cpu_mins);
        self.nodes.merge_from(incoming.nodes);
    }

    /// Copy every cached field the caller did not supply.
    pub(crate) fn fill_missing_from(
        &mut self,
        cached: &ResourceLimits,
    ) {
        self.jobs.fill_missing_from(cached.jobs);
        self.submit_jobs.fill_missing_from(cached.submit_jobs);
        self.wall.fill_missing_from(cached.wall);
        self.cpus.fill_missing_from(cached.cpus);
        self.cpu_mins.fill_missing_from(cached.cpu_mins);
        self.nodes.fill_missing_from(cached.nodes);
    }
}

/// Grouped "used" quantities accumulated against a record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedResources {
    pub cpus: u64,
    pub nodes: u64,
    pub cpu_mins: u64,
    pub wall: u64,
}

impl UsedResources {
    pub(crate) fn add(
        &mut self,
        delta: &UsedResources,
    ) {
        self.cpus += delta.cpus;
        self.nodes += delta.nodes;
        self.cpu_mins += delta.cpu_mins;
        self.wall += delta.wall;
    }

    pub(crate) fn clear(&mut self) {
        *self = UsedResources::default();
    }
}
