//! Usage accumulation and roll-up.
//!
//! Usage is charged against user-level (leaf) associations; every account
//! on a leaf's ancestor path accumulates the usage of all its descendant
//! leaves. Ordinary clears leave the long-lived `usage_raw` fair-share
//! accumulator alone, only the explicit raw reset (decay windows) touches
//! it.


use tracing::error;

use crate::model::AssocUsage;
use crate::model::Association;
use crate::tree::build_index;

/// Add every counter of `delta` into `target`.
pub(crate) fn add_usage(
    target: &mut AssocUsage,
    delta: &AssocUsage,
) {
    target.used_jobs += delta.used_jobs;
    target.used_submit_jobs += delta.used_submit_jobs;
    target.usage_raw += delta.usage_raw;
    target.grp_used.add(&delta.grp_used);
}

/// Zero every counter except the persistent raw-usage accumulator.
pub(crate) fn clear_usage(target: &mut AssocUsage) {
    target.used_jobs = 0;
    target.used_submit_jobs = 0;
    target.grp_used.clear();
}

/// The explicit raw reset, invoked separately for fair-share decay windows.
pub(crate) fn reset_raw_usage(target: &mut AssocUsage) {
    target.usage_raw = 0.0;
}

/// Walk from every leaf (user-level) association up through its ancestors,
/// adding the leaf's own counters into each one.
pub(crate) fn propagate_leaf_usage(list: &mut [Association]) {
    let index = build_index(list);

    for i in 0..list.len() {
        if !list[i].is_user_record() {
            continue;
        }
        let leaf_usage = list[i].usage.clone();
        let mut cur = list[i].parent_ref;
        let mut hops = list.len();
        while let Some(parent_id) = cur {
            if hops == 0 {
                error!("association {} sits on a parent cycle", list[i].id);
                break;
            }
            hops -= 1;
            let Some(&pos) = index.get(&parent_id) else {
                break;
            };
            add_usage(&mut list[pos].usage, &leaf_usage);
            cur = list[pos].parent_ref;
        }
    }
}

/// Rebuild every non-user association's usage from scratch by re-walking
/// every leaf's ancestor chain. Used after a structural merge changed
/// parentage: the old roll-up totals describe a tree that no longer exists.
pub(crate) fn reaggregate(list: &mut [Association]) {
    for assoc in list.iter_mut() {
        if !assoc.is_user_record() {
            assoc.usage = AssocUsage::default();
        }
    }
    propagate_leaf_usage(list);
}
