//! The linkage resolver: one pass over a flat association list that
//! re-derives every parent reference, children list, level-share sum and
//! normalized share.
//!
//! Resolution never aborts an install. Individual bad records (self-parent,
//! parent id that does not exist) are skipped with a data-integrity log and
//! the pass produces a best-effort tree.

use std::collections::HashMap;

use tracing::error;
use tracing::warn;

use crate::connector::UidResolver;
use crate::errors::DataIntegrityError;
use crate::model::Association;

/// id -> position lookup built once per pass.
pub(crate) type AssocIndex = HashMap<u32, usize>;

pub(crate) fn build_index(list: &[Association]) -> AssocIndex {
    list.iter().enumerate().map(|(i, a)| (a.id, i)).collect()
}

/// Caller-owned memo for consecutive sibling records pointing at the same
/// parent. Reset at the start of every full pass.
#[derive(Debug, Default)]
pub(crate) struct ResolveCtx {
    /// Position of the most recently resolved parent
    last_parent: Option<usize>,
    /// Position of the most recently resolved account-level parent
    last_acct_parent: Option<usize>,
}

impl ResolveCtx {
    fn lookup(
        &self,
        list: &[Association],
        parent_id: u32,
    ) -> Option<usize> {
        if let Some(pos) = self.last_parent {
            if list[pos].id == parent_id {
                return Some(pos);
            }
        }
        if let Some(pos) = self.last_acct_parent {
            if list[pos].id == parent_id {
                return Some(pos);
            }
        }
        None
    }

    fn remember(
        &mut self,
        list: &[Association],
        pos: usize,
    ) {
        self.last_parent = Some(pos);
        if !list[pos].is_user_record() {
            self.last_acct_parent = Some(pos);
        }
    }
}

/// Resolve every record's parent reference and numeric user identifier.
///
/// Children lists are populated only when `track_fairshare` is on; callers
/// that also need level shares and normalized shares run
/// [`normalize_shares`] afterwards. A record naming itself as its parent is
/// demoted to an unlinked node with an error log rather than failing the
/// install.
pub(crate) fn resolve(
    list: &mut [Association],
    ctx: &mut ResolveCtx,
    uid_resolver: &dyn UidResolver,
    track_fairshare: bool,
) {
    for assoc in list.iter_mut() {
        assoc.reset_linkage();
    }
    *ctx = ResolveCtx::default();

    let index = build_index(list);

    for i in 0..list.len() {
        if let Some(name) = list[i].user.clone() {
            let uid = uid_resolver.uid_for(&name);
            if uid.is_none() {
                warn!(
                    "could not resolve a uid for user '{}' on association {}",
                    name, list[i].id
                );
            }
            list[i].uid = uid;
        } else {
            // An account-level record never carries a uid, whatever the
            // wire delivered; a stale one would satisfy id-less matching.
            list[i].uid = None;
        }

        if list[i].is_root() {
            continue;
        }

        let parent_id = list[i].parent_id;
        if parent_id == list[i].id {
            error!(
                "{}; treating it as unlinked",
                DataIntegrityError::SelfParent { id: list[i].id }
            );
            list[i].parent_ref = None;
            continue;
        }

        let parent_pos = ctx
            .lookup(list, parent_id)
            .or_else(|| index.get(&parent_id).copied());
        match parent_pos {
            Some(pos) => {
                list[i].parent_ref = Some(parent_id);
                if track_fairshare {
                    let child_id = list[i].id;
                    list[pos].children.push(child_id);
                }
                ctx.remember(list, pos);
            }
            None => {
                error!(
                    "{}",
                    DataIntegrityError::MissingParent {
                        id: list[i].id,
                        parent_id,
                    }
                );
                list[i].parent_ref = None;
            }
        }
    }
}

/// Compute level shares and normalized shares over a resolved tree.
///
/// Every child of a node gets `level_shares` = the sum of `shares_raw`
/// across all that node's children; `shares_norm` is then the product of
/// `shares_raw / level_shares` walking from the node up to the root, whose
/// own `shares_norm` is 1.0. Only meaningful after [`resolve`] ran with
/// fair-share tracking on.
pub(crate) fn normalize_shares(list: &mut [Association]) {
    let index = build_index(list);

    for i in 0..list.len() {
        if list[i].children.is_empty() {
            continue;
        }
        let level: u64 = list[i]
            .children
            .iter()
            .filter_map(|id| index.get(id))
            .map(|&pos| u64::from(list[pos].shares_raw))
            .sum();
        for child_id in list[i].children.clone() {
            if let Some(&pos) = index.get(&child_id) {
                list[pos].level_shares = level;
            }
        }
    }

    for i in 0..list.len() {
        if list[i].parent_ref.is_none() {
            // Roots (and unlinked records) hold the defined 1.0; keep
            // level_shares meaningful everywhere.
            list[i].shares_norm = 1.0;
            if list[i].level_shares == 0 {
                list[i].level_shares = u64::from(list[i].shares_raw);
            }
            continue;
        }

        let mut norm = 1.0_f64;
        let mut cur = i;
        // The hop bound caps the walk if the data sneaks a cycle past the
        // self-parent check.
        let mut hops = list.len();
        while let Some(parent_id) = list[cur].parent_ref {
            if hops == 0 {
                error!("association {} sits on a parent cycle", list[i].id);
                break;
            }
            hops -= 1;
            if list[cur].level_shares > 0 {
                norm *= f64::from(list[cur].shares_raw) / list[cur].level_shares as f64;
            }
            match index.get(&parent_id) {
                Some(&pos) => cur = pos,
                None => break,
            }
        }
        list[i].shares_norm = norm;
    }
}

/// Sort so parents come before children: ascending by the nested-set left
/// index, with the id as a stable tiebreaker for records that carry none.
pub(crate) fn sort_parents_first(list: &mut [Association]) {
    list.sort_by(|a, b| a.lft.cmp(&b.lft).then(a.id.cmp(&b.id)));
}
