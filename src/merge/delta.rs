//! The delta merger: applies one add/modify/remove update envelope to a
//! cache table under that table's lock.
//!
//! Objects are consumed by value in arrival order. A modify or remove that
//! targets a record that no longer exists is absorbed: the rest of the
//! batch is still applied and the merge reports a soft
//! [`DataIntegrityError::PartialMerge`] at the end. There is no partial
//! rollback.

use tracing::debug;
use tracing::warn;

use super::apply_qos_instrs;
use super::parse_qos_instrs;
use crate::errors::DataIntegrityError;
use crate::model::AssocDelta;
use crate::model::CacheTable;
use crate::model::QosDelta;
use crate::model::UpdateObject;
use crate::model::UpdateOp;
use crate::model::UpdateRecords;
use crate::model::UserDelta;
use crate::model::WckeyDelta;
use crate::registry::AssociationRegistry;
use crate::tree;
use crate::Result;

impl AssociationRegistry {
    /// Apply one update envelope to the matching cache table.
    pub fn apply_update(
        &self,
        update: UpdateObject,
    ) -> Result<()> {
        match update.records {
            UpdateRecords::Assocs(objs) => self.apply_assoc_updates(update.op, objs),
            UpdateRecords::Qos(objs) => self.apply_qos_updates(update.op, objs),
            UpdateRecords::Users(objs) => self.apply_user_updates(update.op, objs),
            UpdateRecords::Wckeys(objs) => self.apply_wckey_updates(update.op, objs),
        }
    }

    /// Objects carrying a cluster name are discarded when the cache is
    /// scoped to a different cluster.
    fn out_of_scope(
        &self,
        cluster: Option<&str>,
    ) -> bool {
        if self.settings.cluster_name.is_empty() {
            return false;
        }
        matches!(cluster, Some(cl) if cl != self.settings.cluster_name)
    }

    fn apply_assoc_updates(
        &self,
        op: UpdateOp,
        objs: Vec<AssocDelta>,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Associations)?;
        let cluster_scoped = !self.settings.cluster_name.is_empty();

        let mut guard = self.assocs.lock();
        let list = guard.get_or_insert_with(Vec::new);

        let mut missing = 0usize;
        let mut relink = false;

        for obj in objs {
            if self.out_of_scope(obj.cluster.as_deref()) {
                debug!("discarding association delta for cluster {:?}", obj.cluster);
                continue;
            }

            let pos = if obj.id != 0 {
                list.iter().position(|a| a.id == obj.id)
            } else {
                let uid = obj
                    .user
                    .as_deref()
                    .and_then(|name| self.uid_resolver.uid_for(name));
                let cluster_key = if cluster_scoped {
                    None
                } else {
                    obj.cluster.as_deref()
                };
                list.iter().position(|a| {
                    a.matches_composite(
                        uid,
                        obj.account.as_deref(),
                        obj.partition.as_deref(),
                        cluster_key,
                    )
                })
            };

            match op {
                UpdateOp::Add => {
                    if pos.is_some() {
                        // Duplicate add
                        continue;
                    }
                    list.push(obj.into_record());
                    // The new node may be another node's not-yet-seen parent.
                    relink = true;
                }
                UpdateOp::Modify => {
                    let Some(p) = pos else {
                        warn!("association modify targets a record that no longer exists");
                        missing += 1;
                        continue;
                    };
                    if let Some(parent_id) = obj.parent_id {
                        if parent_id != list[p].parent_id {
                            list[p].parent_id = parent_id;
                            relink = true;
                        }
                    }
                    if let Some(lft) = obj.lft {
                        list[p].lft = lft;
                    }
                    if let Some(shares) = obj.shares_raw {
                        if shares != list[p].shares_raw {
                            list[p].shares_raw = shares;
                            relink = true;
                        }
                    }
                    list[p].grp.merge_from(&obj.grp);
                    list[p].max_per_job.merge_from(&obj.max_per_job);
                    if let Some(instrs) = obj.qos {
                        if instrs.is_empty() {
                            // No instructions: inherit the parent's list. Read
                            // the parent id written above, not the linkage from
                            // before this batch; the same object may have just
                            // reparented this record.
                            let parent_id = list[p].parent_id;
                            let own_id = list[p].id;
                            let inherited = list
                                .iter()
                                .find(|a| a.id == parent_id && a.id != own_id)
                                .map(|a| a.qos_list.clone());
                            if let Some(qos_list) = inherited {
                                list[p].qos_list = qos_list;
                            }
                        } else {
                            let parsed = parse_qos_instrs(&instrs);
                            apply_qos_instrs(&mut list[p].qos_list, &parsed);
                        }
                    }
                }
                UpdateOp::Remove => {
                    let Some(p) = pos else {
                        // Removing an already-gone record is a no-op.
                        continue;
                    };
                    if let Some(notifier) = &self.notifier {
                        notifier.notify(&list[p]);
                    }
                    list.remove(p);
                    relink = true;
                }
            }
        }

        if relink {
            tree::sort_parents_first(list);
            self.link_assocs(list);
        }

        if missing > 0 {
            Err(DataIntegrityError::PartialMerge { missing }.into())
        } else {
            Ok(())
        }
    }

    fn apply_qos_updates(
        &self,
        op: UpdateOp,
        objs: Vec<QosDelta>,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Qos)?;

        // Removing a QOS also strips its token from every association's
        // allowed list, so the association lock comes first, per the fixed
        // acquisition order.
        let mut assoc_guard = if op == UpdateOp::Remove {
            Some(self.assocs.lock())
        } else {
            None
        };

        let mut guard = self.qos.lock();
        let list = guard.get_or_insert_with(Vec::new);

        let mut missing = 0usize;
        let mut changed = false;

        for obj in objs {
            let pos = list.iter().position(|q| q.id == obj.id);
            match op {
                UpdateOp::Add => {
                    if pos.is_some() {
                        continue;
                    }
                    list.push(obj.into_record());
                    changed = true;
                }
                UpdateOp::Modify => {
                    let Some(p) = pos else {
                        warn!("qos modify targets id {} which no longer exists", obj.id);
                        missing += 1;
                        continue;
                    };
                    if let Some(name) = obj.name {
                        list[p].name = name;
                    }
                    if let Some(priority) = obj.priority {
                        if priority != list[p].priority {
                            list[p].priority = priority;
                            changed = true;
                        }
                    }
                    list[p].grp.merge_from(&obj.grp);
                    list[p].max_per_user.merge_from(&obj.max_per_user);
                    list[p].max_per_account.merge_from(&obj.max_per_account);
                    if let Some(preempt) = obj.preempt {
                        list[p].preempt = preempt;
                    }
                }
                UpdateOp::Remove => {
                    let Some(p) = pos else {
                        continue;
                    };
                    let removed = list.remove(p);
                    changed = true;
                    let token = removed.id.to_string();
                    if let Some(assocs) = assoc_guard.as_mut().and_then(|g| g.as_mut()) {
                        for assoc in assocs.iter_mut() {
                            assoc.qos_list.retain(|t| t != &token);
                        }
                    }
                }
            }
        }

        if changed {
            crate::model::normalize_priorities(list);
        }

        if missing > 0 {
            Err(DataIntegrityError::PartialMerge { missing }.into())
        } else {
            Ok(())
        }
    }

    fn apply_user_updates(
        &self,
        op: UpdateOp,
        objs: Vec<UserDelta>,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Users)?;

        let mut guard = self.users.lock();
        let list = guard.get_or_insert_with(Vec::new);

        let mut missing = 0usize;

        for obj in objs {
            let pos = list.iter().position(|u| u.name_matches(&obj.name));
            match op {
                UpdateOp::Add => {
                    if pos.is_some() {
                        continue;
                    }
                    let mut user = obj.into_record();
                    user.uid = self.uid_resolver.uid_for(&user.name);
                    list.push(user);
                }
                UpdateOp::Modify => {
                    let Some(p) = pos else {
                        warn!("user modify targets '{}' which no longer exists", obj.name);
                        missing += 1;
                        continue;
                    };
                    if let Some(account) = obj.default_account {
                        list[p].default_account = Some(account);
                    }
                    if let Some(wckey) = obj.default_wckey {
                        list[p].default_wckey = Some(wckey);
                    }
                    if let Some(level) = obj.admin_level {
                        list[p].admin_level = level;
                    }
                    if let Some(coords) = obj.coord_accounts {
                        list[p].coord_accounts = coords;
                    }
                }
                UpdateOp::Remove => {
                    if let Some(p) = pos {
                        list.remove(p);
                    }
                }
            }
        }

        if missing > 0 {
            Err(DataIntegrityError::PartialMerge { missing }.into())
        } else {
            Ok(())
        }
    }

    fn apply_wckey_updates(
        &self,
        op: UpdateOp,
        objs: Vec<WckeyDelta>,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Wckeys)?;
        let cluster_scoped = !self.settings.cluster_name.is_empty();

        let mut guard = self.wckeys.lock();
        let list = guard.get_or_insert_with(Vec::new);

        let mut missing = 0usize;

        for obj in objs {
            if self.out_of_scope(obj.cluster.as_deref()) {
                debug!("discarding wckey delta for cluster {:?}", obj.cluster);
                continue;
            }

            let pos = if obj.id != 0 {
                list.iter().position(|w| w.id == obj.id)
            } else {
                let uid = obj
                    .user
                    .as_deref()
                    .and_then(|name| self.uid_resolver.uid_for(name));
                let cluster_key = if cluster_scoped {
                    None
                } else {
                    obj.cluster.as_deref()
                };
                list.iter()
                    .position(|w| w.matches_composite(uid, obj.name.as_deref(), cluster_key))
            };

            match op {
                UpdateOp::Add => {
                    if pos.is_some() {
                        continue;
                    }
                    let mut wckey = obj.into_record();
                    wckey.uid = self.uid_resolver.uid_for(&wckey.user);
                    list.push(wckey);
                }
                UpdateOp::Modify => {
                    let Some(p) = pos else {
                        warn!("wckey modify targets a record that no longer exists");
                        missing += 1;
                        continue;
                    };
                    if let Some(name) = obj.name {
                        list[p].name = name;
                    }
                    if let Some(user) = obj.user {
                        list[p].uid = self.uid_resolver.uid_for(&user);
                        list[p].user = user;
                    }
                    if let Some(cluster) = obj.cluster {
                        list[p].cluster = cluster;
                    }
                }
                UpdateOp::Remove => {
                    if let Some(p) = pos {
                        list.remove(p);
                    }
                }
            }
        }

        if missing > 0 {
            Err(DataIntegrityError::PartialMerge { missing }.into())
        } else {
            Ok(())
        }
    }
}
