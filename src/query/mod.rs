//! The query surface other subsystems call during normal operation:
//! partial-record fill-ins, admin/coordinator checks, share snapshots for
//! fair-share reporting and the periodic usage clears.

#[cfg(test)]
mod query_test;

use std::collections::HashMap;

use crate::errors::DataIntegrityError;
use crate::model::AdminLevel;
use crate::model::Association;
use crate::model::CacheTable;
use crate::model::Qos;
use crate::model::User;
use crate::model::Wckey;
use crate::registry::AssociationRegistry;
use crate::tree::build_index;
use crate::usage;
use crate::Result;

/// Usage figures attached to one share snapshot; withheld entirely when the
/// privacy flag hides them from the requesting user.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareUsage {
    pub usage_raw: f64,
    /// Raw usage as a fraction of the root's raw usage
    pub usage_norm: f64,
    /// The blended fair-share measure: own normalized usage pulled toward
    /// the parent's effective usage in proportion to the share ratio
    pub usage_effective: f64,
}

/// One association's entry in a shares report.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareSnapshot {
    pub id: u32,
    pub cluster: String,
    pub account: String,
    pub user: Option<String>,
    pub shares_raw: u32,
    pub level_shares: u64,
    pub shares_norm: f64,
    pub usage: Option<ShareUsage>,
}

impl AssociationRegistry {
    /// Complete a partial association from the cache.
    ///
    /// A non-zero id matches by id; otherwise missing identity fields are
    /// progressively resolved (user name / default account through the user
    /// cache, cluster from the configured default) and the composite key is
    /// scanned, accepting a partition-less record as a fallback for a
    /// request naming a specific partition. Every limit, parent pointer and
    /// share value the caller didn't supply is copied from the match.
    ///
    /// Returns whether a match was found; with `enforce` a miss is an
    /// error instead.
    pub fn fill_in_association(
        &self,
        partial: &mut Association,
        enforce: bool,
    ) -> Result<bool> {
        self.ensure_enabled(CacheTable::Associations)?;
        let guard = self.assocs.lock();
        let Some(list) = guard.as_ref() else {
            return self.fill_in_miss(CacheTable::Associations, "cache not loaded", enforce);
        };

        let pos = if partial.id != 0 {
            list.iter().position(|a| a.id == partial.id)
        } else {
            self.resolve_partial_identity(partial);
            let cluster_scoped = !self.settings.cluster_name.is_empty();
            let cluster_key = if cluster_scoped {
                None
            } else if partial.cluster.is_empty() {
                None
            } else {
                Some(partial.cluster.as_str())
            };
            let account = if partial.account.is_empty() {
                None
            } else {
                Some(partial.account.as_str())
            };
            list.iter()
                .position(|a| {
                    a.matches_composite(
                        partial.uid,
                        account,
                        partial.partition.as_deref(),
                        cluster_key,
                    )
                })
                .or_else(|| {
                    // A record with no partition serves any partition.
                    partial.partition.as_ref()?;
                    list.iter()
                        .position(|a| a.matches_composite(partial.uid, account, None, cluster_key))
                })
        };

        match pos {
            Some(p) => {
                partial.fill_missing_from(&list[p]);
                Ok(true)
            }
            None => self.fill_in_miss(CacheTable::Associations, "no match", enforce),
        }
    }

    /// Resolve user name, account and cluster on a keyless partial before
    /// the composite scan.
    fn resolve_partial_identity(
        &self,
        partial: &mut Association,
    ) {
        if partial.uid.is_none() {
            if let Some(name) = partial.user.as_deref() {
                partial.uid = self.uid_resolver.uid_for(name);
            }
        }
        if partial.uid.is_some() && (partial.user.is_none() || partial.account.is_empty()) {
            let users = self.users.lock();
            if let Some(user) = users
                .as_ref()
                .and_then(|l| l.iter().find(|u| u.uid == partial.uid))
            {
                if partial.user.is_none() {
                    partial.user = Some(user.name.clone());
                }
                if partial.account.is_empty() {
                    if let Some(default_account) = &user.default_account {
                        partial.account = default_account.clone();
                    }
                }
            }
        }
        if partial.cluster.is_empty() {
            partial.cluster = self.settings.cluster_name.clone();
        }
    }

    fn fill_in_miss(
        &self,
        table: CacheTable,
        key: &str,
        enforce: bool,
    ) -> Result<bool> {
        if enforce {
            Err(DataIntegrityError::TargetMissing {
                table,
                key: key.to_string(),
            }
            .into())
        } else {
            Ok(false)
        }
    }

    /// Complete a partial user record; matches by uid when carried,
    /// otherwise by case-insensitive name.
    pub fn fill_in_user(
        &self,
        partial: &mut User,
        enforce: bool,
    ) -> Result<bool> {
        self.ensure_enabled(CacheTable::Users)?;
        let guard = self.users.lock();
        let Some(list) = guard.as_ref() else {
            return self.fill_in_miss(CacheTable::Users, "cache not loaded", enforce);
        };

        let pos = if partial.uid.is_some() {
            list.iter().position(|u| u.uid == partial.uid)
        } else if !partial.name.is_empty() {
            list.iter().position(|u| u.name_matches(&partial.name))
        } else {
            None
        };

        match pos {
            Some(p) => {
                partial.fill_missing_from(&list[p]);
                Ok(true)
            }
            None => self.fill_in_miss(CacheTable::Users, &partial.name, enforce),
        }
    }

    /// Complete a partial QOS record; matches by id, and a supplied name
    /// must agree with the cached record's.
    pub fn fill_in_qos(
        &self,
        partial: &mut Qos,
        enforce: bool,
    ) -> Result<bool> {
        self.ensure_enabled(CacheTable::Qos)?;
        let guard = self.qos.lock();
        let Some(list) = guard.as_ref() else {
            return self.fill_in_miss(CacheTable::Qos, "cache not loaded", enforce);
        };

        let pos = if partial.id != 0 {
            list.iter().position(|q| {
                q.id == partial.id && (partial.name.is_empty() || q.name == partial.name)
            })
        } else if !partial.name.is_empty() {
            list.iter().position(|q| q.name == partial.name)
        } else {
            None
        };

        match pos {
            Some(p) => {
                partial.fill_missing_from(&list[p]);
                Ok(true)
            }
            None => self.fill_in_miss(CacheTable::Qos, &partial.name, enforce),
        }
    }

    /// Complete a partial wckey; matches by id when carried, otherwise by
    /// the resolved uid + name [+ cluster] composite key.
    pub fn fill_in_wckey(
        &self,
        partial: &mut Wckey,
        enforce: bool,
    ) -> Result<bool> {
        self.ensure_enabled(CacheTable::Wckeys)?;
        let guard = self.wckeys.lock();
        let Some(list) = guard.as_ref() else {
            return self.fill_in_miss(CacheTable::Wckeys, "cache not loaded", enforce);
        };

        let pos = if partial.id != 0 {
            list.iter().position(|w| w.id == partial.id)
        } else {
            if partial.uid.is_none() && !partial.user.is_empty() {
                partial.uid = self.uid_resolver.uid_for(&partial.user);
            }
            let cluster_scoped = !self.settings.cluster_name.is_empty();
            let cluster_key = if cluster_scoped || partial.cluster.is_empty() {
                None
            } else {
                Some(partial.cluster.as_str())
            };
            let name = if partial.name.is_empty() {
                None
            } else {
                Some(partial.name.as_str())
            };
            list.iter()
                .position(|w| w.matches_composite(partial.uid, name, cluster_key))
        };

        match pos {
            Some(p) => {
                partial.fill_missing_from(&list[p]);
                Ok(true)
            }
            None => self.fill_in_miss(CacheTable::Wckeys, &partial.name, enforce),
        }
    }

    /// Administrative level of a user; `NotSet` when the user is unknown.
    pub fn get_admin_level(
        &self,
        uid: u32,
    ) -> AdminLevel {
        let guard = self.users.lock();
        guard
            .as_ref()
            .and_then(|l| l.iter().find(|u| u.uid == Some(uid)))
            .map(|u| u.admin_level)
            .unwrap_or(AdminLevel::NotSet)
    }

    pub fn is_account_coordinator(
        &self,
        uid: u32,
        account: &str,
    ) -> bool {
        let guard = self.users.lock();
        guard
            .as_ref()
            .and_then(|l| l.iter().find(|u| u.uid == Some(uid)))
            .is_some_and(|u| u.coordinates(account))
    }

    /// Ids of every association belonging to a user.
    pub fn get_user_assocs(
        &self,
        uid: u32,
    ) -> Result<Vec<u32>> {
        self.ensure_enabled(CacheTable::Associations)?;
        let guard = self.assocs.lock();
        Ok(guard
            .as_ref()
            .map(|list| {
                list.iter()
                    .filter(|a| a.uid == Some(uid))
                    .map(|a| a.id)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Whether an association id exists in the cache; with `enforce` an
    /// unknown id is an error instead of `false`.
    pub fn validate_association_id(
        &self,
        id: u32,
        enforce: bool,
    ) -> Result<bool> {
        self.ensure_enabled(CacheTable::Associations)?;
        let guard = self.assocs.lock();
        let known = guard
            .as_ref()
            .is_some_and(|l| l.iter().any(|a| a.id == id));
        if !known && enforce {
            return Err(DataIntegrityError::UnknownAssociationId { id }.into());
        }
        Ok(known)
    }

    /// Share and usage snapshots for every association visible to the
    /// filters.
    ///
    /// With private usage on, the usage figures of a record are withheld
    /// unless the requester owns the record, coordinates its account or is
    /// an operator/administrator.
    pub fn get_shares(
        &self,
        requesting_uid: u32,
        account_filter: Option<&[String]>,
        user_filter: Option<&[String]>,
    ) -> Result<Vec<ShareSnapshot>> {
        self.ensure_enabled(CacheTable::Associations)?;
        let assoc_guard = self.assocs.lock();
        let Some(list) = assoc_guard.as_ref() else {
            return Ok(Vec::new());
        };

        let (privileged, coord_accounts) = {
            let users = self.users.lock();
            let requester = users
                .as_ref()
                .and_then(|l| l.iter().find(|u| u.uid == Some(requesting_uid)));
            (
                requester.map(|u| u.admin_level.is_privileged()).unwrap_or(false),
                requester.map(|u| u.coord_accounts.clone()).unwrap_or_default(),
            )
        };

        let index = build_index(list);
        let root_usage: f64 = list
            .iter()
            .filter(|a| a.parent_ref.is_none() && !a.is_user_record())
            .map(|a| a.usage.usage_raw)
            .sum();
        let mut effective: HashMap<u32, f64> = HashMap::new();

        let mut snapshots = Vec::new();
        for (i, assoc) in list.iter().enumerate() {
            if let Some(accounts) = account_filter {
                if !accounts.iter().any(|a| a == &assoc.account) {
                    continue;
                }
            }
            if let Some(users) = user_filter {
                match assoc.user.as_deref() {
                    Some(name) if users.iter().any(|u| u == name) => {}
                    _ => continue,
                }
            }

            let visible = !self.settings.private_usage
                || privileged
                || assoc.uid == Some(requesting_uid)
                || coord_accounts.iter().any(|a| a == &assoc.account);

            let usage = visible.then(|| ShareUsage {
                usage_raw: assoc.usage.usage_raw,
                usage_norm: norm_usage(assoc, root_usage),
                usage_effective: effective_usage(list, &index, i, root_usage, &mut effective),
            });

            snapshots.push(ShareSnapshot {
                id: assoc.id,
                cluster: assoc.cluster.clone(),
                account: assoc.account.clone(),
                user: assoc.user.clone(),
                shares_raw: assoc.shares_raw,
                level_shares: assoc.level_shares,
                shares_norm: assoc.shares_norm,
                usage,
            });
        }
        Ok(snapshots)
    }

    /// Zero every association's and QOS record's usage counters, leaving
    /// the long-lived raw accumulators alone.
    pub fn clear_all_used_info(&self) -> Result<()> {
        let mut assoc_guard = self.assocs.lock();
        if let Some(list) = assoc_guard.as_mut() {
            for assoc in list.iter_mut() {
                usage::clear_usage(&mut assoc.usage);
            }
        }
        let mut qos_guard = self.qos.lock();
        if let Some(list) = qos_guard.as_mut() {
            for qos in list.iter_mut() {
                qos.clear_used_info();
            }
        }
        Ok(())
    }

    /// The explicit raw-usage reset used by fair-share decay windows.
    pub fn reset_all_raw_usage(&self) -> Result<()> {
        let mut assoc_guard = self.assocs.lock();
        if let Some(list) = assoc_guard.as_mut() {
            for assoc in list.iter_mut() {
                usage::reset_raw_usage(&mut assoc.usage);
            }
        }
        Ok(())
    }

    /// Charge a usage event against an association and all its ancestors.
    pub fn add_assoc_usage(
        &self,
        id: u32,
        delta: &crate::model::AssocUsage,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Associations)?;
        let mut guard = self.assocs.lock();
        let Some(list) = guard.as_mut() else {
            return Err(DataIntegrityError::UnknownAssociationId { id }.into());
        };
        let index = build_index(list);
        let Some(&start) = index.get(&id) else {
            return Err(DataIntegrityError::UnknownAssociationId { id }.into());
        };

        usage::add_usage(&mut list[start].usage, delta);
        let mut cur = list[start].parent_ref;
        let mut hops = list.len();
        while let Some(parent_id) = cur {
            if hops == 0 {
                break;
            }
            hops -= 1;
            let Some(&pos) = index.get(&parent_id) else {
                break;
            };
            usage::add_usage(&mut list[pos].usage, delta);
            cur = list[pos].parent_ref;
        }
        Ok(())
    }
}

fn norm_usage(
    assoc: &Association,
    root_usage: f64,
) -> f64 {
    if root_usage > 0.0 {
        assoc.usage.usage_raw / root_usage
    } else {
        0.0
    }
}

/// Effective usage, memoized per pass: a root's is its own normalized
/// usage; every other node's is its normalized usage pulled toward the
/// parent's effective usage by `shares_raw / level_shares`.
fn effective_usage(
    list: &[Association],
    index: &HashMap<u32, usize>,
    pos: usize,
    root_usage: f64,
    memo: &mut HashMap<u32, f64>,
) -> f64 {
    let assoc = &list[pos];
    if let Some(&cached) = memo.get(&assoc.id) {
        return cached;
    }

    let own = norm_usage(assoc, root_usage);
    // Provisional entry so a cyclic parent chain terminates at `own`.
    memo.insert(assoc.id, own);
    let value = match assoc.parent_ref.and_then(|pid| index.get(&pid)) {
        None => own,
        Some(&parent_pos) => {
            let parent_eff = effective_usage(list, index, parent_pos, root_usage, memo);
            if assoc.level_shares > 0 {
                own + (parent_eff - own) * (f64::from(assoc.shares_raw) / assoc.level_shares as f64)
            } else {
                own
            }
        }
    };
    memo.insert(assoc.id, value);
    value
}
