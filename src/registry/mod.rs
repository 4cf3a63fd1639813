//! The association registry: one service object owning the four accounting
//! caches, their locks and the disconnected-cache state.
//!
//! Lock acquisition order is association -> qos -> user -> wckey -> file,
//! never out of order. No lock is held across the database fetch itself:
//! load paths fetch first and only then take the table lock to install the
//! result, so readers are blocked only for the install. A reader that
//! acquires a table lock always observes a fully resolved tree; resolution
//! and usage re-aggregation complete before the lock is released.

mod builder;
pub use builder::*;

#[cfg(test)]
mod builder_test;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::RegistrySettings;
use crate::connector::AcctConnector;
use crate::connector::AcctQuery;
use crate::connector::RemovedAssocNotifier;
use crate::connector::UidResolver;
use crate::errors::ConnectivityError;
use crate::errors::UsageError;
use crate::model::normalize_priorities;
use crate::model::Association;
use crate::model::CacheTable;
use crate::model::Qos;
use crate::model::User;
use crate::model::Wckey;
use crate::tree;
use crate::tree::ResolveCtx;
use crate::usage;
use crate::Error;
use crate::Result;

/// Whether the caches were populated from the live accounting database or
/// recovered from a persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Normal operation against the live database
    Live,
    /// Running on a recovered snapshot; a refresh is required before the
    /// caches can be considered current again
    Disconnected,
}

/// The in-process authority over the four accounting caches.
///
/// `None` in a table slot means "never loaded"; an empty `Vec` is a present
/// cache that happened to load nothing, installed deliberately so repeated
/// lookups do not re-trigger network calls.
pub struct AssociationRegistry {
    pub(crate) settings: RegistrySettings,
    pub(crate) connector: Arc<dyn AcctConnector>,
    pub(crate) uid_resolver: Arc<dyn UidResolver>,
    pub(crate) notifier: Option<Arc<dyn RemovedAssocNotifier>>,

    pub(crate) assocs: Mutex<Option<Vec<Association>>>,
    pub(crate) qos: Mutex<Option<Vec<Qos>>>,
    pub(crate) users: Mutex<Option<Vec<User>>>,
    pub(crate) wckeys: Mutex<Option<Vec<Wckey>>>,
    pub(crate) state_file_lock: Mutex<()>,

    mode: Mutex<CacheMode>,
}

impl AssociationRegistry {
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn mode(&self) -> CacheMode {
        *self.mode.lock()
    }

    pub(crate) fn set_mode(
        &self,
        mode: CacheMode,
    ) {
        *self.mode.lock() = mode;
    }

    /// Load every enabled table that is not already present.
    ///
    /// If the database is unreachable on this first attempt, recovery from
    /// the persisted snapshot is tried before falling back to empty caches;
    /// a successful recovery leaves the registry in
    /// [`CacheMode::Disconnected`] until a refresh succeeds.
    pub fn init(&self) -> Result<()> {
        let cache = self.settings.cache_flags();
        let enforce = self.settings.enforce_flags();

        let mut outcome = Ok(());
        let mut assoc_fetch_failed = false;

        for table in [
            CacheTable::Associations,
            CacheTable::Qos,
            CacheTable::Users,
            CacheTable::Wckeys,
        ] {
            if !cache.covers(table) || self.table_present(table) {
                continue;
            }
            let result = match table {
                CacheTable::Associations => {
                    match self.load_associations(enforce.covers(table)) {
                        Ok(fetch_failed) => {
                            assoc_fetch_failed = fetch_failed;
                            Ok(())
                        }
                        Err(e) => {
                            assoc_fetch_failed = matches!(
                                &e,
                                Error::Connectivity(ConnectivityError::FetchFailed { .. })
                            );
                            Err(e)
                        }
                    }
                }
                CacheTable::Qos => self.get_qos(enforce.covers(table)),
                CacheTable::Users => self.get_users(enforce.covers(table)),
                CacheTable::Wckeys => self.get_wckeys(enforce.covers(table)),
            };
            if let Err(e) = result {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        // Recovery only when the database itself was unreachable. A
        // reachable database that legitimately serves zero associations
        // keeps its live empty result.
        if assoc_fetch_failed {
            match self.load_state() {
                Ok(()) => {
                    info!("accounting database unreachable; recovered caches from snapshot");
                    return Ok(());
                }
                Err(e) => {
                    debug!("no usable state snapshot to recover from: {}", e);
                }
            }
        }

        outcome
    }

    fn table_present(
        &self,
        table: CacheTable,
    ) -> bool {
        match table {
            CacheTable::Associations => self.assocs.lock().is_some(),
            CacheTable::Qos => self.qos.lock().is_some(),
            CacheTable::Users => self.users.lock().is_some(),
            CacheTable::Wckeys => self.wckeys.lock().is_some(),
        }
    }

    pub(crate) fn ensure_enabled(
        &self,
        table: CacheTable,
    ) -> Result<()> {
        if self.settings.cache_flags().covers(table) {
            Ok(())
        } else {
            Err(UsageError::TableDisabled { table }.into())
        }
    }

    fn query(&self) -> AcctQuery {
        AcctQuery {
            cluster: if self.settings.cluster_name.is_empty() {
                None
            } else {
                Some(self.settings.cluster_name.clone())
            },
        }
    }

    /// Resolve linkage over a freshly installed association list, re-weight
    /// shares when fair-share is tracked, and roll leaf usage up into the
    /// accounts. The roll-up only needs the parent references, so it runs
    /// whether or not fair-share is tracked.
    pub(crate) fn link_assocs(
        &self,
        list: &mut [Association],
    ) {
        let mut ctx = ResolveCtx::default();
        tree::resolve(
            list,
            &mut ctx,
            self.uid_resolver.as_ref(),
            self.settings.track_fairshare,
        );
        if self.settings.track_fairshare {
            tree::normalize_shares(list);
        }
        usage::reaggregate(list);
    }

    // ---- full loads -------------------------------------------------

    /// Fetch the association table and replace the cached list.
    ///
    /// Fails only when `enforce` demands a non-empty result; a fetch
    /// failure without enforcement installs an empty but present cache.
    pub fn get_associations(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.load_associations(enforce).map(|_| ())
    }

    /// Returns whether the fetch itself failed. An absorbed failure still
    /// installs an empty-but-present cache, so the caller cannot tell it
    /// apart from a database that served nothing by inspecting the table.
    fn load_associations(
        &self,
        enforce: bool,
    ) -> Result<bool> {
        self.ensure_enabled(CacheTable::Associations)?;
        let fetched = self
            .connector
            .get_associations(self.settings.admin_uid, &self.query());

        let mut guard = self.assocs.lock();
        match fetched {
            Ok(mut list) => {
                self.link_assocs(&mut list);
                let empty = list.is_empty();
                *guard = Some(list);
                if empty && enforce {
                    return Err(ConnectivityError::EmptyRequired {
                        table: CacheTable::Associations,
                    }
                    .into());
                }
                Ok(false)
            }
            Err(e) => {
                warn!("association table fetch failed: {}", e);
                if guard.is_none() {
                    *guard = Some(Vec::new());
                }
                if enforce {
                    Err(ConnectivityError::FetchFailed {
                        table: CacheTable::Associations,
                    }
                    .into())
                } else {
                    Ok(true)
                }
            }
        }
    }

    pub fn get_qos(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Qos)?;
        let fetched = self.connector.get_qos(self.settings.admin_uid, &self.query());

        let mut guard = self.qos.lock();
        match fetched {
            Ok(mut list) => {
                normalize_priorities(&mut list);
                let empty = list.is_empty();
                *guard = Some(list);
                if empty && enforce {
                    return Err(ConnectivityError::EmptyRequired {
                        table: CacheTable::Qos,
                    }
                    .into());
                }
                Ok(())
            }
            Err(e) => {
                warn!("qos table fetch failed: {}", e);
                if guard.is_none() {
                    *guard = Some(Vec::new());
                }
                if enforce {
                    Err(ConnectivityError::FetchFailed {
                        table: CacheTable::Qos,
                    }
                    .into())
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn get_users(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Users)?;
        let fetched = self.connector.get_users(self.settings.admin_uid, &self.query());

        let mut guard = self.users.lock();
        match fetched {
            Ok(mut list) => {
                for user in list.iter_mut() {
                    if user.uid.is_none() {
                        user.uid = self.uid_resolver.uid_for(&user.name);
                    }
                }
                let empty = list.is_empty();
                *guard = Some(list);
                if empty && enforce {
                    return Err(ConnectivityError::EmptyRequired {
                        table: CacheTable::Users,
                    }
                    .into());
                }
                Ok(())
            }
            Err(e) => {
                warn!("user table fetch failed: {}", e);
                if guard.is_none() {
                    *guard = Some(Vec::new());
                }
                if enforce {
                    Err(ConnectivityError::FetchFailed {
                        table: CacheTable::Users,
                    }
                    .into())
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn get_wckeys(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Wckeys)?;
        let fetched = self
            .connector
            .get_wckeys(self.settings.admin_uid, &self.query());

        let mut guard = self.wckeys.lock();
        match fetched {
            Ok(mut list) => {
                for wckey in list.iter_mut() {
                    if wckey.uid.is_none() {
                        wckey.uid = self.uid_resolver.uid_for(&wckey.user);
                    }
                }
                let empty = list.is_empty();
                *guard = Some(list);
                if empty && enforce {
                    return Err(ConnectivityError::EmptyRequired {
                        table: CacheTable::Wckeys,
                    }
                    .into());
                }
                Ok(())
            }
            Err(e) => {
                warn!("wckey table fetch failed: {}", e);
                if guard.is_none() {
                    *guard = Some(Vec::new());
                }
                if enforce {
                    Err(ConnectivityError::FetchFailed {
                        table: CacheTable::Wckeys,
                    }
                    .into())
                } else {
                    Ok(())
                }
            }
        }
    }

    // ---- refreshes --------------------------------------------------

    /// Best-effort reload while running on a recovered snapshot.
    ///
    /// The fresh list is fetched before the table lock is taken. On
    /// success it replaces the cache with the running usage counters
    /// carried over and re-propagated; on failure the previous cache is
    /// left untouched and the error is returned.
    pub fn refresh_associations(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Associations)?;
        if self.mode() != CacheMode::Disconnected {
            return Err(UsageError::NotDisconnected.into());
        }

        let mut list = match self
            .connector
            .get_associations(self.settings.admin_uid, &self.query())
        {
            Ok(list) => list,
            Err(e) => {
                warn!("association refresh failed; keeping previous cache: {}", e);
                return Err(ConnectivityError::FetchFailed {
                    table: CacheTable::Associations,
                }
                .into());
            }
        };
        if list.is_empty() && enforce {
            warn!("association refresh returned nothing; keeping previous cache");
            return Err(ConnectivityError::EmptyRequired {
                table: CacheTable::Associations,
            }
            .into());
        }

        let mut guard = self.assocs.lock();
        if let Some(old) = guard.as_ref() {
            // Carry the running leaf usage over; the roll-up totals are
            // rebuilt from the leaves during linking.
            for assoc in list.iter_mut() {
                if let Some(prev) = old.iter().find(|o| o.id == assoc.id) {
                    assoc.usage = prev.usage.clone();
                }
            }
        }
        self.link_assocs(&mut list);
        *guard = Some(list);
        drop(guard);

        self.set_mode(CacheMode::Live);
        Ok(())
    }

    pub fn refresh_qos(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.ensure_enabled(CacheTable::Qos)?;
        if self.mode() != CacheMode::Disconnected {
            return Err(UsageError::NotDisconnected.into());
        }

        let mut list = match self.connector.get_qos(self.settings.admin_uid, &self.query()) {
            Ok(list) => list,
            Err(e) => {
                warn!("qos refresh failed; keeping previous cache: {}", e);
                return Err(ConnectivityError::FetchFailed {
                    table: CacheTable::Qos,
                }
                .into());
            }
        };
        if list.is_empty() && enforce {
            warn!("qos refresh returned nothing; keeping previous cache");
            return Err(ConnectivityError::EmptyRequired {
                table: CacheTable::Qos,
            }
            .into());
        }

        let mut guard = self.qos.lock();
        if let Some(old) = guard.as_ref() {
            for qos in list.iter_mut() {
                if let Some(prev) = old.iter().find(|o| o.id == qos.id) {
                    qos.usage_by_account = prev.usage_by_account.clone();
                    qos.usage_by_user = prev.usage_by_user.clone();
                }
            }
        }
        normalize_priorities(&mut list);
        *guard = Some(list);
        drop(guard);

        self.set_mode(CacheMode::Live);
        Ok(())
    }

    pub fn refresh_users(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.refresh_flat(CacheTable::Users, enforce)
    }

    pub fn refresh_wckeys(
        &self,
        enforce: bool,
    ) -> Result<()> {
        self.refresh_flat(CacheTable::Wckeys, enforce)
    }

    /// Users and wckeys carry no usage counters to preserve; their refresh
    /// is fetch-then-swap.
    fn refresh_flat(
        &self,
        table: CacheTable,
        enforce: bool,
    ) -> Result<()> {
        self.ensure_enabled(table)?;
        if self.mode() != CacheMode::Disconnected {
            return Err(UsageError::NotDisconnected.into());
        }

        match table {
            CacheTable::Users => {
                let mut list = match self.connector.get_users(self.settings.admin_uid, &self.query())
                {
                    Ok(list) => list,
                    Err(e) => {
                        warn!("user refresh failed; keeping previous cache: {}", e);
                        return Err(ConnectivityError::FetchFailed { table }.into());
                    }
                };
                if list.is_empty() && enforce {
                    return Err(ConnectivityError::EmptyRequired { table }.into());
                }
                for user in list.iter_mut() {
                    if user.uid.is_none() {
                        user.uid = self.uid_resolver.uid_for(&user.name);
                    }
                }
                *self.users.lock() = Some(list);
            }
            CacheTable::Wckeys => {
                let mut list =
                    match self.connector.get_wckeys(self.settings.admin_uid, &self.query()) {
                        Ok(list) => list,
                        Err(e) => {
                            warn!("wckey refresh failed; keeping previous cache: {}", e);
                            return Err(ConnectivityError::FetchFailed { table }.into());
                        }
                    };
                if list.is_empty() && enforce {
                    return Err(ConnectivityError::EmptyRequired { table }.into());
                }
                for wckey in list.iter_mut() {
                    if wckey.uid.is_none() {
                        wckey.uid = self.uid_resolver.uid_for(&wckey.user);
                    }
                }
                *self.wckeys.lock() = Some(list);
            }
            _ => unreachable!("only flat tables refresh through this path"),
        }

        self.set_mode(CacheMode::Live);
        Ok(())
    }

    /// Re-resolve unknown numeric user identifiers across every cache.
    ///
    /// Records created before the system user database knew their name stay
    /// unresolved; this retries them after the host reports the database
    /// caught up. Tables are visited one lock at a time, in lock order.
    pub fn update_missing_uids(&self) {
        let mut resolved = 0usize;
        {
            let mut guard = self.assocs.lock();
            if let Some(list) = guard.as_mut() {
                for assoc in list.iter_mut().filter(|a| a.uid.is_none()) {
                    if let Some(name) = assoc.user.as_deref() {
                        if let Some(uid) = self.uid_resolver.uid_for(name) {
                            assoc.uid = Some(uid);
                            resolved += 1;
                        }
                    }
                }
            }
        }
        {
            let mut guard = self.users.lock();
            if let Some(list) = guard.as_mut() {
                for user in list.iter_mut().filter(|u| u.uid.is_none()) {
                    if let Some(uid) = self.uid_resolver.uid_for(&user.name) {
                        user.uid = Some(uid);
                        resolved += 1;
                    }
                }
            }
        }
        {
            let mut guard = self.wckeys.lock();
            if let Some(list) = guard.as_mut() {
                for wckey in list.iter_mut().filter(|w| w.uid.is_none()) {
                    if let Some(uid) = self.uid_resolver.uid_for(&wckey.user) {
                        wckey.uid = Some(uid);
                        resolved += 1;
                    }
                }
            }
        }
        if resolved > 0 {
            info!("resolved {} previously unknown uids", resolved);
        }
    }

    // ---- shutdown ---------------------------------------------------

    /// Release every cache, optionally persisting a snapshot first.
    pub fn fini(
        &self,
        persist: bool,
    ) -> Result<()> {
        if persist {
            self.dump_state()?;
            self.dump_usage()?;
        }

        *self.assocs.lock() = None;
        *self.qos.lock() = None;
        *self.users.lock() = None;
        *self.wckeys.lock() = None;
        Ok(())
    }
}
