//! Snapshot persistence: the versioned `assoc_mgr_state` file holding the
//! four caches and the lighter `assoc_mgr_usage` checkpoint holding only
//! per-association raw usage.
//!
//! Dumps copy each table out under its own lock, one at a time, before the
//! file lock is taken; the write lands in a `.new` file and is swapped in
//! by a hard-link rotation, so a failed write never disturbs the previously
//! persisted file. Loads validate the whole file before installing
//! anything.

mod rotate;
mod state_file;
mod state_path_manager;
mod usage_file;

pub(crate) use rotate::*;
pub(crate) use state_file::*;
pub(crate) use state_path_manager::*;
pub(crate) use usage_file::*;

#[cfg(test)]
mod rotate_test;
#[cfg(test)]
mod state_file_test;

use std::fs;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tracing::info;
use tracing::warn;

use crate::constants::STATE_FILE_NAME;
use crate::constants::USAGE_FILE_NAME;
use crate::errors::StorageError;
use crate::model::normalize_priorities;
use crate::registry::AssociationRegistry;
use crate::registry::CacheMode;
use crate::Result;

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl AssociationRegistry {
    fn paths(&self) -> StatePathManager {
        StatePathManager::new(self.settings.state_dir.clone())
    }

    /// Persist all four caches to `assoc_mgr_state`.
    pub fn dump_state(&self) -> Result<()> {
        // Each table is copied out under its own lock before the file lock
        // is taken; the locks never nest.
        let snapshot = StateSnapshot {
            timestamp: unix_now(),
            assocs: self.assocs.lock().clone(),
            qos: self.qos.lock().clone(),
            users: self.users.lock().clone(),
            wckeys: self.wckeys.lock().clone(),
        };
        let bytes = encode_state(&snapshot)?;

        let paths = self.paths();
        let _file_guard = self.state_file_lock.lock();
        write_and_rotate(&paths.base_dir, STATE_FILE_NAME, &bytes)?;
        info!("persisted accounting state to {:?}", paths.current(STATE_FILE_NAME));
        Ok(())
    }

    /// Recover all four caches from `assoc_mgr_state`.
    ///
    /// The file is decoded and validated in full before any table is
    /// installed; a version outside the supported range, an unknown block
    /// tag or a truncated read rejects the whole file and leaves the caches
    /// untouched. On success the registry runs in
    /// [`CacheMode::Disconnected`] until a refresh succeeds.
    pub fn load_state(&self) -> Result<()> {
        let paths = self.paths();
        let path = paths.current(STATE_FILE_NAME);
        let bytes = {
            let _file_guard = self.state_file_lock.lock();
            fs::read(&path).map_err(|source| StorageError::Path {
                path: path.clone(),
                source,
            })?
        };

        let snapshot = decode_state(&bytes)?;

        if let Some(mut list) = snapshot.assocs {
            self.link_assocs(&mut list);
            *self.assocs.lock() = Some(list);
        }
        if let Some(mut list) = snapshot.qos {
            normalize_priorities(&mut list);
            *self.qos.lock() = Some(list);
        }
        if let Some(list) = snapshot.users {
            *self.users.lock() = Some(list);
        }
        if let Some(list) = snapshot.wckeys {
            *self.wckeys.lock() = Some(list);
        }

        self.set_mode(CacheMode::Disconnected);
        info!(
            "recovered accounting state persisted at unix time {}",
            snapshot.timestamp
        );
        Ok(())
    }

    /// Persist the lightweight usage-only checkpoint: one
    /// `(association id, raw usage)` pair per user-level association.
    pub fn dump_usage(&self) -> Result<()> {
        let pairs: Vec<(u32, f64)> = {
            let guard = self.assocs.lock();
            guard
                .as_ref()
                .map(|list| {
                    list.iter()
                        .filter(|a| a.is_user_record())
                        .map(|a| (a.id, a.usage.usage_raw))
                        .collect()
                })
                .unwrap_or_default()
        };
        let bytes = encode_usage(unix_now(), &pairs);

        let paths = self.paths();
        let _file_guard = self.state_file_lock.lock();
        write_and_rotate(&paths.base_dir, USAGE_FILE_NAME, &bytes)
    }

    /// Restore raw usage from the usage checkpoint and re-aggregate it up
    /// the tree. Pairs naming an id the cache no longer holds are skipped
    /// with a log.
    pub fn load_usage(&self) -> Result<()> {
        let paths = self.paths();
        let path = paths.current(USAGE_FILE_NAME);
        let bytes = {
            let _file_guard = self.state_file_lock.lock();
            fs::read(&path).map_err(|source| StorageError::Path {
                path: path.clone(),
                source,
            })?
        };
        let (_, pairs) = decode_usage(&bytes)?;

        let mut guard = self.assocs.lock();
        if let Some(list) = guard.as_mut() {
            for (id, usage_raw) in pairs {
                match list.iter_mut().find(|a| a.id == id) {
                    Some(assoc) => assoc.usage.usage_raw = usage_raw,
                    None => warn!("usage checkpoint names unknown association {}", id),
                }
            }
            crate::usage::reaggregate(list);
        }
        Ok(())
    }
}
