//! Registry configuration.
//!
//! Process-wide inputs read once at init: the default cluster name, the
//! administrative service identity, the fair-share bookkeeping switch and
//! the per-table cache/enforcement flags. Loaded from an optional TOML file
//! with an environment-variable overlay (prefix `ASSOC_REGISTRY`,
//! `__`-separated), environment winning.

#[cfg(test)]
mod config_test;

use std::path::PathBuf;

use bitflags::bitflags;
use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::model::CacheTable;
use crate::Error;
use crate::Result;

bitflags! {
    /// One bit per cache table; used both as "which tables are cached" and
    /// "which tables must be non-empty" selectors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TableFlags: u32 {
        const ASSOCIATIONS = 1 << 0;
        const QOS = 1 << 1;
        const USERS = 1 << 2;
        const WCKEYS = 1 << 3;
    }
}

impl TableFlags {
    pub fn for_table(table: CacheTable) -> TableFlags {
        match table {
            CacheTable::Associations => TableFlags::ASSOCIATIONS,
            CacheTable::Qos => TableFlags::QOS,
            CacheTable::Users => TableFlags::USERS,
            CacheTable::Wckeys => TableFlags::WCKEYS,
        }
    }

    pub fn covers(
        self,
        table: CacheTable,
    ) -> bool {
        self.contains(TableFlags::for_table(table))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrySettings {
    /// Default cluster scope applied to records and queries that carry none;
    /// empty disables cluster scoping
    #[serde(default)]
    pub cluster_name: String,

    /// Identity the registry uses when fetching from the accounting database
    #[serde(default)]
    pub admin_uid: u32,

    /// Hierarchical fair-share bookkeeping: children lists, level shares and
    /// share normalization are maintained only when this is on
    #[serde(default = "default_track_fairshare")]
    pub track_fairshare: bool,

    /// Restrict usage visibility in share snapshots to the owning user,
    /// account coordinators and privileged users
    #[serde(default)]
    pub private_usage: bool,

    /// Directory holding the persisted state and usage files
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_cache_table")]
    pub cache_associations: bool,
    #[serde(default = "default_cache_table")]
    pub cache_qos: bool,
    #[serde(default = "default_cache_table")]
    pub cache_users: bool,
    #[serde(default = "default_cache_table")]
    pub cache_wckeys: bool,

    #[serde(default)]
    pub enforce_associations: bool,
    #[serde(default)]
    pub enforce_qos: bool,
    #[serde(default)]
    pub enforce_users: bool,
    #[serde(default)]
    pub enforce_wckeys: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            admin_uid: 0,
            track_fairshare: default_track_fairshare(),
            private_usage: false,
            state_dir: default_state_dir(),
            cache_associations: default_cache_table(),
            cache_qos: default_cache_table(),
            cache_users: default_cache_table(),
            cache_wckeys: default_cache_table(),
            enforce_associations: false,
            enforce_qos: false,
            enforce_users: false,
            enforce_wckeys: false,
        }
    }
}

impl RegistrySettings {
    /// Load settings from an optional TOML file plus the environment
    /// overlay; the environment has the highest priority.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        match config_path {
            Some(path) => {
                builder = builder.add_source(File::with_name(path).required(true));
            }
            None => {
                builder = builder.add_source(File::with_name("config/assoc_registry").required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ASSOC_REGISTRY")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: RegistrySettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Which tables the registry keeps cached at all.
    pub fn cache_flags(&self) -> TableFlags {
        let mut flags = TableFlags::empty();
        if self.cache_associations {
            flags |= TableFlags::ASSOCIATIONS;
        }
        if self.cache_qos {
            flags |= TableFlags::QOS;
        }
        if self.cache_users {
            flags |= TableFlags::USERS;
        }
        if self.cache_wckeys {
            flags |= TableFlags::WCKEYS;
        }
        flags
    }

    /// Which tables are fatal when empty or unavailable.
    pub fn enforce_flags(&self) -> TableFlags {
        let mut flags = TableFlags::empty();
        if self.enforce_associations {
            flags |= TableFlags::ASSOCIATIONS;
        }
        if self.enforce_qos {
            flags |= TableFlags::QOS;
        }
        if self.enforce_users {
            flags |= TableFlags::USERS;
        }
        if self.enforce_wckeys {
            flags |= TableFlags::WCKEYS;
        }
        flags
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "state_dir must not be empty".into(),
            )));
        }

        let enforced_but_uncached = self.enforce_flags() - self.cache_flags();
        if !enforced_but_uncached.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "a table cannot be enforced while its cache is disabled".into(),
            )));
        }

        Ok(())
    }
}

fn default_track_fairshare() -> bool {
    true
}

fn default_cache_table() -> bool {
    true
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
