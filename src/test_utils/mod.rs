//! Shared fixtures for unit tests: a canned connector, a table-driven uid
//! resolver, a recording removal notifier and record builders.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connector::AcctConnector;
use crate::connector::AcctQuery;
use crate::connector::RemovedAssocNotifier;
use crate::connector::UidResolver;
use crate::errors::ConnectivityError;
use crate::model::Association;
use crate::model::CacheTable;
use crate::model::Qos;
use crate::model::User;
use crate::model::Wckey;
use crate::AssociationRegistry;
use crate::RegistryBuilder;
use crate::RegistrySettings;
use crate::Result;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Connector serving canned tables; flip `fail` to simulate an unreachable
/// database.
#[derive(Default)]
pub struct StubConnector {
    pub assocs: Mutex<Vec<Association>>,
    pub qos: Mutex<Vec<Qos>>,
    pub users: Mutex<Vec<User>>,
    pub wckeys: Mutex<Vec<Wckey>>,
    pub fail: Mutex<bool>,
}

impl StubConnector {
    pub fn with_assocs(assocs: Vec<Association>) -> Self {
        Self {
            assocs: Mutex::new(assocs),
            ..Self::default()
        }
    }

    pub fn set_fail(
        &self,
        fail: bool,
    ) {
        *self.fail.lock() = fail;
    }

    fn check(&self) -> Result<()> {
        if *self.fail.lock() {
            Err(ConnectivityError::FetchFailed {
                table: CacheTable::Associations,
            }
            .into())
        } else {
            Ok(())
        }
    }
}

impl AcctConnector for StubConnector {
    fn get_associations(
        &self,
        _uid: u32,
        _query: &AcctQuery,
    ) -> Result<Vec<Association>> {
        self.check()?;
        Ok(self.assocs.lock().clone())
    }

    fn get_qos(
        &self,
        _uid: u32,
        _query: &AcctQuery,
    ) -> Result<Vec<Qos>> {
        self.check()?;
        Ok(self.qos.lock().clone())
    }

    fn get_users(
        &self,
        _uid: u32,
        _query: &AcctQuery,
    ) -> Result<Vec<User>> {
        self.check()?;
        Ok(self.users.lock().clone())
    }

    fn get_wckeys(
        &self,
        _uid: u32,
        _query: &AcctQuery,
    ) -> Result<Vec<Wckey>> {
        self.check()?;
        Ok(self.wckeys.lock().clone())
    }
}

/// Uid resolver backed by a fixed name -> uid table.
#[derive(Default)]
pub struct MapUidResolver {
    map: HashMap<String, u32>,
}

impl MapUidResolver {
    pub fn new(entries: &[(&str, u32)]) -> Self {
        Self {
            map: entries
                .iter()
                .map(|(name, uid)| (name.to_string(), *uid))
                .collect(),
        }
    }
}

impl UidResolver for MapUidResolver {
    fn uid_for(
        &self,
        user_name: &str,
    ) -> Option<u32> {
        self.map.get(user_name).copied()
    }
}

/// Notifier that records the ids of removed associations.
#[derive(Default)]
pub struct RecordingNotifier {
    pub removed: Mutex<Vec<u32>>,
}

impl RemovedAssocNotifier for RecordingNotifier {
    fn notify(
        &self,
        assoc: &Association,
    ) {
        self.removed.lock().push(assoc.id);
    }
}

/// A registry over a stub connector, with fair-share tracking on and no
/// cluster scoping.
pub fn test_registry(
    connector: Arc<StubConnector>,
    uid_resolver: Arc<MapUidResolver>,
) -> AssociationRegistry {
    enable_logger();
    RegistryBuilder::new(connector, uid_resolver)
        .with_settings(RegistrySettings::default())
        .build()
        .expect("default settings must validate")
}

/// Shorthand association builder for tree fixtures.
pub fn assoc(
    id: u32,
    parent_id: u32,
    account: &str,
    user: Option<&str>,
    shares_raw: u32,
) -> Association {
    Association {
        id,
        parent_id,
        lft: id,
        cluster: "cluster1".to_string(),
        account: account.to_string(),
        user: user.map(str::to_string),
        shares_raw,
        ..Association::default()
    }
}

pub fn qos(
    id: u32,
    name: &str,
    priority: u32,
) -> Qos {
    Qos {
        id,
        name: name.to_string(),
        priority,
        ..Qos::default()
    }
}

pub fn user(
    name: &str,
    uid: u32,
) -> User {
    User {
        uid: Some(uid),
        name: name.to_string(),
        ..User::default()
    }
}

pub fn wckey(
    id: u32,
    name: &str,
    user_name: &str,
) -> Wckey {
    Wckey {
        id,
        name: name.to_string(),
        user: user_name.to_string(),
        cluster: "cluster1".to_string(),
        uid: None,
    }
}
