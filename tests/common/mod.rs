//! Shared fixtures for the integration suite: a canned database connector,
//! a table-driven uid resolver and record builders.

use std::collections::HashMap;
use std::sync::Arc;

use assoc_registry::AcctConnector;
use assoc_registry::AcctQuery;
use assoc_registry::AdminLevel;
use assoc_registry::Association;
use assoc_registry::AssociationRegistry;
use assoc_registry::CacheTable;
use assoc_registry::ConnectivityError;
use assoc_registry::Qos;
use assoc_registry::RegistryBuilder;
use assoc_registry::RegistrySettings;
use assoc_registry::Result;
use assoc_registry::UidResolver;
use assoc_registry::User;
use assoc_registry::Wckey;
use parking_lot::Mutex;

/// Connector serving canned tables; flip `fail` to simulate an unreachable
/// accounting database.
#[derive(Default)]
pub struct StubConnector {
    pub assocs: Mutex<Vec<Association>>,
    pub qos: Mutex<Vec<Qos>>,
    pub users: Mutex<Vec<User>>,
    pub wckeys: Mutex<Vec<Wckey>>,
    pub fail: Mutex<bool>,
}

impl StubConnector {
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

pub struct FixedUids {
    map: HashMap<String, u32>,
}

impl FixedUids {
    pub fn new(entries: &[(&str, u32)]) -> Self {
        Self {
            map: entries
                .iter()
                .map(|(name, uid)| (name.to_string(), *uid))
                .collect(),
        }
    }
}

impl UidResolver for FixedUids {
    fn uid_for(
        &self,
        user_name: &str,
    ) -> Option<u32> {
        self.map.get(user_name).copied()
    }
}

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

/// The reference tree used across the suite: root -> {acct(10), other(30)},
/// acct -> {alice(1), bob(3)}.
pub fn seeded_connector() -> Arc<StubConnector> {
    let connector = Arc::new(StubConnector::default());
    *connector.assocs.lock() = vec![
        assoc(1, 0, "root", None, 1),
        assoc(2, 1, "acct", None, 10),
        assoc(3, 1, "other", None, 30),
        assoc(4, 2, "acct", Some("alice"), 1),
        assoc(5, 2, "acct", Some("bob"), 3),
    ];
    *connector.users.lock() = vec![
        User {
            uid: Some(1000),
            name: "alice".to_string(),
            default_account: Some("acct".to_string()),
            admin_level: AdminLevel::None,
            ..User::default()
        },
        User {
            uid: Some(1001),
            name: "bob".to_string(),
            default_account: Some("acct".to_string()),
            admin_level: AdminLevel::None,
            ..User::default()
        },
    ];
    *connector.qos.lock() = vec![
        Qos {
            id: 5,
            name: "fast".to_string(),
            priority: 100,
            ..Qos::default()
        },
        Qos {
            id: 6,
            name: "slow".to_string(),
            priority: 10,
            ..Qos::default()
        },
    ];
    *connector.wckeys.lock() = vec![Wckey {
        id: 7,
        name: "proj-x".to_string(),
        user: "alice".to_string(),
        cluster: "cluster1".to_string(),
        uid: None,
    }];
    connector
}

pub fn resolver() -> Arc<FixedUids> {
    Arc::new(FixedUids::new(&[("alice", 1000), ("bob", 1001)]))
}

pub fn build_registry(
    connector: Arc<StubConnector>,
    settings: RegistrySettings,
) -> AssociationRegistry {
    RegistryBuilder::new(connector, resolver())
        .with_settings(settings)
        .build()
        .expect("settings must validate")
}
