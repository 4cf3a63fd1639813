//! Builder for [`AssociationRegistry`].
//!
//! The database connector, uid resolver and optional removed-association
//! notifier are injected here, at construction time, instead of living in
//! process-wide statics. `build()` validates the settings and hands back a
//! registry with all four caches unloaded; call
//! [`AssociationRegistry::init`] to populate them.

use std::sync::Arc;

use parking_lot::Mutex;

use super::AssociationRegistry;
use super::CacheMode;
use crate::config::RegistrySettings;
use crate::connector::AcctConnector;
use crate::connector::RemovedAssocNotifier;
use crate::connector::UidResolver;
use crate::Result;

pub struct RegistryBuilder {
    settings: RegistrySettings,
    connector: Arc<dyn AcctConnector>,
    uid_resolver: Arc<dyn UidResolver>,
    notifier: Option<Arc<dyn RemovedAssocNotifier>>,
}

impl RegistryBuilder {
    pub fn new(
        connector: Arc<dyn AcctConnector>,
        uid_resolver: Arc<dyn UidResolver>,
    ) -> Self {
        Self {
            settings: RegistrySettings::default(),
            connector,
            uid_resolver,
            notifier: None,
        }
    }

    pub fn with_settings(
        mut self,
        settings: RegistrySettings,
    ) -> Self {
        self.settings = settings;
        self
    }

    /// Observer invoked before a "remove" delta detaches an association.
    pub fn with_notifier(
        mut self,
        notifier: Arc<dyn RemovedAssocNotifier>,
    ) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<AssociationRegistry> {
        self.settings.validate()?;

        Ok(AssociationRegistry {
            settings: self.settings,
            connector: self.connector,
            uid_resolver: self.uid_resolver,
            notifier: self.notifier,
            assocs: Mutex::new(None),
            qos: Mutex::new(None),
            users: Mutex::new(None),
            wckeys: Mutex::new(None),
            state_file_lock: Mutex::new(()),
            mode: Mutex::new(CacheMode::Live),
        })
    }
}
