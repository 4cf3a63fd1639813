use std::sync::Arc;

use super::*;
use crate::test_utils::MapUidResolver;
use crate::test_utils::StubConnector;

#[test]
fn test_build_with_default_settings() {
    let registry = RegistryBuilder::new(
        Arc::new(StubConnector::default()),
        Arc::new(MapUidResolver::default()),
    )
    .build()
    .unwrap();

    assert_eq!(registry.mode(), CacheMode::Live);
    assert!(registry.assocs.lock().is_none());
    assert!(registry.qos.lock().is_none());
    assert!(registry.users.lock().is_none());
    assert!(registry.wckeys.lock().is_none());
}

#[test]
fn test_build_rejects_invalid_settings() {
    let settings = crate::RegistrySettings {
        cache_qos: false,
        enforce_qos: true,
        ..crate::RegistrySettings::default()
    };
    let result = RegistryBuilder::new(
        Arc::new(StubConnector::default()),
        Arc::new(MapUidResolver::default()),
    )
    .with_settings(settings)
    .build();

    assert!(result.is_err());
}
