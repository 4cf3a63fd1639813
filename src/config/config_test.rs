use serial_test::serial;
use temp_env::with_vars;

use super::*;

fn cleanup_registry_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("ASSOC_REGISTRY__") {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_settings_should_initialize_with_hardcoded_values() {
    let settings = RegistrySettings::default();

    assert_eq!(settings.cluster_name, "");
    assert!(settings.track_fairshare);
    assert!(!settings.private_usage);
    assert_eq!(settings.state_dir, PathBuf::from("state"));
    assert_eq!(settings.cache_flags(), TableFlags::all());
    assert!(settings.enforce_flags().is_empty());
}

#[test]
#[serial]
fn load_should_merge_environment_overrides() {
    cleanup_registry_env_vars();
    with_vars(
        vec![
            ("ASSOC_REGISTRY__CLUSTER_NAME", Some("cluster9")),
            ("ASSOC_REGISTRY__ENFORCE_ASSOCIATIONS", Some("true")),
        ],
        || {
            let settings = RegistrySettings::load(None).unwrap();

            assert_eq!(settings.cluster_name, "cluster9");
            assert!(settings.enforce_flags().covers(CacheTable::Associations));
            assert!(!settings.enforce_flags().covers(CacheTable::Qos));
        },
    );
}

#[test]
#[serial]
fn load_should_read_explicit_toml_file() {
    cleanup_registry_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("registry.toml");

    std::fs::write(
        &config_path,
        r#"
        cluster_name = "cluster2"
        track_fairshare = false
        cache_wckeys = false
        state_dir = "/var/spool/registry"
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let settings = RegistrySettings::load(config_path.to_str()).unwrap();

        assert_eq!(settings.cluster_name, "cluster2");
        assert!(!settings.track_fairshare);
        assert!(!settings.cache_flags().covers(CacheTable::Wckeys));
        assert_eq!(settings.state_dir, PathBuf::from("/var/spool/registry"));
    });
}

#[test]
fn validation_should_reject_enforced_but_uncached_table() {
    let settings = RegistrySettings {
        cache_users: false,
        enforce_users: true,
        ..RegistrySettings::default()
    };
    assert!(settings.validate().is_err());
}

#[test]
fn validation_should_reject_empty_state_dir() {
    let settings = RegistrySettings {
        state_dir: PathBuf::new(),
        ..RegistrySettings::default()
    };
    assert!(settings.validate().is_err());
}

#[test]
fn table_flags_cover_their_tables() {
    assert!(TableFlags::ASSOCIATIONS.covers(CacheTable::Associations));
    assert!(!TableFlags::ASSOCIATIONS.covers(CacheTable::Users));
    assert_eq!(
        TableFlags::for_table(CacheTable::Wckeys),
        TableFlags::WCKEYS
    );
}
