use std::sync::Arc;

use crate::model::AdminLevel;
use crate::model::Association;
use crate::model::AssocUsage;
use crate::model::Limit;
use crate::model::Qos;
use crate::model::User;
use crate::model::Wckey;
use crate::test_utils::assoc;
use crate::test_utils::qos;
use crate::test_utils::test_registry;
use crate::test_utils::user;
use crate::test_utils::wckey;
use crate::test_utils::MapUidResolver;
use crate::test_utils::StubConnector;
use crate::AssociationRegistry;
use crate::Error;

fn query_registry() -> AssociationRegistry {
    let mut partitioned = assoc(4, 2, "acct", Some("alice"), 5);
    partitioned.partition = Some("gpu".to_string());
    let connector = Arc::new(StubConnector::with_assocs(vec![
        assoc(1, 0, "root", None, 1),
        assoc(2, 1, "acct", None, 10),
        assoc(3, 2, "acct", Some("alice"), 5),
        partitioned,
    ]));
    *connector.users.lock() = vec![
        {
            let mut u = user("alice", 1000);
            u.default_account = Some("acct".to_string());
            u.coord_accounts = vec!["acct".to_string()];
            u
        },
        {
            let mut u = user("root", 0);
            u.admin_level = AdminLevel::Administrator;
            u
        },
    ];
    *connector.qos.lock() = vec![qos(5, "fast", 100)];
    *connector.wckeys.lock() = vec![wckey(7, "proj-x", "alice")];

    let resolver = Arc::new(MapUidResolver::new(&[("alice", 1000), ("root", 0)]));
    let registry = test_registry(connector, resolver);
    registry.init().unwrap();
    registry
}

/// Case 1: a partial carrying an id fills in everything by id.
#[test]
fn test_fill_in_association_by_id_case1() {
    let registry = query_registry();
    {
        let mut guard = registry.assocs.lock();
        let rec = guard.as_mut().unwrap().iter_mut().find(|a| a.id == 3).unwrap();
        rec.grp.jobs = Limit::Max(20);
    }

    let mut partial = Association {
        id: 3,
        ..Association::default()
    };
    assert!(registry.fill_in_association(&mut partial, false).unwrap());
    assert_eq!(partial.account, "acct");
    assert_eq!(partial.user.as_deref(), Some("alice"));
    assert_eq!(partial.grp.jobs, Limit::Max(20));
    assert_eq!(partial.parent_ref, Some(2));
    assert!(partial.shares_norm > 0.0);
}

/// Case 2: a keyless partial resolves user name and default account from
/// the uid before scanning.
#[test]
fn test_fill_in_association_resolves_identity_case2() {
    let registry = query_registry();

    let mut partial = Association {
        uid: Some(1000),
        ..Association::default()
    };
    assert!(registry.fill_in_association(&mut partial, false).unwrap());
    assert_eq!(partial.id, 3);
    assert_eq!(partial.user.as_deref(), Some("alice"));
    assert_eq!(partial.account, "acct");
}

/// Case 3: a partition-less record is a fallback match for a request
/// naming a partition with no exact record.
#[test]
fn test_fill_in_association_partition_fallback_case3() {
    let registry = query_registry();

    // Exact partition record exists and wins.
    let mut exact = Association {
        user: Some("alice".to_string()),
        account: "acct".to_string(),
        partition: Some("gpu".to_string()),
        ..Association::default()
    };
    assert!(registry.fill_in_association(&mut exact, false).unwrap());
    assert_eq!(exact.id, 4);

    // No record for this partition: the partition-less one serves it.
    let mut fallback = Association {
        user: Some("alice".to_string()),
        account: "acct".to_string(),
        partition: Some("batch".to_string()),
        ..Association::default()
    };
    assert!(registry.fill_in_association(&mut fallback, false).unwrap());
    assert_eq!(fallback.id, 3);
    // The caller's partition is left as given.
    assert_eq!(fallback.partition.as_deref(), Some("batch"));
}

/// Case 4: a miss is only an error under enforcement.
#[test]
fn test_fill_in_association_enforcement_case4() {
    let registry = query_registry();

    let mut partial = Association {
        user: Some("ghost".to_string()),
        account: "acct".to_string(),
        ..Association::default()
    };
    assert!(!registry.fill_in_association(&mut partial, false).unwrap());

    let err = registry
        .fill_in_association(&mut partial, true)
        .unwrap_err();
    assert!(matches!(err, Error::DataIntegrity(_)));
}

#[test]
fn test_fill_in_user_by_uid_and_name() {
    let registry = query_registry();

    let mut by_uid = User {
        uid: Some(1000),
        ..User::default()
    };
    assert!(registry.fill_in_user(&mut by_uid, false).unwrap());
    assert_eq!(by_uid.name, "alice");
    assert_eq!(by_uid.default_account.as_deref(), Some("acct"));

    let mut by_name = User {
        name: "ALICE".to_string(),
        ..User::default()
    };
    assert!(registry.fill_in_user(&mut by_name, false).unwrap());
    assert_eq!(by_name.uid, Some(1000));
}

/// A supplied QOS name must agree with the cached record's.
#[test]
fn test_fill_in_qos_name_must_match() {
    let registry = query_registry();

    let mut good = Qos {
        id: 5,
        name: "fast".to_string(),
        ..Qos::default()
    };
    assert!(registry.fill_in_qos(&mut good, false).unwrap());
    assert_eq!(good.priority, 100);

    let mut mismatched = Qos {
        id: 5,
        name: "slow".to_string(),
        ..Qos::default()
    };
    assert!(!registry.fill_in_qos(&mut mismatched, false).unwrap());
}

#[test]
fn test_fill_in_wckey_by_composite() {
    let registry = query_registry();

    let mut partial = Wckey {
        name: "proj-x".to_string(),
        user: "alice".to_string(),
        ..Wckey::default()
    };
    assert!(registry.fill_in_wckey(&mut partial, false).unwrap());
    assert_eq!(partial.id, 7);
}

#[test]
fn test_get_admin_level_unknown_user_is_not_set() {
    let registry = query_registry();
    assert_eq!(registry.get_admin_level(0), AdminLevel::Administrator);
    assert_eq!(registry.get_admin_level(4242), AdminLevel::NotSet);
}

#[test]
fn test_is_account_coordinator() {
    let registry = query_registry();
    assert!(registry.is_account_coordinator(1000, "acct"));
    assert!(!registry.is_account_coordinator(1000, "other"));
    assert!(!registry.is_account_coordinator(4242, "acct"));
}

#[test]
fn test_get_user_assocs_collects_both_records() {
    let registry = query_registry();
    let mut ids = registry.get_user_assocs(1000).unwrap();
    ids.sort_unstable();
    assert_eq!(ids, vec![3, 4]);
    assert!(registry.get_user_assocs(4242).unwrap().is_empty());
}

#[test]
fn test_validate_association_id() {
    let registry = query_registry();
    assert!(registry.validate_association_id(3, false).unwrap());
    assert!(!registry.validate_association_id(99, false).unwrap());
    assert!(registry.validate_association_id(99, true).is_err());
}

#[test]
fn test_clear_all_used_info_keeps_raw_usage() {
    let registry = query_registry();
    registry
        .add_assoc_usage(
            3,
            &AssocUsage {
                used_jobs: 2,
                usage_raw: 12.0,
                ..AssocUsage::default()
            },
        )
        .unwrap();

    registry.clear_all_used_info().unwrap();

    let guard = registry.assocs.lock();
    let rec = guard.as_ref().unwrap().iter().find(|a| a.id == 3).unwrap();
    assert_eq!(rec.usage.used_jobs, 0);
    assert_eq!(rec.usage.usage_raw, 12.0);
    drop(guard);

    registry.reset_all_raw_usage().unwrap();
    let guard = registry.assocs.lock();
    let rec = guard.as_ref().unwrap().iter().find(|a| a.id == 3).unwrap();
    assert_eq!(rec.usage.usage_raw, 0.0);
}

#[test]
fn test_add_assoc_usage_charges_ancestors() {
    let registry = query_registry();
    registry
        .add_assoc_usage(
            3,
            &AssocUsage {
                used_jobs: 1,
                usage_raw: 30.0,
                ..AssocUsage::default()
            },
        )
        .unwrap();

    let guard = registry.assocs.lock();
    let list = guard.as_ref().unwrap();
    assert_eq!(list.iter().find(|a| a.id == 2).unwrap().usage.usage_raw, 30.0);
    assert_eq!(list.iter().find(|a| a.id == 1).unwrap().usage.usage_raw, 30.0);
    drop(guard);

    let err = registry
        .add_assoc_usage(99, &AssocUsage::default())
        .unwrap_err();
    assert!(matches!(err, Error::DataIntegrity(_)));
}
