//! # Volume Driver Integration Tests
//!
//! End-to-end volume flows through the public driver API, with the
//! in-memory secret store standing in for Vault and a mounter that keeps the
//! served filesystem in process.
//!
//! These tests verify:
//! - Create, mount, read, remove
//! - Duplicate creation leaves the original volume untouched
//! - Policy provisioning scopes the volume token
//! - Provisioning failures keep the volume with the start-up token
//! - Concurrent mounts of one volume start a single server
//! - Nested secrets are reachable one path component at a time
//! - Removing a mounted volume keeps serving it until shutdown

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::harness;
use docker_volume_vault::fs::{FsVariant, NodeKind};
use docker_volume_vault::ErrorKind;
use std::collections::HashMap;
use std::sync::Arc;

fn opts(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_create_mount_read_remove() {
    let h = harness(FsVariant::Enumerating);
    h.vault.insert("secret/foo", "bar");

    h.driver.create("db", HashMap::new()).await.unwrap();
    let mountpoint = h.driver.mount("db").await.unwrap();
    assert_eq!(mountpoint, h.root.path().join("db"));
    assert!(mountpoint.is_dir());

    let fs = h.mounter.filesystem(&mountpoint).unwrap();
    assert_eq!(fs.open_for_read("secret/foo").await.unwrap(), b"bar\n");

    h.driver.remove("db").unwrap();
    assert_eq!(
        h.driver.get("db").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_nested_secret_reachable_component_by_component() {
    let h = harness(FsVariant::Enumerating);
    h.vault.insert("secret/db/password", "hunter2");
    h.driver.create("db", HashMap::new()).await.unwrap();
    let mountpoint = h.driver.mount("db").await.unwrap();
    let fs = h.mounter.filesystem(&mountpoint).unwrap();

    for component in ["secret", "secret/db"] {
        assert_eq!(
            fs.attributes_of(component).await.unwrap().kind,
            NodeKind::Directory,
            "{component}"
        );
    }
    let password = fs.attributes_of("secret/db/password").await.unwrap();
    assert_eq!(password.kind, NodeKind::File);
    assert_eq!(fs.open_for_read("secret/db/password").await.unwrap(), b"hunter2\n");
}

#[tokio::test]
async fn test_removed_volume_keeps_serving_until_shutdown() {
    let h = harness(FsVariant::Enumerating);
    h.vault.insert("secret/foo", "bar");
    h.driver.create("db", HashMap::new()).await.unwrap();
    let mountpoint = h.driver.mount("db").await.unwrap();

    h.driver.remove("db").unwrap();
    let fs = h.mounter.filesystem(&mountpoint).expect("still served after remove");
    assert_eq!(fs.open_for_read("secret/foo").await.unwrap(), b"bar\n");

    h.driver.shutdown().await;
    assert!(h.mounter.filesystem(&mountpoint).is_none());
}

#[tokio::test]
async fn test_plain_variant_serves_bare_values() {
    let h = harness(FsVariant::Plain);
    h.vault.insert("secret/foo", "bar");

    h.driver.create("db", HashMap::new()).await.unwrap();
    let mountpoint = h.driver.mount("db").await.unwrap();
    let fs = h.mounter.filesystem(&mountpoint).unwrap();

    assert_eq!(fs.open_for_read("secret/foo").await.unwrap(), b"bar");
    assert_eq!(
        fs.attributes_of("secret").await.unwrap().kind,
        NodeKind::Directory
    );
    assert!(fs.list_directory("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_create_keeps_original() {
    let h = harness(FsVariant::Enumerating);
    h.driver
        .create("db", opts(&[("note", "first")]))
        .await
        .unwrap();

    let err = h
        .driver
        .create("db", opts(&[("policy-rules", "%%%")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(err.to_string(), "Volume db already exists");

    // The rejected create never reached Vault
    h.driver.mount("db").await.unwrap();
    assert_eq!(h.vault.connections(), vec!["s.root".to_string()]);
}

#[tokio::test]
async fn test_policy_rules_scope_the_volume_token() {
    let h = harness(FsVariant::Enumerating);
    let rules = "path \"secret/x/*\" {\n  capabilities = [\"read\"]\n}\n";

    h.driver
        .create("x", opts(&[("policy-rules", &STANDARD.encode(rules))]))
        .await
        .unwrap();
    h.driver.mount("x").await.unwrap();

    assert_eq!(h.vault.policy("docker-policy-x").as_deref(), Some(rules));
    let token = h.vault.connections().last().cloned().unwrap();
    assert_eq!(
        h.vault.token_policies(&token),
        Some(vec!["docker-policy-x".to_string()])
    );
}

#[tokio::test]
async fn test_policy_rules_from_file() {
    let h = harness(FsVariant::Enumerating);
    let file = h.root.path().join("db.hcl");
    std::fs::write(&file, "path \"secret/db\" {}").unwrap();

    h.driver
        .create(
            "db",
            opts(&[
                ("policy-rules", &format!("@{}", file.display())),
                ("policy-name", "db-readers"),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(
        h.vault.policy("db-readers").as_deref(),
        Some("path \"secret/db\" {}")
    );
}

#[tokio::test]
async fn test_provisioning_failure_keeps_start_up_token() {
    let h = harness(FsVariant::Enumerating);
    let missing = h.root.path().join("missing.hcl");

    let err = h
        .driver
        .create(
            "db",
            opts(&[("policy-rules", &format!("@{}", missing.display()))]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    h.driver.mount("db").await.unwrap();
    assert_eq!(h.vault.connections(), vec!["s.root".to_string()]);
}

#[tokio::test]
async fn test_concurrent_mounts_share_one_server() {
    let h = harness(FsVariant::Enumerating);
    h.driver.create("db", HashMap::new()).await.unwrap();

    let mounts: Vec<_> = (0..8)
        .map(|_| {
            let driver = Arc::clone(&h.driver);
            tokio::spawn(async move { driver.mount("db").await })
        })
        .collect();
    let mut mountpoints = Vec::new();
    for mount in mounts {
        mountpoints.push(mount.await.unwrap().unwrap());
    }

    assert!(mountpoints.iter().all(|m| *m == mountpoints[0]));
    assert_eq!(h.vault.connections().len(), 1);
}

#[tokio::test]
async fn test_unmount_stops_serving_and_remount_reconnects() {
    let h = harness(FsVariant::Enumerating);
    h.driver.create("db", HashMap::new()).await.unwrap();
    let mountpoint = h.driver.mount("db").await.unwrap();

    h.driver.unmount("db").await.unwrap();
    assert!(h.mounter.filesystem(&mountpoint).is_none());
    h.driver.unmount("db").await.unwrap();

    h.driver.mount("db").await.unwrap();
    assert!(h.mounter.filesystem(&mountpoint).is_some());
    assert_eq!(h.vault.connections().len(), 2);
}

#[tokio::test]
async fn test_secret_changes_are_visible_while_mounted() {
    let h = harness(FsVariant::Enumerating);
    h.vault.add_mount("secret/");
    h.driver.create("db", HashMap::new()).await.unwrap();
    let mountpoint = h.driver.mount("db").await.unwrap();
    let fs = h.mounter.filesystem(&mountpoint).unwrap();

    assert_eq!(
        fs.open_for_read("secret/rotating").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    h.vault.insert("secret/rotating", "v1");
    assert_eq!(fs.open_for_read("secret/rotating").await.unwrap(), b"v1\n");
    h.vault.insert("secret/rotating", "v2");
    assert_eq!(fs.open_for_read("secret/rotating").await.unwrap(), b"v2\n");

    let names: Vec<_> = fs
        .list_directory("/")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["secret"]);
}
