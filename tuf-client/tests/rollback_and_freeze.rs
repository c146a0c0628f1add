// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two attack scenarios driven through the public `Repository::get` entry point: a timestamp that
//! regresses the trusted snapshot pointer, and metadata that is simply already expired.

mod support;

use support::*;
use tuf_client::{FilesystemTransport, Repository, Settings};

fn base_settings<'a>(
    server: &'a ServerRepo,
    root_bytes: &'a [u8],
    targets_cache: &'a tempfile::TempDir,
) -> Settings<'a, &'a [u8]> {
    Settings {
        root: root_bytes,
        metadata_root_url: server.metadata_url().as_str(),
        targets_root_url: server.targets_url().as_str(),
        metadata_cache_dir: None,
        targets_cache_dir: targets_cache.path(),
        limits: tuf_client::Limits::default(),
        expiration_enforcement: tuf_client::ExpirationEnforcement::Safe,
    }
}

#[test]
fn timestamp_regressing_snapshot_pointer_is_rejected() {
    let signer = new_signer();
    let server = ServerRepo::new();

    let root = build_root(&signer, 1, in_one_hour());
    let root_bytes = root_bytes(&root, &signer);
    server.write_metadata("root.json", &root_bytes);

    let contents = b"first version contents";
    let digest = server.write_target("a/b.txt", contents);
    let targets = build_targets(
        5,
        in_one_hour(),
        vec![("a/b.txt", target_file(contents.len() as u64, digest))],
        None,
    );
    server.write_metadata("5.targets.json", &sign_and_wrap(&targets, &[&signer]));

    let snapshot = build_snapshot(5, in_one_hour(), &[("targets.json", 5)]);
    server.write_metadata("5.snapshot.json", &sign_and_wrap(&snapshot, &[&signer]));

    let timestamp_v1 = build_timestamp(1, in_one_hour(), 5);
    server.write_metadata("timestamp.json", &sign_and_wrap(&timestamp_v1, &[&signer]));

    let targets_cache = tempfile::tempdir().unwrap();
    let settings = base_settings(&server, &root_bytes, &targets_cache);
    let mut repo = Repository::load(FilesystemTransport, settings).unwrap();

    let found = repo.get("a/b.txt").unwrap();
    assert_eq!(std::fs::read(&found.local_path).unwrap(), contents);

    // A compromised or confused timestamp signer advances its own version (so the
    // version-monotonicity check alone would accept it) but points at an older snapshot.
    let timestamp_v2 = build_timestamp(2, in_one_hour(), 3);
    server.write_metadata("timestamp.json", &sign_and_wrap(&timestamp_v2, &[&signer]));

    let err = repo.get("a/b.txt").unwrap_err();
    assert!(matches!(
        err,
        tuf_client::Error::Rollback { role: tuf_client::schema::RoleType::Snapshot, .. }
    ));
}

#[test]
fn expired_timestamp_is_rejected_on_first_refresh() {
    let signer = new_signer();
    let server = ServerRepo::new();

    let root = build_root(&signer, 1, in_one_hour());
    let root_bytes = root_bytes(&root, &signer);
    server.write_metadata("root.json", &root_bytes);

    let targets = build_targets(1, in_one_hour(), vec![], None);
    server.write_metadata("1.targets.json", &sign_and_wrap(&targets, &[&signer]));

    let snapshot = build_snapshot(1, in_one_hour(), &[("targets.json", 1)]);
    server.write_metadata("1.snapshot.json", &sign_and_wrap(&snapshot, &[&signer]));

    // Already expired.
    let timestamp = build_timestamp(1, one_hour_ago(), 1);
    server.write_metadata("timestamp.json", &sign_and_wrap(&timestamp, &[&signer]));

    let targets_cache = tempfile::tempdir().unwrap();
    let settings = base_settings(&server, &root_bytes, &targets_cache);
    let mut repo = Repository::load(FilesystemTransport, settings).unwrap();

    let err = repo.get("a/b.txt").unwrap_err();
    assert!(matches!(
        err,
        tuf_client::Error::ExpiredMetadata { role: tuf_client::schema::RoleType::Timestamp, .. }
    ));
}

#[test]
fn expiration_enforcement_unsafe_bypasses_freeze_check() {
    let signer = new_signer();
    let server = ServerRepo::new();

    let root = build_root(&signer, 1, in_one_hour());
    let root_bytes = root_bytes(&root, &signer);
    server.write_metadata("root.json", &root_bytes);

    let contents = b"stale but explicitly trusted";
    let digest = server.write_target("a/b.txt", contents);
    let targets = build_targets(
        1,
        one_hour_ago(),
        vec![("a/b.txt", target_file(contents.len() as u64, digest))],
        None,
    );
    server.write_metadata("1.targets.json", &sign_and_wrap(&targets, &[&signer]));

    let snapshot = build_snapshot(1, one_hour_ago(), &[("targets.json", 1)]);
    server.write_metadata("1.snapshot.json", &sign_and_wrap(&snapshot, &[&signer]));

    let timestamp = build_timestamp(1, one_hour_ago(), 1);
    server.write_metadata("timestamp.json", &sign_and_wrap(&timestamp, &[&signer]));

    let targets_cache = tempfile::tempdir().unwrap();
    let mut settings = base_settings(&server, &root_bytes, &targets_cache);
    settings.expiration_enforcement = tuf_client::ExpirationEnforcement::Unsafe;
    let mut repo = Repository::load(FilesystemTransport, settings).unwrap();

    let found = repo.get("a/b.txt").unwrap();
    assert_eq!(std::fs::read(&found.local_path).unwrap(), contents);
}
