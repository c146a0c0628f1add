// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delegation traversal: a terminating delegation that doesn't list the requested target must
//! stop the search, even when a later sibling delegation (matching the same path pattern) would
//! otherwise have satisfied the query.

mod support;

use support::*;
use std::collections::HashMap;
use tuf_client::schema::Delegations;
use tuf_client::{FilesystemTransport, Repository, Settings};

fn setup() -> (ServerRepo, Signer, tempfile::TempDir) {
    let top_signer = new_signer();
    let addon_signer = new_signer();
    let fallback_signer = new_signer();
    let server = ServerRepo::new();

    let root = build_root(&top_signer, 1, in_one_hour());
    server.write_metadata("root.json", &root_bytes(&root, &top_signer));

    let addon_contents = b"addon package";
    let addon_digest = server.write_target("pkgs/foo.tgz", addon_contents);
    let addon_targets = build_targets(
        1,
        in_one_hour(),
        vec![("pkgs/foo.tgz", target_file(addon_contents.len() as u64, addon_digest))],
        None,
    );
    server.write_metadata("1.addon.json", &sign_and_wrap(&addon_targets, &[&addon_signer]));

    let fallback_contents = b"fallback package";
    let fallback_digest = server.write_target("pkgs/missing.tgz", fallback_contents);
    let fallback_targets = build_targets(
        1,
        in_one_hour(),
        vec![("pkgs/missing.tgz", target_file(fallback_contents.len() as u64, fallback_digest))],
        None,
    );
    server.write_metadata("1.fallback.json", &sign_and_wrap(&fallback_targets, &[&fallback_signer]));

    let (addon_keyid, addon_key, addon_role) =
        terminating_delegation("addon", &addon_signer, "pkgs/*", true);
    let (fallback_keyid, fallback_key, fallback_role) =
        terminating_delegation("fallback", &fallback_signer, "pkgs/*", false);

    let mut keys = HashMap::new();
    keys.insert(addon_keyid, addon_key);
    keys.insert(fallback_keyid, fallback_key);
    let delegations = Delegations { keys, roles: vec![addon_role, fallback_role] };

    let top_targets = build_targets(1, in_one_hour(), vec![], Some(delegations));
    server.write_metadata("1.targets.json", &sign_and_wrap(&top_targets, &[&top_signer]));

    let snapshot = build_snapshot(
        1,
        in_one_hour(),
        &[("targets.json", 1), ("addon.json", 1), ("fallback.json", 1)],
    );
    server.write_metadata("1.snapshot.json", &sign_and_wrap(&snapshot, &[&top_signer]));

    let timestamp = build_timestamp(1, in_one_hour(), 1);
    server.write_metadata("timestamp.json", &sign_and_wrap(&timestamp, &[&top_signer]));

    let targets_cache = tempfile::tempdir().unwrap();
    (server, top_signer, targets_cache)
}

fn open_repo(server: &ServerRepo, signer: &Signer, targets_cache: &tempfile::TempDir) -> Repository<FilesystemTransport> {
    let root = build_root(signer, 1, in_one_hour());
    let settings = Settings {
        root: root_bytes(&root, signer).as_slice(),
        metadata_root_url: server.metadata_url().as_str(),
        targets_root_url: server.targets_url().as_str(),
        metadata_cache_dir: None,
        targets_cache_dir: targets_cache.path(),
        limits: tuf_client::Limits::default(),
        expiration_enforcement: tuf_client::ExpirationEnforcement::Safe,
    };
    Repository::load(FilesystemTransport, settings).unwrap()
}

#[test]
fn hit_in_first_matching_delegation_succeeds() {
    let (server, signer, targets_cache) = setup();
    let mut repo = open_repo(&server, &signer, &targets_cache);

    let found = repo.get("pkgs/foo.tgz").unwrap();
    assert_eq!(std::fs::read(&found.local_path).unwrap(), b"addon package");
    assert!(repo.all_targets().contains_key("addon"));
    assert!(!repo.all_targets().contains_key("fallback"));
}

#[test]
fn terminating_delegation_stops_search_before_fallback() {
    let (server, signer, targets_cache) = setup();
    let mut repo = open_repo(&server, &signer, &targets_cache);

    let err = repo.get("pkgs/missing.tgz").unwrap_err();
    assert!(matches!(err, tuf_client::Error::TargetNotFound { .. }));
    assert!(repo.all_targets().contains_key("addon"));
    assert!(!repo.all_targets().contains_key("fallback"));
}
