// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

// An integration test might want to use some, but not all, of the symbols herein. To do so would
// cause compiler warnings for unused code, so we suppress them, same as the teacher's own
// `tests/test_utils.rs`.
#![allow(unused)]

//! Builds small, fully self-signed TUF repositories on disk so the refresh pipeline can be driven
//! end to end through [`tuf_client::Repository`]'s public API, without a production signer or a
//! checked-in fixture repository.

use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{Ed25519KeyPair, KeyPair};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use tuf_client::schema::decoded::{Decoded, Hex};
use tuf_client::schema::key::{Ed25519Key, Ed25519Scheme, Key};
use tuf_client::schema::{
    DelegatedRole, Delegations, PathSet, Role, RoleKeys, RoleType, Root, Signature, Signed,
    Snapshot, Target, Targets, TimeSnap, Timestamp,
};

/// A generated Ed25519 key pair, its TUF key ID, and its `Key` metadata representation.
pub struct Signer {
    pub pair: Ed25519KeyPair,
    pub keyid: Decoded<Hex>,
    pub key: Key,
}

/// Generates a fresh Ed25519 signer. Every fixture repository uses freshly generated keys rather
/// than checked-in key material, since nothing here needs to be reproducible across runs.
pub fn new_signer() -> Signer {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
    let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
    let key = Key::Ed25519 {
        keyid_hash_algorithms: vec!["sha256".to_string(), "sha512".to_string()],
        keyval: Ed25519Key {
            public: Decoded::from(pair.public_key().as_ref().to_vec()),
            _extra: HashMap::new(),
        },
        scheme: Ed25519Scheme::Ed25519,
        _extra: HashMap::new(),
    };
    let keyid = key.key_id().expect("key id");
    Signer { pair, keyid, key }
}

/// `RoleKeys` authorizing a single signer at threshold 1.
pub fn solo_role_keys(signer: &Signer) -> RoleKeys {
    RoleKeys {
        keyids: vec![signer.keyid.clone()],
        threshold: NonZeroU64::new(1).unwrap(),
        _extra: HashMap::new(),
    }
}

/// Signs `role`'s canonical form with every signer in `signers` and embeds those exact canonical
/// bytes, unchanged, as the `"signed"` value of the wire document — not a re-serialization through
/// `serde_json`, whose `HashMap` field order could otherwise drift from what was actually signed.
pub fn sign_and_wrap<T: Role>(role: &T, signers: &[&Signer]) -> Vec<u8> {
    let canonical_bytes = role.canonical_form().unwrap();
    let signatures: Vec<Signature> = signers
        .iter()
        .map(|s| Signature {
            keyid: s.keyid.clone(),
            sig: Decoded::from(s.pair.sign(&canonical_bytes).as_ref().to_vec()),
        })
        .collect();
    let signatures_json = serde_json::to_string(&signatures).unwrap();
    let signed_text = String::from_utf8(canonical_bytes).unwrap();
    format!(r#"{{"signed":{signed_text},"signatures":{signatures_json}}}"#).into_bytes()
}

pub fn in_one_hour() -> DateTime<Utc> {
    Utc::now() + Duration::hours(1)
}

pub fn one_hour_ago() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

pub fn sha256_hex(data: &[u8]) -> Decoded<Hex> {
    Decoded::from(digest(&SHA256, data).as_ref().to_vec())
}

/// A minimal, single-key root trusting `signer` for all four top-level roles.
pub fn build_root(signer: &Signer, version: u64, expires: DateTime<Utc>) -> Root {
    let mut keys = HashMap::new();
    keys.insert(signer.keyid.clone(), signer.key.clone());
    let mut roles = HashMap::new();
    for role in [RoleType::Root, RoleType::Snapshot, RoleType::Targets, RoleType::Timestamp] {
        roles.insert(role, solo_role_keys(signer));
    }
    Root {
        spec_version: "1.0.0".to_string(),
        consistent_snapshot: true,
        version: NonZeroU64::new(version).unwrap(),
        expires,
        keys,
        roles,
        _extra: HashMap::new(),
    }
}

pub fn build_timestamp(version: u64, expires: DateTime<Utc>, snapshot_version: u64) -> Timestamp {
    let mut meta = HashMap::new();
    meta.insert(
        "snapshot.json".to_string(),
        TimeSnap { version: NonZeroU64::new(snapshot_version).unwrap(), length: None, hashes: None, _extra: HashMap::new() },
    );
    Timestamp {
        spec_version: "1.0.0".to_string(),
        version: NonZeroU64::new(version).unwrap(),
        expires,
        meta,
        _extra: HashMap::new(),
    }
}

pub fn build_snapshot(version: u64, expires: DateTime<Utc>, file_versions: &[(&str, u64)]) -> Snapshot {
    let mut meta = HashMap::new();
    for (name, v) in file_versions {
        meta.insert(
            (*name).to_string(),
            TimeSnap { version: NonZeroU64::new(*v).unwrap(), length: None, hashes: None, _extra: HashMap::new() },
        );
    }
    Snapshot { spec_version: "1.0.0".to_string(), version: NonZeroU64::new(version).unwrap(), expires, meta, _extra: HashMap::new() }
}

pub fn target_file(length: u64, digest: Decoded<Hex>) -> Target {
    let mut hashes = HashMap::new();
    hashes.insert("sha256".to_string(), digest);
    Target { length, hashes, custom: HashMap::new(), _extra: HashMap::new() }
}

pub fn build_targets(
    version: u64,
    expires: DateTime<Utc>,
    entries: Vec<(&str, Target)>,
    delegations: Option<Delegations>,
) -> Targets {
    let mut targets = HashMap::new();
    for (path, target) in entries {
        targets.insert(path.to_string(), target);
    }
    Targets { spec_version: "1.0.0".to_string(), version: NonZeroU64::new(version).unwrap(), expires, targets, delegations, _extra: HashMap::new() }
}

pub fn terminating_delegation(name: &str, signer: &Signer, pattern: &str, terminating: bool) -> (Decoded<Hex>, Key, DelegatedRole) {
    let role = DelegatedRole {
        name: name.to_string(),
        keyids: vec![signer.keyid.clone()],
        threshold: NonZeroU64::new(1).unwrap(),
        paths: PathSet::Paths(vec![pattern.to_string()]),
        terminating,
    };
    (signer.keyid.clone(), signer.key.clone(), role)
}

/// A freshly created temp directory laid out as `metadata/` + `targets/`, standing in for a
/// repository's HTTP origin server. Accessed only through `file://` URLs in these tests, since the
/// refresh pipeline never cares which `Transport` impl it's handed (§6).
pub struct ServerRepo {
    pub dir: tempfile::TempDir,
}

impl ServerRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("metadata")).unwrap();
        std::fs::create_dir_all(dir.path().join("targets")).unwrap();
        Self { dir }
    }

    pub fn metadata_url(&self) -> url::Url {
        url::Url::from_directory_path(self.dir.path().join("metadata")).unwrap()
    }

    pub fn targets_url(&self) -> url::Url {
        url::Url::from_directory_path(self.dir.path().join("targets")).unwrap()
    }

    pub fn write_metadata(&self, filename: &str, bytes: &[u8]) {
        std::fs::write(self.dir.path().join("metadata").join(filename), bytes).unwrap();
    }

    /// Writes `contents` under the consistent-snapshot hash-prefixed name `fetch_target` expects:
    /// `targets/<dirname>/<hexdigest>.<basename>`.
    pub fn write_target(&self, relpath: &str, contents: &[u8]) -> Decoded<Hex> {
        let digest = sha256_hex(contents);
        let (dirname, basename) = relpath.rsplit_once('/').map_or(("", relpath), |(d, b)| (d, b));
        let hashed_name = format!("{}.{}", hex::encode(&digest), basename);
        let target_dir = if dirname.is_empty() {
            self.dir.path().join("targets")
        } else {
            self.dir.path().join("targets").join(dirname)
        };
        std::fs::create_dir_all(&target_dir).unwrap();
        std::fs::write(target_dir.join(hashed_name), contents).unwrap();
        digest
    }
}

pub fn root_bytes(root: &Root, signer: &Signer) -> Vec<u8> {
    sign_and_wrap(root, &[signer])
}
