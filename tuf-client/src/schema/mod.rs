// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::used_underscore_binding)]

//! The TUF data model: the four signed role documents, their shared envelope, and the
//! delegation graph that connects them.
//!
//! Signature verification is deliberately tied to the exact bytes a role was transmitted in.
//! [`Signed`]'s `Deserialize` impl captures the `signed` object's wire bytes verbatim (via
//! [`serde_json::value::RawValue`]) before any typed parsing happens, and it is those captured
//! bytes — never a re-serialization — that [`Root::verify_role`] and [`Delegations::verify_role`]
//! hand to the crypto oracle in [`crate::schema::key`]. A role that canonicalizes differently than
//! its signer did would otherwise verify against the wrong bytes and silently fail closed; instead
//! it verifies against what was actually signed.

mod de;
pub mod decoded;
mod error;
mod iter;
pub mod key;
mod spki;
mod verify;

pub use crate::schema::error::{Error, Result};

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::iter::KeysIter;
use crate::schema::key::Key;
use globset::GlobBuilder;
use chrono::{DateTime, Utc};
use aws_lc_rs::digest::{digest, SHA256};
use olpc_cjson::CanonicalFormatter;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use serde_plain::{forward_display_to_serde, forward_from_str_to_serde};
use snafu::ensure;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;

/// A digest map, e.g. `{"sha256": "...", "sha512": "..."}`, as found on `TimeSnap` and `Target`
/// entries. Verification requires every algorithm present to match; an empty map is invalid on a
/// `Target` but permitted on a `TimeSnap` (a `TimeSnap` with no `hashes` relies on `version` alone
/// to disambiguate, per TUF 4.4/4.6).
pub type DigestMap = HashMap<String, Decoded<Hex>>;

/// The type of metadata role.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RoleType {
    /// The root role delegates trust to specific keys trusted for all other top-level roles.
    Root,
    /// The snapshot role signs a metadata file that enumerates the current version of every
    /// targets document (top-level and delegated) in the repository.
    Snapshot,
    /// The targets role's signature indicates which target files are trusted by clients.
    Targets,
    /// The timestamp role limits the amount of time a client can be kept unaware of rollback or
    /// freeze by requiring a short-lived pointer to the current snapshot.
    Timestamp,
}

forward_display_to_serde!(RoleType);
forward_from_str_to_serde!(RoleType);

/// Common trait implemented by all four top-level roles.
pub trait Role: Serialize {
    /// The type of role this object represents.
    const TYPE: RoleType;

    /// The name used in error messages and in the unknown-field check below; distinct from
    /// `TYPE`'s `Display` so that delegated targets roles (which share `Targets::TYPE`) can still
    /// be identified by their delegation name at the call site.
    const NAME: &'static str;

    /// The set of top-level field names this role's JSON object may legally carry, `_type`
    /// included. Anything else present on the wire is rejected by [`Signed`]'s `Deserialize` impl
    /// rather than silently folded into an `_extra` bucket — deserializing a role is the one place
    /// the unknown-field check in spec terms must run, since after that point the bytes that were
    /// actually signed are gone and only the typed structure remains.
    const FIELDS: &'static [&'static str];

    /// Determines when metadata should be considered expired and no longer trusted by clients.
    fn expires(&self) -> DateTime<Utc>;

    /// An integer greater than 0. Clients MUST NOT replace a metadata file with a version number
    /// less than the one currently trusted.
    fn version(&self) -> NonZeroU64;

    /// A deterministic JSON serialization, used by tests and by callers that need to recompute a
    /// digest over an in-memory role rather than over its captured wire bytes.
    fn canonical_form(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut data, CanonicalFormatter::new());
        self.serialize(&mut ser).map_err(|e| error::Error::JsonSerialization {
            what: "role",
            message: e.to_string(),
        })?;
        Ok(data)
    }
}

fn check_known_fields(what: &'static str, value: &Value, fields: &'static [&'static str]) -> Result<()> {
    if let Value::Object(map) = value {
        for key in map.keys() {
            ensure!(
                fields.contains(&key.as_str()),
                error::UnknownFieldSnafu {
                    what,
                    field: key.clone(),
                }
            );
        }
    }
    Ok(())
}

/// A signed metadata object: the role's body plus the signatures over it, and the exact bytes of
/// the `"signed"` object as received on the wire.
#[derive(Debug, Clone)]
pub struct Signed<T> {
    /// The role that is signed.
    pub signed: T,
    /// A list of signatures and the key IDs that produced them.
    pub signatures: Vec<Signature>,
    /// The raw bytes of the `"signed"` JSON object, captured before any typed parsing. This is
    /// what signatures are verified against, never a re-encoding of `signed`.
    pub canonical_bytes: Vec<u8>,
}

impl<'de, T> Deserialize<'de> for Signed<T>
where
    T: Role + serde::de::DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Envelope {
            signed: Box<RawValue>,
            signatures: Vec<Signature>,
        }

        let envelope = Envelope::deserialize(deserializer)?;
        let canonical_bytes = envelope.signed.get().as_bytes().to_vec();
        let value: Value = serde_json::from_str(envelope.signed.get()).map_err(D::Error::custom)?;
        check_known_fields(T::NAME, &value, T::FIELDS).map_err(D::Error::custom)?;
        let signed: T = serde_json::from_value(value).map_err(D::Error::custom)?;
        Ok(Signed {
            signed,
            signatures: envelope.signatures,
            canonical_bytes,
        })
    }
}

impl<T: Serialize> Serialize for Signed<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Envelope<'a, T> {
            signed: &'a T,
            signatures: &'a Vec<Signature>,
        }
        Envelope {
            signed: &self.signed,
            signatures: &self.signatures,
        }
        .serialize(serializer)
    }
}

/// A signature and the key ID that made it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Signature {
    /// The key ID (listed in root.json) that made this signature.
    pub keyid: Decoded<Hex>,
    /// The signature itself, over the role's canonical bytes.
    pub sig: Decoded<Hex>,
}

/// Verifies `signed` against `keys`/`role_keys`: every signature whose `keyid` both belongs to
/// `role_keys` and verifies under the corresponding key counts once (a repeated `keyid` counts
/// only the first time), and the total must meet `role_keys.threshold`.
fn verify_signed<T: Role>(
    keys: &HashMap<Decoded<Hex>, Key>,
    role_keys: &RoleKeys,
    signed: &Signed<T>,
) -> Result<()> {
    let mut seen = HashSet::new();
    let mut valid: u64 = 0;
    for sig in &signed.signatures {
        if !role_keys.keyids.contains(&sig.keyid) {
            continue;
        }
        if !seen.insert(sig.keyid.clone()) {
            continue;
        }
        if let Some(key) = keys.get(&sig.keyid) {
            if key.verify(&signed.canonical_bytes, &sig.sig)? {
                valid += 1;
            }
        }
    }
    ensure!(
        valid >= role_keys.threshold.get(),
        error::SignatureThresholdSnafu {
            what: T::NAME,
            have: valid,
            need: role_keys.threshold.get(),
        }
    );
    Ok(())
}

/// True for strings matching `^[0-9a-z-]+$`, the grammar a delegated role's `name` must follow.
fn valid_role_name(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase() || b == b'-')
}

/// True for strings matching `^[\w\-*.]+(/[\w\-*.]+)*$`, the grammar a delegated path pattern must
/// follow: one or more `/`-separated segments, each built from word characters, `-`, `*`, or `.`.
fn valid_path_pattern(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split('/').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '*' || c == '.')
    })
}

/// Checks that `spec_version`'s leading component (before the first `.`) is exactly `1`.
fn check_spec_version(spec_version: &str) -> Result<()> {
    let major = spec_version.split('.').next().unwrap_or_default();
    ensure!(
        major == "1",
        error::UnsupportedSpecVersionSnafu {
            spec_version: spec_version.to_string(),
        }
    );
    Ok(())
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// TUF 4.3: root.json is signed by the root role's keys. It indicates which keys are authorized
/// for all top-level roles, including root itself. Revocation and replacement of top-level role
/// keys is done by changing the keys listed for the roles in this file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "root")]
pub struct Root {
    /// The version of the TUF specification this document follows. Only major version 1 is
    /// accepted.
    pub spec_version: String,

    /// Whether the repository supports consistent snapshots. When `true`, targets and
    /// non-timestamp metadata filenames are prefixed with a version number or content digest.
    pub consistent_snapshot: bool,

    /// An integer greater than 0. Clients MUST NOT replace a metadata file with a version number
    /// less than the one currently trusted.
    pub version: NonZeroU64,

    /// When this document should be considered expired.
    pub expires: DateTime<Utc>,

    /// Every key referenced by `roles`, keyed by its own computed key ID.
    #[serde(deserialize_with = "de::deserialize_keys")]
    pub keys: HashMap<Decoded<Hex>, Key>,

    /// The key IDs and signature threshold for each of the four top-level roles.
    pub roles: HashMap<RoleType, RoleKeys>,

    /// Fields this parser does not recognize; preserved so the envelope round-trips exactly for
    /// anything that re-serializes it (tests, caching), though the unknown-field check in
    /// [`Signed`]'s `Deserialize` impl never lets this be non-empty for a role actually loaded off
    /// the wire.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

/// The key IDs used for a role and the threshold of signatures required to validate it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RoleKeys {
    /// The key IDs authorized for the role.
    pub keyids: Vec<Decoded<Hex>>,

    /// The number of distinct, valid signatures required.
    pub threshold: NonZeroU64,

    /// Fields this parser does not recognize.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Root {
    /// An iterator over the keys authorized for `role`.
    pub fn keys(&self, role: RoleType) -> impl Iterator<Item = &Key> {
        KeysIter {
            keyids_iter: match self.roles.get(&role) {
                Some(role_keys) => role_keys.keyids.iter(),
                None => [].iter(),
            },
            keys: &self.keys,
        }
    }

    /// Checks `spec_version` and that all four top-level roles are present in `roles`.
    pub fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)?;
        for role in [RoleType::Root, RoleType::Snapshot, RoleType::Targets, RoleType::Timestamp] {
            ensure!(
                self.roles.contains_key(&role),
                error::MissingFieldSnafu {
                    what: "root",
                    field: "roles",
                }
            );
        }
        Ok(())
    }

    /// Verifies `role`'s signatures against this root's `KeyThreshold` for `T::TYPE` (§4.1, §4.6).
    /// Used both for a root verifying a freshly fetched root (self-consistency, or during a
    /// rotation) and for a root verifying the timestamp/snapshot/top-level-targets documents it
    /// delegates to directly.
    pub fn verify_role<T: Role>(&self, role: &Signed<T>) -> Result<()> {
        let role_keys = self
            .roles
            .get(&T::TYPE)
            .ok_or_else(|| error::Error::RoleNotFound {
                name: T::NAME.to_string(),
            })?;
        verify_signed(&self.keys, role_keys, role)
    }
}

impl Role for Root {
    const TYPE: RoleType = RoleType::Root;
    const NAME: &'static str = "root";
    const FIELDS: &'static [&'static str] = &[
        "_type",
        "spec_version",
        "consistent_snapshot",
        "version",
        "expires",
        "keys",
        "roles",
    ];

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// TUF 4.4: snapshot.json is signed by the snapshot role. It lists the version number (and
/// optionally length/hashes) of the top-level targets document and every delegated targets
/// document.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "snapshot")]
pub struct Snapshot {
    /// The version of the TUF specification this document follows.
    pub spec_version: String,

    /// An integer greater than 0. Clients MUST NOT replace a metadata file with a version number
    /// less than the one currently trusted.
    pub version: NonZeroU64,

    /// When this document should be considered expired.
    pub expires: DateTime<Utc>,

    /// METAPATH (a targets document's repository-relative path) to its `TimeSnap` entry.
    pub meta: HashMap<String, TimeSnap>,

    /// Fields this parser does not recognize.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

/// A pointer to a versioned metadata file, used both for each entry of `snapshot.json`'s `meta`
/// map and for `timestamp.json`'s lone pointer at the current snapshot. `length`/`hashes` are
/// optional: when absent, `version` alone must disambiguate the referenced file (relying on
/// consistent-snapshot naming), and a caller applying the global download-size ceiling for that
/// document's role in their place (§9).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TimeSnap {
    /// An integer greater than 0. Clients MUST NOT replace a metadata file with a version number
    /// less than the one currently trusted.
    pub version: NonZeroU64,

    /// The length in bytes of the referenced file, if advertised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,

    /// One or more digests of the referenced file, if advertised. Every algorithm present must
    /// match the downloaded bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<DigestMap>,

    /// Fields this parser does not recognize.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Role for Snapshot {
    const TYPE: RoleType = RoleType::Snapshot;
    const NAME: &'static str = "snapshot";
    const FIELDS: &'static [&'static str] = &["_type", "spec_version", "version", "expires", "meta"];

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }
}

impl Snapshot {
    /// Checks `spec_version`.
    pub fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// TUF 4.5: targets.json (and every delegated targets document) is signed by its role. It lists
/// the target files that role vouches for directly, plus an optional delegation to further roles.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "targets")]
pub struct Targets {
    /// The version of the TUF specification this document follows.
    pub spec_version: String,

    /// An integer greater than 0. Clients MUST NOT replace a metadata file with a version number
    /// less than the one currently trusted.
    pub version: NonZeroU64,

    /// When this document should be considered expired.
    pub expires: DateTime<Utc>,

    /// TARGETPATH (a path relative to the targets base URL) to `TargetFile` metadata.
    pub targets: HashMap<String, Target>,

    /// The roles this document delegates some or all of its targets to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,

    /// Fields this parser does not recognize.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

/// TUF 4.5 `TARGETS` entry: length, digests, and opaque application-defined metadata for one
/// target file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Target {
    /// The length in bytes of the target file.
    pub length: u64,

    /// One or more digests of the target file. Every algorithm present must match the downloaded
    /// bytes.
    pub hashes: DigestMap,

    /// Opaque metadata made available to the caller of [`crate::Repository::get`] without
    /// interpretation by this crate.
    #[serde(default)]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, Value>,

    /// Fields this parser does not recognize.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Target {
    /// Checks that at least one digest algorithm was advertised (TUF requires `hashes` be a
    /// non-empty mapping).
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.hashes.is_empty(),
            error::MissingFieldSnafu {
                what: "target",
                field: "hashes",
            }
        );
        Ok(())
    }
}

impl Role for Targets {
    const TYPE: RoleType = RoleType::Targets;
    const NAME: &'static str = "targets";
    const FIELDS: &'static [&'static str] =
        &["_type", "spec_version", "version", "expires", "targets", "delegations"];

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }
}

impl Targets {
    /// Checks `spec_version`, every listed target's hashes, and (if present) this document's own
    /// delegation graph.
    pub fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)?;
        for target in self.targets.values() {
            target.validate()?;
        }
        if let Some(delegations) = &self.delegations {
            delegations.validate()?;
        }
        Ok(())
    }

    /// The target file named `target_name`, if this document lists it directly (not recursing
    /// into delegations — the caller, [`crate::Repository`], walks the delegation graph itself so
    /// it can apply a visit budget).
    pub fn target(&self, target_name: &str) -> Option<&Target> {
        self.targets.get(target_name)
    }
}

/// Delegations found in a targets document.
/// TUF 4.5: `DELEGATIONS` is an object of the form:
/// ```text
/// { "keys" : { KEYID : KEY, ... },
///   "roles" : [{ "name": ROLENAME, "keyids" : [ KEYID, ... ], "threshold" : THRESHOLD,
///                ("path_hash_prefixes" : [ HEX_DIGEST, ... ] | "paths" : [ PATHPATTERN, ... ]),
///                "terminating": TERMINATING }, ... ] }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Delegations {
    /// The public keys that may sign delegated targets documents named in `roles`.
    #[serde(deserialize_with = "de::deserialize_keys")]
    pub keys: HashMap<Decoded<Hex>, Key>,

    /// The delegated roles, in the order they must be visited (pre-order depth-first, per
    /// delegation precedence).
    pub roles: Vec<DelegatedRole>,
}

/// One role delegated by a targets document.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DelegatedRole {
    /// The name of the delegated role, matching `^[0-9a-z-]+$`.
    pub name: String,

    /// The key IDs authorized to sign this role's document.
    pub keyids: Vec<Decoded<Hex>>,

    /// The number of distinct, valid signatures required.
    pub threshold: NonZeroU64,

    /// The target paths this role is trusted to vouch for.
    #[serde(flatten)]
    pub paths: PathSet,

    /// If `true`, a delegation chain that reaches this role without finding the target stops here
    /// rather than continuing to sibling delegations.
    pub terminating: bool,
}

/// The target paths a delegated role controls, expressed either as glob patterns or as path-hash
/// prefixes (for splitting a large target set into roughly even bins without listing every path).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum PathSet {
    /// Shell-style glob patterns. `*` does not cross a `/`; a target must match at least one
    /// pattern in every delegation along the chain that leads to it.
    #[serde(rename = "paths")]
    Paths(Vec<String>),

    /// Hex-string prefixes of a target path's own SHA-256 digest.
    #[serde(rename = "path_hash_prefixes")]
    PathHashPrefixes(Vec<String>),
}

impl PathSet {
    /// Whether `target` falls within this path set.
    pub fn matched_target(&self, target: &str) -> bool {
        match self {
            Self::Paths(paths) => paths.iter().any(|p| Self::matched_path(p, target)),
            Self::PathHashPrefixes(prefixes) => {
                prefixes.iter().any(|prefix| Self::matched_prefix(prefix, target))
            }
        }
    }

    fn matched_prefix(prefix: &str, target: &str) -> bool {
        let hash = digest(&SHA256, target.as_bytes());
        hex::encode(hash.as_ref()).starts_with(prefix)
    }

    fn matched_path(pattern: &str, target: &str) -> bool {
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => glob.compile_matcher().is_match(target),
            Err(_) => false,
        }
    }

    /// Validates each entry's grammar: `paths` entries must match
    /// `^[\w\-*.]+(/[\w\-*.]+)*$`; `path_hash_prefixes` entries are unconstrained hex-ish strings
    /// (TUF does not fix their length, since a bin scheme may use any prefix length).
    fn validate(&self) -> Result<()> {
        if let Self::Paths(paths) = self {
            for path in paths {
                ensure!(
                    valid_path_pattern(path),
                    error::InvalidPathPatternSnafu {
                        pattern: path.clone(),
                    }
                );
            }
        }
        Ok(())
    }
}

impl Delegations {
    /// The delegated role named `role_name`, if any.
    pub fn role(&self, role_name: &str) -> Option<&DelegatedRole> {
        self.roles.iter().find(|role| role.name == role_name)
    }

    /// Checks role name/path-pattern grammar, uniqueness of role names, and verifies every key
    /// referenced by a role actually appears in `keys` (this is already guaranteed not to produce
    /// a dangling reference at signature-verification time, since [`verify_signed`] simply won't
    /// find the key and the signature won't count, but failing fast here gives a clearer error).
    pub fn validate(&self) -> Result<()> {
        let mut seen_names = HashSet::new();
        for role in &self.roles {
            ensure!(
                valid_role_name(&role.name),
                error::InvalidRoleNameSnafu {
                    name: role.name.clone(),
                }
            );
            ensure!(
                seen_names.insert(role.name.clone()),
                error::DuplicateDelegatedRoleSnafu {
                    name: role.name.clone(),
                }
            );
            role.paths.validate()?;
        }
        Ok(())
    }

    /// Verifies `role`'s signatures against the named delegated role's `KeyThreshold` within this
    /// `Delegations` (§4.1, §4.6).
    pub fn verify_role(&self, role: &Signed<Targets>, name: &str) -> Result<()> {
        let delegated = self.role(name).ok_or_else(|| error::Error::RoleNotFound {
            name: name.to_string(),
        })?;
        verify_signed(&self.keys, &delegated.keys(), role)
    }
}

impl DelegatedRole {
    /// This role's key IDs and threshold, in `RoleKeys` form.
    pub fn keys(&self) -> RoleKeys {
        RoleKeys {
            keyids: self.keyids.clone(),
            threshold: self.threshold,
            _extra: HashMap::new(),
        }
    }

    /// Whether a prospective child delegation's own `paths` all fall within this role's scope
    /// (TUF's delegation-chain narrowing rule: a target must be matched by every role along the
    /// chain that leads to it, not just the last one).
    pub fn covers(&self, child_paths: &PathSet) -> Result<()> {
        let paths = match child_paths {
            PathSet::Paths(paths) | PathSet::PathHashPrefixes(paths) => paths,
        };
        for path in paths {
            ensure!(
                self.paths.matched_target(path),
                error::UnmatchedPathSnafu { child: path.clone() }
            );
        }
        Ok(())
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// TUF 4.6: timestamp.json is signed by the timestamp key. It points at the latest snapshot
/// version and is re-signed frequently to bound how long a client can be kept on stale metadata.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "_type")]
#[serde(rename = "timestamp")]
pub struct Timestamp {
    /// The version of the TUF specification this document follows.
    pub spec_version: String,

    /// An integer greater than 0. Clients MUST NOT replace a metadata file with a version number
    /// less than the one currently trusted.
    pub version: NonZeroU64,

    /// When this document should be considered expired.
    pub expires: DateTime<Utc>,

    /// Exactly one entry, keyed by `"snapshot.json"`, describing the current snapshot.
    pub meta: HashMap<String, TimeSnap>,

    /// Fields this parser does not recognize.
    #[serde(flatten)]
    #[serde(deserialize_with = "de::extra_skip_type")]
    pub _extra: HashMap<String, Value>,
}

impl Role for Timestamp {
    const TYPE: RoleType = RoleType::Timestamp;
    const NAME: &'static str = "timestamp";
    const FIELDS: &'static [&'static str] = &["_type", "spec_version", "version", "expires", "meta"];

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn version(&self) -> NonZeroU64 {
        self.version
    }
}

impl Timestamp {
    /// Checks `spec_version` and that `meta` contains an entry for `"snapshot.json"`.
    pub fn validate(&self) -> Result<()> {
        check_spec_version(&self.spec_version)?;
        ensure!(
            self.meta.contains_key("snapshot.json"),
            error::MissingFieldSnafu {
                what: "timestamp",
                field: "meta",
            }
        );
        Ok(())
    }

    /// The `TimeSnap` pointer at the current `snapshot.json`.
    pub fn snapshot_meta(&self) -> Option<&TimeSnap> {
        self.meta.get("snapshot.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_name_grammar() {
        assert!(valid_role_name("foo-bar"));
        assert!(valid_role_name("abc123"));
        assert!(!valid_role_name("Foo"));
        assert!(!valid_role_name(""));
        assert!(!valid_role_name("foo_bar"));
    }

    #[test]
    fn path_pattern_grammar() {
        assert!(valid_path_pattern("targets/*.tgz"));
        assert!(valid_path_pattern("a/b/c-1.0.txt"));
        assert!(!valid_path_pattern(""));
        assert!(!valid_path_pattern("a//b"));
        assert!(!valid_path_pattern("a/b/"));
    }

    #[test]
    fn spec_version_major_must_be_one() {
        assert!(check_spec_version("1.0.0").is_ok());
        assert!(check_spec_version("1.20.0").is_ok());
        assert!(check_spec_version("2.0.0").is_err());
        assert!(check_spec_version("").is_err());
    }

    #[test]
    fn path_set_glob_does_not_cross_slash() {
        let paths = PathSet::Paths(vec!["targets/*.tgz".to_string()]);
        assert!(paths.matched_target("targets/foo.tgz"));
        assert!(!paths.matched_target("targets/nested/foo.tgz"));
    }

    #[test]
    fn signed_round_trips_without_leaking_canonical_bytes() {
        let json = r#"{
            "signed": {
                "_type": "timestamp",
                "spec_version": "1.0.0",
                "version": 1,
                "expires": "2030-01-01T00:00:00Z",
                "meta": {
                    "snapshot.json": { "version": 1 }
                }
            },
            "signatures": []
        }"#;
        let signed: Signed<Timestamp> = serde_json::from_str(json).unwrap();
        assert_eq!(signed.signed.version.get(), 1);
        assert!(signed.canonical_bytes.starts_with(b"{"));
        let out = serde_json::to_string(&signed).unwrap();
        assert!(!out.contains("canonical_bytes"));
    }

    #[test]
    fn signed_rejects_unknown_top_level_field() {
        let json = r#"{
            "signed": {
                "_type": "timestamp",
                "spec_version": "1.0.0",
                "version": 1,
                "expires": "2030-01-01T00:00:00Z",
                "meta": {},
                "bogus": true
            },
            "signatures": []
        }"#;
        let res: std::result::Result<Signed<Timestamp>, _> = serde_json::from_str(json);
        assert!(res.is_err());
    }
}
