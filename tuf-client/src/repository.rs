// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The repository engine: the refresh state machine (§4.6) that chains `trusted_root` forward,
//! re-derives `trusted_timestamp`/`trusted_snapshot`, and walks the delegated-targets graph to
//! resolve one relative target path. [`crate::Repository::get`] is the only entry point that
//! drives this pipeline; everything here is free functions operating on borrowed trust state so
//! that pipeline can be re-run, from the same `trusted_root`, on every call.

use crate::datastore::Datastore;
use crate::download;
use crate::error::{self, Result};
use crate::schema::{DelegatedRole, Delegations, Role, RoleType, Root, Signed, Snapshot, Target, Targets, Timestamp};
use crate::transport::Transport;
use crate::urlpath::{join_components, safe_relpath_components};
use crate::{ExpirationEnforcement, Limits};
use chrono::Duration;
use log::{debug, warn};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use url::Url;

/// How far ahead of the sampled system clock every freeze check treats "now" as being (§6: "NOW
/// lag (5 min past wall clock)"). Reading the clock as running slightly ahead, rather than
/// behind, makes every freeze check strictly more conservative: metadata is declared expired
/// sooner, never later, than an unlagged comparison would.
const NOW_LAG_MINUTES: i64 = 5;

fn lagged_now(datastore: &Datastore) -> Result<chrono::DateTime<chrono::Utc>> {
    Ok(datastore.system_time()? + Duration::minutes(NOW_LAG_MINUTES))
}

/// Fails with [`error::Error::ExpiredMetadata`] if `role` is expired against the lagged clock.
/// A no-op under [`ExpirationEnforcement::Unsafe`].
fn check_expired<T: Role>(
    datastore: &Datastore,
    enforcement: ExpirationEnforcement,
    role: &T,
) -> Result<()> {
    if enforcement == ExpirationEnforcement::Unsafe {
        return Ok(());
    }
    let now = lagged_now(datastore)?;
    ensure!(now < role.expires(), error::ExpiredMetadataSnafu { role: T::TYPE });
    Ok(())
}

fn join_versioned(base: &Url, path: &str) -> Result<Url> {
    base.join(path).context(error::JoinUrlSnafu {
        path: path.to_string(),
        url: base.clone(),
    })
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=
// 4.6.1 Load trusted root

/// Parses `reader` as a signed root document, verifies it against its own root-role threshold
/// (self-consistency — there is no other authority to check the first root against), and rejects
/// a repository that does not use consistent snapshots. Does not check expiry: an out-of-date
/// trusted root is exactly what [`update_root`] exists to repair.
pub(crate) fn load_trusted_root<R: std::io::Read>(reader: R) -> Result<Signed<Root>> {
    let root: Signed<Root> =
        serde_json::from_reader(reader).context(error::ParseTrustedMetadataSnafu)?;
    root.signed
        .validate()
        .context(error::VerifyTrustedMetadataSnafu)?;
    root.signed
        .verify_role(&root)
        .context(error::VerifyTrustedMetadataSnafu)?;
    ensure!(root.signed.consistent_snapshot, error::NoConsistentSnapshotsSnafu);
    Ok(root)
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=
// 4.6.2 Update root

/// Advances `trusted_root` forward along the chain of cross-signed root documents, up to
/// `limits.max_root_rotations` steps. Persists the final root to the datastore and, if the
/// timestamp or snapshot key sets rotated anywhere along the way, deletes the cached
/// `timestamp.json`/`snapshot.json` so the next stages can't be satisfied by metadata signed
/// under now-revoked keys.
pub(crate) fn update_root<T: Transport>(
    transport: &T,
    datastore: &Datastore,
    metadata_root_url: &Url,
    mut trusted_root: Signed<Root>,
    limits: &Limits,
    enforcement: ExpirationEnforcement,
) -> Result<Signed<Root>> {
    let original_timestamp_keys: Vec<_> = trusted_root.signed.keys(RoleType::Timestamp).cloned().collect();
    let original_snapshot_keys: Vec<_> = trusted_root.signed.keys(RoleType::Snapshot).cloned().collect();

    for _ in 0..limits.max_root_rotations {
        let next_version = trusted_root.signed.version.get() + 1;
        let path = format!("{next_version}.root.json");
        let url = join_versioned(metadata_root_url, &path)?;

        let bytes = match download::fetch(transport, url.clone(), limits.max_root_length, limits.min_speed, None) {
            Ok(bytes) => bytes,
            Err(error::Error::NotFound { .. }) => break,
            Err(e) => return Err(e),
        };

        let new_root: Signed<Root> =
            serde_json::from_slice(&bytes).context(error::ParseMetadataSnafu { role: RoleType::Root })?;
        new_root.signed.validate().context(error::VerifyMetadataSnafu { role: RoleType::Root })?;

        // Cross-sign requirement: both the outgoing and the incoming root must vouch for the new
        // file, since this is the single point where trust transitions from one key set to
        // another.
        trusted_root
            .signed
            .verify_role(&new_root)
            .context(error::ArbitrarySoftwareSnafu { role: RoleType::Root })?;
        new_root
            .signed
            .verify_role(&new_root)
            .context(error::ArbitrarySoftwareSnafu { role: RoleType::Root })?;

        ensure!(
            new_root.signed.version.get() == next_version,
            error::RollbackSnafu {
                role: RoleType::Root,
                current_version: trusted_root.signed.version,
                new_version: new_root.signed.version,
            }
        );

        debug!("advanced trusted root to version {next_version}");
        trusted_root = new_root;
    }

    check_expired(datastore, enforcement, &trusted_root.signed)?;
    ensure!(trusted_root.signed.consistent_snapshot, error::NoConsistentSnapshotsSnafu);

    let timestamp_keys: Vec<_> = trusted_root.signed.keys(RoleType::Timestamp).cloned().collect();
    let snapshot_keys: Vec<_> = trusted_root.signed.keys(RoleType::Snapshot).cloned().collect();
    if timestamp_keys != original_timestamp_keys || snapshot_keys != original_snapshot_keys {
        warn!("timestamp or snapshot keys rotated; invalidating cached sub-metadata");
        datastore.remove("timestamp.json")?;
        datastore.remove("snapshot.json")?;
    }

    datastore.create("root.json", &trusted_root)?;
    Ok(trusted_root)
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=
// 4.6.3 Update timestamp

/// Downloads `timestamp.json` fresh (it is never version-prefixed — §6), verifies it against
/// `trusted_root`, and enforces rollback against whatever was previously cached.
pub(crate) fn update_timestamp<T: Transport>(
    transport: &T,
    datastore: &Datastore,
    metadata_root_url: &Url,
    trusted_root: &Signed<Root>,
    limits: &Limits,
    enforcement: ExpirationEnforcement,
) -> Result<Signed<Timestamp>> {
    let url = join_versioned(metadata_root_url, "timestamp.json")?;
    let bytes = download::fetch(transport, url, limits.max_timestamp_length, limits.min_speed, None)?;
    let timestamp: Signed<Timestamp> =
        serde_json::from_slice(&bytes).context(error::ParseMetadataSnafu { role: RoleType::Timestamp })?;
    timestamp.signed.validate().context(error::VerifyMetadataSnafu { role: RoleType::Timestamp })?;

    trusted_root
        .signed
        .verify_role(&timestamp)
        .context(error::ArbitrarySoftwareSnafu { role: RoleType::Timestamp })?;

    if let Some(old) = read_cached::<Timestamp>(datastore, "timestamp.json", trusted_root)? {
        ensure!(
            old.signed.version <= timestamp.signed.version,
            error::RollbackSnafu {
                role: RoleType::Timestamp,
                current_version: old.signed.version,
                new_version: timestamp.signed.version,
            }
        );
        let old_snapshot_ref = old.signed.snapshot_meta();
        let new_snapshot_ref = timestamp.signed.snapshot_meta();
        if let (Some(old_ref), Some(new_ref)) = (old_snapshot_ref, new_snapshot_ref) {
            ensure!(
                old_ref.version <= new_ref.version,
                error::RollbackSnafu {
                    role: RoleType::Snapshot,
                    current_version: old_ref.version,
                    new_version: new_ref.version,
                }
            );
        }
    }

    check_expired(datastore, enforcement, &timestamp.signed)?;
    datastore.create("timestamp.json", &timestamp)?;
    Ok(timestamp)
}

/// Reads and parses a cached metadata file, discarding it (returning `Ok(None)`) if it fails to
/// verify against `trusted_root` — a datastore entry signed under since-revoked keys is no more
/// trustworthy than no entry at all, and must not gate a rollback check.
fn read_cached<T>(datastore: &Datastore, file: &str, trusted_root: &Signed<Root>) -> Result<Option<Signed<T>>>
where
    T: Role + serde::de::DeserializeOwned,
{
    let Some(reader) = datastore.reader(file)? else {
        return Ok(None);
    };
    let Ok(cached) = serde_json::from_reader::<_, Signed<T>>(reader) else {
        return Ok(None);
    };
    if trusted_root.signed.verify_role(&cached).is_err() {
        return Ok(None);
    }
    Ok(Some(cached))
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=
// 4.6.4 Update snapshot

/// Reuses the cached snapshot if its version already satisfies `timestamp`'s pointer; otherwise
/// downloads, verifies, and persists the version `timestamp` points at. Rollback is enforced
/// against every filename the previously cached snapshot listed, not only `targets.json`.
pub(crate) fn update_snapshot<T: Transport>(
    transport: &T,
    datastore: &Datastore,
    metadata_root_url: &Url,
    trusted_root: &Signed<Root>,
    trusted_timestamp: &Signed<Timestamp>,
    limits: &Limits,
    enforcement: ExpirationEnforcement,
) -> Result<Signed<Snapshot>> {
    let snap_ref = trusted_timestamp
        .signed
        .snapshot_meta()
        .context(error::MetaMissingSnafu { file: "snapshot.json", role: RoleType::Timestamp })?;

    let cached = read_cached::<Snapshot>(datastore, "snapshot.json", trusted_root)?;
    if let Some(cached) = &cached {
        if cached.signed.version.get() >= snap_ref.version.get() {
            check_expired(datastore, enforcement, &cached.signed)?;
            debug!("reusing cached snapshot at version {}", cached.signed.version);
            return Ok(cached.clone());
        }
    }

    let path = format!("{}.snapshot.json", snap_ref.version);
    let url = join_versioned(metadata_root_url, &path)?;
    let max_length = snap_ref.length.map_or(limits.max_snapshot_length, |l| l.min(limits.max_snapshot_length));
    let bytes = download::fetch(transport, url, max_length, limits.min_speed, snap_ref.hashes.as_ref())?;
    let snapshot: Signed<Snapshot> =
        serde_json::from_slice(&bytes).context(error::ParseMetadataSnafu { role: RoleType::Snapshot })?;
    snapshot.signed.validate().context(error::VerifyMetadataSnafu { role: RoleType::Snapshot })?;

    trusted_root
        .signed
        .verify_role(&snapshot)
        .context(error::ArbitrarySoftwareSnafu { role: RoleType::Snapshot })?;

    ensure!(
        snapshot.signed.version == snap_ref.version,
        error::MixAndMatchSnafu {
            role: RoleType::Snapshot,
            fetched: snapshot.signed.version,
            expected: snap_ref.version,
        }
    );

    if let Some(old_snapshot) = &cached {
        for (filename, old_meta) in &old_snapshot.signed.meta {
            let new_meta = snapshot
                .signed
                .meta
                .get(filename)
                .context(error::MetaMissingSnafu { file: filename.clone(), role: RoleType::Snapshot })?;
            ensure!(
                old_meta.version <= new_meta.version,
                error::RollbackSnafu {
                    role: RoleType::Targets,
                    current_version: old_meta.version,
                    new_version: new_meta.version,
                }
            );
        }
    }

    check_expired(datastore, enforcement, &snapshot.signed)?;
    datastore.create("snapshot.json", &snapshot)?;
    Ok(snapshot)
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=
// 4.6.5 Targets update & delegation DFS

/// Which trust source a targets document's signature is checked against: the root, for the
/// top-level `targets.json`, or a parent `Delegations`/role-name pair for anything reached by
/// following a delegation.
pub(crate) enum Authority<'a> {
    Root(&'a Signed<Root>),
    Delegation { parent: &'a Delegations, name: &'a str },
}

impl Authority<'_> {
    fn verify(&self, role: &Signed<Targets>) -> Result<()> {
        match self {
            Authority::Root(root) => root
                .signed
                .verify_role(role)
                .context(error::ArbitrarySoftwareSnafu { role: RoleType::Targets }),
            Authority::Delegation { parent, name } => parent
                .verify_role(role, name)
                .context(error::ArbitrarySoftwareSnafu { role: RoleType::Targets }),
        }
    }

    /// The `DelegatedRole` definition that authorized descending into the document currently
    /// being loaded, if any (top-level targets has none — nothing narrows its own scope).
    fn delegated_role_def(&self) -> Option<&DelegatedRole> {
        match self {
            Authority::Root(_) => None,
            Authority::Delegation { parent, name } => parent.role(name),
        }
    }
}

/// The result of a successful DFS hit: the matched target file and the name of the targets
/// document (top-level or delegated) that listed it.
pub(crate) struct TargetsHit {
    pub(crate) target: Target,
    pub(crate) found_in: String,
}

/// Loads (reusing the cache when possible) the targets document named `role_name`, verifies it
/// against `authority`, and — per §4.6.5 — either returns the target directly or recurses into
/// whichever of its delegations match `target_relpath`, stopping at the first hit or the first
/// `terminating` delegation along the matching chain. `cache` accumulates every targets document
/// actually loaded, so a caller can expose it later without a second traversal (§12).
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_targets<T: Transport>(
    transport: &T,
    datastore: &Datastore,
    metadata_root_url: &Url,
    trusted_root: &Signed<Root>,
    trusted_snapshot: &Signed<Snapshot>,
    visited: &mut HashSet<String>,
    depth: u64,
    role_name: &str,
    authority: Authority<'_>,
    target_relpath: &str,
    limits: &Limits,
    enforcement: ExpirationEnforcement,
    cache: &mut HashMap<String, Signed<Targets>>,
) -> Result<Option<TargetsHit>> {
    if visited.contains(role_name) || depth > limits.max_preorder_dfs_visits {
        return Ok(None);
    }
    visited.insert(role_name.to_string());

    let filename = format!("{role_name}.json");
    let snap_ref = trusted_snapshot
        .signed
        .meta
        .get(&filename)
        .context(error::RoleNotInMetaSnafu { name: role_name.to_string() })?;

    let cache_file = if role_name == "targets" { "targets.json".to_string() } else { filename.clone() };
    let cached = read_cached::<Targets>(datastore, &cache_file, trusted_root)?;
    let current = if let Some(cached) = &cached {
        if cached.signed.version.get() >= snap_ref.version.get() {
            debug!("reusing cached '{role_name}' at version {}", cached.signed.version);
            cached.clone()
        } else {
            fetch_and_verify_targets(
                transport, datastore, metadata_root_url, &authority, role_name, snap_ref, limits, &cache_file,
            )?
        }
    } else {
        fetch_and_verify_targets(
            transport, datastore, metadata_root_url, &authority, role_name, snap_ref, limits, &cache_file,
        )?
    };

    check_expired(datastore, enforcement, &current.signed)?;
    cache.insert(role_name.to_string(), current.clone());

    if let Some(target) = current.signed.target(target_relpath) {
        return Ok(Some(TargetsHit { target: target.clone(), found_in: role_name.to_string() }));
    }

    let Some(delegations) = &current.signed.delegations else {
        return Ok(None);
    };

    for child in &delegations.roles {
        if !child.paths.matched_target(target_relpath) {
            continue;
        }
        if let Some(parent_def) = authority.delegated_role_def() {
            parent_def
                .covers(&child.paths)
                .context(error::ArbitrarySoftwareSnafu { role: RoleType::Targets })?;
        }

        let hit = update_targets(
            transport,
            datastore,
            metadata_root_url,
            trusted_root,
            trusted_snapshot,
            visited,
            depth + 1,
            &child.name,
            Authority::Delegation { parent: delegations, name: &child.name },
            target_relpath,
            limits,
            enforcement,
            cache,
        )?;

        if hit.is_some() || child.terminating {
            return Ok(hit);
        }
    }

    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn fetch_and_verify_targets<T: Transport>(
    transport: &T,
    datastore: &Datastore,
    metadata_root_url: &Url,
    authority: &Authority<'_>,
    role_name: &str,
    snap_ref: &crate::schema::TimeSnap,
    limits: &Limits,
    cache_file: &str,
) -> Result<Signed<Targets>> {
    let path = format!("{}.{role_name}.json", snap_ref.version);
    let url = join_versioned(metadata_root_url, &path)?;
    let max_length = snap_ref.length.map_or(limits.max_targets_length, |l| l.min(limits.max_targets_length));
    let bytes = download::fetch(transport, url, max_length, limits.min_speed, snap_ref.hashes.as_ref())?;

    let parsed: Signed<Targets> =
        serde_json::from_slice(&bytes).context(error::ParseMetadataSnafu { role: RoleType::Targets })?;
    parsed.signed.validate().context(error::VerifyMetadataSnafu { role: RoleType::Targets })?;

    authority.verify(&parsed)?;

    ensure!(
        parsed.signed.version == snap_ref.version,
        error::MixAndMatchSnafu {
            role: RoleType::Targets,
            fetched: parsed.signed.version,
            expected: snap_ref.version,
        }
    );

    datastore.create(cache_file, &parsed)?;
    Ok(parsed)
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=
// 4.6.6 Fetch target

/// Resolves `relpath`/`target` to a local file under `targets_cache_dir`, downloading it first if
/// it isn't already cached. Under consistent snapshots every download URL is tried under each
/// advertised `(algorithm, hexdigest)` in declared order; the first to succeed wins, and a
/// `NotFound` on every attempt is reported as [`error::Error::InconsistentTarget`].
pub(crate) fn fetch_target<T: Transport>(
    transport: &T,
    datastore: &Datastore,
    targets_cache_dir: &Path,
    targets_root_url: &Url,
    relpath: &str,
    target: &Target,
    min_speed: u64,
) -> Result<PathBuf> {
    let components = safe_relpath_components(relpath)?;
    let local_path = join_components(targets_cache_dir, &components);

    if local_path.is_file() {
        debug!("'{relpath}' already present in targets cache");
        return Ok(local_path);
    }

    let (dirname, basename) = components.split_at(components.len() - 1);
    let basename = basename[0];

    for (_, digest) in &target.hashes {
        let hexdigest = hex::encode(digest.as_ref());
        let hashed_name = format!("{hexdigest}.{basename}");
        let mut segments: Vec<&str> = dirname.to_vec();
        segments.push(&hashed_name);
        let relative = segments.join("/");
        let url = join_versioned(targets_root_url, &relative)?;

        match download::fetch(transport, url, target.length, min_speed, Some(&target.hashes)) {
            Ok(bytes) => {
                use std::io::Write;
                let scratch_dir = datastore.path();
                let mut staged = tempfile::NamedTempFile::new_in(scratch_dir)
                    .context(error::TempFileCreateSnafu { path: scratch_dir.to_path_buf() })?;
                staged
                    .write_all(&bytes)
                    .context(error::TempFileCreateSnafu { path: scratch_dir.to_path_buf() })?;
                let (_, staged_path) = staged
                    .keep()
                    .map_err(|e| e.error)
                    .context(error::TempFileCreateSnafu { path: scratch_dir.to_path_buf() })?;
                crate::datastore::mv_file(&staged_path, &local_path)?;
                return Ok(local_path);
            }
            Err(error::Error::NotFound { .. }) => continue,
            Err(e) => return Err(e),
        }
    }

    error::InconsistentTargetSnafu { target: relpath.to_string() }.fail()
}
