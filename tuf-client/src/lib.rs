// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(missing_debug_implementations, missing_copy_implementations)]
#![deny(rust_2018_idioms)]
// #![deny(missing_docs)] // to make it easy to comment out
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate, clippy::missing_errors_doc)]

//! A client for The Update Framework (TUF), implementing the repository refresh state machine,
//! delegated-targets lookup, and bounded downloading described by the TUF specification.
//!
//! A [`Repository`] is constructed from a trusted root document and two pairs of URLs/cache
//! directories (one pair for metadata, one for targets). [`Repository::get`] is the single public
//! operation: every call re-runs the entire refresh pipeline — root rotation, then
//! timestamp/snapshot/targets update, then the delegation search — from the trusted root forward,
//! and returns the local path and metadata of the requested target.
//!
//! ```no_run
//! use tuf_client::{DefaultTransport, Repository, Settings};
//! use std::fs::File;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), tuf_client::Error> {
//! let settings = Settings {
//!     root: File::open("root.json").unwrap(),
//!     metadata_root_url: "https://example.com/metadata/",
//!     targets_root_url: "https://example.com/targets/",
//!     metadata_cache_dir: None,
//!     targets_cache_dir: Path::new("/var/cache/tuf/targets"),
//!     limits: tuf_client::Limits::default(),
//!     expiration_enforcement: tuf_client::ExpirationEnforcement::Safe,
//! };
//! let mut repo = Repository::load(DefaultTransport::new(), settings)?;
//! let found = repo.get("a/b.txt")?;
//! println!("{}", found.local_path.display());
//! # Ok(())
//! # }
//! ```

mod datastore;
mod download;
mod error;
#[cfg(feature = "http")]
mod http;
pub mod schema;
mod repository;
mod transport;
mod urlpath;

pub use crate::error::{Error, Result};
#[cfg(feature = "http")]
pub use crate::http::{ClientSettings, HttpTransport};
pub use crate::transport::{DefaultTransport, FilesystemTransport, Transport, TransportError, TransportErrorKind};

use crate::datastore::Datastore;
use crate::repository::{Authority, TargetsHit};
use crate::schema::{Root, Signed, Snapshot, Target, Targets, Timestamp};
use snafu::{OptionExt, ResultExt};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// Whether a [`Repository`] enforces metadata expiration. [`ExpirationEnforcement::Unsafe`]
/// bypasses every freeze check (§4.6) and exists only for tooling that needs to inspect an
/// already-expired repository (e.g. disaster recovery); it must never be the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationEnforcement {
    /// Expired metadata is rejected. The only sound choice for a client consuming untrusted
    /// updates.
    Safe,
    /// Expiration is never checked.
    Unsafe,
}

impl Default for ExpirationEnforcement {
    fn default() -> Self {
        Self::Safe
    }
}

impl From<bool> for ExpirationEnforcement {
    fn from(safe: bool) -> Self {
        if safe {
            Self::Safe
        } else {
            Self::Unsafe
        }
    }
}

impl From<ExpirationEnforcement> for bool {
    fn from(e: ExpirationEnforcement) -> Self {
        matches!(e, ExpirationEnforcement::Safe)
    }
}

/// The size/throughput/rotation ceilings enforced throughout the refresh pipeline (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of root rotations attempted per refresh.
    pub max_root_rotations: u64,
    /// Maximum byte length of a downloaded `{N}.root.json`.
    pub max_root_length: u64,
    /// Maximum byte length of a downloaded `timestamp.json`.
    pub max_timestamp_length: u64,
    /// Maximum byte length of a downloaded `{N}.snapshot.json`, absent a tighter bound from
    /// `snapshot.json`'s own advertised length.
    pub max_snapshot_length: u64,
    /// Maximum byte length of a downloaded targets document, absent a tighter bound from the
    /// snapshot's advertised length for it.
    pub max_targets_length: u64,
    /// Maximum number of distinct delegated targets roles visited per `get()` call.
    pub max_preorder_dfs_visits: u64,
    /// The minimum sustained transfer rate, in bytes/sec, below which a download fails with
    /// `SlowRetrieval`. Zero disables the check.
    pub min_speed: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_root_rotations: 1 << 5,
            max_root_length: 1 << 15,
            max_timestamp_length: 1 << 11,
            max_snapshot_length: 1 << 17,
            max_targets_length: 1 << 21,
            max_preorder_dfs_visits: 1 << 5,
            min_speed: 1 << 13,
        }
    }
}

/// Configuration for [`Repository::load`].
pub struct Settings<'a, R: Read> {
    /// A reader over the caller's out-of-band trusted `root.json`.
    pub root: R,
    /// The base URL metadata files are fetched from.
    pub metadata_root_url: &'a str,
    /// The base URL target files are fetched from.
    pub targets_root_url: &'a str,
    /// Where the metadata cache (`root.json`, `timestamp.json`, `snapshot.json`, and every
    /// visited `{rolename}.json`) is persisted. `None` uses a process-owned temporary directory
    /// removed when the `Repository` is dropped.
    pub metadata_cache_dir: Option<&'a Path>,
    /// Where downloaded target files are persisted, mirroring each target's repository-relative
    /// path. Must already exist.
    pub targets_cache_dir: &'a Path,
    /// Download size/throughput/rotation ceilings.
    pub limits: Limits,
    /// Whether to enforce metadata expiration.
    pub expiration_enforcement: ExpirationEnforcement,
}

impl<R: Read> std::fmt::Debug for Settings<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("metadata_root_url", &self.metadata_root_url)
            .field("targets_root_url", &self.targets_root_url)
            .field("metadata_cache_dir", &self.metadata_cache_dir)
            .field("targets_cache_dir", &self.targets_cache_dir)
            .field("limits", &self.limits)
            .field("expiration_enforcement", &self.expiration_enforcement)
            .finish_non_exhaustive()
    }
}

/// The result of a successful [`Repository::get`]: the target's local path, plus its metadata
/// (length, hashes, and any `custom` field) for the caller to inspect.
#[derive(Debug, Clone)]
pub struct GetResult {
    /// The target's local path, inside the configured targets cache directory.
    pub local_path: PathBuf,
    /// The target's metadata, as found in whichever targets document (top-level or delegated)
    /// ultimately listed it.
    pub target_file: Target,
}

fn parse_url(url: &str) -> Result<Url> {
    let url = if url.ends_with('/') { url.to_string() } else { format!("{url}/") };
    Url::parse(&url).context(error::ParseUrlSnafu { url })
}

/// A TUF client session: one trusted root, refreshed forward on every [`Repository::get`] call,
/// against one metadata repository and one targets repository.
pub struct Repository<T: Transport> {
    transport: T,
    datastore: Datastore,
    targets_cache_dir: PathBuf,
    metadata_root_url: Url,
    targets_root_url: Url,
    limits: Limits,
    expiration_enforcement: ExpirationEnforcement,

    trusted_root: Signed<Root>,
    trusted_timestamp: Option<Signed<Timestamp>>,
    trusted_snapshot: Option<Signed<Snapshot>>,
    targets: HashMap<String, Signed<Targets>>,
}

impl<T: Transport> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("metadata_root_url", &self.metadata_root_url)
            .field("targets_root_url", &self.targets_root_url)
            .field("root_version", &self.trusted_root.signed.version)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Repository<T> {
    /// Bootstraps a session: parses and self-verifies `settings.root` (§4.6.1), persists it as
    /// the metadata cache's `root.json`, and opens the metadata/targets cache directories. Does
    /// not perform any network I/O — the full refresh pipeline runs lazily, on every
    /// [`Repository::get`] call, starting from this trusted root.
    pub fn load<R: Read>(transport: T, settings: Settings<'_, R>) -> Result<Self> {
        let trusted_root = repository::load_trusted_root(settings.root)?;
        let datastore = Datastore::new(settings.metadata_cache_dir.map(Path::to_path_buf))?;
        datastore.create("root.json", &trusted_root)?;

        std::fs::create_dir_all(settings.targets_cache_dir).context(error::DirCreateSnafu {
            path: settings.targets_cache_dir.to_path_buf(),
        })?;

        Ok(Self {
            transport,
            datastore,
            targets_cache_dir: settings.targets_cache_dir.to_path_buf(),
            metadata_root_url: parse_url(settings.metadata_root_url)?,
            targets_root_url: parse_url(settings.targets_root_url)?,
            limits: settings.limits,
            expiration_enforcement: settings.expiration_enforcement,
            trusted_root,
            trusted_timestamp: None,
            trusted_snapshot: None,
            targets: HashMap::new(),
        })
    }

    /// Runs the entire refresh pipeline (§4.6.2–4.6.6) and resolves `relpath` against the result.
    /// Calling this twice in a row is well-defined: the second call re-runs refresh from
    /// `trusted_root` forward, exactly as the first did (§5, Idempotence).
    pub fn get(&mut self, relpath: &str) -> Result<GetResult> {
        self.trusted_root = repository::update_root(
            &self.transport,
            &self.datastore,
            &self.metadata_root_url,
            self.trusted_root.clone(),
            &self.limits,
            self.expiration_enforcement,
        )?;

        let trusted_timestamp = repository::update_timestamp(
            &self.transport,
            &self.datastore,
            &self.metadata_root_url,
            &self.trusted_root,
            &self.limits,
            self.expiration_enforcement,
        )?;

        let trusted_snapshot = repository::update_snapshot(
            &self.transport,
            &self.datastore,
            &self.metadata_root_url,
            &self.trusted_root,
            &trusted_timestamp,
            &self.limits,
            self.expiration_enforcement,
        )?;

        let mut visited = HashSet::new();
        let mut cache = HashMap::new();
        let hit = repository::update_targets(
            &self.transport,
            &self.datastore,
            &self.metadata_root_url,
            &self.trusted_root,
            &trusted_snapshot,
            &mut visited,
            1,
            "targets",
            Authority::Root(&self.trusted_root),
            relpath,
            &self.limits,
            self.expiration_enforcement,
            &mut cache,
        )?;

        self.trusted_timestamp = Some(trusted_timestamp);
        self.trusted_snapshot = Some(trusted_snapshot);
        self.targets = cache;

        let TargetsHit { target, .. } = hit.context(error::TargetNotFoundSnafu { target: relpath.to_string() })?;

        let local_path = repository::fetch_target(
            &self.transport,
            &self.datastore,
            &self.targets_cache_dir,
            &self.targets_root_url,
            relpath,
            &target,
            self.limits.min_speed,
        )?;

        Ok(GetResult { local_path, target_file: target })
    }

    /// Releases this session's resources. Equivalent to dropping the `Repository`, spelled out
    /// for callers who want an explicit release point (§5, §6).
    pub fn close(self) {
        drop(self);
    }

    /// The top-level targets document from the last successful [`Repository::get`] call, if any.
    pub fn targets(&self) -> Option<&Signed<Targets>> {
        self.targets.get("targets")
    }

    /// Every targets document (top-level and delegated) visited during the last successful
    /// [`Repository::get`] call.
    pub fn all_targets(&self) -> &HashMap<String, Signed<Targets>> {
        &self.targets
    }

    /// The currently trusted root.
    pub fn root(&self) -> &Signed<Root> {
        &self.trusted_root
    }

    /// The snapshot from the last successful [`Repository::get`] call, if any.
    pub fn snapshot(&self) -> Option<&Signed<Snapshot>> {
        self.trusted_snapshot.as_ref()
    }

    /// The timestamp from the last successful [`Repository::get`] call, if any.
    pub fn timestamp(&self) -> Option<&Signed<Timestamp>> {
        self.trusted_timestamp.as_ref()
    }
}
