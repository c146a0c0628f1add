// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reader/Writer: on-disk staging for the metadata cache (§4.5). A single `Datastore` backs the
//! trusted root/timestamp/snapshot/targets files a [`crate::Repository`] persists between
//! refreshes, plus the monotonic-clock guard `system_time` relies on to detect a stepped-back
//! system clock. Unlike the multi-threaded original this is grounded on, nothing here needs to be
//! `Sync`: §5 restricts a `Repository` to one thread at a time, so a plain, lock-free struct
//! suffices.

use crate::error::{self, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use snafu::{ensure, ResultExt};
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Persists TUF metadata files to a directory, either caller-supplied or a process-owned
/// temporary directory.
#[derive(Debug)]
pub(crate) struct Datastore {
    path: DatastorePath,
}

impl Datastore {
    pub(crate) fn new(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                fs::create_dir_all(&p).context(error::DirCreateSnafu { path: p.clone() })?;
                DatastorePath::Path(p)
            }
            None => DatastorePath::TempDir(TempDir::new().context(error::DatastoreInitSnafu)?),
        };
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.path()
    }

    /// Opens a reader for `file` in the datastore. A missing file is `Ok(None)`, not an error —
    /// callers treat "nothing cached yet" as ordinary, expected state.
    pub(crate) fn reader(&self, file: &str) -> Result<Option<impl Read>> {
        let path = self.path().join(file);
        match File::open(&path) {
            Ok(file) => Ok(Some(file)),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Ok(None),
                _ => Err(err).context(error::DatastoreOpenSnafu { path }),
            },
        }
    }

    /// Writes `value` to `file` in the datastore as pretty-printed JSON. Staged through a temp
    /// file in the same directory and renamed into place so a reader never observes a partially
    /// written file.
    pub(crate) fn create<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let dir = self.path();
        let dst = dir.join(file);
        let mut tmp =
            NamedTempFile::new_in(dir).context(error::TempFileCreateSnafu { path: dir.to_path_buf() })?;
        serde_json::to_writer_pretty(&mut tmp, value).context(error::DatastoreSerializeSnafu {
            what: format!("{file} in datastore"),
            path: dst.clone(),
        })?;
        tmp.persist(&dst)
            .map_err(|e| e.error)
            .context(error::DatastoreCreateSnafu { path: dst })
    }

    /// Removes `file` from the datastore. A missing file is not an error.
    pub(crate) fn remove(&self, file: &str) -> Result<()> {
        let path = self.path().join(file);
        debug!("removing '{}'", path.display());
        rm_file(&path, true)
    }

    /// Samples the system clock and checks it has not stepped backward since the last sample
    /// persisted under `latest_known_time.json`. Distinct from the freeze-attack check in
    /// `repository.rs`, which compares a role's `expires` against this sample plus a fixed lag —
    /// this guard instead catches the local clock itself being rolled back, independent of any
    /// particular role's metadata.
    pub(crate) fn system_time(&self) -> Result<DateTime<Utc>> {
        let file = "latest_known_time.json";
        let latest_known_time = self
            .reader(file)?
            .and_then(|r| serde_json::from_reader::<_, DateTime<Utc>>(r).ok());

        let sys_time = Utc::now();

        if let Some(latest_known_time) = latest_known_time {
            ensure!(
                sys_time >= latest_known_time,
                error::SystemTimeSteppedBackwardSnafu {
                    sys_time,
                    latest_known_time,
                }
            );
        }

        self.create(file, &sys_time)?;
        Ok(sys_time)
    }
}

/// Holds either a caller-managed path or a process-owned `TempDir` that is removed on drop.
#[derive(Debug)]
enum DatastorePath {
    Path(PathBuf),
    TempDir(TempDir),
}

impl DatastorePath {
    fn path(&self) -> &Path {
        match self {
            DatastorePath::Path(p) => p,
            DatastorePath::TempDir(t) => t.path(),
        }
    }
}

/// Atomically replaces `dst` with `src`, creating `dst`'s parent directory (mode `0o700` on Unix)
/// first if it does not exist. Used to move a verified target out of scratch space and into the
/// targets cache (§4.5).
pub(crate) fn mv_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        create_dir_all_mode(parent)?;
    }
    fs::rename(src, dst).context(error::TargetPersistSnafu {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
    })
}

/// Removes `path`. If `ignore_errors` is set, a missing file is not an error; otherwise every I/O
/// failure, including "not found", propagates.
pub(crate) fn rm_file(path: &Path, ignore_errors: bool) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if ignore_errors && err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).context(error::DatastoreRemoveSnafu {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(unix)]
fn create_dir_all_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::create_dir_all(path).context(error::DirCreateSnafu {
        path: path.to_path_buf(),
    })?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).context(error::DirCreateSnafu {
        path: path.to_path_buf(),
    })
}

#[cfg(not(unix))]
fn create_dir_all_mode(path: &Path) -> Result<()> {
    fs::create_dir_all(path).context(error::DirCreateSnafu {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn create_then_reader_round_trips() {
        let datastore = Datastore::new(None).unwrap();
        datastore.create("x.json", &42u32).unwrap();
        let mut reader = datastore.reader("x.json").unwrap().unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).unwrap();
        assert_eq!(contents.trim(), "42");
    }

    #[test]
    fn reader_missing_file_is_none() {
        let datastore = Datastore::new(None).unwrap();
        assert!(datastore.reader("nope.json").unwrap().is_none());
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let datastore = Datastore::new(None).unwrap();
        datastore.remove("nope.json").unwrap();
    }

    #[test]
    fn system_time_rejects_backward_step() {
        let datastore = Datastore::new(None).unwrap();
        let future = Utc::now() + Duration::days(1);
        datastore.create("latest_known_time.json", &future).unwrap();
        let err = datastore.system_time().unwrap_err();
        assert!(matches!(err, error::Error::SystemTimeSteppedBackward { .. }));
    }

    #[test]
    fn mv_file_creates_parent_and_moves() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, b"hello").unwrap();
        let dst = dir.path().join("nested/dir/dst.txt");
        mv_file(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"hello");
    }

    #[test]
    fn rm_file_ignores_missing_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        rm_file(&path, true).unwrap();
        assert!(rm_file(&path, false).is_err());
    }
}
