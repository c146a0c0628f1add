// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utilities for mapping a `file://` URL to a local path, and for validating a targets-role
//! TARGETPATH before it is used to build either a download URL or an on-disk cache path (§6:
//! the on-disk targets cache mirrors a target's repository-relative path, which means a
//! maliciously crafted but validly signed targets document could otherwise smuggle a `..`
//! component into either one).

use crate::error::{self, Result};
use snafu::ensure;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Converts a file URL into a file path.
/// Needed because `url.to_file_path()` will decode any percent encoding, which could restore path
/// traversal characters, and `url.path()` roots paths to '/' on Windows.
pub(crate) trait SafeUrlPath {
    /// Returns the path component of a URL as a filesystem path.
    fn safe_url_filepath(&self) -> PathBuf;
}

#[cfg(windows)]
impl SafeUrlPath for Url {
    fn safe_url_filepath(&self) -> PathBuf {
        let url_path = self.path();

        // Windows filepaths when written as `file://` URLs have path components prefixed with a /.
        PathBuf::from(if let Some(stripped) = url_path.strip_prefix('/') {
            stripped
        } else {
            url_path
        })
    }
}

#[cfg(unix)]
impl SafeUrlPath for Url {
    fn safe_url_filepath(&self) -> PathBuf {
        PathBuf::from(self.path())
    }
}

/// Splits a TARGETPATH into its `/`-separated components, rejecting anything that could escape
/// the targets cache or repository-relative download URL it's about to be joined onto: an empty
/// component, `.`, or `..`. Unlike [`SafeUrlPath`], which defends against a path already reduced
/// to percent-escaped text, this defends against the relpath itself before any encoding happens.
pub(crate) fn safe_relpath_components(relpath: &str) -> Result<Vec<&str>> {
    let mut out = Vec::new();
    for segment in relpath.split('/') {
        ensure!(
            !segment.is_empty() && segment != "." && segment != "..",
            error::InvalidTargetPathSnafu {
                relpath: relpath.to_string(),
            }
        );
        out.push(segment);
    }
    Ok(out)
}

/// Joins `components` onto `base`, one segment at a time. Only ever called with components
/// already validated by [`safe_relpath_components`].
pub(crate) fn join_components(base: &Path, components: &[&str]) -> PathBuf {
    let mut path = base.to_path_buf();
    for component in components {
        path.push(component);
    }
    path
}

/// True if `path`, once its `.`/`..` components are resolved lexically, still starts with
/// `base`. Used as a final defense-in-depth check after [`join_components`], in case a caller
/// passes an already-built path from elsewhere.
#[cfg(test)]
pub(crate) fn stays_within(base: &Path, path: &Path) -> bool {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved.starts_with(base)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn manifest_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_safe_simple() {
        let cargo_toml = manifest_dir().join("Cargo.toml");
        let cargo_toml_url = Url::from_file_path(&cargo_toml)
            .expect("Could not create URL from Cargo.toml filepath");

        let safe_url_path = cargo_toml_url.safe_url_filepath();

        assert_eq!(cargo_toml, safe_url_path);
        assert!(safe_url_path.is_absolute());
    }

    #[test]
    fn relpath_components_rejects_traversal() {
        assert!(safe_relpath_components("a/../b").is_err());
        assert!(safe_relpath_components("a/./b").is_err());
        assert!(safe_relpath_components("a//b").is_err());
        assert!(safe_relpath_components("..").is_err());
        assert!(safe_relpath_components("").is_err());
    }

    #[test]
    fn relpath_components_accepts_ordinary_paths() {
        assert_eq!(safe_relpath_components("a/b.txt").unwrap(), vec!["a", "b.txt"]);
        assert_eq!(safe_relpath_components("b.txt").unwrap(), vec!["b.txt"]);
    }

    #[test]
    fn join_components_builds_nested_path() {
        let base = PathBuf::from("/cache");
        let joined = join_components(&base, &["a", "b.txt"]);
        assert_eq!(joined, PathBuf::from("/cache/a/b.txt"));
    }

    #[test]
    fn stays_within_rejects_escape() {
        let base = PathBuf::from("/cache");
        assert!(!stays_within(&base, &PathBuf::from("/cache/../etc/passwd")));
        assert!(stays_within(&base, &PathBuf::from("/cache/a/b.txt")));
    }
}
