// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The crate's error type.

use crate::schema::RoleType;
use chrono::{DateTime, Utc};
use snafu::{Backtrace, Snafu};
use std::num::NonZeroU64;
use std::path::PathBuf;
use url::Url;

/// The result type returned by most functions in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    // === Attacks (spec taxonomy) ===
    /// A role's signatures did not satisfy its key threshold.
    #[snafu(display("role {:?} is not signed by a threshold of its trusted keys", role))]
    ArbitrarySoftware {
        /// The role whose signature check failed.
        role: RoleType,
        /// Underlying signature-verification failure.
        source: crate::schema::Error,
    },

    /// A downloaded file exceeded its advertised or configured length bound.
    #[snafu(display("{} exceeded the maximum allowed length of {} bytes ({})", url, max_length, specifier))]
    EndlessData {
        /// The URL being fetched.
        url: Url,
        /// The bound that was exceeded.
        max_length: u64,
        /// Which bound was in effect (e.g. "snapshot.json length" or "max_targets_size").
        specifier: &'static str,
    },

    /// A role's metadata has expired.
    #[snafu(display("{:?} metadata is expired", role))]
    ExpiredMetadata {
        /// The expired role.
        role: RoleType,
    },

    /// A referenced metadata file's version did not match the version recorded by its authority.
    #[snafu(display(
        "{:?} version mismatch: fetched {}, but authority expects {}",
        role,
        fetched,
        expected
    ))]
    MixAndMatch {
        /// The role being verified.
        role: RoleType,
        /// The version the fetched file actually declared.
        fetched: NonZeroU64,
        /// The version the authority (timestamp/snapshot) required.
        expected: NonZeroU64,
    },

    /// A role's metadata version decreased relative to a previously trusted copy.
    #[snafu(display(
        "potential rollback attack: {:?} version {} is older than trusted version {}",
        role,
        new_version,
        current_version
    ))]
    Rollback {
        /// The role whose version regressed.
        role: RoleType,
        /// The previously-trusted version.
        current_version: NonZeroU64,
        /// The newly fetched version.
        new_version: NonZeroU64,
    },

    /// A transport either timed out or sustained a throughput below `SLOW_RETRIEVAL_THRESHOLD`.
    #[snafu(display("slow retrieval while fetching {}: {}", url, reason))]
    SlowRetrieval {
        /// The URL being fetched.
        url: Url,
        /// Human-readable description (timeout vs. measured speed).
        reason: String,
    },

    // === Repository errors ===
    /// The trusted root does not have `consistent_snapshot` set.
    #[snafu(display("repository does not use consistent snapshots, which is required"))]
    NoConsistentSnapshots,

    /// The requested target is not present in any visited targets metadata.
    #[snafu(display("target '{}' not found", target))]
    TargetNotFound {
        /// The requested target path.
        target: String,
    },

    /// A consistent-snapshot target could be found at none of its hash-prefixed URLs.
    #[snafu(display("target '{}' could not be fetched under any advertised hash", target))]
    InconsistentTarget {
        /// The requested target path.
        target: String,
    },

    /// A target path contained an empty, `.`, or `..` component.
    #[snafu(display("target path '{}' is not a safe relative path", relpath))]
    InvalidTargetPath {
        /// The offending target path.
        relpath: String,
    },

    // === Transport-level ===
    /// The remote resource does not exist (HTTP 403/404 or a missing local file).
    #[snafu(display("{} not found", url))]
    NotFound {
        /// The URL that was not found.
        url: Url,
    },

    /// The underlying transport failed for a reason other than "not found".
    #[snafu(display("failed to fetch {}: {}", url, source))]
    Transport {
        /// The URL being fetched.
        url: Url,
        /// The transport failure.
        source: crate::transport::TransportError,
    },

    /// A downloaded file's digest did not match its advertised hash.
    #[snafu(display(
        "hash mismatch for {}: calculated {}, expected {}",
        context,
        calculated,
        expected
    ))]
    HashMismatch {
        /// What was hashed (a URL or file path).
        context: String,
        /// The digest actually computed.
        calculated: String,
        /// The digest the metadata advertised.
        expected: String,
    },

    // === Parsing ===
    /// The trusted root shipped with the application could not be parsed.
    #[snafu(display("failed to parse trusted root metadata: {}", source))]
    ParseTrustedMetadata {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The trusted root shipped with the application failed self-verification.
    #[snafu(display("trusted root metadata failed to self-verify: {}", source))]
    VerifyTrustedMetadata {
        /// The underlying verification error.
        source: crate::schema::Error,
    },

    /// A fetched metadata file could not be parsed.
    #[snafu(display("failed to parse {:?} metadata: {}", role, source))]
    ParseMetadata {
        /// The role being parsed.
        role: RoleType,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A fetched metadata file's signatures did not verify against its authority.
    #[snafu(display("failed to verify {:?} metadata: {}", role, source))]
    VerifyMetadata {
        /// The role being verified.
        role: RoleType,
        /// The underlying verification error.
        source: crate::schema::Error,
    },

    /// A delegated role's metadata could not be located in its parent's `meta` map.
    #[snafu(display("'{}' not found in {:?} meta", file, role))]
    MetaMissing {
        /// The expected filename.
        file: String,
        /// The role whose `meta` map was searched.
        role: RoleType,
    },

    /// A delegation referenced a role with no corresponding entry in snapshot's `meta`.
    #[snafu(display("delegated role '{}' not listed in snapshot meta", name))]
    RoleNotInMeta {
        /// The delegated role name.
        name: String,
    },

    // === URL / I/O plumbing ===
    /// A base URL could not be parsed.
    #[snafu(display("failed to parse URL '{}': {}", url, source))]
    ParseUrl {
        /// The invalid URL string.
        url: String,
        /// The underlying URL-parsing error.
        source: url::ParseError,
    },

    /// A relative path could not be joined onto a base URL.
    #[snafu(display("failed to join '{}' onto '{}': {}", path, url, source))]
    JoinUrl {
        /// The relative path being joined.
        path: String,
        /// The base URL.
        url: Url,
        /// The underlying URL-joining error.
        source: url::ParseError,
    },

    /// The local clock appears to have stepped backward since it was last sampled.
    #[snafu(display(
        "system clock stepped backward: now {}, but latest known time was {}",
        sys_time,
        latest_known_time
    ))]
    SystemTimeSteppedBackward {
        /// The time just sampled.
        sys_time: DateTime<Utc>,
        /// The most recently persisted sample.
        latest_known_time: DateTime<Utc>,
    },

    /// The scratch/datastore directory could not be created.
    #[snafu(display("failed to create datastore: {}", source))]
    DatastoreInit {
        /// The underlying I/O error.
        source: std::io::Error,
        /// Backtrace for this error.
        backtrace: Backtrace,
    },

    /// A file in the datastore could not be opened for reading.
    #[snafu(display("failed to open '{}' in datastore: {}", path.display(), source))]
    DatastoreOpen {
        /// The path that could not be opened.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A file in the datastore could not be created for writing.
    #[snafu(display("failed to create '{}' in datastore: {}", path.display(), source))]
    DatastoreCreate {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be serialized into the datastore.
    #[snafu(display("failed to serialize {} at '{}': {}", what, path.display(), source))]
    DatastoreSerialize {
        /// Description of the value being serialized.
        what: String,
        /// The destination path.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A file in the datastore could not be removed.
    #[snafu(display("failed to remove '{}' from datastore: {}", path.display(), source))]
    DatastoreRemove {
        /// The path that could not be removed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A downloaded target could not be moved into its final cache location.
    #[snafu(display("failed to persist '{}' to '{}': {}", src.display(), dst.display(), source))]
    TargetPersist {
        /// The temp file's path.
        src: PathBuf,
        /// The destination path.
        dst: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A parent directory for a staged file could not be created.
    #[snafu(display("failed to create directory '{}': {}", path.display(), source))]
    DirCreate {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A scratch file could not be created.
    #[snafu(display("failed to create temporary file in '{}': {}", path.display(), source))]
    TempFileCreate {
        /// The scratch directory.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    // === HTTP transport (feature = "http") ===
    /// An HTTP client could not be built.
    #[cfg(feature = "http")]
    #[snafu(display("failed to build HTTP client for {}: {}", url, source))]
    HttpClientBuild {
        /// The URL being requested.
        url: Url,
        /// The underlying `reqwest` error.
        source: reqwest::Error,
    },

    /// An HTTP request could not be built.
    #[cfg(feature = "http")]
    #[snafu(display("failed to build HTTP request for {}: {}", url, source))]
    HttpRequestBuild {
        /// The URL being requested.
        url: Url,
        /// The underlying `reqwest` error.
        source: reqwest::Error,
    },

    /// An HTTP request header value was invalid.
    #[cfg(feature = "http")]
    #[snafu(display("invalid HTTP header value '{}': {}", header_value, source))]
    HttpHeader {
        /// The value that failed to parse.
        header_value: String,
        /// The underlying `reqwest` error.
        source: reqwest::header::InvalidHeaderValue,
    },

    /// An HTTP request failed with a non-retryable status.
    #[cfg(feature = "http")]
    #[snafu(display("HTTP request to {} failed: {}", url, source))]
    HttpFetch {
        /// The URL requested.
        url: Url,
        /// The underlying `reqwest` error.
        source: reqwest::Error,
    },

    /// An HTTP request exhausted its retry budget.
    #[cfg(feature = "http")]
    #[snafu(display("HTTP request to {} failed after {} tries: {}", url, tries, source))]
    HttpRetries {
        /// The URL requested.
        url: Url,
        /// The number of attempts made.
        tries: u32,
        /// The last underlying `reqwest` error.
        source: reqwest::Error,
    },
}
