// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "http")]
use crate::{ClientSettings, HttpTransport};
use crate::urlpath::SafeUrlPath;
use dyn_clone::DynClone;
use snafu::Snafu;
use std::fmt::Debug;
use std::io::{ErrorKind, Read};
use url::Url;

/// Abstracts over the method/protocol by which metadata and target bytes are obtained. The
/// repository engine never opens a socket or a file directly; it only ever calls `fetch` and
/// reads from whatever comes back.
pub trait Transport: Debug + DynClone {
    /// Opens a `Read` object for the file specified by `url`, alongside its advertised length if
    /// the transport can cheaply learn one (a `Content-Length` header, a file's size on disk) —
    /// `None` when the transport has no such signal. The caller uses this to reject an oversized
    /// download before reading a single byte of the body, rather than relying solely on the
    /// cumulative check applied to bytes actually read.
    fn fetch(&self, url: Url) -> Result<(Box<dyn Read + Send>, Option<u64>), TransportError>;
}

dyn_clone::clone_trait_object!(Transport);

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// The kind of error a [`Transport`] experienced during `fetch`.
///
/// Distinguishing "not found" from every other failure matters: the root-rotation loop treats a
/// missing next-version root as "we've reached the end of the chain", not as a hard failure.
#[derive(Debug, Copy, Clone)]
#[non_exhaustive]
pub enum TransportErrorKind {
    /// The transport does not handle the URL scheme named, e.g. `file://` or `http://`.
    UnsupportedUrlScheme,
    /// The file cannot be found.
    FileNotFound,
    /// The transport failed for any other reason: IO error, broken connection, etc.
    Other,
}

/// The error type that [`Transport::fetch`] returns.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[snafu(display("{:?} error fetching '{}': {}", kind, url, source))]
pub struct TransportError {
    /// The kind of error that occurred.
    pub kind: TransportErrorKind,
    /// The URL the transport was trying to fetch.
    pub url: String,
    /// The underlying error.
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    /// Creates a new [`TransportError`].
    pub fn new<S, E>(kind: TransportErrorKind, url: S, source_error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        S: AsRef<str>,
    {
        Self {
            kind,
            url: url.as_ref().into(),
            source: source_error.into(),
        }
    }

    /// Creates a [`TransportError`] for reporting an unhandled URL scheme.
    pub fn unsupported_scheme<S: AsRef<str>>(url: S) -> Self {
        TransportError::new(
            TransportErrorKind::UnsupportedUrlScheme,
            url,
            "transport cannot handle the given URL scheme".to_string(),
        )
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// A [`Transport`] for `file://` URLs.
#[derive(Debug, Clone, Copy)]
pub struct FilesystemTransport;

impl Transport for FilesystemTransport {
    fn fetch(&self, url: Url) -> Result<(Box<dyn Read + Send>, Option<u64>), TransportError> {
        if url.scheme() != "file" {
            return Err(TransportError::unsupported_scheme(url));
        }

        let f = std::fs::File::open(url.safe_url_filepath()).map_err(|e| {
            let kind = match e.kind() {
                ErrorKind::NotFound => TransportErrorKind::FileNotFound,
                _ => TransportErrorKind::Other,
            };
            TransportError::new(kind, url, e)
        })?;
        let length = f.metadata().ok().map(|m| m.len());
        Ok((Box::new(f), length))
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// A `Transport` that handles `file://` URLs, and `http(s)://` URLs when the `http` feature is
/// enabled.
#[derive(Debug, Clone, Copy)]
pub struct DefaultTransport {
    file: FilesystemTransport,
    #[cfg(feature = "http")]
    http: HttpTransport,
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self {
            file: FilesystemTransport,
            #[cfg(feature = "http")]
            http: HttpTransport::default(),
        }
    }
}

impl DefaultTransport {
    /// Creates a new `DefaultTransport`. Same as `default()`.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "http")]
impl DefaultTransport {
    /// Creates a new `DefaultTransport` using the given HTTP `ClientSettings`.
    pub fn from_http_settings(settings: ClientSettings) -> Self {
        Self {
            file: FilesystemTransport,
            http: HttpTransport::from_settings(settings),
        }
    }
}

impl Transport for DefaultTransport {
    fn fetch(&self, url: Url) -> Result<(Box<dyn Read + Send>, Option<u64>), TransportError> {
        match url.scheme() {
            "file" => self.file.fetch(url),
            "http" | "https" => self.handle_http(url),
            _ => Err(TransportError::unsupported_scheme(url)),
        }
    }
}

impl DefaultTransport {
    #[cfg(not(feature = "http"))]
    #[allow(clippy::trivially_copy_pass_by_ref, clippy::unused_self)]
    fn handle_http(&self, url: Url) -> Result<(Box<dyn Read + Send>, Option<u64>), TransportError> {
        Err(TransportError::new(
            TransportErrorKind::UnsupportedUrlScheme,
            url,
            "this build does not have the http feature enabled",
        ))
    }

    #[cfg(feature = "http")]
    fn handle_http(&self, url: Url) -> Result<(Box<dyn Read + Send>, Option<u64>), TransportError> {
        self.http.fetch(url)
    }
}
