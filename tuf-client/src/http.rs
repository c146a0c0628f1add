// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An HTTP [`Transport`] with bounded retries, exponential backoff, and range-based resume.
//! Present only when the `http` feature is enabled, since the repository engine itself is
//! transport-agnostic (§6: `Transport` is a collaborator contract, not a hard dependency).

use crate::error::{self, Error, Result};
use crate::transport::{Transport, TransportError, TransportErrorKind};
use log::{debug, trace};
use reqwest::blocking::{Client, ClientBuilder, Request, Response};
use reqwest::header::{self, HeaderValue, ACCEPT_RANGES};
use reqwest::Method;
use snafu::ResultExt;
use std::cmp::Ordering;
use std::io::Read;
use std::time::Duration;
use url::Url;

/// Settings for the HTTP client's retry strategy and timeouts.
#[derive(Clone, Copy, Debug)]
pub struct ClientSettings {
    /// Timeout for connect, read, and write operations.
    pub timeout: Duration,
    /// Timeout for only the connect phase.
    pub connect_timeout: Duration,
    /// The total number of times a request will be attempted.
    pub tries: u32,
    /// The pause between the first and second try.
    pub initial_backoff: Duration,
    /// The maximum length of a pause between retries.
    pub max_backoff: Duration,
    /// The factor by which the pause grows after each try, up to `max_backoff`.
    pub backoff_factor: f32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            // try / 100ms / try / 150ms / try / 220ms / try
            tries: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            backoff_factor: 1.5,
        }
    }
}

/// An HTTP `Transport` with retry logic.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpTransport {
    settings: ClientSettings,
}

impl HttpTransport {
    /// Creates a new `HttpTransport` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `HttpTransport` with specific settings.
    pub fn from_settings(settings: ClientSettings) -> Self {
        Self { settings }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: Url) -> std::result::Result<(Box<dyn Read + Send>, Option<u64>), TransportError> {
        let mut r = RetryState::new(self.settings.initial_backoff);
        fetch_with_retries(&mut r, &self.settings, &url)
            .map(|read| {
                let length = read.content_length();
                (Box::new(read) as Box<dyn Read + Send>, length)
            })
            .map_err(|e| to_transport_error(&url, e))
    }
}

/// HTTP 403/404 is reported as `TransportErrorKind::FileNotFound` so the root-rotation loop and
/// the repository engine's "no next version" handling can tell it apart from a transient failure.
fn to_transport_error(url: &Url, e: Error) -> TransportError {
    let not_found = match &e {
        Error::HttpFetch { source, .. } => matches!(
            source.status().map(|s| s.as_u16()),
            Some(403) | Some(404)
        ),
        _ => false,
    };
    let kind = if not_found {
        TransportErrorKind::FileNotFound
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, url.as_str(), e)
}

/// A `Read` that carries enough state to resume a dropped connection with a `Range` request.
#[derive(Debug)]
pub struct RetryRead {
    retry_state: RetryState,
    settings: ClientSettings,
    response: Response,
    url: Url,
}

impl Read for RetryRead {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let retry_err = match self.response.read(buf) {
                Ok(sz) => {
                    self.retry_state.next_byte += sz;
                    return Ok(sz);
                }
                Err(err) => err,
            };
            debug!("error during read of '{}': {:?}", self.url, retry_err);

            if self.retry_state.current_try >= self.settings.tries - 1 {
                return Err(retry_err);
            }
            self.retry_state.increment(&self.settings);
            std::thread::sleep(self.retry_state.wait);
            if !self.supports_range() {
                return Err(retry_err);
            }
            match fetch_with_retries(&mut self.retry_state, &self.settings, &self.url) {
                Ok(new_retry_read) => self.response = new_retry_read.response,
                Err(_) => return Err(retry_err),
            }
        }
    }
}

impl RetryRead {
    /// The response's advertised `Content-Length`, if present, used to reject an oversized
    /// download before a single byte of the body is read (§4.4).
    fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Checks for the header `Accept-Ranges: bytes`.
    fn supports_range(&self) -> bool {
        self.response
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("bytes"))
    }
}

/// Tracks retry progress across both the initial request and any mid-stream resumes.
#[derive(Clone, Copy, Debug)]
struct RetryState {
    /// The current try; the first try is zero.
    current_try: u32,
    /// How long to sleep before the next retry.
    wait: Duration,
    /// The next byte to request, used to build a `Range` header on resume.
    next_byte: usize,
}

impl RetryState {
    fn new(initial_wait: Duration) -> Self {
        Self {
            current_try: 0,
            wait: initial_wait,
            next_byte: 0,
        }
    }

    fn increment(&mut self, settings: &ClientSettings) {
        if self.current_try > 0 {
            let new_wait = self.wait.mul_f32(settings.backoff_factor);
            match new_wait.cmp(&settings.max_backoff) {
                Ordering::Less => self.wait = new_wait,
                Ordering::Greater => self.wait = settings.max_backoff,
                Ordering::Equal => {}
            }
        }
        self.current_try += 1;
    }
}

fn fetch_with_retries(r: &mut RetryState, cs: &ClientSettings, url: &Url) -> Result<RetryRead> {
    trace!("beginning fetch for '{}'", url);
    let client = ClientBuilder::new()
        .timeout(cs.timeout)
        .connect_timeout(cs.connect_timeout)
        .build()
        .context(error::HttpClientBuildSnafu { url: url.clone() })?;

    loop {
        let request = build_request(&client, r.next_byte, url)?;

        let result = match client.execute(request) {
            Ok(response) => response.error_for_status(),
            Err(err) => Err(err),
        };

        let retry_err = match result {
            Ok(response) => {
                return Ok(RetryRead {
                    retry_state: *r,
                    settings: *cs,
                    response,
                    url: url.clone(),
                });
            }
            Err(err) => {
                if let Some(status) = err.status() {
                    if !status.is_success() && !status.is_server_error() {
                        return Err(err).context(error::HttpFetchSnafu { url: url.clone() });
                    }
                }
                err
            }
        };

        if r.current_try >= cs.tries - 1 {
            return Err(retry_err).context(error::HttpRetriesSnafu {
                url: url.clone(),
                tries: cs.tries,
            });
        }
        r.increment(cs);
        std::thread::sleep(r.wait);
    }
}

fn build_request(client: &Client, next_byte: usize, url: &Url) -> Result<Request> {
    if next_byte == 0 {
        client
            .request(Method::GET, url.as_str())
            .build()
            .context(error::HttpRequestBuildSnafu { url: url.clone() })
    } else {
        let header_value_string = format!("bytes={}-", next_byte);
        let header_value = HeaderValue::from_str(&header_value_string)
            .context(error::HttpHeaderSnafu {
                header_value: header_value_string.clone(),
            })?;
        client
            .request(Method::GET, url.as_str())
            .header(header::RANGE, header_value)
            .build()
            .context(error::HttpRequestBuildSnafu { url: url.clone() })
    }
}
