// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bounded, attack-aware downloader (§4.4). Every fetch passes through a cumulative-size
//! ceiling and a minimum-throughput check before a single byte reaches the caller, and — when the
//! caller knows the expected digest — a full verification of the downloaded bytes against it.
//! Nothing here trusts `Content-Length` or any other header; every bound is enforced against
//! bytes actually read.

use crate::error::{self, Result};
use crate::schema::DigestMap;
use crate::transport::{Transport, TransportError, TransportErrorKind};
use aws_lc_rs::digest::{digest, SHA256, SHA512};
use std::io::Read;
use std::time::Instant;
use url::Url;

/// Fetches `url` through `transport`, enforcing `max_length` (the governing ceiling regardless of
/// what the role's own metadata advertised, or omitted — §9) and `min_speed` (bytes/sec, averaged
/// per chunk) against every byte read. If `expected_hashes` is given, the complete download's
/// digest is verified against every algorithm this crate recognizes before returning. A 403/404
/// transport response is reported as [`error::Error::NotFound`]; any other transport failure as
/// [`error::Error::Transport`].
pub(crate) fn fetch(
    transport: &dyn Transport,
    url: Url,
    max_length: u64,
    min_speed: u64,
    expected_hashes: Option<&DigestMap>,
) -> Result<Vec<u8>> {
    let (inner, advertised_length) =
        transport.fetch(url.clone()).map_err(|source| to_fetch_error(&url, source))?;

    if let Some(advertised) = advertised_length {
        if advertised > max_length {
            return Err(error::Error::EndlessData {
                url,
                max_length,
                specifier: "advertised content length",
            });
        }
    }

    let mut reader = BoundedReader::new(inner, url.clone(), max_length, min_speed);

    let mut buf = Vec::new();
    if let Err(io_err) = reader.read_to_end(&mut buf) {
        return Err(reader.error.take().unwrap_or_else(|| error::Error::Transport {
            url: url.clone(),
            source: TransportError::new(TransportErrorKind::Other, url.as_str(), io_err),
        }));
    }

    if let Some(hashes) = expected_hashes {
        verify_hashes(&url, &buf, hashes)?;
    }

    Ok(buf)
}

fn to_fetch_error(url: &Url, source: TransportError) -> error::Error {
    if matches!(source.kind, TransportErrorKind::FileNotFound) {
        error::Error::NotFound { url: url.clone() }
    } else {
        error::Error::Transport {
            url: url.clone(),
            source,
        }
    }
}

/// A `Read` adapter enforcing a size ceiling and a minimum per-chunk throughput, in one pass so
/// neither check requires buffering or a second read of the data.
struct BoundedReader<R> {
    inner: R,
    url: Url,
    max_length: u64,
    min_speed: u64,
    seen: u64,
    last_chunk_at: Instant,
    error: Option<error::Error>,
}

impl<R: Read> BoundedReader<R> {
    fn new(inner: R, url: Url, max_length: u64, min_speed: u64) -> Self {
        Self {
            inner,
            url,
            max_length,
            min_speed,
            seen: 0,
            last_chunk_at: Instant::now(),
            error: None,
        }
    }

    fn fail(&mut self, e: error::Error) -> std::io::Error {
        self.error = Some(e);
        std::io::Error::other("download policy violation")
    }
}

impl<R: Read> Read for BoundedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let chunk_started_at = Instant::now();
        let n = self.inner.read(buf)?;
        if n == 0 {
            return Ok(0);
        }

        self.seen = self.seen.saturating_add(n as u64);
        if self.seen > self.max_length {
            return Err(self.fail(error::Error::EndlessData {
                url: self.url.clone(),
                max_length: self.max_length,
                specifier: "download size ceiling",
            }));
        }

        // Grace period: the first chunk's elapsed time includes connection setup, which would
        // otherwise masquerade as slow retrieval. Only chunks after the first are timed against
        // `min_speed`, matching a retrieval loop that samples speed between consecutive reads
        // rather than from the start of the whole request.
        if self.min_speed > 0 && self.seen > n as u64 {
            let elapsed = chunk_started_at.duration_since(self.last_chunk_at).as_secs_f64();
            let speed = n as f64 / elapsed.max(f64::EPSILON);
            if (speed as u64) < self.min_speed {
                return Err(self.fail(error::Error::SlowRetrieval {
                    url: self.url.clone(),
                    reason: format!(
                        "{speed:.0} bytes/sec observed, below the {} bytes/sec threshold",
                        self.min_speed
                    ),
                }));
            }
        }
        self.last_chunk_at = Instant::now();

        Ok(n)
    }
}

/// Verifies `data` against every digest algorithm in `expected` that this crate recognizes
/// (`sha256`, `sha512`). An algorithm name this crate doesn't recognize is ignored rather than
/// rejected — it neither weakens a passing check on a recognized algorithm nor can it be used to
/// forge one, since every recognized algorithm present must still match.
fn verify_hashes(url: &Url, data: &[u8], expected: &DigestMap) -> Result<()> {
    for (algorithm, expected_digest) in expected {
        let calculated = match algorithm.as_str() {
            "sha256" => digest(&SHA256, data).as_ref().to_vec(),
            "sha512" => digest(&SHA512, data).as_ref().to_vec(),
            _ => continue,
        };
        if calculated != expected_digest.as_ref() {
            return Err(error::Error::HashMismatch {
                context: url.to_string(),
                calculated: hex::encode(&calculated),
                expected: hex::encode(expected_digest.as_ref()),
            });
        }
    }
    Ok(())
}
