// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A byte buffer that serializes/deserializes through a hex string, so that types holding raw key
//! material or signature bytes can derive `Serialize`/`Deserialize` without hand-written impls.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

/// A marker type for an encoding scheme that [`Decoded`] can convert to/from text.
pub trait Encoding {
    /// Decodes `s` into raw bytes.
    fn decode(s: &str) -> Result<Vec<u8>, String>;
    /// Encodes `bytes` into this encoding's text form.
    fn encode(bytes: &[u8]) -> String;
}

/// Lowercase hexadecimal encoding, used throughout TUF metadata for key IDs and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hex;

impl Encoding for Hex {
    fn decode(s: &str) -> Result<Vec<u8>, String> {
        hex::decode(s).map_err(|e| e.to_string())
    }

    fn encode(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }
}

/// A `Vec<u8>` that serializes to and deserializes from a text encoding (see [`Encoding`]),
/// rather than as a JSON array of numbers.
///
/// This is used for key IDs, signatures, and hash digests, all of which are hex strings on the
/// wire but are most useful as raw bytes once parsed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decoded<F> {
    bytes: Vec<u8>,
    spooky: PhantomData<F>,
}

impl<F> Decoded<F> {
    /// Consumes the wrapper, returning the raw bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl<F> From<Vec<u8>> for Decoded<F> {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            spooky: PhantomData,
        }
    }
}

impl<F> Deref for Decoded<F> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl<F> AsRef<[u8]> for Decoded<F> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<F> fmt::Debug for Decoded<F>
where
    F: Encoding,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Decoded").field(&F::encode(&self.bytes)).finish()
    }
}

impl<F> Serialize for Decoded<F>
where
    F: Encoding,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&F::encode(&self.bytes))
    }
}

impl<'de, F> Deserialize<'de> for Decoded<F>
where
    F: Encoding,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = F::decode(&s).map_err(D::Error::custom)?;
        Ok(Self {
            bytes,
            spooky: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let decoded: Decoded<Hex> = Decoded::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&decoded).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: Decoded<Hex> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_vec(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn rejects_non_hex() {
        let res: Result<Decoded<Hex>, _> = serde_json::from_str("\"not-hex!!\"");
        assert!(res.is_err());
    }
}
