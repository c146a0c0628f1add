// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `Key` tagged enum and its three recognized variants (§3, §4.1 of the specification).

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::error::{self, Result};
use crate::schema::spki;
use crate::schema::verify;
use aws_lc_rs::digest::{digest, SHA256};
use olpc_cjson::to_canonical_vec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_plain::{forward_display_to_serde, forward_from_str_to_serde};
use snafu::ensure;
use std::collections::HashMap;

/// A public key, tagged by its `keytype`. Key identity (the `keyid` used throughout the rest of
/// the metadata) is derived from the scheme and the key material, never supplied independently.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "keytype")]
pub enum Key {
    /// An ECDSA key over the P-256 curve, verified against SHA-256 message digests.
    #[serde(rename = "ecdsa-sha2-nistp256")]
    Ecdsa {
        /// The hash algorithms this key's ID may be computed with. The specification requires
        /// this be exactly `["sha256", "sha512"]`.
        keyid_hash_algorithms: Vec<String>,
        /// The signature scheme.
        scheme: EcdsaScheme,
        /// The key material.
        keyval: EcdsaKey,
        /// Extra fields found during deserialization, preserved so `key_id()` round-trips.
        #[serde(flatten)]
        _extra: HashMap<String, Value>,
    },
    /// An Ed25519 key.
    #[serde(rename = "ed25519")]
    Ed25519 {
        /// The hash algorithms this key's ID may be computed with.
        keyid_hash_algorithms: Vec<String>,
        /// The signature scheme.
        scheme: Ed25519Scheme,
        /// The key material.
        keyval: Ed25519Key,
        /// Extra fields found during deserialization.
        #[serde(flatten)]
        _extra: HashMap<String, Value>,
    },
    /// An RSA key, verified with RSASSA-PSS over SHA-256.
    #[serde(rename = "rsa")]
    Rsa {
        /// The hash algorithms this key's ID may be computed with.
        keyid_hash_algorithms: Vec<String>,
        /// The signature scheme.
        scheme: RsaScheme,
        /// The key material.
        keyval: RsaKey,
        /// Extra fields found during deserialization.
        #[serde(flatten)]
        _extra: HashMap<String, Value>,
    },
}

/// The lone recognized ECDSA scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaScheme {
    /// `ecdsa-sha2-nistp256`
    EcdsaSha2Nistp256,
}

forward_display_to_serde!(EcdsaScheme);
forward_from_str_to_serde!(EcdsaScheme);

impl Serialize for EcdsaScheme {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("ecdsa-sha2-nistp256")
    }
}

impl<'de> Deserialize<'de> for EcdsaScheme {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "ecdsa-sha2-nistp256" {
            Ok(EcdsaScheme::EcdsaSha2Nistp256)
        } else {
            Err(serde::de::Error::custom(format!("bad ecdsa scheme: {s}")))
        }
    }
}

/// The lone recognized Ed25519 scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ed25519Scheme {
    /// `ed25519`
    #[serde(rename = "ed25519")]
    Ed25519,
}

/// The lone recognized RSA scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsaScheme {
    /// `rsassa-pss-sha256`
    #[serde(rename = "rsassa-pss-sha256")]
    RsassaPssSha256,
}

/// ECDSA key material: hex-encoded uncompressed point.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EcdsaKey {
    /// The hex-encoded public key point.
    pub public: Decoded<Hex>,
    /// Extra fields found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// Ed25519 key material: hex-encoded 32-byte public key.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Ed25519Key {
    /// The hex-encoded public key.
    pub public: Decoded<Hex>,
    /// Extra fields found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// RSA key material: a PEM-encoded `SubjectPublicKeyInfo`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RsaKey {
    /// The PEM-encoded public key.
    pub public: String,
    /// Extra fields found during deserialization.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

impl Key {
    /// The hash algorithms this key declares for its own `keyid` computation. The specification
    /// requires this be exactly `["sha256", "sha512"]`; see [`Key::validate`].
    pub fn keyid_hash_algorithms(&self) -> &[String] {
        match self {
            Key::Ecdsa { keyid_hash_algorithms, .. }
            | Key::Ed25519 { keyid_hash_algorithms, .. }
            | Key::Rsa { keyid_hash_algorithms, .. } => keyid_hash_algorithms,
        }
    }

    /// Rejects a key whose declared `keyid_hash_algorithms` is anything other than exactly
    /// `["sha256", "sha512"]` (§4.3).
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.keyid_hash_algorithms() == ["sha256".to_string(), "sha512".to_string()],
            error::UnsupportedHashAlgorithmsSnafu
        );
        Ok(())
    }

    /// Computes this key's ID: the hex-encoded SHA-256 digest of the key's own canonical JSON
    /// representation.
    pub fn key_id(&self) -> Result<Decoded<Hex>> {
        let canonical = to_canonical_vec(self).map_err(|e| error::Error::JsonSerialization {
            what: "key",
            message: e.to_string(),
        })?;
        let computed = digest(&SHA256, &canonical);
        Ok(Decoded::from(computed.as_ref().to_vec()))
    }

    /// Verifies `sig` over `msg` using this key's scheme and material. Returns `Ok(false)` for a
    /// bad signature (never an error); returns `Err` only if the key material itself is
    /// malformed and therefore cannot be used at all.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<bool> {
        match self {
            Key::Ecdsa { keyval, .. } => Ok(verify::verify_ecdsa_p256_sha256(&keyval.public, sig, msg)),
            Key::Ed25519 { keyval, .. } => Ok(verify::verify_ed25519(&keyval.public, sig, msg)),
            Key::Rsa { keyval, .. } => {
                let der = spki::rsa_public_key_from_pem(&keyval.public)?;
                Ok(verify::verify_rsassa_pss_sha256(&der, sig, msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_hash_algorithms() {
        let key = Key::Ed25519 {
            keyid_hash_algorithms: vec!["sha1".to_string()],
            scheme: Ed25519Scheme::Ed25519,
            keyval: Ed25519Key {
                public: Decoded::from(vec![0u8; 32]),
                _extra: HashMap::new(),
            },
            _extra: HashMap::new(),
        };
        assert!(key.validate().is_err());
    }

    #[test]
    fn accepts_sha256_sha512() {
        let key = Key::Ed25519 {
            keyid_hash_algorithms: vec!["sha256".to_string(), "sha512".to_string()],
            scheme: Ed25519Scheme::Ed25519,
            keyval: Ed25519Key {
                public: Decoded::from(vec![0u8; 32]),
                _extra: HashMap::new(),
            },
            _extra: HashMap::new(),
        };
        assert!(key.validate().is_ok());
    }
}
