// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RSA public key material, per the specification, arrives as PEM-encoded X.509
//! SubjectPublicKeyInfo rather than as a raw hex digest like the ECDSA/Ed25519 schemes. This
//! module extracts the DER-encoded `RSAPublicKey` (modulus + exponent) that the crypto oracle's
//! RSASSA-PSS verifier expects.

use crate::schema::error::{self, Result};
use pkcs8::der::Decode;
use pkcs8::SubjectPublicKeyInfoRef;
use snafu::ResultExt;

/// Parses a PEM-encoded SubjectPublicKeyInfo block and returns the inner RSA public key bytes
/// (the DER `RSAPublicKey` sequence carried in the SPKI's `subjectPublicKey` bit string).
pub(super) fn rsa_public_key_from_pem(pem_str: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str.trim()).context(error::InvalidPemKeySnafu)?;
    let spki = SubjectPublicKeyInfoRef::from_der(pem.contents())
        .map_err(|e| error::Error::InvalidSpkiKey {
            message: e.to_string(),
        })?;
    let bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| error::Error::InvalidSpkiKey {
            message: "SubjectPublicKeyInfo bit string is not byte-aligned".to_string(),
        })?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_pem() {
        assert!(rsa_public_key_from_pem("not a pem").is_err());
    }
}
