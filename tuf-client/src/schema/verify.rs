// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The crypto oracle (§4.1): `verify(scheme, material, signature, message) -> bool`. Bad
//! signatures are reported as `false`, never as an error; only malformed key material escapes
//! this module as an error, and even that is handled by the caller ([`crate::schema::key::Key`]),
//! not here — by the time bytes reach these functions the key material is known-well-formed.

use aws_lc_rs::signature::{self, UnparsedPublicKey};

/// Verifies an ECDSA-P256/SHA256 signature (wire signature is ASN.1 DER, per the scheme's key
/// exchange convention shared with this crate's signing side).
pub(super) fn verify_ecdsa_p256_sha256(public_key: &[u8], sig: &[u8], msg: &[u8]) -> bool {
    UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, public_key)
        .verify(msg, sig)
        .is_ok()
}

/// Verifies an Ed25519 signature.
pub(super) fn verify_ed25519(public_key: &[u8], sig: &[u8], msg: &[u8]) -> bool {
    UnparsedPublicKey::new(&signature::ED25519, public_key)
        .verify(msg, sig)
        .is_ok()
}

/// Verifies an RSASSA-PSS/SHA256 signature. `public_key` is the DER-encoded `RSAPublicKey`
/// (modulus + exponent) extracted from the key's PEM `SubjectPublicKeyInfo` by
/// [`crate::schema::spki`].
pub(super) fn verify_rsassa_pss_sha256(public_key: &[u8], sig: &[u8], msg: &[u8]) -> bool {
    UnparsedPublicKey::new(&signature::RSA_PSS_2048_8192_SHA256, public_key)
        .verify(msg, sig)
        .is_ok()
}
