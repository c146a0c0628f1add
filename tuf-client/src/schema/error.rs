// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while parsing and verifying the data model in [`crate::schema`].

use snafu::Snafu;

/// The result type returned by functions in [`crate::schema`].
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for [`crate::schema`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// A key's declared `keyid` did not match the key ID computed from its own contents.
    #[snafu(display("key ID '{}' does not match calculated key ID '{}'", keyid, calculated))]
    InvalidKeyId {
        /// The declared key ID.
        keyid: String,
        /// The key ID computed from the key's canonical JSON form.
        calculated: String,
    },

    /// The same key ID appeared more than once in a single key map.
    #[snafu(display("duplicate key ID '{}'", keyid))]
    DuplicateKeyId {
        /// The repeated key ID.
        keyid: String,
    },

    /// A key declared `keyid_hash_algorithms` other than exactly `["sha256", "sha512"]`.
    #[snafu(display(
        "key declares unsupported keyid_hash_algorithms (must be exactly [\"sha256\", \"sha512\"])"
    ))]
    UnsupportedHashAlgorithms,

    /// A role's metadata JSON carried a key whose name is not part of its fixed schema.
    #[snafu(display("unrecognized field '{}' in {} metadata", field, what))]
    UnknownField {
        /// The role or structure being parsed.
        what: &'static str,
        /// The unrecognized field name.
        field: String,
    },

    /// A role's metadata JSON was missing a required field.
    #[snafu(display("missing required field '{}' in {} metadata", field, what))]
    MissingField {
        /// The role or structure being parsed.
        what: &'static str,
        /// The missing field name.
        field: &'static str,
    },

    /// A delegated role name did not match `^[0-9a-z-]+$`.
    #[snafu(display("invalid delegated role name '{}'", name))]
    InvalidRoleName {
        /// The offending name.
        name: String,
    },

    /// A delegated path pattern did not match the allowed grammar.
    #[snafu(display("invalid delegated path pattern '{}'", pattern))]
    InvalidPathPattern {
        /// The offending pattern.
        pattern: String,
    },

    /// Two delegations in a single `Targets` role shared a name.
    #[snafu(display("duplicate delegated role name '{}'", name))]
    DuplicateDelegatedRole {
        /// The repeated name.
        name: String,
    },

    /// `spec_version`'s major component was not 1.
    #[snafu(display("unsupported spec_version '{}' (major version must be 1)", spec_version))]
    UnsupportedSpecVersion {
        /// The offending `spec_version` string.
        spec_version: String,
    },

    /// RSA public key material could not be parsed as PEM.
    #[snafu(display("RSA public key is not valid PEM: {}", source))]
    InvalidPemKey {
        /// The underlying PEM-decoding error.
        source: pem::PemError,
    },

    /// RSA public key material was valid PEM but not a valid SubjectPublicKeyInfo.
    #[snafu(display("RSA public key is not a valid SubjectPublicKeyInfo: {}", message))]
    InvalidSpkiKey {
        /// A description of the parse failure.
        message: String,
    },

    /// A role name did not resolve to any visited delegation.
    #[snafu(display("role '{}' not found", name))]
    RoleNotFound {
        /// The role name searched for.
        name: String,
    },

    /// A delegation's own path patterns are not a subset of its delegator's.
    #[snafu(display("delegated path '{}' is not covered by the delegating role", child))]
    UnmatchedPath {
        /// The delegated path that escaped its delegator's authorization.
        child: String,
    },

    /// A role's body could not be serialized to its canonical JSON form.
    #[snafu(display("failed to serialize {} to canonical JSON: {}", what, message))]
    JsonSerialization {
        /// What was being serialized.
        what: &'static str,
        /// A description of the underlying canonicalization failure.
        message: String,
    },

    /// Fewer distinct, valid signatures were found over a role than its threshold requires.
    #[snafu(display(
        "signature threshold not met for {} role: {} of {} required valid signatures",
        what,
        have,
        need
    ))]
    SignatureThreshold {
        /// The role being verified.
        what: &'static str,
        /// The number of distinct valid signatures found.
        have: u64,
        /// The threshold required.
        need: u64,
    },
}
