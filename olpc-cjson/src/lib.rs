// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`serde_json`] [`Formatter`] that emits [OLPC-style canonical JSON].
//!
//! Canonical JSON fixes one byte representation per logical document so that
//! independent parties computing a digest, or verifying a signature, over
//! the same data always agree. This crate does not sort object keys itself
//! (see [`to_canonical_vec`] for how that's achieved); it normalizes string
//! content to NFC and otherwise emits the same minimal, whitespace-free
//! output as `serde_json`'s built-in compact formatter.
//!
//! [OLPC-style canonical JSON]: http://wiki.laptop.org/go/Canonical_JSON

#![forbid(missing_debug_implementations, missing_copy_implementations)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]

use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;
use unicode_normalization::UnicodeNormalization;

/// A [`Formatter`] that writes string content normalized to Unicode NFC and
/// otherwise matches `serde_json`'s compact (whitespace-free) output.
///
/// Key ordering is not this formatter's job: feed it a [`serde_json::Value`]
/// (whose [`serde_json::Map`] is a `BTreeMap` when the `preserve_order`
/// feature is not enabled) rather than a typed struct, and keys at every
/// nesting level come out lexicographically sorted for free. See
/// [`to_canonical_vec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalFormatter {
    _private: (),
}

impl CanonicalFormatter {
    /// Creates a new `CanonicalFormatter`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Formatter for CanonicalFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let normalized: String = fragment.nfc().collect();
        writer.write_all(normalized.as_bytes())
    }
}

/// Errors produced while canonicalizing a value.
#[derive(Debug)]
pub enum Error {
    /// The value could not be converted to a [`serde_json::Value`] tree.
    ToValue(serde_json::Error),
    /// The canonicalized tree could not be serialized.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ToValue(e) => write!(f, "failed to convert value to a JSON tree: {e}"),
            Error::Serialize(e) => write!(f, "failed to serialize canonical JSON: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ToValue(e) | Error::Serialize(e) => Some(e),
        }
    }
}

/// Serializes `value` as canonical JSON: object keys sorted lexicographically
/// at every nesting level, UTF-8 output, integers without leading zeros,
/// strings NFC-normalized and minimally escaped, and no insignificant
/// whitespace.
///
/// `value` is first converted to a [`serde_json::Value`] tree (whose object
/// representation is key-sorted) so that structs, whose fields would
/// otherwise serialize in declaration order, and `HashMap`s, whose entries
/// would otherwise serialize in arbitrary order, both come out sorted.
pub fn to_canonical_vec<T>(value: &T) -> Result<Vec<u8>, Error>
where
    T: Serialize,
{
    let tree = serde_json::to_value(value).map_err(Error::ToValue)?;
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter::new());
    tree.serialize(&mut ser).map_err(Error::Serialize)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_derive::Serialize;
    use std::collections::HashMap;

    #[test]
    fn sorts_object_keys() {
        let mut map = HashMap::new();
        map.insert("zebra", 1);
        map.insert("apple", 2);
        map.insert("mango", 3);
        let out = to_canonical_vec(&map).unwrap();
        assert_eq!(out, br#"{"apple":2,"mango":3,"zebra":1}"#);
    }

    #[test]
    fn no_insignificant_whitespace() {
        #[derive(Serialize)]
        struct S {
            b: u32,
            a: Vec<u32>,
        }
        let out = to_canonical_vec(&S { b: 1, a: vec![1, 2, 3] }).unwrap();
        assert_eq!(out, br#"{"a":[1,2,3],"b":1}"#);
    }

    #[test]
    fn normalizes_to_nfc() {
        // "e" + combining acute accent U+0301 should normalize to U+00E9 (é).
        let decomposed = "e\u{0301}";
        let out = to_canonical_vec(&decomposed).unwrap();
        assert_eq!(out, "\"\u{e9}\"".as_bytes());
    }

    #[test]
    fn minimal_escaping_preserves_non_ascii() {
        let s = "héllo";
        let out = to_canonical_vec(&s).unwrap();
        assert_eq!(out, format!("\"{s}\"").as_bytes());
    }

    #[test]
    fn nested_maps_sort_at_every_level() {
        let mut inner = HashMap::new();
        inner.insert("z", 1);
        inner.insert("a", 2);
        let mut outer = HashMap::new();
        outer.insert("outer-z", inner.clone());
        outer.insert("outer-a", inner);
        let out = to_canonical_vec(&outer).unwrap();
        assert_eq!(
            out,
            br#"{"outer-a":{"a":2,"z":1},"outer-z":{"a":2,"z":1}}"#
        );
    }
}
