// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use std::collections::HashMap;
use std::slice;

/// An iterator over the keys belonging to a role, resolved against the owning `Root`'s (or
/// `Delegations`'s) key map. Key IDs that the map does not contain (which should not happen in a
/// well-formed, already-validated repository) are silently skipped rather than panicking.
pub(crate) struct KeysIter<'a> {
    pub(crate) keyids_iter: slice::Iter<'a, Decoded<Hex>>,
    pub(crate) keys: &'a HashMap<Decoded<Hex>, Key>,
}

impl<'a> Iterator for KeysIter<'a> {
    type Item = &'a Key;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let keyid = self.keyids_iter.next()?;
            if let Some(key) = self.keys.get(keyid) {
                return Some(key);
            }
        }
    }
}
