//! Identity tracking for shared and cyclic references.

use std::collections::HashMap;

use crate::value::{SpecRef, SpecTypeName};

/// Identity of one source allocation: storage address plus static type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecIdentityKey {
    /// Storage identity of the referenced cell.
    pub n_addr: usize,
    /// Static type of the referent.
    pub ty: SpecTypeName,
}

impl SpecIdentityKey {
    pub fn of(target: &SpecRef, elem: &SpecTypeName) -> Self {
        Self {
            n_addr: target.addr(),
            ty: elem.clone(),
        }
    }
}

/// Per-invocation map from source storage to its copy.
///
/// A copy is registered before its referent is traversed, so a cycle back to
/// the same key observes the in-progress copy instead of recursing again.
#[derive(Debug, Default)]
pub struct IdentityTracker {
    dict_copies: HashMap<SpecIdentityKey, SpecRef>,
}

impl IdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy already created for `key`.
    pub fn lookup(&self, key: &SpecIdentityKey) -> Option<SpecRef> {
        self.dict_copies.get(key).cloned()
    }

    /// Record `copy` for `key`. Returns `false` if the key was already tracked,
    /// in which case the existing entry is kept.
    pub fn register(&mut self, key: SpecIdentityKey, copy: SpecRef) -> bool {
        if self.dict_copies.contains_key(&key) {
            return false;
        }
        self.dict_copies.insert(key, copy);
        true
    }

    pub fn len(&self) -> usize {
        self.dict_copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_copies.is_empty()
    }
}
