//! # Capability Matching
//!
//! Prefix-wildcard matching of held permissions against the permissions an
//! activity requires. A `*` anywhere in a pattern is removed and the rest is
//! used as a prefix; there is no glob or regex semantics beyond that.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Check whether any required pattern is satisfied by any held permission.
///
/// A required pattern is satisfied when:
/// 1. it equals a held permission, or
/// 2. it contains `*` and a held permission starts with the pattern minus its `*`s, or
/// 3. a held permission contains `*` and the pattern starts with that permission minus its `*`s.
///
/// # Example
///
/// ```
/// use iam_policy::matches;
/// use std::collections::HashSet;
///
/// let held: HashSet<String> = ["settings:objects:read".to_string()].into();
/// assert!(matches(&held, &["settings:*"]));
/// assert!(!matches(&held, &["storage:*"]));
///
/// let admin: HashSet<String> = ["account:*".to_string()].into();
/// assert!(matches(&admin, &["account:users:read"]));
/// ```
pub fn matches<R: AsRef<str>>(held: &HashSet<String>, required: &[R]) -> bool {
    required.iter().any(|req| {
        let req = req.as_ref();
        if held.contains(req) {
            return true;
        }
        held.iter().any(|perm| {
            (req.contains('*') && perm.starts_with(&req.replace('*', "")))
                || (perm.contains('*') && req.starts_with(&perm.replace('*', "")))
        })
    })
}

/// The set of actions an entity holds.
///
/// # Example
///
/// ```
/// use iam_policy::HeldPermissions;
///
/// let mut held = HeldPermissions::new();
/// held.insert("account:users:read");
/// held.insert("account:groups:read");
///
/// assert!(held.satisfies(&["account:users:*"]));
/// assert_eq!(held.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldPermissions {
    permissions: HashSet<String>,
}

impl HeldPermissions {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self {
            permissions: HashSet::new(),
        }
    }

    /// Add an action to the set.
    pub fn insert(&mut self, permission: impl Into<String>) {
        self.permissions.insert(permission.into());
    }

    /// Check if the set contains an action verbatim.
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Check the set against an activity's requirement list (see [`matches`]).
    pub fn satisfies<R: AsRef<str>>(&self, required: &[R]) -> bool {
        matches(&self.permissions, required)
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: &HeldPermissions) {
        self.permissions.extend(other.permissions.iter().cloned());
    }

    /// Get the count of actions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Actions in lexicographic order.
    pub fn sorted(&self) -> Vec<String> {
        let mut all: Vec<String> = self.permissions.iter().cloned().collect();
        all.sort();
        all
    }

    /// Borrow the underlying set.
    pub fn as_set(&self) -> &HashSet<String> {
        &self.permissions
    }
}

impl<S: Into<String>> FromIterator<S> for HeldPermissions {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut held = HeldPermissions::new();
        for perm in iter {
            held.insert(perm);
        }
        held
    }
}
