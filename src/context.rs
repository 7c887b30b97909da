//! Run-scoped state shared across every document of a verification run
//!
//! A [`RunContext`] is created empty at the start of a run and dropped at its
//! end. Both tables are first-write-wins: the first document to set a tag or
//! register an identity owns it for the rest of the run.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Namespace assumed when a resource does not declare one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity of a resource within a run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub name: String,
    pub namespace: String,
    pub kind: String,
}

impl ResourceIdentity {
    pub fn new(
        name: impl Into<String>,
        namespace: Option<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Canonical values for TAG() checks
#[derive(Debug, Default)]
pub struct TagTable {
    values: HashMap<String, String>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical value recorded for a tag, if any
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.values.get(tag).map(String::as_str)
    }

    /// Record a tag's canonical value. Existing entries are never replaced.
    ///
    /// Returns true if the value was recorded.
    pub fn record(&mut self, tag: &str, value: impl Into<String>) -> bool {
        if self.values.contains_key(tag) {
            return false;
        }
        self.values.insert(tag.to_string(), value.into());
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Every resource identity seen so far in the run
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    seen: HashSet<ResourceIdentity>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity. Returns false if it was already registered.
    pub fn register(&mut self, identity: ResourceIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Mutable state threaded through one verification run
#[derive(Debug, Default)]
pub struct RunContext {
    pub tags: TagTable,
    pub identities: IdentityRegistry,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}
