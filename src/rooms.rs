//! Namespace membership
//!
//! Groups connections by application namespace for broadcast addressing. A
//! connection joins exactly one namespace at connect time and the association
//! is immutable; the membership lifetime itself is owned by the transport
//! collaborator, this side only mirrors it for addressing and bookkeeping.
//!
//! Fan-out to a namespace is delegated to the transport's group-send
//! primitive via an opaque [`BroadcastGroup`]; individual members are never
//! enumerated here.

use dashmap::DashMap;
use tracing::debug;

/// Opaque handle addressing every connection joined to a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastGroup(String);

impl BroadcastGroup {
    pub fn namespace(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BroadcastGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace membership bookkeeping
#[derive(Debug, Default)]
pub struct Rooms {
    /// Namespace → member handles in join order
    members: DashMap<String, Vec<u64>>,

    /// Handle → namespace it joined
    index: DashMap<u64, String>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a connection to its namespace group. Called once per connection
    /// at connect time; re-joining is a no-op.
    pub fn join(&self, namespace: &str, handle: u64) {
        self.index.insert(handle, namespace.to_string());

        let mut members = self.members.entry(namespace.to_string()).or_default();
        if !members.contains(&handle) {
            members.push(handle);
        }
        drop(members);

        debug!(namespace, handle, "joined namespace group");
    }

    /// Drop the bookkeeping for a connection the transport reported gone
    pub fn forget(&self, handle: u64) {
        if let Some((_, namespace)) = self.index.remove(&handle) {
            self.members.alter(&namespace, |_, mut handles| {
                handles.retain(|&h| h != handle);
                handles
            });
            self.members.remove_if(&namespace, |_, handles| handles.is_empty());
        }
    }

    /// Group handle for addressing a namespace broadcast
    pub fn group(&self, namespace: &str) -> BroadcastGroup {
        BroadcastGroup(namespace.to_string())
    }

    /// Namespace a handle joined, if it is tracked
    pub fn namespace_of(&self, handle: u64) -> Option<String> {
        self.index.get(&handle).map(|ns| ns.clone())
    }

    /// Tracked member count for a namespace
    pub fn member_count(&self, namespace: &str) -> usize {
        self.members.get(namespace).map(|m| m.len()).unwrap_or(0)
    }
}
