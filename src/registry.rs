//! Session registry
//!
//! Single source of truth for which connections belong to which identity.
//! Owns the identity → session map and the reverse handle → identity index
//! used to resolve a disconnecting handle without a linear scan.
//!
//! Uses DashMap sharded locking so both event sources (pub/sub messages and
//! connection lifecycle events) can call in concurrently.

use dashmap::DashMap;
use tracing::debug;

use crate::session::Session;

/// Reverse-index entry: where a connection handle belongs
#[derive(Debug, Clone)]
struct HandleEntry {
    identity: String,
    namespace: String,
}

/// Outcome of a successful deregistration
///
/// Carries the identity/namespace so the caller can still build a lifecycle
/// envelope after the session object itself may have been destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deregistration {
    pub identity: String,
    pub namespace: String,
    /// Connections remaining for the identity (0 if the session was destroyed)
    pub remaining: usize,
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Disconnect for a handle that was never registered or already removed.
    /// The most common real-world race; callers log and continue.
    #[error("unknown connection handle: {0}")]
    UnknownHandle(u64),
}

/// In-memory session registry
///
/// A session exists here iff it has at least one live connection handle:
/// created on the first connect for an identity, destroyed when the last
/// handle is removed. State is process-wide and rebuilt from scratch on
/// restart.
#[derive(Debug, Default)]
pub struct Registry {
    /// Identity token → session
    sessions: DashMap<String, Session>,

    /// Connection handle → identity/namespace (reverse index)
    handles: DashMap<u64, HandleEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, creating the session on first connect.
    ///
    /// Idempotent per handle: re-registering is an overwrite, never a
    /// duplicate entry. Returns the post-mutation connection count for the
    /// identity.
    pub fn register(&self, namespace: &str, identity: &str, handle: u64) -> usize {
        self.handles.insert(
            handle,
            HandleEntry {
                identity: identity.to_string(),
                namespace: namespace.to_string(),
            },
        );

        // entry() serializes racing connects for the same identity
        let mut session = self
            .sessions
            .entry(identity.to_string())
            .or_insert_with(|| Session::new(identity, namespace));
        session.add_handle(handle);
        let count = session.handle_count();
        drop(session);

        debug!(identity, namespace, handle, sessions = count, "connection registered");
        count
    }

    /// Deregister a connection, destroying the session when its last handle
    /// is removed.
    pub fn deregister(&self, handle: u64) -> Result<Deregistration, RegistryError> {
        let (_, entry) = self
            .handles
            .remove(&handle)
            .ok_or(RegistryError::UnknownHandle(handle))?;

        let remaining = match self.sessions.get_mut(&entry.identity) {
            Some(mut session) => {
                session.remove_handle(handle);
                session.handle_count()
            }
            None => 0,
        };

        if remaining == 0 {
            // Re-check emptiness under the shard lock: a connect may have
            // raced in between the count and the removal
            self.sessions.remove_if(&entry.identity, |_, s| s.is_empty());
        }

        debug!(
            identity = %entry.identity,
            namespace = %entry.namespace,
            handle,
            sessions = remaining,
            "connection deregistered"
        );

        Ok(Deregistration {
            identity: entry.identity,
            namespace: entry.namespace,
            remaining,
        })
    }

    /// Connection handles for an identity, in arrival order.
    ///
    /// Empty if the identity has no live connections; absence is a normal
    /// outcome, not an error.
    pub fn connections_for(&self, identity: &str) -> Vec<u64> {
        self.sessions
            .get(identity)
            .map(|s| s.handles().to_vec())
            .unwrap_or_default()
    }

    /// Number of live sessions (identities with at least one connection)
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Total number of live connections
    pub fn connection_count(&self) -> usize {
        self.handles.len()
    }
}
