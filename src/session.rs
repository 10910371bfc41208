//! Session bookkeeping
//!
//! A session is the live set of connection handles for one identity within
//! one namespace. The registry is its exclusive owner.

/// The live connections of one identity
#[derive(Debug)]
pub struct Session {
    /// Identity token (shared across devices/tabs, not unique per connection)
    pub identity: String,
    /// Namespace joined at connect time, immutable thereafter
    pub namespace: String,
    /// Connection handles in arrival order
    handles: Vec<u64>,
}

impl Session {
    pub fn new(identity: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            namespace: namespace.into(),
            handles: Vec::new(),
        }
    }

    /// Append a handle, preserving arrival order. Re-adding a handle that is
    /// already present is a no-op.
    pub fn add_handle(&mut self, handle: u64) {
        if !self.handles.contains(&handle) {
            self.handles.push(handle);
        }
    }

    /// Remove a handle. Returns false if it was not present.
    pub fn remove_handle(&mut self, handle: u64) -> bool {
        match self.handles.iter().position(|&h| h == handle) {
            Some(pos) => {
                self.handles.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Handles in arrival order
    pub fn handles(&self) -> &[u64] {
        &self.handles
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
