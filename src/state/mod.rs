//! Shared session state.
//!
//! The lifecycle controller is the only writer; HTTP handlers observe the
//! session through a read-only [`SessionWatch`]. A single `RwLock` guards the
//! state, so a reader never sees a partially applied transition.

use parking_lot::RwLock;
use std::sync::Arc;

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// True once the session is paired and connected.
    pub ready: bool,
    /// Pairing code awaiting a scan. Only present while not ready.
    pub pending_code: Option<String>,
}

#[derive(Default)]
struct Inner {
    ready: bool,
    pending_code: Option<String>,
}

/// Exclusive writer handle, owned by the lifecycle controller.
///
/// Deliberately not `Clone`: there is exactly one writer per session.
pub struct SessionStore {
    inner: Arc<RwLock<Inner>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Create a read-only view for HTTP handlers.
    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Record a pairing code. Forces `ready` off, upholding the invariant
    /// that a pending code only exists while the session is not ready.
    pub fn set_pending_code(&self, code: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.ready = false;
        inner.pending_code = Some(code.into());
    }

    /// Mark the session paired and connected. Clears any pending code.
    pub fn mark_ready(&self) {
        let mut inner = self.inner.write();
        inner.ready = true;
        inner.pending_code = None;
    }

    /// Mark the session logged out. Clears any pending code.
    pub fn mark_logged_out(&self) {
        let mut inner = self.inner.write();
        inner.ready = false;
        inner.pending_code = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read();
        SessionSnapshot {
            ready: inner.ready,
            pending_code: inner.pending_code.clone(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only accessor over the session state.
#[derive(Clone)]
pub struct SessionWatch {
    inner: Arc<RwLock<Inner>>,
}

impl SessionWatch {
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read();
        SessionSnapshot {
            ready: inner.ready,
            pending_code: inner.pending_code.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_is_not_ready() {
        let store = SessionStore::new();
        assert_eq!(store.snapshot(), SessionSnapshot::default());
    }

    #[test]
    fn test_pending_code_then_ready() {
        let store = SessionStore::new();
        store.set_pending_code("2@ABC");
        let snap = store.snapshot();
        assert!(!snap.ready);
        assert_eq!(snap.pending_code.as_deref(), Some("2@ABC"));

        store.mark_ready();
        let snap = store.snapshot();
        assert!(snap.ready);
        assert!(snap.pending_code.is_none());
    }

    #[test]
    fn test_logged_out_clears_everything() {
        let store = SessionStore::new();
        store.mark_ready();
        store.mark_logged_out();
        assert_eq!(store.snapshot(), SessionSnapshot::default());
    }

    #[test]
    fn test_ready_never_coexists_with_pending_code() {
        let store = SessionStore::new();
        // Exercise every transition and check the invariant after each.
        store.set_pending_code("2@A");
        store.mark_ready();
        store.set_pending_code("2@B");
        store.mark_logged_out();
        store.set_pending_code("2@C");
        store.mark_ready();
        let snap = store.snapshot();
        assert!(!(snap.ready && snap.pending_code.is_some()));
    }

    #[test]
    fn test_watch_sees_writer_updates() {
        let store = SessionStore::new();
        let watch = store.watch();
        assert!(!watch.snapshot().ready);
        store.mark_ready();
        assert!(watch.snapshot().ready);
    }
}
