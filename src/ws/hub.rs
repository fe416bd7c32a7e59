//! Process-wide registry of live notification sessions.
//!
//! Sessions are keyed by a monotonically allocated id and indexed by user id.
//! Dispatch never blocks: each session owns a bounded outbound buffer and a
//! full buffer drops that one payload for that one session.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc::{self, error::TrySendError};

/// Capacity of each session's outbound buffer.
pub const OUTBOUND_CAPACITY: usize = 256;

pub type SessionId = u64;

/// A serialized frame shared by every session it is fanned out to.
pub type Payload = Arc<str>;

/// Hub-side view of a session: its identity and the producer end of its buffer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user_id: i64,
    pub outbound: mpsc::Sender<Payload>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, SessionHandle>,
    by_user: HashMap<i64, HashSet<SessionId>>,
}

impl Registry {
    fn remove(&mut self, session_id: SessionId) -> Option<SessionHandle> {
        let removed = self.sessions.remove(&session_id)?;
        if let Some(ids) = self.by_user.get_mut(&removed.user_id) {
            ids.remove(&session_id);
            if ids.is_empty() {
                self.by_user.remove(&removed.user_id);
            }
        }
        Some(removed)
    }
}

#[derive(Default)]
pub struct Hub {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a session id and its outbound buffer. The receiver belongs to the writer task.
    pub fn open_session(&self, user_id: i64) -> (SessionHandle, mpsc::Receiver<Payload>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (
            SessionHandle {
                id,
                user_id,
                outbound,
            },
            rx,
        )
    }

    /// Insert a session, replacing any entry with the same id.
    pub fn register(&self, session: SessionHandle) {
        let mut registry = self.write();
        if let Some(previous) = registry.remove(session.id) {
            tracing::debug!(session_id = previous.id, "replacing registered session");
        }
        registry
            .by_user
            .entry(session.user_id)
            .or_default()
            .insert(session.id);
        tracing::info!(session_id = session.id, user_id = session.user_id, "session registered");
        registry.sessions.insert(session.id, session);
    }

    /// Remove a session and close its outbound buffer. Returns `false` when it was already gone.
    ///
    /// The hub holds the only strong sender, so dropping the entry closes the buffer.
    pub fn unregister(&self, session_id: SessionId) -> bool {
        let removed = self.write().remove(session_id);
        match removed {
            Some(session) => {
                tracing::info!(session_id, user_id = session.user_id, "session unregistered");
                true
            }
            None => false,
        }
    }

    /// Best-effort fan-out to every session of `user_id`. Returns how many sessions accepted it.
    pub fn send_to_user(&self, user_id: i64, payload: &Payload) -> usize {
        let registry = self.read();
        let Some(ids) = registry.by_user.get(&user_id) else {
            return 0;
        };
        ids.iter()
            .filter_map(|id| registry.sessions.get(id))
            .filter(|session| try_deliver(session, payload))
            .count()
    }

    /// Best-effort delivery to a single session.
    pub fn send_to_session(&self, session_id: SessionId, payload: &Payload) -> bool {
        self.read()
            .sessions
            .get(&session_id)
            .is_some_and(|session| try_deliver(session, payload))
    }

    /// Best-effort fan-out to every registered session.
    pub fn broadcast_all(&self, payload: &Payload) -> usize {
        self.read()
            .sessions
            .values()
            .filter(|session| try_deliver(session, payload))
            .count()
    }

    pub fn connected_sessions(&self) -> usize {
        self.read().sessions.len()
    }

    pub fn connected_users(&self) -> usize {
        self.read().by_user.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn try_deliver(session: &SessionHandle, payload: &Payload) -> bool {
    match session.outbound.try_send(payload.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(
                session_id = session.id,
                user_id = session.user_id,
                "session buffer full, dropping payload"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(session_id = session.id, "session buffer closed, skipping");
            false
        }
    }
}
