//! Session store: the keyed container of every live session.
//!
//! The store knows nothing about game rules. It spawns an actor for each
//! session it is given, keeps the actor's handle under the session id, and
//! hands out clones of those handles. Its lock guards only the map; it is
//! never held while talking to a session, so sessions never wait on each
//! other.

use std::collections::HashMap;

use noughts_protocol::{Session, SessionId};
use tokio::sync::RwLock;

use crate::actor::{SessionHandle, spawn_session};

/// Default command channel size for session actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

struct Slot {
    /// Insertion counter, used to list sessions in creation order.
    seq: u64,
    handle: SessionHandle,
}

#[derive(Default)]
struct Slots {
    by_id: HashMap<SessionId, Slot>,
    next_seq: u64,
}

/// Keyed container of live sessions.
pub struct SessionStore {
    slots: RwLock<Slots>,
    channel_size: usize,
}

impl SessionStore {
    /// Creates an empty store whose session actors queue up to
    /// `channel_size` commands each.
    pub fn new(channel_size: usize) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            channel_size,
        }
    }

    /// Takes ownership of `session`, starting its actor, and returns a
    /// handle to it.
    pub async fn create(&self, session: Session) -> SessionHandle {
        let handle = spawn_session(session, self.channel_size);
        let mut slots = self.slots.write().await;
        let seq = slots.next_seq;
        slots.next_seq += 1;
        slots.by_id.insert(
            handle.session_id(),
            Slot {
                seq,
                handle: handle.clone(),
            },
        );
        handle
    }

    /// Looks up a session's handle.
    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.slots
            .read()
            .await
            .by_id
            .get(id)
            .map(|slot| slot.handle.clone())
    }

    /// Handles to every session, in creation order.
    pub async fn handles(&self) -> Vec<SessionHandle> {
        let slots = self.slots.read().await;
        let mut ordered: Vec<&Slot> = slots.by_id.values().collect();
        ordered.sort_by_key(|slot| slot.seq);
        ordered.into_iter().map(|slot| slot.handle.clone()).collect()
    }

    /// Snapshots of every session, in creation order.
    ///
    /// A session deleted while the list is being built is left out.
    pub async fn list(&self) -> Vec<Session> {
        let handles = self.handles().await;
        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(session) = handle.snapshot().await {
                sessions.push(session);
            }
        }
        sessions
    }

    /// Snapshots of the Versus sessions still waiting for a second
    /// participant, in creation order.
    pub async fn list_waiting(&self) -> Vec<Session> {
        self.list()
            .await
            .into_iter()
            .filter(Session::is_waiting)
            .collect()
    }

    /// Removes a session and stops its actor.
    ///
    /// Returns whether the session existed.
    pub async fn delete(&self, id: &SessionId) -> bool {
        let removed = self.slots.write().await.by_id.remove(id);
        match removed {
            Some(slot) => {
                slot.handle.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Number of sessions in the store.
    pub async fn len(&self) -> usize {
        self.slots.read().await.by_id.len()
    }

    /// Returns `true` if the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.by_id.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_SIZE)
    }
}
