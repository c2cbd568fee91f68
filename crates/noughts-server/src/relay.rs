//! Notification relay: who is attached to which session, and fan-out.
//!
//! The relay keeps two maps. `peers` maps a participant to the outbound
//! queue of their connection; `groups` maps a session to the participants
//! watching it. Groups are a delivery concern only. They never decide
//! who may play, which is the engine's job.
//!
//! Delivery is fire-and-forget over unbounded channels: a peer whose
//! connection is gone is skipped silently.

use std::collections::{HashMap, HashSet};

use noughts_protocol::{Event, ParticipantId, Payload, SessionId};
use tokio::sync::{RwLock, mpsc};

/// A frame queued for one connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// The `seq` of the command this answers; `None` for pushed events.
    pub reply_to: Option<u64>,
    pub payload: Payload,
}

impl Outgoing {
    pub fn reply(seq: u64, payload: Payload) -> Self {
        Self {
            reply_to: Some(seq),
            payload,
        }
    }

    pub fn event(event: Event) -> Self {
        Self {
            reply_to: None,
            payload: Payload::Event(event),
        }
    }
}

/// Sender half of a connection's outbound queue.
pub type PeerSender = mpsc::UnboundedSender<Outgoing>;

/// Who receives an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every member of the session's group.
    Group(SessionId),
    /// Every member of the session's group except one.
    GroupExcept(SessionId, ParticipantId),
}

/// An event and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub recipient: Recipient,
    pub event: Event,
}

impl Notice {
    pub fn group(session_id: SessionId, event: Event) -> Self {
        Self {
            recipient: Recipient::Group(session_id),
            event,
        }
    }

    pub fn others(session_id: SessionId, except: ParticipantId, event: Event) -> Self {
        Self {
            recipient: Recipient::GroupExcept(session_id, except),
            event,
        }
    }

    /// The session whose group receives this notice.
    pub fn session_id(&self) -> SessionId {
        match &self.recipient {
            Recipient::Group(id) | Recipient::GroupExcept(id, _) => *id,
        }
    }
}

/// A change to the caller's group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Add the caller to the session's group.
    Enter(SessionId),
    /// Remove the caller from the session's group.
    Exit(SessionId),
    /// Drop the session's group entirely.
    Dissolve(SessionId),
}

#[derive(Default)]
struct Registry {
    peers: HashMap<ParticipantId, PeerSender>,
    groups: HashMap<SessionId, HashSet<ParticipantId>>,
}

/// Tracks connections and session groups and fans events out to them.
#[derive(Default)]
pub struct Relay {
    registry: RwLock<Registry>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection's outbound queue.
    pub async fn register(&self, participant_id: ParticipantId, sender: PeerSender) {
        self.registry
            .write()
            .await
            .peers
            .insert(participant_id, sender);
    }

    /// Forgets a connection and removes it from every group.
    pub async fn unregister(&self, participant_id: &ParticipantId) {
        let mut registry = self.registry.write().await;
        registry.peers.remove(participant_id);
        registry.groups.retain(|_, members| {
            members.remove(participant_id);
            !members.is_empty()
        });
    }

    /// Applies a membership change on behalf of `participant_id`.
    pub async fn apply(&self, participant_id: &ParticipantId, change: Membership) {
        let mut registry = self.registry.write().await;
        match change {
            Membership::Enter(session_id) => {
                registry
                    .groups
                    .entry(session_id)
                    .or_default()
                    .insert(participant_id.clone());
            }
            Membership::Exit(session_id) => {
                if let Some(members) = registry.groups.get_mut(&session_id) {
                    members.remove(participant_id);
                    if members.is_empty() {
                        registry.groups.remove(&session_id);
                    }
                }
            }
            Membership::Dissolve(session_id) => {
                registry.groups.remove(&session_id);
            }
        }
    }

    /// Drops a session's group.
    pub async fn dissolve(&self, session_id: &SessionId) {
        self.registry.write().await.groups.remove(session_id);
    }

    /// Delivers a notice to its recipients and returns how many were
    /// reached.
    pub async fn deliver(&self, notice: Notice) -> usize {
        let registry = self.registry.read().await;
        let (session_id, except) = match &notice.recipient {
            Recipient::Group(session_id) => (session_id, None),
            Recipient::GroupExcept(session_id, except) => (session_id, Some(except)),
        };
        let Some(members) = registry.groups.get(session_id) else {
            return 0;
        };

        let mut reached = 0;
        for member in members {
            if Some(member) == except {
                continue;
            }
            let Some(sender) = registry.peers.get(member) else {
                continue;
            };
            if sender.send(Outgoing::event(notice.event.clone())).is_ok() {
                reached += 1;
            }
        }
        reached
    }
}
