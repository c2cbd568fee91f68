//! Session actor: an isolated Tokio task that owns one session.
//!
//! The actor is the only code that ever holds a `&mut Session`. Commands
//! arrive over an mpsc channel and are applied strictly one at a time,
//! which is what serializes concurrent moves on the same board. Reads are
//! answered with a clone taken between two commands, so a reader never
//! sees a half-applied move.

use chrono::{DateTime, Utc};
use noughts_protocol::{Mover, ParticipantId, Session, SessionId};
use tokio::sync::{mpsc, oneshot};

use crate::{GameError, rules};

/// Commands sent to a session actor through its channel.
///
/// Variants with a `reply` field are request/response: the caller waits on
/// the `oneshot` receiver for the result.
pub(crate) enum SessionCommand {
    /// Seat a participant (or welcome one back).
    Join {
        participant_id: ParticipantId,
        display_name: String,
        reply: oneshot::Sender<Result<Session, GameError>>,
    },

    /// Apply a move.
    Move {
        mover: Mover,
        row: usize,
        col: usize,
        reply: oneshot::Sender<Result<Session, GameError>>,
    },

    /// Clear a participant's connected flag. Replies whether they are seated.
    Leave {
        participant_id: ParticipantId,
        reply: oneshot::Sender<bool>,
    },

    /// Clear a participant's connected flag. Replies whether it changed.
    Disconnect {
        participant_id: ParticipantId,
        reply: oneshot::Sender<bool>,
    },

    /// Request a snapshot.
    Snapshot { reply: oneshot::Sender<Session> },

    /// Stop the actor if nothing happened since `cutoff`. Replies whether
    /// it stopped.
    ExpireIfIdle {
        cutoff: DateTime<Utc>,
        reply: oneshot::Sender<bool>,
    },

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running session actor.
///
/// Cheap to clone: it's an `mpsc::Sender` and the session id. Once the
/// actor has stopped, every request through the handle fails with
/// [`GameError::NotFound`].
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// The id of the session this handle talks to.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns a consistent copy of the session's current state.
    pub async fn snapshot(&self) -> Result<Session, GameError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    pub(crate) async fn join(
        &self,
        participant_id: ParticipantId,
        display_name: String,
    ) -> Result<Session, GameError> {
        self.request(|reply| SessionCommand::Join {
            participant_id,
            display_name,
            reply,
        })
        .await?
    }

    pub(crate) async fn make_move(
        &self,
        mover: Mover,
        row: usize,
        col: usize,
    ) -> Result<Session, GameError> {
        self.request(|reply| SessionCommand::Move {
            mover,
            row,
            col,
            reply,
        })
        .await?
    }

    pub(crate) async fn leave(&self, participant_id: ParticipantId) -> Result<bool, GameError> {
        self.request(|reply| SessionCommand::Leave {
            participant_id,
            reply,
        })
        .await
    }

    pub(crate) async fn disconnect(
        &self,
        participant_id: ParticipantId,
    ) -> Result<bool, GameError> {
        self.request(|reply| SessionCommand::Disconnect {
            participant_id,
            reply,
        })
        .await
    }

    pub(crate) async fn expire_if_idle(&self, cutoff: DateTime<Utc>) -> Result<bool, GameError> {
        self.request(|reply| SessionCommand::ExpireIfIdle { cutoff, reply })
            .await
    }

    /// Tells the actor to stop. Commands already queued ahead of this one
    /// are still applied.
    pub(crate) async fn shutdown(&self) {
        let _ = self.sender.send(SessionCommand::Shutdown).await;
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer. A closed channel on either leg means the actor is gone.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| GameError::NotFound(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| GameError::NotFound(self.session_id))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor {
    session: Session,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    /// Processes commands until shutdown, expiry, or every handle is dropped.
    async fn run(mut self) {
        let session_id = self.session.id;
        tracing::debug!(%session_id, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Join {
                    participant_id,
                    display_name,
                    reply,
                } => {
                    let result =
                        rules::join(&mut self.session, participant_id, display_name, Utc::now())
                            .map(|()| self.session.clone());
                    let _ = reply.send(result);
                }
                SessionCommand::Move {
                    mover,
                    row,
                    col,
                    reply,
                } => {
                    let result = rules::apply_move(&mut self.session, &mover, row, col, Utc::now())
                        .map(|_| self.session.clone());
                    let _ = reply.send(result);
                }
                SessionCommand::Leave {
                    participant_id,
                    reply,
                } => {
                    let seated = rules::disconnect(&mut self.session, &participant_id).is_some();
                    let _ = reply.send(seated);
                }
                SessionCommand::Disconnect {
                    participant_id,
                    reply,
                } => {
                    let changed =
                        rules::disconnect(&mut self.session, &participant_id) == Some(true);
                    let _ = reply.send(changed);
                }
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(self.session.clone());
                }
                SessionCommand::ExpireIfIdle { cutoff, reply } => {
                    let idle = self.session.last_move_at < cutoff;
                    let _ = reply.send(idle);
                    if idle {
                        break;
                    }
                }
                SessionCommand::Shutdown => break,
            }
        }

        tracing::debug!(%session_id, "session actor stopped");
    }
}

/// Spawns an actor that owns `session` and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it's full.
/// Must be called from within a Tokio runtime.
pub(crate) fn spawn_session(session: Session, channel_size: usize) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));
    let session_id = session.id;

    let actor = SessionActor {
        session,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
