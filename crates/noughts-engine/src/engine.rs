//! The game engine: the command surface every adapter calls.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use noughts_protocol::{Mover, ParticipantId, Session, SessionId};

use crate::{EngineConfig, GameError, SessionHandle, SessionStore, rules};

/// Creates sessions and routes membership and move commands to them.
///
/// The engine is shared by reference (usually behind an `Arc`) between
/// every connection task. All methods take `&self`.
///
/// ## Lifecycle of a session
///
/// ```text
/// create_solo / create_versus ──→ [InProgress] ──move──→ [Won | Draw]
///                                      │  ↑
///                            join/leave/disconnect
///
/// delete_session or sweep_idle ──→ gone (NotFound from then on)
/// ```
pub struct GameEngine {
    store: SessionStore,
}

impl GameEngine {
    /// Creates an engine with an empty store.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: SessionStore::new(config.channel_size),
        }
    }

    // -- Creation ---------------------------------------------------------

    /// Starts a Solo session: empty board, `X` to move. Always succeeds.
    pub async fn create_solo(&self) -> Session {
        let session = rules::new_solo(Utc::now());
        self.store.create(session.clone()).await;
        session
    }

    /// Starts a Versus session with the caller seated as `X`.
    ///
    /// # Errors
    /// [`GameError::InvalidInput`] if `display_name` is blank.
    pub async fn create_versus(
        &self,
        participant_id: ParticipantId,
        display_name: &str,
    ) -> Result<Session, GameError> {
        let name = rules::display_name(display_name)?;
        let session = rules::new_versus(participant_id, name, Utc::now());
        self.store.create(session.clone()).await;
        Ok(session)
    }

    // -- Queries ----------------------------------------------------------

    /// Returns a snapshot of one session.
    ///
    /// # Errors
    /// [`GameError::NotFound`] if there is no such session.
    pub async fn get_session(&self, session_id: SessionId) -> Result<Session, GameError> {
        self.handle(session_id).await?.snapshot().await
    }

    /// Snapshots of every session, oldest first.
    pub async fn list_all(&self) -> Vec<Session> {
        self.store.list().await
    }

    /// Snapshots of the Versus sessions waiting for a second participant.
    pub async fn list_waiting(&self) -> Vec<Session> {
        self.store.list_waiting().await
    }

    // -- Membership -------------------------------------------------------

    /// Seats `participant_id` as the second participant (`O`).
    ///
    /// Joining a session you're already in succeeds without changing
    /// anything but your connected flag.
    ///
    /// # Errors
    /// - [`GameError::InvalidInput`]: blank display name
    /// - [`GameError::NotFound`]: no such session
    /// - [`GameError::WrongMode`]: the session is Solo
    /// - [`GameError::SessionFull`]: two other participants already seated
    pub async fn join(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
        display_name: &str,
    ) -> Result<Session, GameError> {
        let name = rules::display_name(display_name)?;
        self.handle(session_id)
            .await?
            .join(participant_id, name)
            .await
    }

    /// Marks a participant as disconnected from one session.
    ///
    /// The seat, the turn, and the outcome are untouched. Returns `false`
    /// if the participant isn't seated there.
    ///
    /// # Errors
    /// [`GameError::NotFound`] if there is no such session.
    pub async fn leave(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Result<bool, GameError> {
        self.handle(session_id)
            .await?
            .leave(participant_id)
            .await
    }

    /// Marks `participant_id` as disconnected in every session they're
    /// seated in, and returns the ids of the sessions where that changed.
    ///
    /// Each session is visited through its own actor, so this never stalls
    /// unrelated games. Sessions deleted mid-scan are skipped.
    pub async fn handle_disconnection(&self, participant_id: &ParticipantId) -> Vec<SessionId> {
        let mut affected = Vec::new();
        for handle in self.store.handles().await {
            if let Ok(true) = handle.disconnect(participant_id.clone()).await {
                affected.push(handle.session_id());
            }
        }
        affected
    }

    // -- Play -------------------------------------------------------------

    /// Validates and applies a move, returning the session after it.
    ///
    /// `mover` is a [`Mark`](noughts_protocol::Mark) for Solo sessions and
    /// a [`ParticipantId`] for Versus sessions.
    ///
    /// # Errors
    /// In order of checking: [`GameError::NotFound`], [`GameError::GameOver`],
    /// [`GameError::WaitingForOpponent`], [`GameError::InvalidInput`] /
    /// [`GameError::PlayerNotInGame`], [`GameError::NotYourTurn`],
    /// [`GameError::InvalidCoordinates`], [`GameError::CellOccupied`].
    /// A rejected move leaves the session unchanged.
    pub async fn make_move(
        &self,
        session_id: SessionId,
        mover: impl Into<Mover>,
        row: usize,
        col: usize,
    ) -> Result<Session, GameError> {
        self.handle(session_id)
            .await?
            .make_move(mover.into(), row, col)
            .await
    }

    // -- Removal ----------------------------------------------------------

    /// Deletes a session. Returns whether it existed.
    pub async fn delete_session(&self, session_id: SessionId) -> bool {
        self.store.delete(&session_id).await
    }

    /// Deletes every session with no activity for longer than `max_idle`
    /// and returns their ids.
    ///
    /// The idle check runs inside each session's actor, so a session that
    /// is being played at the moment of the sweep is never removed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        let Some(cutoff) = TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|max_idle| Utc::now().checked_sub_signed(max_idle))
        else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        for handle in self.store.handles().await {
            if let Ok(true) = handle.expire_if_idle(cutoff).await {
                let session_id = handle.session_id();
                self.store.delete(&session_id).await;
                expired.push(session_id);
            }
        }
        expired
    }

    async fn handle(&self, session_id: SessionId) -> Result<SessionHandle, GameError> {
        self.store
            .get(&session_id)
            .await
            .ok_or(GameError::NotFound(session_id))
    }
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
