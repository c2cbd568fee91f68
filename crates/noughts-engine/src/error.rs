//! Error types for the engine.

use noughts_protocol::{ErrorKind, ParticipantId, SessionId, Turn};

/// Why a command was rejected.
///
/// Every variant is recoverable: a rejected command leaves its session
/// exactly as it was and never affects other sessions. Callers map these
/// to their own status signaling via [`GameError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// No session with this id (never created, deleted, or expired).
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// A field failed validation, e.g. a blank display name, or a move
    /// whose identity doesn't fit the session's mode.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A Versus-only membership operation was aimed at a Solo session.
    #[error("session {0} is not a versus session")]
    WrongMode(SessionId),

    /// The Versus session already has two participants.
    #[error("session {0} is full")]
    SessionFull(SessionId),

    /// The session has been won or drawn; no further moves.
    #[error("session {0} is already over")]
    GameOver(SessionId),

    /// A Versus session with fewer than two participants can't be played.
    #[error("session {0} is waiting for a second player")]
    WaitingForOpponent(SessionId),

    /// The mover is not the one expected to move.
    #[error("not your turn: waiting on {expected}")]
    NotYourTurn { expected: Turn },

    /// The mover is not a participant of this Versus session.
    #[error("player {0} is not in this game")]
    PlayerNotInGame(ParticipantId),

    /// Row or column outside `0..3`.
    #[error("coordinates ({row}, {col}) are off the board")]
    InvalidCoordinates { row: usize, col: usize },

    /// The target cell already holds a mark.
    #[error("cell ({row}, {col}) is occupied")]
    CellOccupied { row: usize, col: usize },
}

impl GameError {
    /// The wire-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::WrongMode(_) => ErrorKind::WrongMode,
            Self::SessionFull(_) => ErrorKind::SessionFull,
            Self::GameOver(_) => ErrorKind::GameOver,
            Self::WaitingForOpponent(_) => ErrorKind::WaitingForOpponent,
            Self::NotYourTurn { .. } => ErrorKind::NotYourTurn,
            Self::PlayerNotInGame(_) => ErrorKind::PlayerNotInGame,
            Self::InvalidCoordinates { .. } => ErrorKind::InvalidCoordinates,
            Self::CellOccupied { .. } => ErrorKind::CellOccupied,
        }
    }
}
