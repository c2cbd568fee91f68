//! Live-channel message types.
//!
//! Every frame on the wire is an [`Envelope`]. Its [`Payload`] is one of:
//!
//! ```text
//! client → server   Command   (create, join, move, leave, ...)
//! server → caller   Reply     (the result of that caller's command)
//! server → caller   Error     (why that caller's command was rejected)
//! server → group    Event     (what happened in a session the caller is in)
//! ```
//!
//! Participant identity never appears in a command: the server takes it
//! from the connection the command arrived on.

use serde::{Deserialize, Serialize};

use crate::{Mark, Outcome, ParticipantId, Session, SessionId};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A request from a live-channel client.
///
/// Internally tagged: `{ "type": "Join", "session_id": "...", "display_name": "bob" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Start a single-caller game. The caller plays both marks.
    CreateSolo,

    /// Start a two-player game with the caller as the first participant (`X`).
    CreateVersus { display_name: String },

    /// List Versus sessions still waiting for a second participant.
    ListWaiting,

    /// List every session.
    ListAll,

    /// Fetch one session.
    GetSession { session_id: SessionId },

    /// Join a waiting Versus session as the second participant (`O`).
    Join {
        session_id: SessionId,
        display_name: String,
    },

    /// Place a mark.
    ///
    /// With `mark` set this is a Solo move for that mark; without it the
    /// caller moves as their Versus participant. Coordinates are signed so
    /// a negative value reaches the server and is rejected there instead
    /// of failing to decode.
    Move {
        session_id: SessionId,
        row: i64,
        col: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mark: Option<Mark>,
    },

    /// Mark the caller as disconnected from a session without ending it.
    Leave { session_id: SessionId },

    /// Remove a session entirely.
    DeleteSession { session_id: SessionId },

    /// Keep an otherwise quiet connection alive. Answered with `Ack`.
    Heartbeat,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// The successful result of a [`Command`], sent only to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    Session { session: Session },
    Sessions { sessions: Vec<Session> },
    Deleted { existed: bool },
    Ack,
}

/// A change in a session, fanned out to the parties attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A second participant (or a returning one) joined.
    PlayerJoined {
        session_id: SessionId,
        participant_id: ParticipantId,
        display_name: String,
    },

    /// A move was accepted. `session` is the snapshot after the move.
    MoveMade {
        session_id: SessionId,
        row: usize,
        col: usize,
        mark: Mark,
        /// The participant who moved; `None` for Solo sessions.
        #[serde(default)]
        by: Option<ParticipantId>,
        session: Session,
    },

    /// The move just made ended the game.
    GameEnded {
        session_id: SessionId,
        outcome: Outcome,
        session: Session,
    },

    /// A participant left the session voluntarily.
    PlayerLeft {
        session_id: SessionId,
        participant_id: ParticipantId,
    },

    /// A participant's connection dropped.
    PlayerDisconnected {
        session_id: SessionId,
        participant_id: ParticipantId,
    },

    /// The session was deleted; the group is dissolved.
    SessionDeleted { session_id: SessionId },
}

/// Why a command was rejected. Mirrors the engine's error variants plus
/// the boundary-only failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    WrongMode,
    SessionFull,
    GameOver,
    NotYourTurn,
    PlayerNotInGame,
    InvalidCoordinates,
    CellOccupied,
    WaitingForOpponent,
}

impl ErrorKind {
    /// HTTP-style status code for adapters that signal errors that way.
    pub fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::InvalidInput | Self::InvalidCoordinates => 400,
            Self::PlayerNotInGame => 403,
            Self::WrongMode
            | Self::SessionFull
            | Self::GameOver
            | Self::NotYourTurn
            | Self::CellOccupied
            | Self::WaitingForOpponent => 409,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of a frame.
///
/// Adjacently tagged: `{ "type": "Command", "data": { "type": "ListAll" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Command(Command),
    Reply(Reply),
    Event(Event),
    Error {
        code: u16,
        kind: ErrorKind,
        message: String,
    },
}

/// The top-level wire frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number. A reply or error carries the `seq` of
    /// the command it answers; pushed events use the server's own counter.
    pub seq: u64,

    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}
