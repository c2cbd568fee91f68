//! The session data model.
//!
//! These are the values the engine hands back after every command and the
//! relay pushes to connected clients. They carry no behavior beyond simple
//! queries; every mutation goes through the engine's rules.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

/// Width and height of the board. Rule variants are out of scope, so this
/// never changes.
pub const BOARD_SIZE: usize = 3;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Unique identifier for a session, generated at creation.
///
/// Serialized as the plain UUID string so clients can drop it straight into
/// a URL or a subsequent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random (v4) session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(ProtocolError::InvalidSessionId)
    }
}

/// Identifier of a Versus participant, supplied by the caller.
///
/// The live-channel adapter uses the connection handle (`conn-7`), so the
/// same id is what a disconnect later reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps a caller-supplied identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Mark and Board
// ---------------------------------------------------------------------------

/// One of the two symbols played on the board.
///
/// `X` always moves first: it is the Solo opening turn and the mark of the
/// Versus session's creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
        }
    }
}

impl FromStr for Mark {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Self::X),
            "O" | "o" => Ok(Self::O),
            other => Err(ProtocolError::InvalidMark(other.to_owned())),
        }
    }
}

/// The 3×3 grid, row-major. `None` is an empty cell.
///
/// Serialized as nested arrays: `[["X", null, null], [null, "O", null], ...]`.
///
/// The only way to write a cell is [`Board::place`], which refuses to
/// touch a non-empty cell. A written cell therefore never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([[Option<Mark>; BOARD_SIZE]; BOARD_SIZE]);

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `(row, col)` lies on the board.
    pub fn contains(row: usize, col: usize) -> bool {
        row < BOARD_SIZE && col < BOARD_SIZE
    }

    /// Returns the mark at `(row, col)`, or `None` if the cell is empty or
    /// off the board.
    pub fn get(&self, row: usize, col: usize) -> Option<Mark> {
        self.0.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Writes `mark` into an empty on-board cell.
    ///
    /// Returns `false` (and leaves the board untouched) if the cell is
    /// off the board or already taken.
    pub fn place(&mut self, row: usize, col: usize, mark: Mark) -> bool {
        let Some(cell) = self.0.get_mut(row).and_then(|r| r.get_mut(col)) else {
            return false;
        };
        if cell.is_some() {
            return false;
        }
        *cell = Some(mark);
        true
    }

    /// Number of non-empty cells.
    pub fn filled(&self) -> usize {
        self.0.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Returns `true` once all nine cells hold a mark.
    pub fn is_full(&self) -> bool {
        self.filled() == BOARD_SIZE * BOARD_SIZE
    }
}

impl From<[[Option<Mark>; BOARD_SIZE]; BOARD_SIZE]> for Board {
    fn from(rows: [[Option<Mark>; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self(rows)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// How a session is played. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// One caller plays both marks; there are no recorded participants.
    Solo,
    /// Two identified participants, one mark each.
    Versus,
}

/// A player attached to a Versus session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    /// `X` for the creator, `O` for the second joiner. Never reassigned.
    pub mark: Mark,
    /// Cleared on leave/disconnect. The participant stays in the list.
    pub connected: bool,
}

/// Who is expected to move next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    /// Solo sessions alternate anonymous marks.
    Mark(Mark),
    /// Versus sessions name the participant to move.
    Participant(ParticipantId),
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mark(mark) => write!(f, "{mark}"),
            Self::Participant(id) => write!(f, "{id}"),
        }
    }
}

/// Terminal classification of a session.
///
/// Moves from `InProgress` to `Won` or `Draw` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "mark")]
pub enum Outcome {
    InProgress,
    Won(Mark),
    Draw,
}

/// The acting identity of a move.
///
/// Solo callers name the mark they play; Versus callers are identified and
/// the engine looks their mark up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mover {
    Mark(Mark),
    Participant(ParticipantId),
}

impl From<Mark> for Mover {
    fn from(mark: Mark) -> Self {
        Self::Mark(mark)
    }
}

impl From<ParticipantId> for Mover {
    fn from(id: ParticipantId) -> Self {
        Self::Participant(id)
    }
}

/// One game and its board: the unit of play.
///
/// Values of this type are snapshots. Holding one never blocks the engine,
/// and mutating one has no effect on the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub board: Board,
    pub mode: Mode,
    /// Join order. Empty for Solo, at most two entries for Versus.
    pub participants: Vec<Participant>,
    pub turn: Turn,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
    pub last_move_at: DateTime<Utc>,
}

impl Session {
    /// Looks up a participant by id.
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Returns `true` once the outcome is `Won` or `Draw`.
    pub fn is_finished(&self) -> bool {
        self.outcome != Outcome::InProgress
    }

    /// A Versus session still looking for its second participant.
    pub fn is_waiting(&self) -> bool {
        self.mode == Mode::Versus && self.participants.len() < 2 && !self.is_finished()
    }
}
