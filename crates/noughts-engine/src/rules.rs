//! Game rules: the pure state transitions a session actor applies.
//!
//! Nothing here is async or shared. Each function takes the session by
//! `&mut` and either mutates it completely or returns an error having
//! touched nothing. The actor guarantees only one of these runs at a time
//! per session.

use chrono::{DateTime, Utc};
use noughts_protocol::{
    BOARD_SIZE, Board, Mark, Mode, Mover, Outcome, Participant, ParticipantId, Session,
    SessionId, Turn,
};

use crate::GameError;

/// Maximum number of participants in a Versus session.
const VERSUS_SEATS: usize = 2;

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// A fresh Solo session: empty board, `X` to move.
pub(crate) fn new_solo(now: DateTime<Utc>) -> Session {
    Session {
        id: SessionId::generate(),
        board: Board::new(),
        mode: Mode::Solo,
        participants: Vec::new(),
        turn: Turn::Mark(Mark::X),
        outcome: Outcome::InProgress,
        created_at: now,
        last_move_at: now,
    }
}

/// A fresh Versus session with its creator seated as `X` and on turn.
pub(crate) fn new_versus(
    creator: ParticipantId,
    display_name: String,
    now: DateTime<Utc>,
) -> Session {
    Session {
        id: SessionId::generate(),
        board: Board::new(),
        mode: Mode::Versus,
        participants: vec![Participant {
            id: creator.clone(),
            display_name,
            mark: Mark::X,
            connected: true,
        }],
        turn: Turn::Participant(creator),
        outcome: Outcome::InProgress,
        created_at: now,
        last_move_at: now,
    }
}

/// Trims a display name and rejects it if nothing is left.
pub(crate) fn display_name(raw: &str) -> Result<String, GameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(GameError::InvalidInput("display name cannot be empty".into()));
    }
    Ok(name.to_owned())
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Seats `participant_id` in a Versus session.
///
/// A participant who is already seated is welcomed back (marked connected)
/// without changing their mark or the seat order.
pub(crate) fn join(
    session: &mut Session,
    participant_id: ParticipantId,
    display_name: String,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    if session.mode != Mode::Versus {
        return Err(GameError::WrongMode(session.id));
    }

    if let Some(seated) = session
        .participants
        .iter_mut()
        .find(|p| p.id == participant_id)
    {
        seated.connected = true;
        return Ok(());
    }

    if session.participants.len() >= VERSUS_SEATS {
        return Err(GameError::SessionFull(session.id));
    }

    let mark = if session.participants.is_empty() {
        Mark::X
    } else {
        Mark::O
    };
    session.participants.push(Participant {
        id: participant_id,
        display_name,
        mark,
        connected: true,
    });
    session.last_move_at = now;
    Ok(())
}

/// Clears a participant's `connected` flag. The seat is kept.
///
/// Returns `None` if they aren't seated here, otherwise whether they were
/// connected before the call.
pub(crate) fn disconnect(session: &mut Session, participant_id: &ParticipantId) -> Option<bool> {
    let seated = session
        .participants
        .iter_mut()
        .find(|p| &p.id == participant_id)?;
    let was_connected = seated.connected;
    seated.connected = false;
    Some(was_connected)
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// Validates and applies one move, returning the mark that was placed.
///
/// Checks run in a fixed order and all of them finish before the board
/// is written, so a rejected move never leaves a trace.
pub(crate) fn apply_move(
    session: &mut Session,
    mover: &Mover,
    row: usize,
    col: usize,
    now: DateTime<Utc>,
) -> Result<Mark, GameError> {
    if session.is_finished() {
        return Err(GameError::GameOver(session.id));
    }
    if session.mode == Mode::Versus && session.participants.len() < VERSUS_SEATS {
        return Err(GameError::WaitingForOpponent(session.id));
    }

    let (mark, acting) = resolve_mover(session, mover)?;

    if acting != session.turn {
        return Err(GameError::NotYourTurn {
            expected: session.turn.clone(),
        });
    }
    if !Board::contains(row, col) {
        return Err(GameError::InvalidCoordinates { row, col });
    }
    if !session.board.place(row, col, mark) {
        return Err(GameError::CellOccupied { row, col });
    }

    session.last_move_at = now;

    if completes_line(&session.board, row, col, mark) {
        session.outcome = Outcome::Won(mark);
    } else if session.board.is_full() {
        session.outcome = Outcome::Draw;
    } else {
        session.turn = next_turn(session, &acting, mark);
    }

    Ok(mark)
}

/// Works out which mark the mover plays and the turn value that names them.
fn resolve_mover(session: &Session, mover: &Mover) -> Result<(Mark, Turn), GameError> {
    match (session.mode, mover) {
        (Mode::Solo, Mover::Mark(mark)) => Ok((*mark, Turn::Mark(*mark))),
        (Mode::Solo, Mover::Participant(_)) => Err(GameError::InvalidInput(
            "solo moves must name a mark".into(),
        )),
        (Mode::Versus, Mover::Participant(id)) => {
            let seated = session
                .participant(id)
                .ok_or_else(|| GameError::PlayerNotInGame(id.clone()))?;
            Ok((seated.mark, Turn::Participant(id.clone())))
        }
        (Mode::Versus, Mover::Mark(_)) => Err(GameError::InvalidInput(
            "versus moves must be made by a participant".into(),
        )),
    }
}

fn next_turn(session: &Session, acting: &Turn, mark: Mark) -> Turn {
    match acting {
        Turn::Mark(_) => Turn::Mark(mark.other()),
        Turn::Participant(id) => session
            .participants
            .iter()
            .find(|p| &p.id != id)
            .map(|p| Turn::Participant(p.id.clone()))
            .unwrap_or_else(|| acting.clone()),
    }
}

/// Returns `true` if the mark just placed at `(row, col)` completes a line.
///
/// Only the lines through the played cell are checked: its row, its column,
/// and whichever diagonals it sits on. No other line can have changed.
pub fn completes_line(board: &Board, row: usize, col: usize, mark: Mark) -> bool {
    let owns = |r: usize, c: usize| board.get(r, c) == Some(mark);
    let last = BOARD_SIZE - 1;

    let across = (0..BOARD_SIZE).all(|c| owns(row, c));
    let down = (0..BOARD_SIZE).all(|r| owns(r, col));
    let diagonal = row == col && (0..BOARD_SIZE).all(|i| owns(i, i));
    let anti_diagonal = row + col == last && (0..BOARD_SIZE).all(|i| owns(i, last - i));

    across || down || diagonal || anti_diagonal
}
