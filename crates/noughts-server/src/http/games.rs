//! Game REST handlers.
//!
//! Each handler builds the same [`Command`] a live-channel client would
//! send and runs it through [`dispatch`]. Events go out through the relay,
//! so players watching over WebSocket see moves made over HTTP. HTTP
//! callers never join a group themselves.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use noughts_engine::GameError;
use noughts_protocol::{Codec, Command, ErrorKind, Mark, ParticipantId, Reply, SessionId};
use serde::{Deserialize, Serialize};

use crate::dispatch::{command_name, dispatch};
use crate::relay::Membership;
use crate::server::ServerState;

// ============================================================================
// Request / response bodies
// ============================================================================

/// Body of `POST /api/games/multiplayer` and `POST /api/games/:id/join`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRequest {
    pub participant_id: ParticipantId,
    pub display_name: String,
}

/// Body of `POST /api/games/:id/moves`.
///
/// `mark` makes it a Solo move. Without it, `participant_id` names the
/// Versus participant who is moving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub row: i64,
    pub col: i64,
    #[serde(default)]
    pub mark: Option<Mark>,
    #[serde(default)]
    pub participant_id: Option<ParticipantId>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/games
pub async fn create_solo<C: Codec>(State(state): State<Arc<ServerState<C>>>) -> Response {
    respond(&state, anonymous(), Command::CreateSolo, StatusCode::CREATED).await
}

/// POST /api/games/multiplayer
pub async fn create_versus<C: Codec>(
    State(state): State<Arc<ServerState<C>>>,
    Json(body): Json<PlayerRequest>,
) -> Response {
    let command = Command::CreateVersus {
        display_name: body.display_name,
    };
    respond(&state, body.participant_id, command, StatusCode::CREATED).await
}

/// GET /api/games
pub async fn list_all<C: Codec>(State(state): State<Arc<ServerState<C>>>) -> Response {
    respond(&state, anonymous(), Command::ListAll, StatusCode::OK).await
}

/// GET /api/games/multiplayer/available
pub async fn list_waiting<C: Codec>(State(state): State<Arc<ServerState<C>>>) -> Response {
    respond(&state, anonymous(), Command::ListWaiting, StatusCode::OK).await
}

/// GET /api/games/:id
pub async fn get_session<C: Codec>(
    State(state): State<Arc<ServerState<C>>>,
    Path(session_id): Path<SessionId>,
) -> Response {
    respond(&state, anonymous(), Command::GetSession { session_id }, StatusCode::OK).await
}

/// POST /api/games/:id/join
pub async fn join<C: Codec>(
    State(state): State<Arc<ServerState<C>>>,
    Path(session_id): Path<SessionId>,
    Json(body): Json<PlayerRequest>,
) -> Response {
    let command = Command::Join {
        session_id,
        display_name: body.display_name,
    };
    respond(&state, body.participant_id, command, StatusCode::OK).await
}

/// POST /api/games/:id/moves
pub async fn make_move<C: Codec>(
    State(state): State<Arc<ServerState<C>>>,
    Path(session_id): Path<SessionId>,
    Json(body): Json<MoveRequest>,
) -> Response {
    let caller = match (body.mark, body.participant_id) {
        (Some(_), participant_id) => participant_id.unwrap_or_else(anonymous),
        (None, Some(participant_id)) => participant_id,
        (None, None) => {
            return error_response(&GameError::InvalidInput(
                "a move needs a mark or a participant_id".to_string(),
            ));
        }
    };
    let command = Command::Move {
        session_id,
        row: body.row,
        col: body.col,
        mark: body.mark,
    };
    respond(&state, caller, command, StatusCode::OK).await
}

/// DELETE /api/games/:id
pub async fn delete_session<C: Codec>(
    State(state): State<Arc<ServerState<C>>>,
    Path(session_id): Path<SessionId>,
) -> Response {
    let command = Command::DeleteSession { session_id };
    match run(&state, anonymous(), command).await {
        Ok(Reply::Deleted { existed: true }) => StatusCode::NO_CONTENT.into_response(),
        Ok(_) => error_response(&GameError::NotFound(session_id)),
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// The caller for commands that don't act as any participant.
fn anonymous() -> ParticipantId {
    ParticipantId::new("http")
}

/// Dispatches `command` and relays its events.
async fn run<C: Codec>(
    state: &ServerState<C>,
    caller: ParticipantId,
    command: Command,
) -> Result<Reply, GameError> {
    let name = command_name(&command);
    let dispatched = dispatch(&state.engine, &caller, command).await;

    match &dispatched.reply {
        Ok(_) => tracing::info!(%caller, command = name, "http command accepted"),
        Err(e) => tracing::debug!(%caller, command = name, error = %e, "http command rejected"),
    }
    for notice in dispatched.notices {
        state.relay.deliver(notice).await;
    }
    if let Some(Membership::Dissolve(session_id)) = dispatched.membership {
        state.relay.dissolve(&session_id).await;
    }

    dispatched.reply
}

async fn respond<C: Codec>(
    state: &ServerState<C>,
    caller: ParticipantId,
    command: Command,
    status: StatusCode,
) -> Response {
    match run(state, caller, command).await {
        Ok(Reply::Session { session }) => (status, Json(session)).into_response(),
        Ok(Reply::Sessions { sessions }) => (status, Json(sessions)).into_response(),
        Ok(Reply::Deleted { .. } | Reply::Ack) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &GameError) -> Response {
    let kind = err.kind();
    let status =
        StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorResponse {
        code: status.as_u16(),
        kind,
        message: err.to_string(),
    };
    (status, Json(body)).into_response()
}
