//! Request/response surface over HTTP.
//!
//! ```text
//! POST   /api/games                          create a Solo session       201
//! GET    /api/games                          list every session
//! GET    /api/games/:id                      fetch one session
//! POST   /api/games/:id/moves                place a mark
//! DELETE /api/games/:id                      delete a session            204
//! POST   /api/games/multiplayer              create a Versus session     201
//! GET    /api/games/multiplayer/available    list waiting Versus sessions
//! POST   /api/games/:id/join                 join a Versus session
//! ```
//!
//! Rejections use the status from [`ErrorKind::status_code`] with an
//! [`ErrorResponse`] body.
//!
//! [`ErrorKind::status_code`]: noughts_protocol::ErrorKind::status_code

mod games;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use noughts_protocol::Codec;

use crate::server::ServerState;

pub use games::{ErrorResponse, MoveRequest, PlayerRequest};

/// Create the HTTP router with all game routes configured.
pub(crate) fn create_router<C: Codec>(state: Arc<ServerState<C>>) -> Router {
    Router::new()
        .route(
            "/api/games",
            post(games::create_solo::<C>).get(games::list_all::<C>),
        )
        .route("/api/games/multiplayer", post(games::create_versus::<C>))
        .route(
            "/api/games/multiplayer/available",
            get(games::list_waiting::<C>),
        )
        .route(
            "/api/games/:id",
            get(games::get_session::<C>).delete(games::delete_session::<C>),
        )
        .route("/api/games/:id/join", post(games::join::<C>))
        .route("/api/games/:id/moves", post(games::make_move::<C>))
        .with_state(state)
}
