//! # Noughts server
//!
//! Game server for Noughts & Crosses.
//!
//! Clients connect over WebSocket and exchange JSON [`Envelope`]s. Every
//! connection is one participant; the server turns each [`Command`] into
//! an engine call through [`dispatch()`], answers the caller, and relays
//! [`Event`]s to everyone attached to the affected session. A REST surface
//! under `/api/games` drives the same dispatch on a second listener.
//!
//! ```text
//! WebSocket ─→ handler ─→ dispatch ─→ GameEngine
//!                 ↑           │ ↑
//!               writer ←── Relay ── HTTP router
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use noughts_server::prelude::*;
//!
//! # async fn start() -> Result<(), NoughtsError> {
//! let server = NoughtsServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! [`Envelope`]: noughts_protocol::Envelope
//! [`Command`]: noughts_protocol::Command
//! [`Event`]: noughts_protocol::Event

mod config;
mod dispatch;
mod error;
mod handler;
mod http;
mod relay;
mod server;

pub use config::{
    ConfigError, ENV_BIND, ENV_HTTP_BIND, ENV_IDLE_TIMEOUT_SECS, ENV_SESSION_TTL_SECS,
    ENV_SWEEP_INTERVAL_SECS, ServerConfig,
};
pub use dispatch::{Dispatched, command_name, disconnect, dispatch};
pub use error::NoughtsError;
pub use http::{ErrorResponse, MoveRequest, PlayerRequest};
pub use relay::{Membership, Notice, Outgoing, PeerSender, Recipient, Relay};
pub use server::{NoughtsServer, NoughtsServerBuilder};

/// Common imports for running or embedding a Noughts server.
pub mod prelude {
    pub use crate::{NoughtsError, NoughtsServer, NoughtsServerBuilder, ServerConfig};
    pub use noughts_engine::{EngineConfig, GameEngine, GameError};
    pub use noughts_protocol::{
        Command, Envelope, ErrorKind, Event, Mark, Mode, Outcome, ParticipantId, Payload, Reply,
        Session, SessionId, Turn,
    };
}
