//! Wire protocol and data model for Noughts.
//!
//! This crate defines everything that crosses a boundary between the
//! game engine and the outside world:
//!
//! - **Data model** ([`Session`], [`Board`], [`Participant`], [`Outcome`], ...):
//!   the snapshot of one game that callers receive after every command.
//! - **Messages** ([`Envelope`], [`Command`], [`Reply`], [`Event`]): what
//!   live-channel clients send and what the server pushes back.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong at the boundary.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Engine (Session, GameError)
//! ```
//!
//! The protocol layer holds no game rules. It only knows the shape of a
//! session and how to serialize it.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{Command, Envelope, ErrorKind, Event, Payload, Reply};
pub use types::{
    BOARD_SIZE, Board, Mark, Mode, Mover, Outcome, Participant, ParticipantId,
    Session, SessionId, Turn,
};
