//! Game-session engine for Noughts.
//!
//! This is the core of the system: it owns every live session, enforces
//! turn order, validates moves, detects wins and draws, and tracks who is
//! sitting at each board.
//!
//! # Key types
//!
//! - [`GameEngine`]: the command surface adapters call (create, join, move, ...)
//! - [`SessionStore`]: keyed container of live sessions, no rule knowledge
//! - [`SessionHandle`]: talks to one session's actor
//! - [`GameError`]: why a command was rejected
//! - [`EngineConfig`]: tunables
//!
//! # Concurrency
//!
//! Each session runs as its own Tokio task (actor model). Every mutation
//! of a session is a message to that task, so two moves on the same board
//! are applied one after the other and the second one sees the first.
//! Sessions never share a lock with each other.
//!
//! ```text
//! adapter ──→ GameEngine ──→ SessionStore (RwLock<id → handle>)
//!                  │
//!                  └──→ SessionHandle ──mpsc──→ session actor ──→ rules
//! ```
//!
//! The engine performs no I/O and never retries. Logging of outcomes is
//! left to the adapter.

mod actor;
mod config;
mod engine;
mod error;
mod rules;
mod store;

pub use actor::SessionHandle;
pub use config::EngineConfig;
pub use engine::GameEngine;
pub use error::GameError;
pub use rules::completes_line;
pub use store::SessionStore;
