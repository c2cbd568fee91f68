//! `NoughtsServer` builder and server loop.
//!
//! This is the entry point for running a Noughts game server. It ties
//! together all the layers: transport → protocol → dispatch → engine,
//! with the relay fanning events back out. The HTTP router shares the
//! same engine and relay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use noughts_engine::{EngineConfig, GameEngine};
use noughts_protocol::{Codec, Event, JsonCodec};
use noughts_transport::{Transport, WebSocketTransport};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::NoughtsError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::http::create_router;
use crate::relay::{Notice, Relay};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) engine: GameEngine,
    pub(crate) relay: Relay,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

impl ServerState<JsonCodec> {
    pub(crate) fn new(config: ServerConfig, engine_config: EngineConfig) -> Self {
        Self {
            engine: GameEngine::new(engine_config),
            relay: Relay::new(),
            codec: JsonCodec,
            config,
        }
    }
}

/// Builder for configuring and starting a Noughts server.
///
/// # Example
///
/// ```rust,no_run
/// use noughts_server::prelude::*;
///
/// # async fn start() -> Result<(), NoughtsError> {
/// let server = NoughtsServer::builder()
///     .bind("0.0.0.0:8080")
///     .session_ttl(Some(std::time::Duration::from_secs(3600)))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct NoughtsServerBuilder {
    config: ServerConfig,
    engine_config: EngineConfig,
}

impl NoughtsServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            engine_config: EngineConfig::default(),
        }
    }

    /// Replaces the whole server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the address of the HTTP listener. `None` serves no HTTP.
    pub fn http_bind(mut self, addr: Option<&str>) -> Self {
        self.config.http_bind_addr = addr.map(str::to_string);
        self
    }

    /// Sets how long a silent connection is kept before it's dropped.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.connection_idle_timeout = timeout;
        self
    }

    /// Sets how long an untouched session lives.
    pub fn session_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    /// Sets how often idle sessions are swept.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Sets the engine configuration.
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Binds the listeners and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<NoughtsServer, NoughtsError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let http = match &self.config.http_bind_addr {
            Some(addr) => {
                let listener = TcpListener::bind(addr).await.map_err(|source| {
                    NoughtsError::HttpBind {
                        addr: addr.clone(),
                        source,
                    }
                })?;
                tracing::info!(%addr, "HTTP listener bound");
                Some(listener)
            }
            None => None,
        };

        let state = Arc::new(ServerState::new(self.config, self.engine_config));

        Ok(NoughtsServer {
            transport,
            http,
            state,
        })
    }
}

impl Default for NoughtsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Noughts game server, bound and ready to accept connections.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct NoughtsServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    http: Option<TcpListener>,
    state: Arc<ServerState<C>>,
}

impl NoughtsServer {
    /// Creates a new builder.
    pub fn builder() -> NoughtsServerBuilder {
        NoughtsServerBuilder::new()
    }
}

impl<C: Codec> NoughtsServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, NoughtsError> {
        Ok(self.transport.local_addr()?)
    }

    /// Returns the address the HTTP listener is bound to, if there is one.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http.as_ref().and_then(|listener| listener.local_addr().ok())
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), NoughtsError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted connection gets its own handler task. Connections
    /// already open keep running after shutdown until they close.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), NoughtsError> {
        tracing::info!("Noughts server running");
        let sweeper = self.spawn_sweeper();
        let http = self.spawn_http();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        for task in [sweeper, http].into_iter().flatten() {
            task.abort();
        }
        self.transport.shutdown().await?;
        tracing::info!("Noughts server stopped");
        Ok(())
    }

    /// Starts serving HTTP if a listener was bound.
    fn spawn_http(&mut self) -> Option<JoinHandle<()>> {
        let listener = self.http.take()?;
        let router = create_router(Arc::clone(&self.state));

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }))
    }

    /// Starts the idle-session sweep if a session TTL is configured.
    fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let ttl = self.state.config.session_ttl?;
        let every = self.state.config.sweep_interval.max(Duration::from_millis(1));
        let state = Arc::clone(&self.state);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for session_id in state.engine.sweep_idle(ttl).await {
                    tracing::info!(%session_id, "session expired");
                    state
                        .relay
                        .deliver(Notice::group(session_id, Event::SessionDeleted { session_id }))
                        .await;
                    state.relay.dissolve(&session_id).await;
                }
            }
        }))
    }
}
