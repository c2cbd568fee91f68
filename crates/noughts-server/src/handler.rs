//! Per-connection handler: command loop and outbound writer.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Derive the participant id from the connection id
//!   2. Register an outbound queue with the relay, spawn its writer
//!   3. Loop: receive envelopes → dispatch → reply, notify, regroup
//!   4. On exit (close, error, idle timeout): mark the participant
//!      disconnected and tell the sessions they were in

use std::sync::Arc;
use std::time::{Duration, Instant};

use noughts_protocol::{Codec, Envelope, ErrorKind, ParticipantId, Payload};
use noughts_transport::{Connection, TransportError, WebSocketConnection};
use tokio::sync::mpsc;

use crate::NoughtsError;
use crate::dispatch::{command_name, disconnect, dispatch};
use crate::relay::{Membership, Outgoing, PeerSender};
use crate::server::ServerState;

/// Drop guard that runs disconnection cleanup when the handler exits.
///
/// `Drop` is synchronous, so the async cleanup is spawned as a
/// fire-and-forget task. It also runs if the handler panics.
struct DisconnectGuard<C: Codec> {
    participant_id: ParticipantId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let participant_id = self.participant_id.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.relay.unregister(&participant_id).await;
            let notices = disconnect(&state.engine, &participant_id).await;
            for notice in notices {
                tracing::info!(
                    %participant_id,
                    session_id = %notice.session_id(),
                    "player disconnected from session"
                );
                state.relay.deliver(notice).await;
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), NoughtsError> {
    let conn = Arc::new(conn);
    let participant_id = ParticipantId::new(conn.id().to_string());
    tracing::debug!(%participant_id, "handling new connection");

    let start = Instant::now();
    let (tx, rx) = mpsc::unbounded_channel();
    state.relay.register(participant_id.clone(), tx.clone()).await;
    let _guard = DisconnectGuard {
        participant_id: participant_id.clone(),
        state: Arc::clone(&state),
    };
    tokio::spawn(write_loop(Arc::clone(&conn), rx, Arc::clone(&state), start));

    loop {
        let Some(received) = recv_within(&conn, state.config.connection_idle_timeout).await else {
            tracing::info!(%participant_id, "connection timed out");
            break;
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%participant_id, "connection closed cleanly");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%participant_id, error = %e, "failed to decode envelope");
                send_error(&tx, 0, ErrorKind::InvalidInput, e.to_string());
                continue;
            }
        };

        let seq = envelope.seq;
        let Payload::Command(command) = envelope.payload else {
            send_error(
                &tx,
                seq,
                ErrorKind::InvalidInput,
                "expected a Command payload".to_string(),
            );
            continue;
        };

        let name = command_name(&command);
        let dispatched = dispatch(&state.engine, &participant_id, command).await;

        // Joining takes effect before anything is sent, so by the time the
        // caller sees the reply they already receive the group's events.
        // Leaving takes effect last, after the group heard about it.
        let (enter, leave) = match dispatched.membership {
            Some(change @ Membership::Enter(_)) => (Some(change), None),
            other => (None, other),
        };
        if let Some(change) = enter {
            state.relay.apply(&participant_id, change).await;
        }

        match dispatched.reply {
            Ok(reply) => {
                tracing::info!(%participant_id, command = name, "command accepted");
                let _ = tx.send(Outgoing::reply(seq, Payload::Reply(reply)));
            }
            Err(e) => {
                tracing::debug!(%participant_id, command = name, error = %e, "command rejected");
                send_error(&tx, seq, e.kind(), e.to_string());
            }
        }

        for notice in dispatched.notices {
            state.relay.deliver(notice).await;
        }
        if let Some(change) = leave {
            state.relay.apply(&participant_id, change).await;
        }
    }

    // _guard drops here → disconnection cleanup fires.
    Ok(())
}

/// Receives the next message, giving up once the peer has been silent
/// for `limit`.
///
/// Any frame counts as activity, so a client answering nothing but pings
/// is kept. Returns `None` on timeout.
async fn recv_within(
    conn: &WebSocketConnection,
    limit: Option<Duration>,
) -> Option<Result<Option<Vec<u8>>, TransportError>> {
    let Some(limit) = limit else {
        return Some(conn.recv().await);
    };
    loop {
        let remaining = limit.saturating_sub(conn.idle_for());
        if remaining.is_zero() {
            return None;
        }
        if let Ok(received) = tokio::time::timeout(remaining, conn.recv()).await {
            return Some(received);
        }
    }
}

/// Drains a connection's outbound queue onto the wire.
///
/// Ends once every sender is gone (the handler exited and the relay
/// forgot the peer) or the connection stops accepting writes.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    state: Arc<ServerState<C>>,
    start: Instant,
) {
    let mut event_seq: u64 = 1;

    while let Some(outgoing) = rx.recv().await {
        let envelope = Envelope {
            seq: outgoing.reply_to.unwrap_or_else(|| next_seq(&mut event_seq)),
            timestamp: start.elapsed().as_millis() as u64,
            payload: outgoing.payload,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
            break;
        }
    }

    let _ = conn.close().await;
}

/// Queues an `Error` payload for the caller.
fn send_error(tx: &PeerSender, seq: u64, kind: ErrorKind, message: String) {
    let _ = tx.send(Outgoing::reply(
        seq,
        Payload::Error {
            code: kind.status_code(),
            kind,
            message,
        },
    ));
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use noughts_engine::EngineConfig;
    use noughts_transport::{Transport, WebSocketTransport};

    use crate::config::ServerConfig;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn accepted() -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        let client = tokio::spawn(async move {
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .unwrap()
                .0
        });
        let conn = transport.accept().await.unwrap();
        (conn, client.await.unwrap())
    }

    fn state() -> Arc<ServerState<noughts_protocol::JsonCodec>> {
        let config = ServerConfig {
            connection_idle_timeout: None,
            ..ServerConfig::default()
        };
        Arc::new(ServerState::new(config, EngineConfig::default()))
    }

    #[tokio::test]
    async fn test_handle_connection_abrupt_drop_is_transport_error() {
        let (conn, client) = accepted().await;
        let handler = tokio::spawn(handle_connection(conn, state()));

        drop(client);

        let result = tokio::time::timeout(Duration::from_secs(2), handler)
            .await
            .expect("handler should notice the dropped socket")
            .unwrap();
        assert!(matches!(result, Err(NoughtsError::Transport(_))));
    }

    #[tokio::test]
    async fn test_handle_connection_clean_close_is_ok() {
        let (conn, mut client) = accepted().await;
        let handler = tokio::spawn(handle_connection(conn, state()));

        client.close(None).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handler)
            .await
            .expect("handler should end on close")
            .unwrap();
        assert!(result.is_ok());
    }
}
