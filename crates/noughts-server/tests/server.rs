//! Integration tests for the Noughts server: real WebSocket clients
//! talking to a server bound on a random port.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use noughts_server::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// How long a client waits for a frame it expects.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port and returns the address.
async fn start_server_with(builder: NoughtsServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .http_bind(None)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

async fn start_server() -> String {
    start_server_with(NoughtsServer::builder()).await
}

/// A test client that numbers its commands.
struct Client {
    ws: ClientWs,
    seq: u64,
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("should connect");
        Self { ws, seq: 0 }
    }

    async fn send_raw(&mut self, text: String) {
        self.ws.send(Message::text(text)).await.expect("send should succeed");
    }

    /// Sends a command and returns the seq it went out with.
    async fn send(&mut self, command: Command) -> u64 {
        self.seq += 1;
        let envelope = Envelope {
            seq: self.seq,
            timestamp: 0,
            payload: Payload::Command(command),
        };
        self.send_raw(serde_json::to_string(&envelope).unwrap()).await;
        self.seq
    }

    /// Receives the next envelope, failing the test if none arrives.
    async fn recv(&mut self) -> Envelope {
        let next = tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str::<Envelope>(text.as_str())
                            .expect("server frames should be envelopes");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    other => panic!("expected a text frame, got {other:?}"),
                }
            }
        })
        .await;
        next.expect("timed out waiting for a frame")
    }

    /// Sends a command and returns the payload answering it.
    async fn request(&mut self, command: Command) -> Payload {
        let seq = self.send(command).await;
        let envelope = self.recv().await;
        assert_eq!(envelope.seq, seq, "reply should carry the command's seq");
        envelope.payload
    }

    async fn session(&mut self, command: Command) -> Session {
        match self.request(command).await {
            Payload::Reply(Reply::Session { session }) => session,
            other => panic!("expected a session reply, got {other:?}"),
        }
    }

    async fn error(&mut self, command: Command) -> (u16, ErrorKind) {
        match self.request(command).await {
            Payload::Error { code, kind, .. } => (code, kind),
            other => panic!("expected an error, got {other:?}"),
        }
    }

    async fn event(&mut self) -> Event {
        match self.recv().await.payload {
            Payload::Event(event) => event,
            other => panic!("expected an event, got {other:?}"),
        }
    }

    /// Asserts nothing arrives for a short while.
    async fn assert_silent(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(150), self.ws.next()).await;
        assert!(next.is_err(), "expected silence, got {next:?}");
    }
}

fn mv(session_id: SessionId, row: i64, col: i64) -> Command {
    Command::Move {
        session_id,
        row,
        col,
        mark: None,
    }
}

fn solo_mv(session_id: SessionId, mark: Mark, row: i64, col: i64) -> Command {
    Command::Move {
        session_id,
        row,
        col,
        mark: Some(mark),
    }
}

/// Alice creates a Versus game and Bob joins it. Alice's `PlayerJoined`
/// event is consumed. Returns the session and both participant ids.
async fn versus_pair(
    alice: &mut Client,
    bob: &mut Client,
) -> (SessionId, ParticipantId, ParticipantId) {
    let created = alice
        .session(Command::CreateVersus {
            display_name: "Alice".into(),
        })
        .await;
    let joined = bob
        .session(Command::Join {
            session_id: created.id,
            display_name: "Bob".into(),
        })
        .await;
    let joined_event = alice.event().await;
    assert!(matches!(joined_event, Event::PlayerJoined { .. }));

    (
        created.id,
        joined.participants[0].id.clone(),
        joined.participants[1].id.clone(),
    )
}

// =========================================================================
// Solo
// =========================================================================

#[tokio::test]
async fn test_solo_game_to_win_over_websocket() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    let session = client.session(Command::CreateSolo).await;
    assert_eq!(session.turn, Turn::Mark(Mark::X));

    let moves = [(Mark::X, 0, 0), (Mark::O, 1, 0), (Mark::X, 0, 1), (Mark::O, 1, 1)];
    for (mark, row, col) in moves {
        let after = client.session(solo_mv(session.id, mark, row, col)).await;
        assert_eq!(after.outcome, Outcome::InProgress);
        assert!(matches!(client.event().await, Event::MoveMade { by: None, .. }));
    }

    let last = client.session(solo_mv(session.id, Mark::X, 0, 2)).await;
    assert_eq!(last.outcome, Outcome::Won(Mark::X));
    assert!(matches!(client.event().await, Event::MoveMade { .. }));
    assert!(matches!(
        client.event().await,
        Event::GameEnded { outcome: Outcome::Won(Mark::X), .. }
    ));

    let (code, kind) = client.error(solo_mv(session.id, Mark::O, 2, 2)).await;
    assert_eq!((code, kind), (409, ErrorKind::GameOver));
}

// =========================================================================
// Versus
// =========================================================================

#[tokio::test]
async fn test_versus_waiting_list_and_join() {
    let addr = start_server().await;
    let mut alice = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;

    let created = alice
        .session(Command::CreateVersus {
            display_name: "Alice".into(),
        })
        .await;

    match bob.request(Command::ListWaiting).await {
        Payload::Reply(Reply::Sessions { sessions }) => {
            assert_eq!(sessions.len(), 1);
            assert_eq!(sessions[0].id, created.id);
        }
        other => panic!("expected sessions, got {other:?}"),
    }

    let joined = bob
        .session(Command::Join {
            session_id: created.id,
            display_name: "Bob".into(),
        })
        .await;
    assert_eq!(joined.participants.len(), 2);
    assert_eq!(joined.participants[1].mark, Mark::O);

    match alice.event().await {
        Event::PlayerJoined {
            session_id,
            participant_id,
            display_name,
        } => {
            assert_eq!(session_id, created.id);
            assert_eq!(participant_id, joined.participants[1].id);
            assert_eq!(display_name, "Bob");
        }
        other => panic!("expected PlayerJoined, got {other:?}"),
    }
    bob.assert_silent().await;

    match bob.request(Command::ListWaiting).await {
        Payload::Reply(Reply::Sessions { sessions }) => assert!(sessions.is_empty()),
        other => panic!("expected sessions, got {other:?}"),
    }
}

#[tokio::test]
async fn test_versus_moves_broadcast_to_both_players() {
    let addr = start_server().await;
    let mut alice = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;
    let (id, alice_id, bob_id) = versus_pair(&mut alice, &mut bob).await;

    let after = alice.session(mv(id, 1, 1)).await;
    assert_eq!(after.turn, Turn::Participant(bob_id.clone()));

    for client in [&mut alice, &mut bob] {
        match client.event().await {
            Event::MoveMade {
                row, col, mark, by, ..
            } => {
                assert_eq!((row, col, mark), (1, 1, Mark::X));
                assert_eq!(by, Some(alice_id.clone()));
            }
            other => panic!("expected MoveMade, got {other:?}"),
        }
    }

    bob.session(mv(id, 0, 0)).await;
    assert!(matches!(alice.event().await, Event::MoveMade { mark: Mark::O, .. }));
    assert!(matches!(bob.event().await, Event::MoveMade { mark: Mark::O, .. }));
}

#[tokio::test]
async fn test_rejected_move_goes_only_to_caller() {
    let addr = start_server().await;
    let mut alice = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;
    let (id, _, _) = versus_pair(&mut alice, &mut bob).await;

    let (code, kind) = bob.error(mv(id, 0, 0)).await;
    assert_eq!((code, kind), (409, ErrorKind::NotYourTurn));

    let (code, kind) = alice.error(mv(id, -1, 0)).await;
    assert_eq!((code, kind), (400, ErrorKind::InvalidInput));

    let (code, kind) = alice.error(mv(id, 3, 0)).await;
    assert_eq!((code, kind), (400, ErrorKind::InvalidCoordinates));

    alice.assert_silent().await;
    bob.assert_silent().await;
}

#[tokio::test]
async fn test_stranger_cannot_move_or_join_full_game() {
    let addr = start_server().await;
    let mut alice = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;
    let mut carol = Client::connect(&addr).await;
    let (id, _, _) = versus_pair(&mut alice, &mut bob).await;

    let (code, kind) = carol.error(mv(id, 0, 0)).await;
    assert_eq!((code, kind), (403, ErrorKind::PlayerNotInGame));

    let (code, kind) = carol
        .error(Command::Join {
            session_id: id,
            display_name: "Carol".into(),
        })
        .await;
    assert_eq!((code, kind), (409, ErrorKind::SessionFull));
}

#[tokio::test]
async fn test_leave_notifies_the_other_player() {
    let addr = start_server().await;
    let mut alice = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;
    let (id, _, bob_id) = versus_pair(&mut alice, &mut bob).await;

    let reply = bob.request(Command::Leave { session_id: id }).await;
    assert_eq!(reply, Payload::Reply(Reply::Ack));

    assert_eq!(
        alice.event().await,
        Event::PlayerLeft {
            session_id: id,
            participant_id: bob_id,
        }
    );

    // Bob left the group: he no longer hears about moves.
    alice.session(mv(id, 2, 2)).await;
    assert!(matches!(alice.event().await, Event::MoveMade { .. }));
    bob.assert_silent().await;
}

#[tokio::test]
async fn test_disconnect_notifies_the_other_player() {
    let addr = start_server().await;
    let mut alice = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;
    let (id, _, bob_id) = versus_pair(&mut alice, &mut bob).await;

    bob.ws.close(None).await.unwrap();
    drop(bob);

    assert_eq!(
        alice.event().await,
        Event::PlayerDisconnected {
            session_id: id,
            participant_id: bob_id,
        }
    );

    let session = alice.session(Command::GetSession { session_id: id }).await;
    assert_eq!(session.participants.len(), 2);
    assert!(!session.participants[1].connected);
}

#[tokio::test]
async fn test_delete_session_notifies_group() {
    let addr = start_server().await;
    let mut alice = Client::connect(&addr).await;
    let mut bob = Client::connect(&addr).await;
    let (id, _, _) = versus_pair(&mut alice, &mut bob).await;

    let reply = alice.request(Command::DeleteSession { session_id: id }).await;
    assert_eq!(reply, Payload::Reply(Reply::Deleted { existed: true }));
    assert_eq!(bob.event().await, Event::SessionDeleted { session_id: id });
    assert_eq!(alice.event().await, Event::SessionDeleted { session_id: id });

    let (code, kind) = bob.error(Command::GetSession { session_id: id }).await;
    assert_eq!((code, kind), (404, ErrorKind::NotFound));

    let reply = alice.request(Command::DeleteSession { session_id: id }).await;
    assert_eq!(reply, Payload::Reply(Reply::Deleted { existed: false }));
}

// =========================================================================
// Protocol errors and connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_malformed_frame_is_invalid_input() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    client.send_raw("{not json".to_string()).await;

    let envelope = client.recv().await;
    assert_eq!(envelope.seq, 0);
    assert!(matches!(
        envelope.payload,
        Payload::Error { code: 400, kind: ErrorKind::InvalidInput, .. }
    ));

    // The connection survives a bad frame.
    client.session(Command::CreateSolo).await;
}

#[tokio::test]
async fn test_non_command_payload_is_rejected() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr).await;

    let bogus = Envelope {
        seq: 9,
        timestamp: 0,
        payload: Payload::Reply(Reply::Ack),
    };
    client.send_raw(serde_json::to_string(&bogus).unwrap()).await;

    let envelope = client.recv().await;
    assert_eq!(envelope.seq, 9);
    assert!(matches!(
        envelope.payload,
        Payload::Error { kind: ErrorKind::InvalidInput, .. }
    ));
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let addr = start_server_with(
        NoughtsServer::builder().idle_timeout(Some(Duration::from_millis(100))),
    )
    .await;
    let mut client = Client::connect(&addr).await;

    let next = tokio::time::timeout(RECV_TIMEOUT, client.ws.next())
        .await
        .expect("server should close the idle connection");
    assert!(
        matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))),
        "expected a close, got {next:?}"
    );
}

#[tokio::test]
async fn test_waiting_creator_kept_alive_by_pings() {
    let addr = start_server_with(
        NoughtsServer::builder().idle_timeout(Some(Duration::from_millis(300))),
    )
    .await;
    let mut alice = Client::connect(&addr).await;
    let created = alice
        .session(Command::CreateVersus {
            display_name: "Alice".into(),
        })
        .await;

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        alice
            .ws
            .send(Message::Ping(Default::default()))
            .await
            .expect("connection should still be open");
    }

    let mut bob = Client::connect(&addr).await;
    bob.session(Command::Join {
        session_id: created.id,
        display_name: "Bob".into(),
    })
    .await;
    assert!(matches!(alice.event().await, Event::PlayerJoined { .. }));

    let after = alice.session(mv(created.id, 1, 1)).await;
    assert_eq!(after.board.get(1, 1), Some(Mark::X));
    assert!(after.participants[0].connected);
}

#[tokio::test]
async fn test_heartbeat_keeps_connection_open() {
    let addr = start_server_with(
        NoughtsServer::builder().idle_timeout(Some(Duration::from_millis(300))),
    )
    .await;
    let mut client = Client::connect(&addr).await;

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            client.request(Command::Heartbeat).await,
            Payload::Reply(Reply::Ack)
        );
    }

    let session = client.session(Command::CreateSolo).await;
    assert_eq!(session.turn, Turn::Mark(Mark::X));
}

#[tokio::test]
async fn test_idle_sessions_expire() {
    let addr = start_server_with(
        NoughtsServer::builder()
            .session_ttl(Some(Duration::from_millis(100)))
            .sweep_interval(Duration::from_millis(25)),
    )
    .await;
    let mut client = Client::connect(&addr).await;

    let session = client.session(Command::CreateSolo).await;

    assert_eq!(
        client.event().await,
        Event::SessionDeleted {
            session_id: session.id
        }
    );
    let (code, kind) = client
        .error(Command::GetSession {
            session_id: session.id,
        })
        .await;
    assert_eq!((code, kind), (404, ErrorKind::NotFound));
}

#[tokio::test]
async fn test_run_until_stops_on_shutdown_signal() {
    let server = NoughtsServer::builder()
        .bind("127.0.0.1:0")
        .http_bind(Some("127.0.0.1:0"))
        .build()
        .await
        .expect("server should build");
    assert!(server.http_addr().is_some());
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(RECV_TIMEOUT, running)
        .await
        .expect("server should stop")
        .expect("server task should not panic");
    assert!(result.is_ok());
}
