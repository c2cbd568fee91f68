//! Transport-agnostic command dispatch.
//!
//! [`dispatch`] turns one [`Command`] from one caller into everything the
//! adapter has to do about it: the reply for the caller, the events for
//! the session's group, and the caller's group membership change. It
//! never touches a socket, so any request/response adapter can drive the
//! engine through the same contract the live channel uses.

use noughts_engine::{GameEngine, GameError};
use noughts_protocol::{Command, Event, Mode, Mover, ParticipantId, Reply, Session, SessionId};

use crate::relay::{Membership, Notice};

/// The effects of one dispatched command.
#[derive(Debug)]
pub struct Dispatched {
    /// What the caller receives.
    pub reply: Result<Reply, GameError>,
    /// Events for the session's group.
    pub notices: Vec<Notice>,
    /// How the caller's group membership changes. An `Enter` is applied
    /// before `notices` are delivered, an `Exit` or `Dissolve` after.
    pub membership: Option<Membership>,
}

impl Dispatched {
    fn reply(reply: Reply) -> Self {
        Self {
            reply: Ok(reply),
            notices: Vec::new(),
            membership: None,
        }
    }

    fn rejected(err: GameError) -> Self {
        Self {
            reply: Err(err),
            notices: Vec::new(),
            membership: None,
        }
    }

    fn entered(session: Session) -> Self {
        Self {
            membership: Some(Membership::Enter(session.id)),
            ..Self::reply(Reply::Session { session })
        }
    }
}

/// Short name of a command, for logs.
pub fn command_name(command: &Command) -> &'static str {
    match command {
        Command::CreateSolo => "CreateSolo",
        Command::CreateVersus { .. } => "CreateVersus",
        Command::ListWaiting => "ListWaiting",
        Command::ListAll => "ListAll",
        Command::GetSession { .. } => "GetSession",
        Command::Join { .. } => "Join",
        Command::Move { .. } => "Move",
        Command::Leave { .. } => "Leave",
        Command::DeleteSession { .. } => "DeleteSession",
        Command::Heartbeat => "Heartbeat",
    }
}

/// Runs one command on behalf of `caller`.
pub async fn dispatch(engine: &GameEngine, caller: &ParticipantId, command: Command) -> Dispatched {
    match command {
        Command::CreateSolo => Dispatched::entered(engine.create_solo().await),

        Command::CreateVersus { display_name } => {
            match engine.create_versus(caller.clone(), &display_name).await {
                Ok(session) => Dispatched::entered(session),
                Err(e) => Dispatched::rejected(e),
            }
        }

        Command::ListWaiting => Dispatched::reply(Reply::Sessions {
            sessions: engine.list_waiting().await,
        }),

        Command::ListAll => Dispatched::reply(Reply::Sessions {
            sessions: engine.list_all().await,
        }),

        Command::GetSession { session_id } => match engine.get_session(session_id).await {
            Ok(session) => Dispatched::reply(Reply::Session { session }),
            Err(e) => Dispatched::rejected(e),
        },

        Command::Join {
            session_id,
            display_name,
        } => {
            let result = engine.join(session_id, caller.clone(), &display_name).await;
            let session = match result {
                Ok(session) => session,
                Err(e) => return Dispatched::rejected(e),
            };
            let display_name = session
                .participant(caller)
                .map(|p| p.display_name.clone())
                .unwrap_or(display_name);
            let joined = Event::PlayerJoined {
                session_id,
                participant_id: caller.clone(),
                display_name,
            };
            Dispatched {
                notices: vec![Notice::others(session_id, caller.clone(), joined)],
                ..Dispatched::entered(session)
            }
        }

        Command::Move {
            session_id,
            row,
            col,
            mark,
        } => {
            let (Ok(row), Ok(col)) = (usize::try_from(row), usize::try_from(col)) else {
                return Dispatched::rejected(GameError::InvalidInput(format!(
                    "coordinates ({row}, {col}) must not be negative"
                )));
            };
            let mover = match mark {
                Some(mark) => Mover::Mark(mark),
                None => Mover::Participant(caller.clone()),
            };
            match engine.make_move(session_id, mover, row, col).await {
                Ok(session) => Dispatched {
                    notices: move_notices(&session, caller, row, col),
                    ..Dispatched::reply(Reply::Session { session })
                },
                Err(e) => Dispatched::rejected(e),
            }
        }

        Command::Leave { session_id } => match engine.leave(session_id, caller.clone()).await {
            Ok(seated) => {
                let notices = if seated {
                    let left = Event::PlayerLeft {
                        session_id,
                        participant_id: caller.clone(),
                    };
                    vec![Notice::others(session_id, caller.clone(), left)]
                } else {
                    Vec::new()
                };
                Dispatched {
                    reply: Ok(Reply::Ack),
                    notices,
                    membership: Some(Membership::Exit(session_id)),
                }
            }
            Err(e) => Dispatched::rejected(e),
        },

        Command::DeleteSession { session_id } => {
            let existed = engine.delete_session(session_id).await;
            if existed {
                Dispatched {
                    reply: Ok(Reply::Deleted { existed }),
                    notices: vec![Notice::group(
                        session_id,
                        Event::SessionDeleted { session_id },
                    )],
                    membership: Some(Membership::Dissolve(session_id)),
                }
            } else {
                Dispatched::reply(Reply::Deleted { existed })
            }
        }

        Command::Heartbeat => Dispatched::reply(Reply::Ack),
    }
}

/// Marks `participant_id` disconnected everywhere and returns the
/// notices for the sessions that changed.
pub async fn disconnect(engine: &GameEngine, participant_id: &ParticipantId) -> Vec<Notice> {
    engine
        .handle_disconnection(participant_id)
        .await
        .into_iter()
        .map(|session_id| {
            Notice::others(
                session_id,
                participant_id.clone(),
                Event::PlayerDisconnected {
                    session_id,
                    participant_id: participant_id.clone(),
                },
            )
        })
        .collect()
}

fn move_notices(session: &Session, caller: &ParticipantId, row: usize, col: usize) -> Vec<Notice> {
    let Some(mark) = session.board.get(row, col) else {
        return Vec::new();
    };
    let by = (session.mode == Mode::Versus).then(|| caller.clone());
    let session_id: SessionId = session.id;

    let mut notices = vec![Notice::group(
        session_id,
        Event::MoveMade {
            session_id,
            row,
            col,
            mark,
            by,
            session: session.clone(),
        },
    )];
    if session.is_finished() {
        notices.push(Notice::group(
            session_id,
            Event::GameEnded {
                session_id,
                outcome: session.outcome,
                session: session.clone(),
            },
        ));
    }
    notices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Recipient;
    use noughts_protocol::{Mark, Outcome};

    fn pid(id: &str) -> ParticipantId {
        ParticipantId::from(id)
    }

    fn session_of(dispatched: &Dispatched) -> Session {
        match &dispatched.reply {
            Ok(Reply::Session { session }) => session.clone(),
            other => panic!("expected a session reply, got {other:?}"),
        }
    }

    async fn versus_pair(engine: &GameEngine) -> SessionId {
        let created = dispatch(
            engine,
            &pid("alice"),
            Command::CreateVersus {
                display_name: "Alice".into(),
            },
        )
        .await;
        let id = session_of(&created).id;
        dispatch(
            engine,
            &pid("bob"),
            Command::Join {
                session_id: id,
                display_name: "Bob".into(),
            },
        )
        .await;
        id
    }

    fn play(session_id: SessionId, row: i64, col: i64) -> Command {
        Command::Move {
            session_id,
            row,
            col,
            mark: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_create_solo_enters_group() {
        let engine = GameEngine::default();
        let out = dispatch(&engine, &pid("alice"), Command::CreateSolo).await;

        let session = session_of(&out);
        assert_eq!(session.mode, Mode::Solo);
        assert_eq!(out.membership, Some(Membership::Enter(session.id)));
        assert!(out.notices.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_join_notifies_others() {
        let engine = GameEngine::default();
        let created = dispatch(
            &engine,
            &pid("alice"),
            Command::CreateVersus {
                display_name: "Alice".into(),
            },
        )
        .await;
        let id = session_of(&created).id;

        let out = dispatch(
            &engine,
            &pid("bob"),
            Command::Join {
                session_id: id,
                display_name: " Bob ".into(),
            },
        )
        .await;

        assert_eq!(out.membership, Some(Membership::Enter(id)));
        assert_eq!(
            out.notices,
            vec![Notice::others(
                id,
                pid("bob"),
                Event::PlayerJoined {
                    session_id: id,
                    participant_id: pid("bob"),
                    display_name: "Bob".into(),
                },
            )]
        );
    }

    #[tokio::test]
    async fn test_dispatch_move_broadcasts_to_group() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;

        let out = dispatch(&engine, &pid("alice"), play(id, 1, 1)).await;

        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].recipient, Recipient::Group(id));
        assert!(matches!(
            &out.notices[0].event,
            Event::MoveMade { mark: Mark::X, by: Some(by), .. } if *by == pid("alice")
        ));
    }

    #[tokio::test]
    async fn test_dispatch_winning_move_adds_game_ended() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;
        for (who, row, col) in [("alice", 0, 0), ("bob", 1, 0), ("alice", 0, 1), ("bob", 1, 1)] {
            dispatch(&engine, &pid(who), play(id, row, col)).await;
        }

        let out = dispatch(&engine, &pid("alice"), play(id, 0, 2)).await;

        assert_eq!(out.notices.len(), 2);
        assert!(matches!(
            out.notices[1].event,
            Event::GameEnded { outcome: Outcome::Won(Mark::X), .. }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_solo_move_uses_mark_and_has_no_author() {
        let engine = GameEngine::default();
        let id = session_of(&dispatch(&engine, &pid("alice"), Command::CreateSolo).await).id;

        let out = dispatch(
            &engine,
            &pid("alice"),
            Command::Move {
                session_id: id,
                row: 2,
                col: 0,
                mark: Some(Mark::X),
            },
        )
        .await;

        assert!(matches!(
            &out.notices[0].event,
            Event::MoveMade { mark: Mark::X, by: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_dispatch_negative_coordinates_is_invalid_input() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;

        let out = dispatch(&engine, &pid("alice"), play(id, -1, 0)).await;

        assert!(matches!(out.reply, Err(GameError::InvalidInput(_))));
        assert!(out.notices.is_empty());
        assert_eq!(engine.get_session(id).await.unwrap().board.filled(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_rejection_has_no_side_effects() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;

        let out = dispatch(&engine, &pid("bob"), play(id, 0, 0)).await;

        assert!(matches!(out.reply, Err(GameError::NotYourTurn { .. })));
        assert!(out.notices.is_empty());
        assert_eq!(out.membership, None);
    }

    #[tokio::test]
    async fn test_dispatch_leave_notifies_others_and_exits() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;

        let out = dispatch(&engine, &pid("bob"), Command::Leave { session_id: id }).await;

        assert!(matches!(out.reply, Ok(Reply::Ack)));
        assert_eq!(out.membership, Some(Membership::Exit(id)));
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].recipient, Recipient::GroupExcept(id, pid("bob")));
    }

    #[tokio::test]
    async fn test_dispatch_leave_by_stranger_is_silent() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;

        let out = dispatch(&engine, &pid("mallory"), Command::Leave { session_id: id }).await;

        assert!(matches!(out.reply, Ok(Reply::Ack)));
        assert!(out.notices.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_delete_dissolves_group_once() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;

        let first = dispatch(&engine, &pid("alice"), Command::DeleteSession { session_id: id }).await;
        let second = dispatch(&engine, &pid("alice"), Command::DeleteSession { session_id: id }).await;

        assert!(matches!(first.reply, Ok(Reply::Deleted { existed: true })));
        assert_eq!(first.membership, Some(Membership::Dissolve(id)));
        assert_eq!(first.notices.len(), 1);
        assert!(matches!(second.reply, Ok(Reply::Deleted { existed: false })));
        assert!(second.notices.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_notices_only_affected_sessions() {
        let engine = GameEngine::default();
        let id = versus_pair(&engine).await;
        dispatch(
            &engine,
            &pid("carol"),
            Command::CreateVersus {
                display_name: "Carol".into(),
            },
        )
        .await;

        let notices = disconnect(&engine, &pid("bob")).await;

        assert_eq!(
            notices,
            vec![Notice::others(
                id,
                pid("bob"),
                Event::PlayerDisconnected {
                    session_id: id,
                    participant_id: pid("bob"),
                },
            )]
        );
    }

    #[tokio::test]
    async fn test_dispatch_heartbeat_acks_without_effects() {
        let engine = GameEngine::default();

        let dispatched = dispatch(&engine, &pid("alice"), Command::Heartbeat).await;

        assert!(matches!(dispatched.reply, Ok(Reply::Ack)));
        assert!(dispatched.notices.is_empty());
        assert!(dispatched.membership.is_none());
        assert!(engine.list_all().await.is_empty());
    }
}
