use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        game::GameSnapshot,
        ws::{
            ClientIntent, ErrorPayload, HandshakeParams, INVALID_MESSAGE_CODE, ServerMessage,
            clamp_progress,
        },
    },
    error::ServiceError,
    services::lobby_service,
    state::{
        ConnectionId, RoomHub, SharedState,
        lobby::{self, DepartOutcome, LobbyError, Submission},
    },
};

/// One accepted realtime connection bound to a user and, while attached, a game room.
struct Session {
    id: ConnectionId,
    user_id: Uuid,
    game_id: RwLock<Option<Uuid>>,
    tx: mpsc::UnboundedSender<Message>,
}

impl Session {
    /// Game this session acts on, as long as it is still a member of that room.
    async fn current_game(&self, rooms: &RoomHub) -> Result<Uuid, ServiceError> {
        let mut game_id = self.game_id.write().await;
        match *game_id {
            Some(id) if rooms.contains(id, self.id) => Ok(id),
            _ => {
                game_id.take();
                Err(LobbyError::PlayerNotInGame.into())
            }
        }
    }

    /// Forget the room this session was attached to.
    async fn detach(&self) -> Option<Uuid> {
        self.game_id.write().await.take()
    }
}

/// Which outbound event carries a snapshot.
#[derive(Debug, Clone, Copy)]
enum SnapshotEvent {
    GameState,
    StartGame,
}

/// Handle the full lifecycle for an individual lobby WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, params: HandshakeParams) {
    let (sender, receiver) = socket.split();
    run_session(state, sender, receiver, params).await;
}

/// Drive one session over any frame stream and sink, so the loop does not depend on axum's socket.
async fn run_session<W, R>(
    state: SharedState,
    mut sender: W,
    mut receiver: R,
    params: HandshakeParams,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let session = match open_session(&state, params, outbound_tx.clone()).await {
        Ok(session) => session,
        Err(payload) => {
            send_message_to_websocket(&outbound_tx, &ServerMessage::Error(payload));
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientIntent::from_json_str(&text) {
                Ok(intent) => {
                    debug!(connection = %session.id, user_id = %session.user_id, ?intent, "received intent");
                    tokio::spawn(dispatch_intent(state.clone(), session.clone(), intent));
                }
                Err(err) => {
                    warn!(connection = %session.id, error = %err, "failed to parse lobby message");
                    send_invalid_message(&session.tx, err.to_string());
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %session.id, user_id = %session.user_id, "client closed connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                send_invalid_message(&session.tx, "binary frames are not supported".into());
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %session.id, error = %err, "websocket error");
                break;
            }
        }
    }

    // Membership is only left through an explicit intent; a dropped socket just leaves the room.
    if let Some(game_id) = session.detach().await {
        state.rooms().leave(game_id, session.id);
    }
    info!(connection = %session.id, user_id = %session.user_id, "lobby connection closed");

    finalize(writer_task, outbound_tx).await;
}

/// Resolve the caller's game, join its room and push the current snapshot to the room.
async fn open_session(
    state: &SharedState,
    params: HandshakeParams,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<Arc<Session>, ErrorPayload> {
    let Some(user_id) = params.user_id else {
        return Err(failure_payload(&ServiceError::Lobby(LobbyError::UserNotFound)));
    };

    let resolved = match params.game_id {
        Some(game_id) => lobby_service::find_game(state, game_id, user_id).await,
        None => lobby_service::find_game_by_user_id(state, user_id).await,
    };
    let snapshot = resolved.map_err(|err| {
        if err.is_infrastructure() {
            error!(%user_id, error = ?err, "failed to resolve lobby connection");
        } else {
            info!(%user_id, error = %err, "rejecting lobby connection");
        }
        failure_payload(&err)
    })?;

    let session = Arc::new(Session {
        id: Uuid::new_v4(),
        user_id,
        game_id: RwLock::new(Some(snapshot.id)),
        tx,
    });
    state
        .rooms()
        .join(snapshot.id, session.id, user_id, session.tx.clone());
    info!(connection = %session.id, %user_id, game_id = %snapshot.id, "lobby connection attached");

    if let Err(err) = refresh_room(state, snapshot.id).await {
        report_failure(&session, &err);
    }
    Ok(session)
}

/// Run one intent to completion, reporting failures privately to its sender.
async fn dispatch_intent(state: SharedState, session: Arc<Session>, intent: ClientIntent) {
    let result = match intent {
        ClientIntent::Submit {
            code,
            progress,
            language,
        } => {
            let submission =
                Submission::new(clamp_progress(progress), code).with_language(language);
            handle_submit(&state, &session, submission).await
        }
        ClientIntent::StartGame => handle_start(&state, &session).await,
        ClientIntent::Leave => handle_leave(&state, &session).await,
        ClientIntent::Unknown => {
            send_invalid_message(&session.tx, "unknown event".into());
            Ok(())
        }
    };

    if let Err(err) = result {
        report_failure(&session, &err);
    }
}

async fn handle_submit(
    state: &SharedState,
    session: &Session,
    submission: Submission,
) -> Result<(), ServiceError> {
    let game_id = session.current_game(state.rooms()).await?;
    lobby_service::submit_code(state, game_id, session.user_id, submission).await?;
    refresh_room(state, game_id).await
}

async fn handle_start(state: &SharedState, session: &Session) -> Result<(), ServiceError> {
    let game_id = session.current_game(state.rooms()).await?;
    let current = lobby_service::find_game(state, game_id, session.user_id).await?;
    lobby::check_startable(current.status, current.participants.len())?;
    if !current
        .participant(session.user_id)
        .is_some_and(|participant| participant.is_host)
    {
        return Err(LobbyError::PlayerNotHost.into());
    }

    let started = lobby_service::start_game(state, game_id).await?;
    broadcast_snapshot(state, started, SnapshotEvent::StartGame);
    Ok(())
}

async fn handle_leave(state: &SharedState, session: &Session) -> Result<(), ServiceError> {
    let game_id = session.current_game(state.rooms()).await?;
    let outcome = lobby_service::leave_game(state, game_id, session.user_id).await?;

    session.detach().await;
    let detached = state.rooms().leave_user(game_id, session.user_id);
    debug!(%game_id, user_id = %session.user_id, detached, "user connections left the room");

    match outcome {
        DepartOutcome::LastPlayerLeft => {
            state.rooms().close_room(game_id);
            Ok(())
        }
        DepartOutcome::Remaining { .. } => refresh_room(state, game_id).await,
    }
}

/// Re-read the game after a write and push it to its room.
async fn refresh_room(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    match lobby_service::game_snapshot(state, game_id).await? {
        Some(snapshot) => broadcast_snapshot(state, snapshot, SnapshotEvent::GameState),
        None => {
            debug!(%game_id, "game gone; closing room");
            state.rooms().close_room(game_id);
        }
    }
    Ok(())
}

fn broadcast_snapshot(state: &SharedState, snapshot: GameSnapshot, event: SnapshotEvent) {
    let game_id = snapshot.id;
    let version = snapshot.version;
    let message = match event {
        SnapshotEvent::GameState => ServerMessage::GameState(snapshot),
        SnapshotEvent::StartGame => ServerMessage::StartGame(snapshot),
    };
    let Some(frame) = encode(&message) else {
        return;
    };
    let delivered = state.rooms().broadcast(game_id, version, frame);
    debug!(%game_id, version, ?event, delivered, "broadcast snapshot");
}

/// Send a sanitized failure to the session that caused it.
fn report_failure(session: &Session, err: &ServiceError) {
    if err.is_infrastructure() {
        error!(connection = %session.id, user_id = %session.user_id, error = ?err, "lobby intent failed");
    } else {
        debug!(connection = %session.id, user_id = %session.user_id, error = %err, "lobby intent rejected");
    }
    send_message_to_websocket(&session.tx, &ServerMessage::Error(failure_payload(err)));
}

fn failure_payload(err: &ServiceError) -> ErrorPayload {
    match err {
        ServiceError::Lobby(lobby) => ErrorPayload::coded(lobby.code(), lobby.to_string()),
        ServiceError::InvalidInput(message) => {
            ErrorPayload::coded(INVALID_MESSAGE_CODE, message.clone())
        }
        _ => ErrorPayload::internal(),
    }
}

fn send_invalid_message(tx: &mpsc::UnboundedSender<Message>, message: String) {
    send_message_to_websocket(
        tx,
        &ServerMessage::Error(ErrorPayload::coded(INVALID_MESSAGE_CODE, message)),
    );
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize lobby message");
            None
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
fn send_message_to_websocket(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    if let Some(frame) = encode(message) {
        if tx.send(frame).is_err() {
            debug!("writer closed before message could be queued");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use axum::body::Bytes;
    use futures::channel::mpsc as wire;
    use serde_json::Value;
    use tokio::time::timeout;

    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::MemoryGameStore},
            models::{GameStatus, ProgrammingLanguage, UserEntity},
        },
        services::challenge_service::{random_challenge, seed_catalog},
        state::AppState,
    };

    use super::*;

    struct Client {
        session: Arc<Session>,
        rx: mpsc::UnboundedReceiver<Message>,
    }

    impl Client {
        fn frames(&mut self) -> Vec<Value> {
            let mut frames = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                if let Message::Text(text) = message {
                    frames.push(serde_json::from_str(&text).unwrap());
                }
            }
            frames
        }
    }

    async fn setup() -> (SharedState, MemoryGameStore) {
        let config = AppConfig::default();
        let store = MemoryGameStore::new();
        seed_catalog(&store, config.challenges()).await.unwrap();
        let state = AppState::new(config);
        state.install_game_store(Arc::new(store.clone())).await;
        (state, store)
    }

    async fn seeded_lobby(store: &MemoryGameStore, players: usize) -> (Uuid, Vec<Uuid>) {
        let mut ids = Vec::new();
        for index in 0..players {
            let user = UserEntity {
                id: Uuid::new_v4(),
                username: format!("player{index}"),
                created_at: SystemTime::now(),
            };
            store.save_user(user.clone()).await.unwrap();
            ids.push(user.id);
        }
        let challenge = random_challenge(store).await.unwrap();
        let mut game =
            lobby::new_game(&challenge, ids[0], SystemTime::now(), Duration::from_secs(30));
        for id in &ids[1..] {
            lobby::admit(&mut game, *id, 6, SystemTime::now()).unwrap();
        }
        let game_id = game.id;
        store.insert_game(game).await.unwrap();
        (game_id, ids)
    }

    async fn connect(state: &SharedState, user_id: Uuid, game_id: Option<Uuid>) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let params = HandshakeParams {
            user_id: Some(user_id),
            game_id,
        };
        let session = open_session(state, params, tx).await.unwrap();
        Client { session, rx }
    }

    fn event(frame: &Value) -> &str {
        frame["event"].as_str().unwrap()
    }

    #[tokio::test]
    async fn connecting_pushes_snapshot_to_the_room() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;

        let mut host = connect(&state, ids[0], Some(game_id)).await;
        let first = host.frames();
        assert_eq!(first.len(), 1);
        assert_eq!(event(&first[0]), "gameState");
        assert_eq!(first[0]["data"]["participants"].as_array().unwrap().len(), 2);

        let mut guest = connect(&state, ids[1], None).await;
        assert_eq!(host.frames().len(), 1);
        assert_eq!(guest.frames().len(), 1);
        assert_eq!(state.rooms().member_count(game_id), 2);
    }

    #[tokio::test]
    async fn outsider_is_rejected_without_joining_room() {
        let (state, store) = setup().await;
        let (game_id, _) = seeded_lobby(&store, 1).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let params = HandshakeParams {
            user_id: Some(Uuid::new_v4()),
            game_id: Some(game_id),
        };

        let err = open_session(&state, params, tx).await.err().unwrap();
        assert_eq!(err.code.as_deref(), Some("PLAYER_NOT_IN_GAME"));
        assert_eq!(state.rooms().member_count(game_id), 0);

        let (tx, _rx) = mpsc::unbounded_channel();
        let err = open_session(&state, HandshakeParams::default(), tx)
            .await
            .err()
            .unwrap();
        assert_eq!(err.code.as_deref(), Some("USER_NOT_FOUND"));
    }

    #[tokio::test]
    async fn guest_cannot_start_and_error_stays_private() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;
        let mut host = connect(&state, ids[0], Some(game_id)).await;
        let mut guest = connect(&state, ids[1], Some(game_id)).await;
        host.frames();
        guest.frames();

        dispatch_intent(state.clone(), guest.session.clone(), ClientIntent::StartGame).await;

        let frames = guest.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(event(&frames[0]), "error");
        assert_eq!(frames[0]["data"]["code"], "PLAYER_NOT_HOST");
        assert!(host.frames().is_empty());
    }

    #[tokio::test]
    async fn solo_host_cannot_start() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 1).await;
        let mut host = connect(&state, ids[0], Some(game_id)).await;
        host.frames();

        dispatch_intent(state.clone(), host.session.clone(), ClientIntent::StartGame).await;
        let frames = host.frames();
        assert_eq!(frames[0]["data"]["code"], "NOT_ENOUGH_PLAYERS");
    }

    #[tokio::test]
    async fn host_start_is_broadcast_to_everyone() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;
        let mut host = connect(&state, ids[0], Some(game_id)).await;
        let mut guest = connect(&state, ids[1], Some(game_id)).await;
        host.frames();
        guest.frames();

        dispatch_intent(state.clone(), host.session.clone(), ClientIntent::StartGame).await;

        for client in [&mut host, &mut guest] {
            let frames = client.frames();
            assert_eq!(frames.len(), 1);
            assert_eq!(event(&frames[0]), "startGame");
            assert_eq!(frames[0]["data"]["status"], "IN_PROGRESS");
        }

        dispatch_intent(state.clone(), host.session.clone(), ClientIntent::StartGame).await;
        assert_eq!(host.frames()[0]["data"]["code"], "GAME_ALREADY_STARTED");
    }

    #[tokio::test]
    async fn submissions_refresh_the_room() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;
        lobby_service::start_game(&state, game_id).await.unwrap();
        let mut host = connect(&state, ids[0], Some(game_id)).await;
        let mut guest = connect(&state, ids[1], Some(game_id)).await;
        host.frames();
        guest.frames();

        let submit = |code: &str| ClientIntent::Submit {
            code: code.into(),
            progress: 250,
            language: Some(ProgrammingLanguage::Typescript),
        };
        dispatch_intent(state.clone(), host.session.clone(), submit("a")).await;
        let frames = guest.frames();
        assert_eq!(event(&frames[0]), "gameState");
        assert_eq!(frames[0]["data"]["participants"][0]["isCompleted"], true);
        assert_eq!(frames[0]["data"]["participants"][0]["percentage"], 100);
        assert_eq!(frames[0]["data"]["participants"][0]["language"], "TYPESCRIPT");
        host.frames();

        dispatch_intent(state.clone(), guest.session.clone(), submit("b")).await;
        let frames = host.frames();
        assert_eq!(frames[0]["data"]["status"], "COMPLETED");

        dispatch_intent(state.clone(), guest.session.clone(), submit("c")).await;
        let frames = guest.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1]["data"]["code"], "PLAYER_ALREADY_COMPLETED");
    }

    #[tokio::test]
    async fn leaving_detaches_and_updates_remaining_players() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;
        let mut host = connect(&state, ids[0], Some(game_id)).await;
        let mut guest = connect(&state, ids[1], Some(game_id)).await;
        host.frames();
        guest.frames();

        dispatch_intent(state.clone(), host.session.clone(), ClientIntent::Leave).await;

        assert!(host.frames().is_empty());
        let frames = guest.frames();
        let participants = frames[0]["data"]["participants"].as_array().unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0]["isHost"], true);
        assert_eq!(state.rooms().member_count(game_id), 1);

        dispatch_intent(state.clone(), host.session.clone(), ClientIntent::Leave).await;
        assert_eq!(host.frames()[0]["data"]["code"], "PLAYER_NOT_IN_GAME");

        dispatch_intent(state.clone(), guest.session.clone(), ClientIntent::Leave).await;
        assert!(guest.frames().is_empty());
        assert_eq!(state.rooms().member_count(game_id), 0);
        assert!(store.find_game(game_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn infrastructure_failures_are_sanitized() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;
        lobby_service::start_game(&state, game_id).await.unwrap();
        let mut host = connect(&state, ids[0], Some(game_id)).await;
        host.frames();

        store.set_offline(true);
        dispatch_intent(
            state.clone(),
            host.session.clone(),
            ClientIntent::Submit {
                code: String::new(),
                progress: 100,
                language: None,
            },
        )
        .await;

        let frames = host.frames();
        assert_eq!(frames[0]["data"]["message"], "Internal server error");
        assert!(frames[0]["data"].get("code").is_none());
        store.set_offline(false);
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.status, GameStatus::InProgress);
    }

    #[tokio::test]
    async fn unknown_intents_get_invalid_message() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 1).await;
        let mut host = connect(&state, ids[0], Some(game_id)).await;
        host.frames();

        dispatch_intent(state.clone(), host.session.clone(), ClientIntent::Unknown).await;
        assert_eq!(host.frames()[0]["data"]["code"], INVALID_MESSAGE_CODE);
    }

    #[tokio::test]
    async fn leaving_detaches_every_connection_of_that_user() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;
        let mut laptop = connect(&state, ids[0], Some(game_id)).await;
        let mut phone = connect(&state, ids[0], Some(game_id)).await;
        let mut guest = connect(&state, ids[1], Some(game_id)).await;
        laptop.frames();
        phone.frames();
        guest.frames();

        dispatch_intent(state.clone(), laptop.session.clone(), ClientIntent::Leave).await;

        assert_eq!(state.rooms().member_count(game_id), 1);
        assert!(phone.frames().is_empty());
        assert_eq!(guest.frames().len(), 1);

        dispatch_intent(state.clone(), phone.session.clone(), ClientIntent::StartGame).await;
        assert_eq!(phone.frames()[0]["data"]["code"], "PLAYER_NOT_IN_GAME");
        assert!(guest.frames().is_empty());
    }

    /// Socket session driven through in-memory frame channels.
    struct Socket {
        inbound: wire::UnboundedSender<Result<Message, axum::Error>>,
        outbound: wire::UnboundedReceiver<Message>,
        task: JoinHandle<()>,
    }

    impl Socket {
        fn open(state: &SharedState, params: HandshakeParams) -> Self {
            let (inbound, receiver) = wire::unbounded();
            let (sender, outbound) = wire::unbounded();
            let task = tokio::spawn(run_session(state.clone(), sender, receiver, params));
            Self {
                inbound,
                outbound,
                task,
            }
        }

        fn send(&self, message: Message) {
            self.inbound.unbounded_send(Ok(message)).unwrap();
        }

        async fn next(&mut self) -> Message {
            timeout(Duration::from_secs(2), self.outbound.next())
                .await
                .unwrap()
                .unwrap()
        }

        async fn next_json(&mut self) -> Value {
            match self.next().await {
                Message::Text(text) => serde_json::from_str(&text).unwrap(),
                other => panic!("expected a text frame, got {other:?}"),
            }
        }

        async fn closed(self) {
            drop(self.inbound);
            timeout(Duration::from_secs(2), self.task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn dropped_socket_keeps_the_player_in_the_game() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 2).await;
        let mut socket = Socket::open(
            &state,
            HandshakeParams {
                user_id: Some(ids[1]),
                game_id: Some(game_id),
            },
        );
        assert_eq!(event(&socket.next_json().await), "gameState");
        assert_eq!(state.rooms().member_count(game_id), 1);

        socket.closed().await;

        assert_eq!(state.rooms().member_count(game_id), 0);
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.participants.len(), 2);
        assert!(game.has_participant(ids[1]));
        assert!(game.participants[&ids[0]].is_host);
    }

    #[tokio::test]
    async fn failed_handshake_sends_error_then_close() {
        let (state, store) = setup().await;
        let (game_id, _) = seeded_lobby(&store, 1).await;
        let mut socket = Socket::open(
            &state,
            HandshakeParams {
                user_id: Some(Uuid::new_v4()),
                game_id: Some(game_id),
            },
        );

        let frame = socket.next_json().await;
        assert_eq!(event(&frame), "error");
        assert_eq!(frame["data"]["code"], "PLAYER_NOT_IN_GAME");
        assert!(matches!(socket.next().await, Message::Close(_)));
        timeout(Duration::from_secs(2), socket.task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.rooms().member_count(game_id), 0);
    }

    #[tokio::test]
    async fn socket_rejects_garbage_and_answers_pings() {
        let (state, store) = setup().await;
        let (game_id, ids) = seeded_lobby(&store, 1).await;
        let mut socket = Socket::open(
            &state,
            HandshakeParams {
                user_id: Some(ids[0]),
                game_id: None,
            },
        );
        assert_eq!(event(&socket.next_json().await), "gameState");

        socket.send(Message::Text("not json".into()));
        let frame = socket.next_json().await;
        assert_eq!(frame["data"]["code"], INVALID_MESSAGE_CODE);

        socket.send(Message::Binary(Bytes::from_static(b"\x00\x01")));
        let frame = socket.next_json().await;
        assert_eq!(frame["data"]["code"], INVALID_MESSAGE_CODE);

        socket.send(Message::Ping(Bytes::from_static(b"beat")));
        match socket.next().await {
            Message::Pong(payload) => assert_eq!(payload, Bytes::from_static(b"beat")),
            other => panic!("expected pong, got {other:?}"),
        }

        socket.closed().await;
        assert!(store.find_game(game_id).await.unwrap().is_some());
    }
}
