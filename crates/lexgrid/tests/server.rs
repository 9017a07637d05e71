//! End-to-end tests: real WebSocket clients against a running server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lexgrid::prelude::*;
use lexgrid_protocol::{MatchStarted, SessionId, SyncType};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server with no countdown on a random port and returns the
/// address.
async fn start_server() -> String {
    let server = LexgridServer::builder()
        .bind("127.0.0.1:0")
        .room_config(RoomConfig {
            countdown: Duration::ZERO,
            ..RoomConfig::default()
        })
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

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, event: &ClientEvent) {
    let text = serde_json::to_string(event).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

/// Reads events until `pick` accepts one. Panics after two seconds.
async fn recv_until<T>(ws: &mut ClientWs, mut pick: impl FnMut(ServerEvent) -> Option<T>) -> T {
    let wait = async {
        loop {
            let msg = ws.next().await.expect("stream open").expect("recv");
            if !msg.is_text() {
                continue;
            }
            let event: ServerEvent = serde_json::from_slice(&msg.into_data()).expect("decode");
            if let Some(found) = pick(event) {
                return found;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .expect("expected event did not arrive")
}

async fn welcome(ws: &mut ClientWs) -> (PlayerId, SessionId) {
    recv_until(ws, |e| match e {
        ServerEvent::Welcome {
            player_id,
            session_id,
            ..
        } => Some((player_id, session_id)),
        _ => None,
    })
    .await
}

async fn joined(ws: &mut ClientWs) -> RoomCode {
    recv_until(ws, |e| match e {
        ServerEvent::RoomJoined { room, .. } => Some(room.code),
        _ => None,
    })
    .await
}

async fn match_started(ws: &mut ClientWs) -> MatchStarted {
    recv_until(ws, |e| match e {
        ServerEvent::MatchStarted(m) => Some(m),
        _ => None,
    })
    .await
}

/// A connected test client and the identity it was welcomed with.
struct Player {
    ws: ClientWs,
    id: PlayerId,
    session: SessionId,
}

async fn player(addr: &str) -> Player {
    let mut ws = connect(addr).await;
    let (id, session) = welcome(&mut ws).await;
    Player { ws, id, session }
}

/// Host and guest seated in one room, both ready, match started.
async fn started_match(addr: &str) -> (Player, Player, MatchStarted, MatchStarted) {
    let mut host = player(addr).await;
    let mut guest = player(addr).await;

    send(
        &mut host.ws,
        &ClientEvent::CreateRoom {
            player_name: "ana".into(),
            settings: MatchSettings::default(),
        },
    )
    .await;
    let code = joined(&mut host.ws).await;
    send(
        &mut guest.ws,
        &ClientEvent::JoinRoom {
            room_code: code,
            player_name: "bo".into(),
        },
    )
    .await;
    joined(&mut guest.ws).await;

    send(&mut host.ws, &ClientEvent::SetReady { is_ready: true }).await;
    send(&mut guest.ws, &ClientEvent::SetReady { is_ready: true }).await;
    // The ready frames travel on separate connections; start only once the
    // engine has seen both.
    recv_until(&mut host.ws, |e| match e {
        ServerEvent::RoomUpdated { room } => (room.players.len() == 2
            && room.players.iter().all(|p| p.is_ready))
        .then_some(()),
        _ => None,
    })
    .await;
    send(&mut host.ws, &ClientEvent::StartMatch).await;

    let a = match_started(&mut host.ws).await;
    let b = match_started(&mut guest.ws).await;
    (host, guest, a, b)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connect_receives_welcome() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    let (player_id, session_id) = welcome(&mut ws).await;
    assert!(player_id.0 > 0);
    assert_eq!(session_id.0.len(), 32);
}

#[tokio::test]
async fn test_undecodable_frame_keeps_connection_open() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    welcome(&mut ws).await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    ws.send(Message::Text(r#"{"event":"room:explode","data":{}}"#.into()))
        .await
        .expect("send");
    send(
        &mut ws,
        &ClientEvent::CreateRoom {
            player_name: "ana".into(),
            settings: MatchSettings::default(),
        },
    )
    .await;
    let code = joined(&mut ws).await;
    assert_eq!(code.as_str().len(), RoomCode::LEN);
}

#[tokio::test]
async fn test_join_unknown_room_returns_404() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    welcome(&mut ws).await;

    send(
        &mut ws,
        &ClientEvent::JoinRoom {
            room_code: RoomCode::parse("ZZZZZ").unwrap(),
            player_name: "ana".into(),
        },
    )
    .await;
    let code = recv_until(&mut ws, |e| match e {
        ServerEvent::Error { code, .. } => Some(code),
        _ => None,
    })
    .await;
    assert_eq!(code, 404);
}

#[tokio::test]
async fn test_start_match_both_players_get_same_board() {
    let addr = start_server().await;
    let (host, guest, a, b) = started_match(&addr).await;

    assert_eq!(a.board_checksum, b.board_checksum);
    assert_eq!(a.board, b.board);
    assert_eq!(a.board.checksum(), a.board_checksum);
    assert_eq!(a.current_round, 1);
    assert_eq!(a.player_count, 2);
    assert_ne!(host.id, guest.id);
}

#[tokio::test]
async fn test_reconnect_mid_round_resyncs_board() {
    let addr = start_server().await;
    let (mut host, guest, started, _) = started_match(&addr).await;
    let Player {
        ws, id, session
    } = guest;
    drop(ws);

    // Wait until the server has seen the drop.
    recv_until(&mut host.ws, |e| match e {
        ServerEvent::RoomUpdated { room } => room
            .players
            .iter()
            .any(|p| p.id == id && !p.is_connected)
            .then_some(()),
        _ => None,
    })
    .await;

    let mut back = player(&addr).await;
    assert_ne!(back.id, id);
    send(
        &mut back.ws,
        &ClientEvent::Reconnect {
            session_id: session.clone(),
            username: "bo".into(),
        },
    )
    .await;

    let (restored, kept) = welcome(&mut back.ws).await;
    assert_eq!(restored, id);
    assert_eq!(kept, session);
    joined(&mut back.ws).await;
    let resync = recv_until(&mut back.ws, |e| match e {
        ServerEvent::BoardResync(r) => Some(r),
        _ => None,
    })
    .await;
    assert_eq!(resync.sync_type, SyncType::Rejoin);
    assert_eq!(resync.board.checksum(), resync.board_checksum);
    assert_eq!(resync.board_checksum, started.board_checksum);
    assert!(resync.time_remaining <= started.time_remaining);
    assert!(resync.time_remaining > 0);
}

#[tokio::test]
async fn test_reconnect_with_unknown_session_returns_404() {
    let addr = start_server().await;
    let mut p = player(&addr).await;
    send(
        &mut p.ws,
        &ClientEvent::Reconnect {
            session_id: SessionId("0".repeat(32)),
            username: "bo".into(),
        },
    )
    .await;
    let code = recv_until(&mut p.ws, |e| match e {
        ServerEvent::Error { code, .. } => Some(code),
        _ => None,
    })
    .await;
    assert_eq!(code, 404);
}
