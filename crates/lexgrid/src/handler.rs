//! Per-connection handler: registration, a writer task and the read loop.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the engine → `session:welcome` is queued
//!   2. Spawn a writer that encodes outgoing events onto the socket
//!   3. Loop: receive frames → decode → forward to the engine
//!
//! Frames that do not decode into a [`ClientEvent`] are logged and dropped;
//! the connection stays open.

use std::sync::Arc;

use lexgrid_protocol::{ClientEvent, Codec, ServerEvent};
use lexgrid_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::{mpsc, oneshot};

use crate::LexgridError;
use crate::engine::EngineCommand;

/// Tells the engine the connection is gone when the handler exits,
/// including on early return or panic.
struct DisconnectGuard {
    conn: ConnectionId,
    engine: mpsc::UnboundedSender<EngineCommand>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let _ = self
            .engine
            .send(EngineCommand::Disconnected { conn: self.conn });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    codec: C,
    engine: mpsc::UnboundedSender<EngineCommand>,
) -> Result<(), LexgridError>
where
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (outbound, events) = mpsc::unbounded_channel();
    let (reply, player) = oneshot::channel();
    engine
        .send(EngineCommand::Connect {
            conn: conn_id,
            outbound,
            reply,
        })
        .map_err(|_| LexgridError::EngineStopped)?;
    let _guard = DisconnectGuard {
        conn: conn_id,
        engine: engine.clone(),
    };
    let player_id = player.await.map_err(|_| LexgridError::EngineStopped)?;
    tracing::info!(%conn_id, %player_id, "player connected");

    let writer = tokio::spawn(write_loop(Arc::clone(&conn), codec.clone(), events));

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) if e.is_recoverable() => {
                tracing::debug!(%conn_id, error = %e, "frame dropped");
                continue;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let event: ClientEvent = match codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "undecodable frame dropped");
                continue;
            }
        };

        if engine
            .send(EngineCommand::Event {
                conn: conn_id,
                event,
            })
            .is_err()
        {
            return Err(LexgridError::EngineStopped);
        }
    }

    writer.abort();
    // _guard drops here → the engine marks the player disconnected.
    Ok(())
}

/// Encodes and sends every event the engine routes to this connection.
///
/// Ends when the engine drops the sender or the socket refuses a write.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    codec: C,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
) {
    let conn_id = conn.id();
    while let Some(event) = events.recv().await {
        let bytes = match codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%conn_id, event = event.name(), error = %e, "encode failed");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
    let _ = conn.close().await;
}
