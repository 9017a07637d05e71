//! The engine task: the only owner of rooms and sessions.
//!
//! Connection tasks never touch game state. They forward decoded events
//! over an mpsc queue and receive outgoing events on their own unbounded
//! channel. The engine handles one command or one batch of due timers at a
//! time, so no two handlers ever run concurrently and no locks are needed.
//!
//! ```text
//! handler ──EngineCommand──→ Engine ──ServerEvent──→ handler (writer)
//!                              │
//!                    RoomRegistry + SessionManager
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use lexgrid_protocol::{ClientEvent, PROTOCOL_VERSION, PlayerId, ServerEvent, SessionId};
use lexgrid_room::{Dictionary, Emit, RoomConfig, RoomError, RoomRegistry, SyncConfig};
use lexgrid_session::{CrownService, SessionConfig, SessionManager};
use lexgrid_timer::{BudgetMonitor, sleep_until_due};
use lexgrid_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// How often disconnected sessions are checked against the grace period.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Fraction of the clock tick one engine pass may use before it is logged.
const PASS_WARN_THRESHOLD: f64 = 0.5;

/// What connection tasks ask of the engine.
#[derive(Debug)]
pub(crate) enum EngineCommand {
    /// A new connection. The engine issues a session, sends
    /// `session:welcome` and replies with the player id.
    Connect {
        conn: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
        reply: oneshot::Sender<PlayerId>,
    },
    /// A decoded client event.
    Event { conn: ConnectionId, event: ClientEvent },
    /// The connection is gone.
    Disconnected { conn: ConnectionId },
}

/// A live connection and the player currently speaking through it.
///
/// The player changes once if the connection rejoins as an earlier
/// identity.
struct Link {
    player: PlayerId,
    outbound: mpsc::UnboundedSender<ServerEvent>,
}

pub(crate) struct Engine {
    registry: RoomRegistry,
    sessions: SessionManager,
    links: HashMap<ConnectionId, Link>,
    /// Reverse of `links` for routing emits.
    seats: HashMap<PlayerId, ConnectionId>,
    next_session_sweep: Instant,
    monitor: BudgetMonitor,
}

impl Engine {
    pub(crate) fn new(
        room_config: RoomConfig,
        sync_config: SyncConfig,
        session_config: SessionConfig,
        dictionary: Box<dyn Dictionary>,
        now: Instant,
    ) -> Self {
        let registry = RoomRegistry::new(room_config, sync_config, dictionary, now);
        let monitor = BudgetMonitor::new(registry.config().clock_tick, PASS_WARN_THRESHOLD);
        Self {
            registry,
            sessions: SessionManager::new(session_config),
            links: HashMap::new(),
            seats: HashMap::new(),
            next_session_sweep: now + SESSION_SWEEP_INTERVAL,
            monitor,
        }
    }

    /// Runs until every command sender is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) {
        info!("engine running");
        loop {
            let deadline = self
                .registry
                .next_deadline()
                .map_or(self.next_session_sweep, |d| d.min(self.next_session_sweep));
            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else {
                        break;
                    };
                    let started = Instant::now();
                    self.handle(cmd, started);
                    self.flush();
                    self.monitor.record(started.elapsed());
                }
                () = sleep_until_due(Some(deadline)) => {
                    let started = Instant::now();
                    self.tick(started);
                    self.flush();
                    self.monitor.record(started.elapsed());
                }
            }
        }
        let metrics = self.monitor.metrics();
        info!(
            passes = metrics.passes,
            slow_passes = metrics.slow_passes,
            max_pass_ms = metrics.max_pass_time.as_secs_f64() * 1000.0,
            "engine stopped"
        );
    }

    // -- commands -----------------------------------------------------------

    pub(crate) fn handle(&mut self, cmd: EngineCommand, now: Instant) {
        match cmd {
            EngineCommand::Connect {
                conn,
                outbound,
                reply,
            } => {
                let session = self.sessions.create();
                let player = session.player_id;
                let welcome = ServerEvent::Welcome {
                    player_id: player,
                    session_id: session.session_id.clone(),
                    protocol_version: PROTOCOL_VERSION,
                };
                let _ = outbound.send(welcome);
                self.links.insert(conn, Link { player, outbound });
                self.seats.insert(player, conn);
                debug!(%conn, player_id = %player, "connection registered");
                if reply.send(player).is_err() {
                    debug!(%conn, "connection closed before welcome");
                }
            }
            EngineCommand::Event { conn, event } => {
                let Some(player) = self.links.get(&conn).map(|l| l.player) else {
                    debug!(%conn, "event from unknown connection dropped");
                    return;
                };
                self.dispatch(conn, player, event, now);
            }
            EngineCommand::Disconnected { conn } => {
                let Some(link) = self.links.remove(&conn) else {
                    return;
                };
                let player = link.player;
                if self.seats.get(&player) == Some(&conn) {
                    self.seats.remove(&player);
                }
                if let Err(e) = self.sessions.disconnect(player, now) {
                    debug!(player_id = %player, error = %e, "no session to disconnect");
                }
                self.registry.disconnect(player, now);
            }
        }
    }

    fn dispatch(&mut self, conn: ConnectionId, player: PlayerId, event: ClientEvent, now: Instant) {
        trace!(player_id = %player, ?event, "client event");
        match event {
            ClientEvent::CreateRoom {
                player_name,
                settings,
            } => {
                let result = self.registry.create_room(player, &player_name, settings, now);
                self.after_seating(player, &player_name, result);
            }
            ClientEvent::JoinRoom {
                room_code,
                player_name,
            } => {
                let result = self.registry.join_room(&room_code, player, &player_name, now);
                self.after_seating(player, &player_name, result);
            }
            ClientEvent::LeaveRoom => {
                let result = match self.registry.room_by_player(player).map(|r| r.code().clone()) {
                    Some(code) => self.registry.leave_room(&code, player, now).map(|_| ()),
                    None => Err(RoomError::NotInRoom(player)),
                };
                if let Err(e) = result {
                    self.send_room_error(player, &e);
                }
            }
            ClientEvent::SetReady { is_ready } => {
                self.registry.set_ready(player, is_ready, now);
            }
            ClientEvent::StartMatch => {
                self.registry.start_match(player, now);
            }
            ClientEvent::Reconnect {
                session_id,
                username,
            } => self.rejoin(conn, player, &session_id, &username, now),
            ClientEvent::SubmitWord { word, tiles } => {
                self.registry.submit_word(player, &word, &tiles, now);
            }
            ClientEvent::RequestResync => {
                self.registry.request_resync(player, now);
            }
        }
    }

    fn after_seating<T>(&mut self, player: PlayerId, name: &str, result: Result<T, RoomError>) {
        match result {
            Ok(_) => {
                if let Err(e) = self.sessions.set_username(player, name.trim()) {
                    warn!(player_id = %player, error = %e, "seated player has no session");
                }
            }
            Err(e) => self.send_room_error(player, &e),
        }
    }

    /// Moves `conn` from its fresh identity back to the one the session
    /// belongs to, then puts that player back in their room.
    fn rejoin(
        &mut self,
        conn: ConnectionId,
        fresh: PlayerId,
        session_id: &SessionId,
        username: &str,
        now: Instant,
    ) {
        let original = match self.sessions.reconnect(session_id, username, now) {
            Ok(session) => session.player_id,
            Err(e) => {
                debug!(player_id = %fresh, error = %e, "rejoin refused");
                self.send_to(
                    fresh,
                    ServerEvent::Error {
                        code: e.status_code(),
                        message: e.to_string(),
                    },
                );
                return;
            }
        };

        // The throwaway identity may have wandered into a room already.
        if let Some(code) = self.registry.room_by_player(fresh).map(|r| r.code().clone()) {
            if let Err(e) = self.registry.leave_room(&code, fresh, now) {
                debug!(
                    player_id = %fresh,
                    room = %code,
                    error = %e,
                    "rejoining connection left no seat"
                );
            }
        }
        self.sessions.discard(fresh);
        self.seats.remove(&fresh);
        if let Some(link) = self.links.get_mut(&conn) {
            link.player = original;
        }
        self.seats.insert(original, conn);
        info!(%conn, player_id = %original, replaced = %fresh, "connection rejoined");

        self.send_to(
            original,
            ServerEvent::Welcome {
                player_id: original,
                session_id: session_id.clone(),
                protocol_version: PROTOCOL_VERSION,
            },
        );
        if let Err(e) = self.registry.reconnect(original, now) {
            // The room is gone; the identity survives for the next match.
            self.send_room_error(original, &e);
        }
    }

    // -- timers -------------------------------------------------------------

    pub(crate) fn tick(&mut self, now: Instant) {
        self.registry.advance(now);
        if now >= self.next_session_sweep {
            self.expire_sessions(now);
            self.next_session_sweep = now + SESSION_SWEEP_INTERVAL;
        }
    }

    /// Drops players whose grace period ran out from their rooms.
    fn expire_sessions(&mut self, now: Instant) {
        for player in self.sessions.expire_stale(now) {
            if let Some(code) = self.registry.room_by_player(player).map(|r| r.code().clone()) {
                if let Err(e) = self.registry.leave_room(&code, player, now) {
                    debug!(player_id = %player, error = %e, "expired player already gone");
                }
            }
        }
        let removed = self.sessions.cleanup_expired();
        if removed > 0 {
            debug!(removed, "expired sessions removed");
        }
    }

    // -- outbound -----------------------------------------------------------

    /// Routes everything the registry queued and credits match winners.
    pub(crate) fn flush(&mut self) {
        for Emit { recipients, event } in self.registry.drain_outbox() {
            if let ServerEvent::MatchFinished {
                winner: Some(winner),
                ..
            } = &event
            {
                match CrownService::award_crown(&mut self.sessions, *winner) {
                    Ok(crowns) => info!(player_id = %winner, crowns, "crown awarded"),
                    Err(e) => warn!(player_id = %winner, error = %e, "crown not awarded"),
                }
            }
            for player in recipients {
                self.send_to(player, event.clone());
            }
        }
    }

    fn send_to(&self, player: PlayerId, event: ServerEvent) {
        let Some(link) = self.seats.get(&player).and_then(|conn| self.links.get(conn)) else {
            trace!(player_id = %player, event = event.name(), "no connection, event dropped");
            return;
        };
        if link.outbound.send(event).is_err() {
            debug!(player_id = %player, "writer gone, event dropped");
        }
    }

    fn send_room_error(&self, player: PlayerId, e: &RoomError) {
        debug!(player_id = %player, error = %e, "request refused");
        self.send_to(
            player,
            ServerEvent::Error {
                code: e.status_code(),
                message: e.to_string(),
            },
        );
    }

    #[cfg(test)]
    fn crowns(&self, player: PlayerId) -> u32 {
        self.sessions.crowns(&player)
    }
}
