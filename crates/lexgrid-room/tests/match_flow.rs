//! Integration tests driving whole matches through the registry with a
//! synthetic clock: countdowns, the round clock, round transitions, board
//! resyncs and rejoining players.

use std::time::{Duration, Instant};

use lexgrid_board::{Board, Position};
use lexgrid_protocol::{
    BoardResync, Difficulty, MatchSettings, MatchStarted, MatchStatus, PlayerId, RoomCode,
    ServerEvent, SyncType,
};
use lexgrid_room::{
    ActivityTier, AnyWord, Emit, RoomConfig, RoomRegistry, RoomTimer, SyncConfig,
};

const HOST: PlayerId = PlayerId(1);
const GUEST: PlayerId = PlayerId(2);
const TICK: Duration = Duration::from_millis(250);

// =========================================================================
// Helpers
// =========================================================================

fn registry(sync: SyncConfig, now: Instant) -> RoomRegistry {
    RoomRegistry::with_seed(RoomConfig::default(), sync, Box::new(AnyWord), 42, now)
}

fn settings(rounds: u8, secs: u32) -> MatchSettings {
    MatchSettings {
        rounds,
        round_duration_secs: secs,
        difficulty: Difficulty::Normal,
    }
}

/// Host and guest in a lobby, both ready.
fn ready_lobby(reg: &mut RoomRegistry, settings: MatchSettings, now: Instant) -> RoomCode {
    let code = reg.create_room(HOST, "ana", settings, now).unwrap().code;
    reg.join_room(&code, GUEST, "bo", now).unwrap();
    assert!(reg.set_ready(HOST, true, now));
    assert!(reg.set_ready(GUEST, true, now));
    reg.drain_outbox();
    code
}

/// Starts a match and fires the countdown. Returns the activation instant.
fn start_and_activate(reg: &mut RoomRegistry, now: Instant) -> Instant {
    assert!(reg.start_match(HOST, now));
    let active = now + reg.config().countdown;
    reg.advance(active);
    active
}

/// Steps the clock by `step` until `until`, collecting every emit.
fn run(reg: &mut RoomRegistry, from: Instant, until: Instant, step: Duration) -> Vec<Emit> {
    let mut t = from;
    let mut emits = Vec::new();
    while t < until {
        t = (t + step).min(until);
        reg.advance(t);
        emits.extend(reg.drain_outbox());
    }
    emits
}

fn events_for(emits: &[Emit], player: PlayerId) -> Vec<ServerEvent> {
    emits
        .iter()
        .filter(|e| e.recipients.contains(&player))
        .map(|e| e.event.clone())
        .collect()
}

fn match_started(events: &[ServerEvent]) -> Vec<MatchStarted> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::MatchStarted(m) => Some(m.clone()),
            _ => None,
        })
        .collect()
}

fn resyncs(events: &[ServerEvent]) -> Vec<BoardResync> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::BoardResync(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

fn timer_values(events: &[ServerEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::TimerUpdate { time_remaining } => Some(*time_remaining),
            _ => None,
        })
        .collect()
}

/// Along the top row, then back along the second row.
fn snake(len: usize) -> Vec<Position> {
    (0..5)
        .map(|x| Position::new(x, 0))
        .chain((0..5).rev().map(|x| Position::new(x, 1)))
        .take(len)
        .collect()
}

fn current_board(reg: &RoomRegistry, code: &RoomCode) -> Board {
    reg.room(code).unwrap().board().unwrap().clone()
}

// =========================================================================
// Match start
// =========================================================================

#[test]
fn test_start_match_both_players_get_same_board() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(3, 30), now);

    assert!(reg.start_match(HOST, now));
    let room = reg.room(&code).unwrap();
    assert_eq!(room.status(), MatchStatus::Starting);
    let cached = room.upcoming_board().unwrap().clone();

    let emits = reg.drain_outbox();
    let host_events = events_for(&emits, HOST);
    assert!(host_events.contains(&ServerEvent::MatchStarting { countdown: 3 }));
    assert!(match_started(&host_events).is_empty());

    let emits = run(&mut reg, now, now + Duration::from_secs(3), TICK);
    let host = match_started(&events_for(&emits, HOST));
    let guest = match_started(&events_for(&emits, GUEST));
    assert_eq!(host.len(), 1);
    assert_eq!(host, guest);

    let started = &host[0];
    assert_eq!(started.board, cached);
    assert_eq!(started.board_checksum, started.board.checksum());
    assert_eq!(started.board_checksum, current_board(&reg, &code).checksum());
    assert_eq!(started.time_remaining, 30);
    assert_eq!((started.current_round, started.total_rounds), (1, 3));
    assert_eq!(started.player_count, 2);
    assert_eq!(started.sequence_number, 0);

    let go = events_for(&emits, HOST)
        .iter()
        .position(|e| *e == ServerEvent::MatchGo);
    assert!(go.is_some());
    assert_eq!(reg.room(&code).unwrap().status(), MatchStatus::Active);
}

#[test]
fn test_countdown_timer_ignored_after_room_gone() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(1, 30), now);
    assert!(reg.start_match(HOST, now));
    reg.leave_room(&code, GUEST, now).unwrap();
    reg.leave_room(&code, HOST, now).unwrap();
    reg.drain_outbox();

    let emits = run(&mut reg, now, now + Duration::from_secs(10), TICK);
    assert!(emits.is_empty());
}

// =========================================================================
// Round clock
// =========================================================================

#[test]
fn test_round_clock_counts_down_and_ends_once() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(2, 30), now);
    let active = start_and_activate(&mut reg, now);
    reg.drain_outbox();

    let emits = run(&mut reg, active, active + Duration::from_secs(31), TICK);
    let events = events_for(&emits, HOST);
    let values = timer_values(&events);

    assert!(values.windows(2).all(|w| w[0] >= w[1]), "{values:?}");
    assert_eq!(values.last(), Some(&0));
    // Above ten seconds each value is sent once, when it changes.
    for secs in 11..=29 {
        assert_eq!(values.iter().filter(|&&v| v == secs).count(), 1, "{secs}");
    }
    // In the final ten seconds every tick is sent.
    assert_eq!(values.iter().filter(|&&v| v == 5).count(), 4);
    assert!(!values.contains(&30));

    let round_ends: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::RoundEnd { .. }))
        .collect();
    assert_eq!(round_ends.len(), 1);
    assert_eq!(reg.room(&code).unwrap().status(), MatchStatus::RoundEnd);
    assert!(reg.timer_deadline(&code, RoomTimer::RoundClock).is_none());
    assert!(reg.timer_deadline(&code, RoomTimer::Resync).is_none());
    assert_eq!(
        reg.timer_deadline(&code, RoomTimer::NextRound),
        Some(active + Duration::from_secs(30) + reg.config().round_end_delay)
    );
}

#[test]
fn test_full_match_runs_every_round_and_returns_to_lobby() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(3, 30), now);
    assert!(reg.start_match(HOST, now));
    reg.drain_outbox();

    // 3 × (3 s countdown + 30 s round) + 2 × 5 s pause + 10 s results.
    let emits = run(&mut reg, now, now + Duration::from_secs(121), TICK);
    let events = events_for(&emits, GUEST);

    let started = match_started(&events);
    let rounds: Vec<_> = started.iter().map(|m| m.current_round).collect();
    assert_eq!(rounds, vec![1, 2, 3]);
    assert!(started.iter().all(|m| m.board_checksum == m.board.checksum()));
    assert_ne!(started[0].board_checksum, started[1].board_checksum);

    let round_ends: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::RoundEnd {
                round_number,
                is_match_complete,
                scores,
            } => Some((*round_number, *is_match_complete, scores.len())),
            _ => None,
        })
        .collect();
    assert_eq!(round_ends, vec![(1, false, 2), (2, false, 2), (3, true, 2)]);

    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::MatchFinished {
                winner,
                total_rounds,
                ..
            } => Some((*winner, *total_rounds)),
            _ => None,
        })
        .collect();
    // Nobody scored: the tie goes to the first player.
    assert_eq!(finished, vec![(Some(HOST), 3)]);

    let room = reg.room(&code).unwrap();
    assert_eq!(room.status(), MatchStatus::Lobby);
    assert!(room.board().is_none());
    assert!(room.players().iter().all(|p| !p.is_ready));
    assert!(matches!(events.last(), Some(ServerEvent::RoomUpdated { .. })));
}

// =========================================================================
// Resync
// =========================================================================

#[test]
fn test_periodic_resync_follows_activity_interval() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(1, 60), now);
    let active = start_and_activate(&mut reg, now);
    reg.drain_outbox();

    assert_eq!(reg.activity_tier(&code, active), Some(ActivityTier::Low));
    let first = active + Duration::from_secs(15);
    assert_eq!(reg.timer_deadline(&code, RoomTimer::Resync), Some(first));

    let emits = run(&mut reg, active, first, TICK);
    let host = resyncs(&events_for(&emits, HOST));
    let guest = resyncs(&events_for(&emits, GUEST));
    assert_eq!(host.len(), 1);
    assert_eq!(host, guest);
    assert_eq!(host[0].sync_type, SyncType::Periodic);
    assert_eq!(host[0].sync_id, 1);
    assert_eq!(host[0].time_remaining, 45);
    assert_eq!(host[0].board_checksum, current_board(&reg, &code).checksum());
    assert_eq!(
        reg.timer_deadline(&code, RoomTimer::Resync),
        Some(first + Duration::from_secs(15))
    );
    assert_eq!(reg.health(&code).unwrap().consecutive_failures(), 0);
}

#[test]
fn test_failed_resync_backs_off_then_returns_to_interval() {
    let now = Instant::now();
    // Every periodic sync overruns a zero budget.
    let sync = SyncConfig {
        sync_timeout: Duration::ZERO,
        ..SyncConfig::default()
    };
    let mut reg = registry(sync, now);
    let code = ready_lobby(&mut reg, settings(1, 60), now);
    let active = start_and_activate(&mut reg, now);
    reg.drain_outbox();

    let mut at = active + Duration::from_secs(15);
    assert_eq!(reg.timer_deadline(&code, RoomTimer::Resync), Some(at));

    for backoff in [500, 1000, 2000] {
        reg.advance(at);
        at += Duration::from_millis(backoff);
        assert_eq!(reg.timer_deadline(&code, RoomTimer::Resync), Some(at));
    }

    // Fourth failure exhausts the retries. One success in five attempts
    // pushes the room from low to medium.
    reg.advance(at);
    let health = reg.health(&code).unwrap();
    assert_eq!(health.total_failures(), 4);
    assert_eq!(health.consecutive_failures(), 0);
    assert_eq!(
        reg.timer_deadline(&code, RoomTimer::Resync),
        Some(at + Duration::from_secs(8))
    );

    let emits = reg.drain_outbox();
    assert!(resyncs(&events_for(&emits, HOST)).is_empty());
    assert_eq!(reg.room(&code).unwrap().status(), MatchStatus::Active);
}

#[test]
fn test_resync_interval_shortens_with_activity() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(1, 60), now);
    let active = start_and_activate(&mut reg, now);

    // Five words of different lengths, so none repeats.
    let t = active + Duration::from_secs(1);
    for len in 3..=7 {
        let path = snake(len);
        let (word, _) = current_board(&reg, &code).word_for_path(&path).unwrap();
        assert!(reg.submit_word(GUEST, &word, &path, t).is_some(), "{word}");
    }
    assert_eq!(reg.activity_tier(&code, t), Some(ActivityTier::Medium));

    run(&mut reg, active, active + Duration::from_secs(15), TICK);
    assert_eq!(
        reg.timer_deadline(&code, RoomTimer::Resync),
        Some(active + Duration::from_secs(15 + 8))
    );
}

#[test]
fn test_idle_room_drops_to_inactive_tier() {
    let now = Instant::now();
    let sync = SyncConfig {
        inactive_after: Duration::from_secs(60),
        ..SyncConfig::default()
    };
    let mut reg = registry(sync, now);
    let code = ready_lobby(&mut reg, settings(1, 120), now);
    let active = start_and_activate(&mut reg, now);

    let t = active + Duration::from_secs(1);
    let path: Vec<Position> = (0..3).map(|x| Position::new(x, 0)).collect();
    let (word, _) = current_board(&reg, &code).word_for_path(&path).unwrap();
    reg.submit_word(HOST, &word, &path, t);

    assert_eq!(
        reg.activity_tier(&code, active + Duration::from_secs(60)),
        Some(ActivityTier::Low)
    );
    assert_eq!(
        reg.activity_tier(&code, active + Duration::from_secs(61)),
        Some(ActivityTier::Inactive)
    );
}

#[test]
fn test_request_resync_throttled_per_player() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    ready_lobby(&mut reg, settings(1, 60), now);
    assert!(!reg.request_resync(GUEST, now));
    let active = start_and_activate(&mut reg, now);
    reg.drain_outbox();

    assert!(reg.request_resync(GUEST, active + Duration::from_secs(1)));
    let emits = reg.drain_outbox();
    assert!(events_for(&emits, HOST).is_empty());
    let first = resyncs(&events_for(&emits, GUEST));
    assert_eq!(first[0].sync_id, 1);
    assert_eq!(first[0].time_remaining, 59);

    assert!(!reg.request_resync(GUEST, active + Duration::from_secs(2)));
    // The throttle is per player.
    assert!(reg.request_resync(HOST, active + Duration::from_secs(2)));

    assert!(reg.request_resync(GUEST, active + Duration::from_millis(3500)));
    let later: Vec<_> = resyncs(&events_for(&reg.drain_outbox(), GUEST));
    assert_eq!(later.last().map(|r| r.sync_id), Some(3));
}

#[test]
fn test_resync_sequence_number_tracks_diffs() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(1, 60), now);
    let active = start_and_activate(&mut reg, now);

    let path: Vec<Position> = (0..3).map(|y| Position::new(0, y)).collect();
    let (word, _) = current_board(&reg, &code).word_for_path(&path).unwrap();
    reg.submit_word(HOST, &word, &path, active);
    reg.drain_outbox();

    assert!(reg.request_resync(HOST, active + Duration::from_secs(1)));
    let sent = resyncs(&events_for(&reg.drain_outbox(), HOST));
    assert_eq!(sent[0].sequence_number, 1);
    assert_eq!(sent[0].board, current_board(&reg, &code));
}

// =========================================================================
// Rejoin
// =========================================================================

#[test]
fn test_reconnect_mid_round_sends_current_board() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(3, 30), now);
    let active = start_and_activate(&mut reg, now);

    let path: Vec<Position> = (0..3).map(|x| Position::new(x, 1)).collect();
    let (word, _) = current_board(&reg, &code).word_for_path(&path).unwrap();
    reg.submit_word(HOST, &word, &path, active + Duration::from_secs(2));

    let dropped = active + Duration::from_millis(12_400);
    run(&mut reg, active, dropped, TICK);
    assert!(reg.disconnect(GUEST, dropped));
    let emits = run(&mut reg, dropped, active + Duration::from_millis(12_500), TICK);
    assert!(events_for(&emits, GUEST).is_empty());

    let back = active + Duration::from_millis(12_600);
    reg.advance(back);
    reg.drain_outbox();
    let view = reg.reconnect(GUEST, back).unwrap();
    assert!(view.players.iter().all(|p| p.is_connected));

    let emits = reg.drain_outbox();
    let guest = events_for(&emits, GUEST);
    assert!(matches!(guest.first(), Some(ServerEvent::RoomJoined { .. })));
    let sent = resyncs(&guest);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sync_type, SyncType::Rejoin);
    assert_eq!(sent[0].time_remaining, 18);
    assert_eq!(sent[0].sequence_number, 1);
    assert_eq!(sent[0].board, current_board(&reg, &code));
    assert_eq!(sent[0].board_checksum, sent[0].board.checksum());
    assert!(matches!(&events_for(&emits, HOST)[..], [ServerEvent::RoomUpdated { .. }]));
}

#[test]
fn test_reconnect_during_countdown_sends_upcoming_board() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    let code = ready_lobby(&mut reg, settings(3, 30), now);
    assert!(reg.start_match(HOST, now));

    reg.disconnect(GUEST, now + Duration::from_secs(1));
    let back = now + Duration::from_millis(1200);
    reg.drain_outbox();
    reg.reconnect(GUEST, back).unwrap();

    let guest = events_for(&reg.drain_outbox(), GUEST);
    let sent = resyncs(&guest);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sync_type, SyncType::RejoinCountdown);
    assert_eq!(sent[0].time_remaining, 30);
    assert_eq!(&sent[0].board, reg.room(&code).unwrap().upcoming_board().unwrap());
    assert!(guest.contains(&ServerEvent::MatchStarting { countdown: 2 }));

    let emits = run(&mut reg, back, now + Duration::from_secs(3), TICK);
    let started = match_started(&events_for(&emits, GUEST));
    assert_eq!(started[0].board, sent[0].board);
}

#[test]
fn test_reconnect_in_lobby_only_rejoins() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    ready_lobby(&mut reg, settings(1, 30), now);
    reg.disconnect(GUEST, now);
    reg.drain_outbox();

    reg.reconnect(GUEST, now).unwrap();
    let guest = events_for(&reg.drain_outbox(), GUEST);
    assert!(matches!(&guest[..], [ServerEvent::RoomJoined { .. }]));
}

#[test]
fn test_disconnected_player_skipped_by_broadcasts() {
    let now = Instant::now();
    let mut reg = registry(SyncConfig::default(), now);
    ready_lobby(&mut reg, settings(1, 30), now);
    let active = start_and_activate(&mut reg, now);
    reg.disconnect(GUEST, active);
    reg.drain_outbox();

    let emits = run(&mut reg, active, active + Duration::from_secs(5), TICK);
    assert!(!emits.is_empty());
    assert!(events_for(&emits, GUEST).is_empty());
}
