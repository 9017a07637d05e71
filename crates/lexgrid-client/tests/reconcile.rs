//! Client reconciliation against a simulated server board.

use std::time::{Duration, Instant};

use lexgrid_board::{Board, BoardGenerator, Position, TileChanges};
use lexgrid_client::{
    ClientSync, ClientSyncConfig, DiffOutcome, LadderState, Renderer, ResyncOutcome, Rung,
};
use lexgrid_protocol::{
    BoardResync, ClientEvent, MatchStarted, ServerEvent, SyncType, TileChangeBatch,
};

// =========================================================================
// Helpers
// =========================================================================

/// Records what it was asked to draw.
#[derive(Default)]
struct FakeRenderer {
    shown: Option<Board>,
    applied: Vec<u64>,
    redraws: usize,
    /// Each diff keeps the renderer busy until cleared.
    slow: bool,
    animating: bool,
    fail_tile_refresh: bool,
}

impl Renderer for FakeRenderer {
    fn update_board(&mut self, board: &Board) {
        self.redraws += 1;
        self.shown = Some(board.clone());
    }

    fn apply_diff(&mut self, sequence: u64, changes: &TileChanges, _board: &Board) {
        self.applied.push(sequence);
        if let Some(shown) = self.shown.as_mut() {
            shown.apply_changes(changes).unwrap();
        }
        self.animating = self.slow;
    }

    fn is_busy(&self) -> bool {
        self.animating
    }

    fn stale_tiles(&self, board: &Board) -> Vec<Position> {
        let Some(shown) = self.shown.as_ref() else {
            return board.tiles.iter().map(|t| t.position).collect();
        };
        board
            .tiles
            .iter()
            .filter(|t| shown.tile_at(t.position).map(|s| s.letter) != Some(t.letter))
            .map(|t| t.position)
            .collect()
    }

    fn refresh_tiles(&mut self, board: &Board, _tiles: &[Position]) -> bool {
        if self.fail_tile_refresh {
            return false;
        }
        self.shown = Some(board.clone());
        true
    }

    fn refresh_board(&mut self, board: &Board) -> bool {
        self.shown = Some(board.clone());
        true
    }

    fn restart_presentation(&mut self, board: &Board) -> bool {
        self.shown = Some(board.clone());
        true
    }

    fn request_full_restart(&mut self) -> bool {
        true
    }
}

/// The authoritative side: a board, its generator and the diff counter.
struct Server {
    board: Board,
    generator: BoardGenerator,
    seq: u64,
    sync_id: u64,
}

impl Server {
    fn new(seed: u64) -> Self {
        let mut generator = BoardGenerator::seeded(seed);
        let board = generator.generate(4, 4);
        Self {
            board,
            generator,
            seq: 0,
            sync_id: 0,
        }
    }

    /// Removes a row-0 word and returns the next diff.
    fn word(&mut self) -> TileChangeBatch {
        let path: Vec<Position> = (0..3).map(|x| Position::new(x, 0)).collect();
        let changes = self.board.collapse(&path, &mut self.generator).unwrap();
        self.seq += 1;
        TileChangeBatch {
            sequence_number: self.seq,
            changes,
            timestamp: self.seq * 100,
        }
    }

    fn match_started(&self) -> MatchStarted {
        MatchStarted {
            board: self.board.clone(),
            board_checksum: self.board.checksum(),
            time_remaining: 60,
            current_round: 1,
            total_rounds: 3,
            player_count: 2,
            sequence_number: self.seq,
        }
    }

    fn resync(&mut self) -> BoardResync {
        self.sync_id += 1;
        BoardResync {
            board: self.board.clone(),
            board_checksum: self.board.checksum(),
            time_remaining: 42,
            sequence_number: self.seq,
            sync_id: self.sync_id,
            sync_type: SyncType::Periodic,
        }
    }
}

fn client(renderer: FakeRenderer) -> ClientSync<FakeRenderer> {
    ClientSync::new(ClientSyncConfig::default(), renderer)
}

/// A client that has seen the round start at the server's current sequence.
fn started(server: &Server, now: Instant) -> ClientSync<FakeRenderer> {
    let mut c = client(FakeRenderer::default());
    c.on_match_started(server.match_started(), now).unwrap();
    c
}

fn resync_requests(c: &mut ClientSync<FakeRenderer>) -> usize {
    c.drain_requests()
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::RequestResync))
        .count()
}

fn assert_mirrors(c: &ClientSync<FakeRenderer>, server: &Server) {
    assert_eq!(c.board().unwrap().checksum(), server.board.checksum());
}

// =========================================================================
// Ordered diffs
// =========================================================================

#[test]
fn test_on_tile_changes_applies_in_order() {
    let now = Instant::now();
    let mut server = Server::new(1);
    let mut c = started(&server, now);

    for _ in 0..3 {
        let batch = server.word();
        assert_eq!(c.on_tile_changes(batch, now), DiffOutcome::Applied);
    }
    assert_eq!(c.last_applied(), 3);
    assert_eq!(c.renderer().applied, vec![1, 2, 3]);
    assert_mirrors(&c, &server);
}

#[test]
fn test_on_tile_changes_five_before_four_is_buffered() {
    let now = Instant::now();
    let mut server = Server::new(2);
    for _ in 0..3 {
        server.word();
    }
    let mut c = started(&server, now);
    assert_eq!(c.last_applied(), 3);

    let four = server.word();
    let five = server.word();
    assert_eq!(c.on_tile_changes(five, now), DiffOutcome::Buffered);
    assert_eq!(c.pending_len(), 1);
    assert_eq!(c.last_applied(), 3);

    assert_eq!(c.on_tile_changes(four, now), DiffOutcome::Applied);
    assert_eq!(c.pending_len(), 0);
    assert_eq!(c.last_applied(), 5);
    assert_eq!(c.renderer().applied, vec![4, 5]);
    assert_mirrors(&c, &server);
}

#[test]
fn test_on_tile_changes_drops_duplicates() {
    let now = Instant::now();
    let mut server = Server::new(3);
    let mut c = started(&server, now);
    let one = server.word();
    let three_ahead = {
        server.word();
        server.word()
    };

    assert_eq!(c.on_tile_changes(one.clone(), now), DiffOutcome::Applied);
    assert_eq!(c.on_tile_changes(one, now), DiffOutcome::Duplicate);
    assert_eq!(c.on_tile_changes(three_ahead.clone(), now), DiffOutcome::Buffered);
    assert_eq!(c.on_tile_changes(three_ahead, now), DiffOutcome::Duplicate);
    assert_eq!(c.pending_len(), 1);
    assert_eq!(c.renderer().applied, vec![1]);
}

#[test]
fn test_on_tile_changes_before_any_board_waits() {
    let now = Instant::now();
    let mut server = Server::new(4);
    let start = server.match_started();
    let one = server.word();

    let mut c = client(FakeRenderer::default());
    assert_eq!(c.on_tile_changes(one, now), DiffOutcome::Buffered);
    c.on_match_started(start, now).unwrap();
    assert_eq!(c.last_applied(), 1);
    assert_mirrors(&c, &server);
}

// =========================================================================
// Processing flag
// =========================================================================

#[test]
fn test_busy_renderer_buffers_until_poll() {
    let now = Instant::now();
    let mut server = Server::new(5);
    let mut c = client(FakeRenderer {
        slow: true,
        ..FakeRenderer::default()
    });
    c.on_match_started(server.match_started(), now).unwrap();

    assert_eq!(c.on_tile_changes(server.word(), now), DiffOutcome::Applied);
    assert!(c.is_processing());
    assert_eq!(c.on_tile_changes(server.word(), now), DiffOutcome::Buffered);

    // Still animating: nothing moves.
    c.poll(now + Duration::from_millis(500));
    assert_eq!(c.last_applied(), 1);

    c.renderer_mut().slow = false;
    c.renderer_mut().animating = false;
    c.poll(now + Duration::from_millis(600));
    assert!(!c.is_processing());
    assert_eq!(c.last_applied(), 2);
    assert_eq!(c.renderer().applied, vec![1, 2]);
    assert_mirrors(&c, &server);
}

#[test]
fn test_poll_processing_timeout_skips_and_requests_resync() {
    let now = Instant::now();
    let mut server = Server::new(6);
    let mut c = client(FakeRenderer {
        slow: true,
        ..FakeRenderer::default()
    });
    c.on_match_started(server.match_started(), now).unwrap();

    c.on_tile_changes(server.word(), now);
    c.on_tile_changes(server.word(), now);
    c.on_tile_changes(server.word(), now);
    assert_eq!(c.pending_len(), 2);

    c.poll(now + Duration::from_millis(2999));
    assert_eq!(c.pending_len(), 2);
    assert_eq!(resync_requests(&mut c), 0);

    c.poll(now + Duration::from_secs(3));
    assert!(!c.is_processing());
    assert_eq!(c.pending_len(), 0);
    assert_eq!(c.last_applied(), 3);
    assert_eq!(resync_requests(&mut c), 1);

    // Diffs 2 and 3 never reached the mirror, so the answering resync
    // finds it at the same sequence but on a different board.
    let outcome = c.on_resync(drifted_resync(&mut server), now + Duration::from_secs(4));
    assert_eq!(outcome, ResyncOutcome::Drift);
    assert_mirrors(&c, &server);
}

#[test]
fn test_on_tile_changes_overflow_clears_buffer() {
    let now = Instant::now();
    let mut server = Server::new(7);
    let config = ClientSyncConfig {
        pending_cap: 2,
        ..ClientSyncConfig::default()
    };
    let mut c = ClientSync::new(config, FakeRenderer::default());
    c.on_match_started(server.match_started(), now).unwrap();

    server.word();
    assert_eq!(c.on_tile_changes(server.word(), now), DiffOutcome::Buffered);
    assert_eq!(c.on_tile_changes(server.word(), now), DiffOutcome::Buffered);
    assert_eq!(c.on_tile_changes(server.word(), now), DiffOutcome::Overflow);
    assert_eq!(c.pending_len(), 0);
    assert_eq!(c.last_applied(), 0);
    assert_eq!(resync_requests(&mut c), 1);
}

// =========================================================================
// Resync
// =========================================================================

#[test]
fn test_on_resync_ignores_stale_sync_id() {
    let now = Instant::now();
    let mut server = Server::new(8);
    let mut c = started(&server, now);
    let first = server.resync();
    let second = server.resync();

    assert_eq!(c.on_resync(second.clone(), now), ResyncOutcome::InSync);
    assert_eq!(c.last_sync_id(), 2);
    assert_eq!(c.on_resync(second, now), ResyncOutcome::Stale);
    assert_eq!(c.on_resync(first, now), ResyncOutcome::Stale);
}

#[test]
fn test_on_resync_in_sync_does_not_redraw() {
    let now = Instant::now();
    let mut server = Server::new(9);
    let mut c = started(&server, now);
    c.on_tile_changes(server.word(), now);
    let redraws = c.renderer().redraws;

    assert_eq!(c.on_resync(server.resync(), now), ResyncOutcome::InSync);
    assert_eq!(c.renderer().redraws, redraws);
    assert_eq!(c.time_remaining(), 42);
}

#[test]
fn test_on_resync_countdown_rejoin_adopts_next_round_board() {
    let now = Instant::now();
    let mut server = Server::new(21);
    let mut c = started(&server, now);
    c.on_tile_changes(server.word(), now);
    let redraws = c.renderer().redraws;

    // Round over: the server deals a new board but the diff counter stays.
    server.board = server.generator.generate(4, 4);
    let mut countdown = server.resync();
    countdown.sync_type = SyncType::RejoinCountdown;
    assert_ne!(countdown.board_checksum, c.board().unwrap().checksum());

    assert_eq!(c.on_resync(countdown, now), ResyncOutcome::Adopted);
    assert_eq!(c.board().unwrap().checksum(), server.board.checksum());
    assert_eq!(c.last_applied(), server.seq);
    assert_eq!(c.renderer().redraws, redraws + 1);
    assert_eq!(c.ladder().state(), LadderState::Idle);
    assert_eq!(c.ladder().history().count(), 0);
}

#[test]
fn test_on_resync_rejects_inconsistent_payload_with_throttled_request() {
    let now = Instant::now();
    let mut server = Server::new(10);
    let mut c = started(&server, now);
    let before = c.board().unwrap().checksum();

    let mut bad = server.resync();
    bad.board.tiles[0].letter = if bad.board.tiles[0].letter == 'Q' { 'Z' } else { 'Q' };
    assert_eq!(c.on_resync(bad.clone(), now), ResyncOutcome::Rejected);
    assert_eq!(c.board().unwrap().checksum(), before);
    assert_eq!(resync_requests(&mut c), 1);

    bad.sync_id = server.resync().sync_id;
    assert_eq!(
        c.on_resync(bad.clone(), now + Duration::from_secs(1)),
        ResyncOutcome::Rejected
    );
    assert_eq!(resync_requests(&mut c), 0);

    bad.sync_id = server.resync().sync_id;
    c.on_resync(bad, now + Duration::from_secs(5));
    assert_eq!(resync_requests(&mut c), 1);
}

#[test]
fn test_on_resync_adopts_when_behind() {
    let now = Instant::now();
    let mut server = Server::new(11);
    let mut c = started(&server, now);
    server.word();
    server.word();
    let ahead = server.word();
    assert_eq!(c.on_tile_changes(ahead.clone(), now), DiffOutcome::Buffered);

    // The resync covers diffs 1 and 2; diff 3 then follows from the buffer.
    let mut covering = server.resync();
    let mut replay = Server::new(11);
    replay.word();
    replay.word();
    covering.board = replay.board.clone();
    covering.board_checksum = replay.board.checksum();
    covering.sequence_number = 2;

    assert_eq!(c.on_resync(covering, now), ResyncOutcome::Adopted);
    assert_eq!(c.last_applied(), 3);
    assert_eq!(c.pending_len(), 0);
    assert_mirrors(&c, &server);
}

#[test]
fn test_on_resync_behind_mirror_is_ignored() {
    let now = Instant::now();
    let mut server = Server::new(12);
    let mut c = started(&server, now);
    let old = server.resync();
    c.on_tile_changes(server.word(), now);

    let mut late = old;
    late.sync_id = 5;
    assert_eq!(c.on_resync(late, now), ResyncOutcome::Stale);
    assert_eq!(c.last_applied(), 1);
    assert_mirrors(&c, &server);
}

#[test]
fn test_on_match_started_rejects_bad_checksum() {
    let now = Instant::now();
    let server = Server::new(13);
    let mut start = server.match_started();
    start.board.tiles[0].points += 1;

    let mut c = client(FakeRenderer::default());
    assert!(c.on_match_started(start, now).is_err());
    assert!(c.board().is_none());
    assert_eq!(resync_requests(&mut c), 1);
}

// =========================================================================
// Drift and recovery
// =========================================================================

/// A resync at the client's own sequence but with a different board.
fn drifted_resync(server: &mut Server) -> BoardResync {
    let tile = &mut server.board.tiles[5];
    tile.letter = if tile.letter == 'Q' { 'Z' } else { 'Q' };
    server.resync()
}

#[test]
fn test_on_resync_drift_adopts_and_repairs_tiles() {
    let now = Instant::now();
    let mut server = Server::new(14);
    let mut c = started(&server, now);

    let outcome = c.on_resync(drifted_resync(&mut server), now);
    assert_eq!(outcome, ResyncOutcome::Drift);
    assert_mirrors(&c, &server);

    let attempts: Vec<_> = c.ladder().history().collect();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].rung, Rung::TileRefresh);
    assert!(attempts[0].succeeded);
    assert_eq!(c.ladder().state(), LadderState::Idle);
    assert!(c.renderer().stale_tiles(&server.board).is_empty());
}

#[test]
fn test_on_resync_drift_escalates_after_cooldown() {
    let now = Instant::now();
    let mut server = Server::new(15);
    let mut c = client(FakeRenderer {
        fail_tile_refresh: true,
        ..FakeRenderer::default()
    });
    c.on_match_started(server.match_started(), now).unwrap();

    c.on_resync(drifted_resync(&mut server), now);
    assert_eq!(
        c.ladder().state(),
        LadderState::Recovering {
            next: Rung::BoardRefresh
        }
    );

    c.poll(now + Duration::from_secs(1));
    assert_eq!(c.ladder().history().count(), 1);

    c.poll(now + Duration::from_secs(2));
    let rungs: Vec<_> = c.ladder().history().map(|a| (a.rung, a.succeeded)).collect();
    assert_eq!(
        rungs,
        vec![(Rung::TileRefresh, false), (Rung::BoardRefresh, true)]
    );
    assert_eq!(c.ladder().state(), LadderState::Idle);
    assert!(c.renderer().stale_tiles(&server.board).is_empty());
}

// =========================================================================
// Event routing
// =========================================================================

#[test]
fn test_handle_routes_board_events() {
    let now = Instant::now();
    let mut server = Server::new(16);
    let mut c = client(FakeRenderer::default());

    c.handle(ServerEvent::MatchStarted(server.match_started()), now);
    c.handle(ServerEvent::TileChanges(server.word()), now);
    c.handle(ServerEvent::TimerUpdate { time_remaining: 7 }, now);
    c.handle(ServerEvent::MatchGo, now);

    assert_eq!(c.last_applied(), 1);
    assert_eq!(c.time_remaining(), 7);
    assert_mirrors(&c, &server);
}
