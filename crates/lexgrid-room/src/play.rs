//! Word submission during an active round.

use std::time::Instant;

use lexgrid_board::Position;
use lexgrid_protocol::{MatchStatus, PlayerId, ServerEvent, TileChangeBatch};
use tracing::debug;

use crate::RoomRegistry;

impl RoomRegistry {
    /// Scores a traced word, collapses its tiles and broadcasts the diff.
    ///
    /// A rejected word is reported to the submitter only and changes
    /// nothing. Submissions outside an active round are dropped.
    ///
    /// Returns the points awarded, or `None` if the word was not accepted.
    pub fn submit_word(
        &mut self,
        player: PlayerId,
        word: &str,
        tiles: &[Position],
        now: Instant,
    ) -> Option<u32> {
        let code = self.player_rooms.get(&player)?.clone();
        let room = self.rooms.get_mut(&code)?;
        if room.status() != MatchStatus::Active {
            debug!(room = %code, player_id = %player, "word outside active round dropped");
            return None;
        }
        let word = word.trim().to_ascii_uppercase();
        let board = room.state.board.as_mut()?;

        let path = board.word_for_path(tiles);
        let rejection = if word.chars().count() < self.config.min_word_len {
            Some("too short".to_string())
        } else {
            match &path {
                Err(e) => Some(e.to_string()),
                Ok((spelled, _)) if spelled != &word => Some("word does not match tiles".to_string()),
                Ok(_) => None,
            }
        };
        let rejection = rejection.or_else(|| {
            let seat = room.players.iter().find(|p| p.id == player)?;
            seat.found_this_round
                .contains(&word)
                .then(|| "already found".to_string())
        });
        let rejection =
            rejection.or_else(|| (!self.dictionary.is_valid_word(&word)).then(|| "not in dictionary".to_string()));
        if let Some(reason) = rejection {
            debug!(room = %code, player_id = %player, %word, %reason, "word rejected");
            self.outbox
                .to_player(player, ServerEvent::WordRejected { word, reason });
            return None;
        }

        let Ok((_, tile_points)) = path else {
            return None;
        };
        let changes = match board.collapse(tiles, &mut room.generator) {
            Ok(changes) => changes,
            Err(e) => {
                self.outbox.to_player(
                    player,
                    ServerEvent::WordRejected {
                        word,
                        reason: e.to_string(),
                    },
                );
                return None;
            }
        };
        let points = tile_points + self.dictionary.score(&word, room.settings.difficulty);

        let seat = room.player_mut(player)?;
        seat.score += points;
        seat.round_score += points;
        seat.stats.record(&word, points);
        seat.found_this_round.insert(word.clone());
        room.touch(now);
        room.state.diff_seq += 1;
        let sequence_number = room.state.diff_seq;
        debug!(room = %code, player_id = %player, %word, points, sequence_number, "word accepted");

        let timestamp = u64::try_from(now.saturating_duration_since(self.started_at).as_millis())
            .unwrap_or(u64::MAX);
        self.outbox.to_room(
            room,
            ServerEvent::TileChanges(TileChangeBatch {
                sequence_number,
                changes,
                timestamp,
            }),
        );
        self.outbox.to_room(
            room,
            ServerEvent::WordAccepted {
                player_id: player,
                word,
                points,
            },
        );
        if let Some(health) = self.health.get_mut(&code) {
            health.record_activity(now, &self.sync_config);
        }
        Some(points)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lexgrid_board::{Board, Tile, TileId, letter_points};
    use lexgrid_protocol::{MatchSettings, RoomCode};

    use super::*;
    use crate::{Emit, RoomConfig, SyncConfig, WordList};

    const HOST: PlayerId = PlayerId(1);
    const GUEST: PlayerId = PlayerId(2);

    /// 3×3 board spelling, row by row: CAT / DOG / EAR.
    fn sample_board() -> Board {
        let rows = ["CAT", "DOG", "EAR"];
        let mut tiles = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            for (x, letter) in row.chars().enumerate() {
                tiles.push(Tile {
                    id: TileId((y * 3 + x) as u64 + 500),
                    letter,
                    points: letter_points(letter),
                    position: Position::new(x as u16, y as u16),
                });
            }
        }
        Board {
            width: 3,
            height: 3,
            tiles,
        }
    }

    fn p(x: u16, y: u16) -> Position {
        Position::new(x, y)
    }

    /// Two ready players in an active round on the sample board.
    fn active_room(now: Instant) -> (RoomRegistry, RoomCode) {
        let config = RoomConfig {
            countdown: Duration::ZERO,
            board_width: 3,
            board_height: 3,
            ..RoomConfig::default()
        };
        let words = WordList::from_words(["cat", "dog", "ear", "cog"]);
        let mut reg = RoomRegistry::with_seed(config, SyncConfig::default(), Box::new(words), 3, now);
        let code = reg
            .create_room(HOST, "ana", MatchSettings::default(), now)
            .unwrap()
            .code;
        reg.join_room(&code, GUEST, "bo", now).unwrap();
        reg.set_ready(HOST, true, now);
        reg.set_ready(GUEST, true, now);
        assert!(reg.start_match(HOST, now));
        reg.rooms.get_mut(&code).unwrap().state.board = Some(sample_board());
        reg.drain_outbox();
        (reg, code)
    }

    fn rejection_for(emits: &[Emit]) -> Option<String> {
        emits.iter().find_map(|e| match &e.event {
            ServerEvent::WordRejected { reason, .. } => Some(reason.clone()),
            _ => None,
        })
    }

    #[test]
    fn test_submit_word_accepted_scores_and_broadcasts() {
        let now = Instant::now();
        let (mut reg, code) = active_room(now);
        let points = reg.submit_word(GUEST, "cat", &[p(0, 0), p(1, 0), p(2, 0)], now);
        assert_eq!(points, Some(5));

        let emits = reg.drain_outbox();
        assert_eq!(emits.len(), 2);
        match &emits[0].event {
            ServerEvent::TileChanges(batch) => {
                assert_eq!(batch.sequence_number, 1);
                assert_eq!(batch.changes.removed_positions.len(), 3);
                assert_eq!(batch.changes.new_tiles.len(), 3);
            }
            other => panic!("expected tile changes, got {other:?}"),
        }
        assert_eq!(emits[0].recipients, vec![HOST, GUEST]);
        assert!(matches!(
            &emits[1].event,
            ServerEvent::WordAccepted { player_id, word, points: 5 } if *player_id == GUEST && word == "CAT"
        ));

        let room = reg.room(&code).unwrap();
        assert_eq!(room.diff_seq(), 1);
        let guest = room.player(GUEST).unwrap();
        assert_eq!((guest.score, guest.round_score), (5, 5));
        assert_eq!(guest.stats.best_word.as_deref(), Some("CAT"));
    }

    #[test]
    fn test_submit_word_diff_reproduces_server_board() {
        let now = Instant::now();
        let (mut reg, code) = active_room(now);
        reg.submit_word(HOST, "DOG", &[p(0, 1), p(1, 1), p(2, 1)], now);
        let emits = reg.drain_outbox();
        let ServerEvent::TileChanges(batch) = &emits[0].event else {
            panic!("expected tile changes");
        };
        let mut mirror = sample_board();
        mirror.apply_changes(&batch.changes).unwrap();
        assert_eq!(mirror.checksum(), reg.room(&code).unwrap().board().unwrap().checksum());
    }

    #[test]
    fn test_submit_word_rejections_change_nothing() {
        let now = Instant::now();
        let (mut reg, code) = active_room(now);
        let cases: [(&str, Vec<Position>, &str); 4] = [
            ("CA", vec![p(0, 0), p(1, 0)], "too short"),
            ("DOG", vec![p(0, 0), p(1, 0), p(2, 0)], "word does not match tiles"),
            ("TAC", vec![p(2, 0), p(1, 0), p(0, 0)], "not in dictionary"),
            ("CAT", vec![p(0, 0), p(2, 0), p(1, 0)], "(0,0) is not adjacent to (2,0)"),
        ];
        for (word, path, reason) in cases {
            assert_eq!(reg.submit_word(GUEST, word, &path, now), None, "{word}");
            let emits = reg.drain_outbox();
            assert_eq!(emits.len(), 1);
            assert_eq!(emits[0].recipients, vec![GUEST]);
            assert_eq!(rejection_for(&emits).as_deref(), Some(reason));
        }
        let room = reg.room(&code).unwrap();
        assert_eq!(room.diff_seq(), 0);
        assert_eq!(room.board(), Some(&sample_board()));
    }

    #[test]
    fn test_submit_word_already_found_this_round() {
        let now = Instant::now();
        let (mut reg, code) = active_room(now);
        let path = [p(0, 0), p(1, 0), p(2, 0)];
        assert!(reg.submit_word(GUEST, "CAT", &path, now).is_some());
        reg.rooms.get_mut(&code).unwrap().state.board = Some(sample_board());
        reg.drain_outbox();

        assert_eq!(reg.submit_word(GUEST, "CAT", &path, now), None);
        assert_eq!(rejection_for(&reg.drain_outbox()).as_deref(), Some("already found"));
        // Another player may still score it.
        assert!(reg.submit_word(HOST, "CAT", &path, now).is_some());
    }

    #[test]
    fn test_submit_word_outside_round_dropped() {
        let now = Instant::now();
        let mut reg = RoomRegistry::new(
            RoomConfig::default(),
            SyncConfig::default(),
            Box::new(WordList::from_words(["cat"])),
            now,
        );
        reg.create_room(HOST, "ana", MatchSettings::default(), now).unwrap();
        reg.drain_outbox();
        assert_eq!(reg.submit_word(HOST, "CAT", &[p(0, 0)], now), None);
        assert!(reg.drain_outbox().is_empty());
    }

    #[test]
    fn test_submit_word_raises_activity() {
        let now = Instant::now();
        let (mut reg, code) = active_room(now);
        reg.submit_word(GUEST, "CAT", &[p(0, 0), p(1, 0), p(2, 0)], now);
        let score = reg
            .health(&code)
            .unwrap()
            .activity_score(now, reg.sync_config());
        assert!((score - 1.0).abs() < 1e-9);
    }
}
