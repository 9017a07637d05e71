//! Queued outbound events.
//!
//! The registry never touches sockets. Every handler pushes [`Emit`]s here
//! and the engine drains them after each call. Room-wide emits are
//! resolved to the room's connected players when they are queued, so a
//! player who disconnected earlier in the same call is skipped.

use lexgrid_protocol::{PlayerId, ServerEvent};

use crate::Room;

/// One event addressed to a set of players.
#[derive(Debug, Clone, PartialEq)]
pub struct Emit {
    pub recipients: Vec<PlayerId>,
    pub event: ServerEvent,
}

#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Emit>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_player(&mut self, player: PlayerId, event: ServerEvent) {
        self.push(vec![player], event);
    }

    /// Every connected player in `room`.
    pub fn to_room(&mut self, room: &Room, event: ServerEvent) {
        self.push(room.connected_ids().collect(), event);
    }

    /// Every connected player in `room` except `skip`.
    pub fn to_room_except(&mut self, room: &Room, skip: PlayerId, event: ServerEvent) {
        self.push(room.connected_ids().filter(|&id| id != skip).collect(), event);
    }

    pub fn drain(&mut self) -> Vec<Emit> {
        std::mem::take(&mut self.queue)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn push(&mut self, recipients: Vec<PlayerId>, event: ServerEvent) {
        if recipients.is_empty() {
            tracing::trace!(event = event.name(), "no recipients, dropping");
            return;
        }
        self.queue.push(Emit { recipients, event });
    }
}
