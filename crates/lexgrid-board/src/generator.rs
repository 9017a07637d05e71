//! Random board generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Board, Position, Tile, TileId};

/// `(letter, weight, points)`. Weights follow English letter frequency.
const LETTERS: [(char, u32, u32); 26] = [
    ('A', 9, 1),
    ('B', 2, 3),
    ('C', 2, 3),
    ('D', 4, 2),
    ('E', 12, 1),
    ('F', 2, 4),
    ('G', 3, 2),
    ('H', 2, 4),
    ('I', 9, 1),
    ('J', 1, 8),
    ('K', 1, 5),
    ('L', 4, 1),
    ('M', 2, 3),
    ('N', 6, 1),
    ('O', 8, 1),
    ('P', 2, 3),
    ('Q', 1, 10),
    ('R', 6, 1),
    ('S', 4, 1),
    ('T', 6, 1),
    ('U', 4, 1),
    ('V', 2, 4),
    ('W', 2, 4),
    ('X', 1, 8),
    ('Y', 2, 4),
    ('Z', 1, 10),
];

const TOTAL_WEIGHT: u32 = {
    let mut total = 0;
    let mut i = 0;
    while i < LETTERS.len() {
        total += LETTERS[i].1;
        i += 1;
    }
    total
};

/// Point value of a letter, or 0 for anything outside `A..=Z`.
pub fn letter_points(letter: char) -> u32 {
    let upper = letter.to_ascii_uppercase();
    LETTERS
        .iter()
        .find(|(l, _, _)| *l == upper)
        .map_or(0, |(_, _, points)| *points)
}

/// Produces boards and refill tiles.
///
/// Tile ids are unique for the lifetime of one generator, so a room keeps a
/// single generator across all of its rounds.
#[derive(Debug)]
pub struct BoardGenerator {
    rng: StdRng,
    next_id: u64,
}

impl BoardGenerator {
    /// Generator seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            next_id: 1,
        }
    }

    /// Deterministic generator. Same seed, same boards.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_id: 1,
        }
    }

    /// Fills a `width` × `height` grid with random tiles.
    pub fn generate(&mut self, width: u16, height: u16) -> Board {
        let mut tiles = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                tiles.push(self.tile_at(Position::new(x, y)));
            }
        }
        tracing::trace!(width, height, "board generated");
        Board {
            width,
            height,
            tiles,
        }
    }

    /// Draws one random tile for the given cell.
    pub fn tile_at(&mut self, position: Position) -> Tile {
        let mut roll = self.rng.random_range(0..TOTAL_WEIGHT);
        let mut picked = LETTERS[LETTERS.len() - 1];
        for entry in LETTERS {
            if roll < entry.1 {
                picked = entry;
                break;
            }
            roll -= entry.1;
        }

        let id = TileId(self.next_id);
        self.next_id += 1;

        Tile {
            id,
            letter: picked.0,
            points: picked.2,
            position,
        }
    }
}

impl Default for BoardGenerator {
    fn default() -> Self {
        Self::new()
    }
}
