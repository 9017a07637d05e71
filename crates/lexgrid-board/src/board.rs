//! The board model and its two mutation paths.
//!
//! The server mutates a board through [`Board::collapse`], which decides
//! what falls and what gets refilled. Clients never decide anything: they
//! replay the resulting [`TileChanges`] with [`Board::apply_changes`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    BoardError, BoardGenerator, Checksum, FallingTile, NewTile, Position, Tile,
    TileChanges,
};

/// A `width` × `height` grid of tiles.
///
/// Boards built by this crate keep `tiles` in row-major order. Boards that
/// arrive over the wire are accepted in any order; lookups fall back to a
/// scan and every mutation rewrites the vector in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub width: u16,
    pub height: u16,
    pub tiles: Vec<Tile>,
}

impl Board {
    /// Number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    /// Returns the tile at `pos`, if any.
    pub fn tile_at(&self, pos: Position) -> Option<&Tile> {
        if !self.contains(pos) {
            return None;
        }
        match self.tiles.get(self.index(pos)) {
            Some(tile) if tile.position == pos => Some(tile),
            _ => self.tiles.iter().find(|t| t.position == pos),
        }
    }

    /// Fingerprint of this board. See [`crate::checksum`].
    pub fn checksum(&self) -> Checksum {
        crate::checksum(self)
    }

    /// Validates a submitted path and spells it out.
    ///
    /// Every cell must be on the board and used once, and each step must
    /// move to one of the eight neighbours. Returns the uppercase word and
    /// the sum of its tile points.
    pub fn word_for_path(&self, path: &[Position]) -> Result<(String, u32), BoardError> {
        if path.is_empty() {
            return Err(BoardError::EmptyPath);
        }

        let mut seen = HashSet::with_capacity(path.len());
        let mut word = String::with_capacity(path.len());
        let mut points = 0;

        for (i, &pos) in path.iter().enumerate() {
            let tile = self.tile_at(pos).ok_or(BoardError::OutOfBounds(pos))?;
            if !seen.insert(pos) {
                return Err(BoardError::DuplicatePosition(pos));
            }
            if i > 0 && !path[i - 1].is_adjacent(&pos) {
                return Err(BoardError::NotAdjacent(path[i - 1], pos));
            }
            word.push(tile.letter.to_ascii_uppercase());
            points += tile.points;
        }

        Ok((word, points))
    }

    /// Lays the tiles out as a dense grid of optional cells.
    fn grid(&self) -> Vec<Option<Tile>> {
        let mut grid = vec![None; self.cell_count()];
        for tile in &self.tiles {
            if self.contains(tile.position) {
                let idx = self.index(tile.position);
                grid[idx] = Some(tile.clone());
            }
        }
        grid
    }

    /// Replaces `tiles` from a complete grid. Fails if any cell is empty.
    fn commit(&mut self, grid: Vec<Option<Tile>>) -> Result<(), BoardError> {
        let missing = grid.iter().filter(|cell| cell.is_none()).count();
        if missing > 0 {
            return Err(BoardError::IncompleteBoard { missing });
        }
        self.tiles = grid.into_iter().flatten().collect();
        Ok(())
    }

    /// Removes the given cells, lets the tiles above them fall, and refills
    /// the empty cells at the top of each column from `generator`.
    ///
    /// Returns the change set a client needs to reproduce the result.
    pub fn collapse(
        &mut self,
        removed: &[Position],
        generator: &mut BoardGenerator,
    ) -> Result<TileChanges, BoardError> {
        let mut grid = self.grid();
        let mut seen = HashSet::with_capacity(removed.len());
        for &pos in removed {
            if !self.contains(pos) {
                return Err(BoardError::OutOfBounds(pos));
            }
            if !seen.insert(pos) {
                return Err(BoardError::DuplicatePosition(pos));
            }
            let idx = self.index(pos);
            grid[idx] = None;
        }

        let mut changes = TileChanges {
            removed_positions: removed.to_vec(),
            ..TileChanges::default()
        };

        for x in 0..self.width {
            // Walk the column bottom-up, packing surviving tiles downward.
            let mut write_y = self.height as i32 - 1;
            for y in (0..self.height).rev() {
                let from = Position::new(x, y);
                let Some(mut tile) = grid[self.index(from)].take() else {
                    continue;
                };
                let to = Position::new(x, write_y as u16);
                if to != from {
                    changes.falling_tiles.push(FallingTile {
                        from,
                        to,
                        letter: tile.letter,
                        points: tile.points,
                        id: tile.id,
                    });
                    tile.position = to;
                }
                let idx = self.index(to);
                grid[idx] = Some(tile);
                write_y -= 1;
            }

            for y in 0..=write_y {
                let position = Position::new(x, y as u16);
                let tile = generator.tile_at(position);
                changes.new_tiles.push(NewTile {
                    position,
                    letter: tile.letter,
                    points: tile.points,
                    id: tile.id,
                });
                let idx = self.index(position);
                grid[idx] = Some(tile);
            }
        }

        self.commit(grid)?;
        Ok(changes)
    }

    /// Replays a change set produced by [`Board::collapse`].
    ///
    /// Only the cells named by the diff are rewritten. Falling moves read
    /// from the board as it was before the diff. On error the board is left
    /// untouched.
    pub fn apply_changes(&mut self, changes: &TileChanges) -> Result<(), BoardError> {
        let mut grid = self.grid();

        for &pos in &changes.removed_positions {
            if !self.contains(pos) {
                return Err(BoardError::OutOfBounds(pos));
            }
            let idx = self.index(pos);
            grid[idx] = None;
        }

        for fall in &changes.falling_tiles {
            if !self.contains(fall.from) {
                return Err(BoardError::OutOfBounds(fall.from));
            }
            let idx = self.index(fall.from);
            grid[idx] = None;
        }
        for fall in &changes.falling_tiles {
            if !self.contains(fall.to) {
                return Err(BoardError::OutOfBounds(fall.to));
            }
            let idx = self.index(fall.to);
            grid[idx] = Some(Tile {
                id: fall.id,
                letter: fall.letter,
                points: fall.points,
                position: fall.to,
            });
        }

        for new in &changes.new_tiles {
            if !self.contains(new.position) {
                return Err(BoardError::OutOfBounds(new.position));
            }
            let idx = self.index(new.position);
            grid[idx] = Some(Tile {
                id: new.id,
                letter: new.letter,
                points: new.points,
                position: new.position,
            });
        }

        self.commit(grid)
    }
}
