//! The tile diff: what a word removal did to the grid.

use serde::{Deserialize, Serialize};

use crate::{Position, TileId};

/// A tile that moved down its column after tiles below it were removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallingTile {
    pub from: Position,
    pub to: Position,
    pub letter: char,
    pub points: u32,
    pub id: TileId,
}

/// A freshly generated tile dropped into a vacated cell at the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTile {
    pub position: Position,
    pub letter: char,
    pub points: u32,
    pub id: TileId,
}

/// Everything that changed on the board after one accepted word.
///
/// Positions in `falling_tiles[].from` refer to the board *before* the
/// change; every other position refers to the board after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileChanges {
    pub removed_positions: Vec<Position>,
    pub falling_tiles: Vec<FallingTile>,
    pub new_tiles: Vec<NewTile>,
}

impl TileChanges {
    /// Returns `true` if the diff touches no cell.
    pub fn is_empty(&self) -> bool {
        self.removed_positions.is_empty()
            && self.falling_tiles.is_empty()
            && self.new_tiles.is_empty()
    }
}
