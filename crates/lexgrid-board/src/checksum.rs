//! Board fingerprinting.
//!
//! Server and client both call [`checksum`]; there is no second algorithm.
//! The digest covers the dimensions and, for every tile in (y, x) order,
//! its letter, points and coordinates. Tile ids and the order of the
//! `tiles` vector do not affect the result.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Board;

/// Hex characters kept from the BLAKE3 digest.
const CHECKSUM_LEN: usize = 16;

/// A short hex board fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(pub String);

impl Checksum {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the checksum of a board.
pub fn checksum(board: &Board) -> Checksum {
    let mut tiles: Vec<_> = board.tiles.iter().collect();
    tiles.sort_by_key(|t| (t.position.y, t.position.x));

    let mut hasher = blake3::Hasher::new();
    hasher.update(&board.width.to_le_bytes());
    hasher.update(&board.height.to_le_bytes());
    for tile in tiles {
        hasher.update(&(tile.letter as u32).to_le_bytes());
        hasher.update(&tile.points.to_le_bytes());
        hasher.update(&tile.position.x.to_le_bytes());
        hasher.update(&tile.position.y.to_le_bytes());
    }

    let hex = hasher.finalize().to_hex();
    Checksum(hex.as_str()[..CHECKSUM_LEN].to_string())
}
