//! Letter grid for Lexgrid.
//!
//! Everything both sides of the wire need to agree on about a board lives
//! here:
//!
//! - [`Board`] and [`Tile`]: the grid model, row-major, y grows downward
//! - [`BoardGenerator`]: weighted random letters with point values
//! - [`TileChanges`]: the remove / fall / refill diff produced by
//!   [`Board::collapse`] on the server and replayed by
//!   [`Board::apply_changes`] on the client
//! - [`checksum`]: the single board fingerprint used by server and client

mod board;
mod changes;
mod checksum;
mod error;
mod generator;
mod tile;

pub use board::Board;
pub use changes::{FallingTile, NewTile, TileChanges};
pub use checksum::{Checksum, checksum};
pub use error::BoardError;
pub use generator::{BoardGenerator, letter_points};
pub use tile::{Position, Tile, TileId};
