//! Error types for board operations.

use crate::Position;

/// Errors raised while validating paths or applying diffs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// A position lies outside the grid.
    #[error("position {0} is outside the board")]
    OutOfBounds(Position),

    /// The same cell appears twice in a path or removal list.
    #[error("position {0} used more than once")]
    DuplicatePosition(Position),

    /// Two consecutive path cells are not neighbours.
    #[error("{0} is not adjacent to {1}")]
    NotAdjacent(Position, Position),

    /// A word path with no tiles.
    #[error("path is empty")]
    EmptyPath,

    /// Applying a diff would leave holes in the grid.
    #[error("diff leaves {missing} empty cell(s)")]
    IncompleteBoard { missing: usize },
}
