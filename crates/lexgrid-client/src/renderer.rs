//! The seam between reconciliation and whatever draws the board.

use lexgrid_board::{Board, Position, TileChanges};

/// A presentation layer for the board.
///
/// Every method must return promptly. Long work such as an animation is
/// started here and reported through [`is_busy`](Self::is_busy) until it
/// finishes.
pub trait Renderer {
    /// Replace everything shown with `board`.
    fn update_board(&mut self, board: &Board);

    /// Animate one diff. `board` is the state after the diff.
    fn apply_diff(&mut self, sequence: u64, changes: &TileChanges, board: &Board);

    /// `true` while a diff is still being animated.
    fn is_busy(&self) -> bool;

    /// Cells whose displayed tile does not match `board`.
    fn stale_tiles(&self, board: &Board) -> Vec<Position>;

    // Recovery rungs. Each returns `true` if the display now matches.

    fn refresh_tiles(&mut self, board: &Board, tiles: &[Position]) -> bool;

    fn refresh_board(&mut self, board: &Board) -> bool;

    fn restart_presentation(&mut self, board: &Board) -> bool;

    /// Last resort: ask the host application to reload the game view.
    fn request_full_restart(&mut self) -> bool;
}
