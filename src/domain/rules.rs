/// Entry rules, truth-table driven.
///
/// Pure functions over the grid. They decide what an attempted step would
/// do without performing it; `sim::step` applies the outcome.
///
/// ## Entry Truth Table
///
/// ┌───────────────────────────┬─────────┬──────────────────────────────┐
/// │ Destination               │ Commit? │ Side effects                 │
/// ├───────────────────────────┼─────────┼──────────────────────────────┤
/// │ outside the grid          │ NO      │ none                         │
/// │ tile rule blocks entry    │ NO      │ rule mutation + effect fire  │
/// │ otherwise                 │ YES     │ rule mutation + effect fire  │
/// └───────────────────────────┴─────────┴──────────────────────────────┘
///
/// Side effects fire for any in-bounds attempt. That is how a Hazard kills
/// a player who never leaves their cell.

use super::grid::TileGrid;
use super::tile::{Tile, TileEffect};

/// Result of attempting to step from (x, y) by (dx, dy).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Entry {
    /// Destination lies outside the grid. Nothing happens but a halt.
    OutOfBounds,
    /// Destination is on the grid.
    Cell {
        x: usize,
        y: usize,
        tile: Tile,
        /// The player's position moves to (x, y).
        commit: bool,
        becomes: Option<Tile>,
        effect: TileEffect,
    },
}

impl Entry {
    pub fn commits(&self) -> bool {
        matches!(self, Entry::Cell { commit: true, .. })
    }
}

/// Destination cell of a step, if it lies on the grid.
pub fn destination(grid: &TileGrid, x: usize, y: usize, dx: i32, dy: i32) -> Option<(usize, usize)> {
    debug_assert!(
        (-1..=1).contains(&dx) && (-1..=1).contains(&dy),
        "velocity ({dx}, {dy}) outside unit range",
    );
    let tx = x as i32 + dx;
    let ty = y as i32 + dy;
    if grid.in_bounds(tx, ty) {
        Some((tx as usize, ty as usize))
    } else {
        None
    }
}

/// Evaluate an attempted step. See truth table above.
pub fn evaluate_entry(grid: &TileGrid, x: usize, y: usize, dx: i32, dy: i32) -> Entry {
    match destination(grid, x, y, dx, dy) {
        None => Entry::OutOfBounds,
        Some((tx, ty)) => {
            let tile = grid.get(tx, ty);
            let rule = tile.rule();
            Entry::Cell {
                x: tx,
                y: ty,
                tile,
                commit: !tile.blocks_entry(),
                becomes: rule.becomes,
                effect: rule.effect,
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_into_empty() {
        let g = TileGrid::from_sketch(&["  "]);
        let e = evaluate_entry(&g, 0, 0, 1, 0);
        assert_eq!(e, Entry::Cell {
            x: 1, y: 0, tile: Tile::Empty, commit: true,
            becomes: None, effect: TileEffect::None,
        });
    }

    #[test]
    fn wall_blocks_silently() {
        let g = TileGrid::from_sketch(&[" #"]);
        let e = evaluate_entry(&g, 0, 0, 1, 0);
        assert!(!e.commits());
        assert!(matches!(e, Entry::Cell { effect: TileEffect::None, becomes: None, .. }));
    }

    #[test]
    fn hazard_blocks_and_kills() {
        let g = TileGrid::from_sketch(&[" X"]);
        let e = evaluate_entry(&g, 0, 0, 1, 0);
        assert!(!e.commits());
        assert!(matches!(e, Entry::Cell { effect: TileEffect::Kill, .. }));
    }

    #[test]
    fn collectible_clears() {
        let g = TileGrid::from_sketch(&[" ", "+"]);
        let e = evaluate_entry(&g, 0, 0, 0, 1);
        assert!(e.commits());
        assert!(matches!(e, Entry::Cell {
            x: 0, y: 1, becomes: Some(Tile::Empty), effect: TileEffect::Collect, ..
        }));
    }

    #[test]
    fn softening_hardens() {
        let g = TileGrid::from_sketch(&["O "]);
        let e = evaluate_entry(&g, 1, 0, -1, 0);
        assert!(e.commits());
        assert!(matches!(e, Entry::Cell { becomes: Some(Tile::Wall), .. }));
    }

    #[test]
    fn transient_is_enterable() {
        let g = TileGrid::from_sketch(&["~", " "]);
        let e = evaluate_entry(&g, 0, 1, 0, -1);
        assert!(e.commits());
        assert!(matches!(e, Entry::Cell { effect: TileEffect::ScheduleRemoval, .. }));
    }

    #[test]
    fn grid_edges() {
        let g = TileGrid::filled(Tile::Empty);
        assert_eq!(evaluate_entry(&g, 0, 0, -1, 0), Entry::OutOfBounds);
        assert_eq!(evaluate_entry(&g, 0, 0, 0, -1), Entry::OutOfBounds);
        assert_eq!(evaluate_entry(&g, 63, 5, 1, 0), Entry::OutOfBounds);
        assert_eq!(evaluate_entry(&g, 5, 63, 0, 1), Entry::OutOfBounds);
        assert!(evaluate_entry(&g, 62, 63, 1, 0).commits());
    }

    #[test]
    fn zero_velocity_targets_own_cell() {
        let g = TileGrid::filled(Tile::Empty);
        assert_eq!(destination(&g, 4, 4, 0, 0), Some((4, 4)));
    }
}
