/// TileGrid: the fixed-size tile map of one attempt.
///
/// Dimensions are set at construction and never change. Only individual
/// cells mutate during play. Cloning a grid yields a fully independent copy,
/// which is how every attempt gets its own map.

use super::tile::Tile;

pub const GRID_WIDTH: usize = 64;
pub const GRID_HEIGHT: usize = 64;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TileGrid {
    cells: Vec<Tile>,
}

impl TileGrid {
    /// A grid with every cell set to `tile`.
    pub fn filled(tile: Tile) -> Self {
        TileGrid { cells: vec![tile; GRID_WIDTH * GRID_HEIGHT] }
    }

    /// Build from row-major tiles. Returns `None` unless the rows are
    /// exactly `GRID_HEIGHT` rows of `GRID_WIDTH` tiles.
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Option<Self> {
        if rows.len() != GRID_HEIGHT || rows.iter().any(|r| r.len() != GRID_WIDTH) {
            return None;
        }
        Some(TileGrid { cells: rows.into_iter().flatten().collect() })
    }

    /// Build from a glyph sketch (see `Tile::from_glyph`). The sketch is
    /// placed at the top-left corner; everything outside it is Empty.
    pub fn from_sketch(rows: &[&str]) -> Self {
        let mut grid = TileGrid::filled(Tile::Empty);
        for (y, row) in rows.iter().enumerate().take(GRID_HEIGHT) {
            for (x, ch) in row.chars().enumerate().take(GRID_WIDTH) {
                grid.set(x, y, Tile::from_glyph(ch));
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        GRID_WIDTH
    }

    pub fn height(&self) -> usize {
        GRID_HEIGHT
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < GRID_WIDTH && (y as usize) < GRID_HEIGHT
    }

    /// Tile at (x, y). Callers bounds-check first; out of range panics.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Tile {
        assert!(x < GRID_WIDTH && y < GRID_HEIGHT, "cell ({x}, {y}) outside grid");
        self.cells[y * GRID_WIDTH + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, tile: Tile) {
        assert!(x < GRID_WIDTH && y < GRID_HEIGHT, "cell ({x}, {y}) outside grid");
        self.cells[y * GRID_WIDTH + x] = tile;
    }

    pub fn collectible_count(&self) -> usize {
        self.cells.iter().filter(|t| t.is_collectible()).count()
    }

    /// Rows as level-file codes.
    #[cfg(test)]
    pub fn to_codes(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(GRID_WIDTH)
            .map(|row| row.iter().map(|t| t.code()).collect())
            .collect()
    }
}
