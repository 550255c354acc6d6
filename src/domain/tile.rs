/// Tile types and their rule table.
///
/// Tile semantics live in `TILE_RULES`, indexed by the tile's level-file
/// code. The step function never matches on tile variants directly; it asks
/// for the tile's `TileRule` and applies whatever the descriptor says.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Tile {
    Empty,
    Wall,
    Hazard,
    Collectible,
    Goal,
    Softening,   // passable once, hardens into Wall
    Transient,   // passable, vanishes after the player moves on
}

/// Status change triggered when the player attempts to enter a tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TileEffect {
    None,
    Kill,
    Collect,
    Win,
    ScheduleRemoval,
}

/// Effect descriptor for one tile type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TileRule {
    pub tile: Tile,
    /// Entry is refused: the player halts in front of the tile.
    pub blocks_entry: bool,
    /// The cell is rewritten to this tile on attempted entry.
    pub becomes: Option<Tile>,
    pub effect: TileEffect,
}

/// Rule table indexed by level-file code. Code 1 is unassigned.
///
/// ┌──────┬─────────────┬────────┬───────────┬─────────────────┐
/// │ code │ tile        │ blocks │ becomes   │ effect          │
/// ├──────┼─────────────┼────────┼───────────┼─────────────────┤
/// │ 0    │ Empty       │ no     │ -         │ -               │
/// │ 2    │ Wall        │ yes    │ -         │ -               │
/// │ 3    │ Hazard      │ yes    │ -         │ Kill            │
/// │ 4    │ Collectible │ no     │ Empty     │ Collect         │
/// │ 5    │ Goal        │ no     │ -         │ Win             │
/// │ 6    │ Softening   │ no     │ Wall      │ -               │
/// │ 7    │ Transient   │ no     │ -         │ ScheduleRemoval │
/// └──────┴─────────────┴────────┴───────────┴─────────────────┘
///
/// Hazard blocks entry yet still kills: the effect fires on the attempt,
/// the position never updates.
pub const TILE_RULES: [Option<TileRule>; 8] = [
    Some(TileRule { tile: Tile::Empty,       blocks_entry: false, becomes: None,             effect: TileEffect::None }),
    None,
    Some(TileRule { tile: Tile::Wall,        blocks_entry: true,  becomes: None,             effect: TileEffect::None }),
    Some(TileRule { tile: Tile::Hazard,      blocks_entry: true,  becomes: None,             effect: TileEffect::Kill }),
    Some(TileRule { tile: Tile::Collectible, blocks_entry: false, becomes: Some(Tile::Empty), effect: TileEffect::Collect }),
    Some(TileRule { tile: Tile::Goal,        blocks_entry: false, becomes: None,             effect: TileEffect::Win }),
    Some(TileRule { tile: Tile::Softening,   blocks_entry: false, becomes: Some(Tile::Wall),  effect: TileEffect::None }),
    Some(TileRule { tile: Tile::Transient,   blocks_entry: false, becomes: None,             effect: TileEffect::ScheduleRemoval }),
];

impl Tile {
    /// Level-file code for this tile.
    pub fn code(self) -> u8 {
        match self {
            Tile::Empty       => 0,
            Tile::Wall        => 2,
            Tile::Hazard      => 3,
            Tile::Collectible => 4,
            Tile::Goal        => 5,
            Tile::Softening   => 6,
            Tile::Transient   => 7,
        }
    }

    /// Decode a level-file code. Unassigned codes yield `None`.
    pub fn from_code(code: i64) -> Option<Tile> {
        usize::try_from(code)
            .ok()
            .and_then(|i| TILE_RULES.get(i).copied().flatten())
            .map(|rule| rule.tile)
    }

    pub fn rule(self) -> TileRule {
        match TILE_RULES[self.code() as usize] {
            Some(rule) => rule,
            None => unreachable!("every tile has a rule entry"),
        }
    }

    pub fn blocks_entry(self) -> bool {
        self.rule().blocks_entry
    }

    pub fn is_collectible(self) -> bool {
        self.rule().effect == TileEffect::Collect
    }

    pub fn from_glyph(c: char) -> Tile {
        match c {
            '#' => Tile::Wall,
            'X' => Tile::Hazard,
            '+' => Tile::Collectible,
            '$' => Tile::Goal,
            'O' => Tile::Softening,
            '~' => Tile::Transient,
            _   => Tile::Empty,
        }
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Tile; 7] = [
        Tile::Empty, Tile::Wall, Tile::Hazard, Tile::Collectible,
        Tile::Goal, Tile::Softening, Tile::Transient,
    ];

    #[test]
    fn table_entries_sit_at_their_code() {
        for tile in ALL {
            let rule = TILE_RULES[tile.code() as usize].expect("rule present");
            assert_eq!(rule.tile, tile);
            assert_eq!(Tile::from_code(tile.code() as i64), Some(tile));
        }
    }

    #[test]
    fn unassigned_codes_rejected() {
        assert_eq!(Tile::from_code(1), None);
        assert_eq!(Tile::from_code(8), None);
        assert_eq!(Tile::from_code(-1), None);
        assert_eq!(Tile::from_code(255), None);
    }

    #[test]
    fn blocking_tiles() {
        let blocking: Vec<Tile> = ALL.iter().copied().filter(|t| t.blocks_entry()).collect();
        assert_eq!(blocking, vec![Tile::Wall, Tile::Hazard]);
    }

    #[test]
    fn hazard_blocks_but_kills() {
        let rule = Tile::Hazard.rule();
        assert!(rule.blocks_entry);
        assert_eq!(rule.effect, TileEffect::Kill);
    }

    #[test]
    fn mutating_tiles() {
        assert_eq!(Tile::Collectible.rule().becomes, Some(Tile::Empty));
        assert_eq!(Tile::Softening.rule().becomes, Some(Tile::Wall));
        assert_eq!(Tile::Transient.rule().becomes, None);
        assert_eq!(Tile::Transient.rule().effect, TileEffect::ScheduleRemoval);
    }
}
