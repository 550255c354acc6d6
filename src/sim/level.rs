/// Level loader and level library.
///
/// ## Sources (priority order):
///   1. `levels_dir`: one JSON file per level, id = file stem
///   2. Built-in level (only when the directory yields nothing)
///
/// ## Level file format:
///   ```json
///   { "playerSpawn": [x, y], "levelMap": [[0, 2, ...], ...] }
///   ```
///   `levelMap` is 64 rows of 64 tile codes (see `domain::tile`).
///   The spawn must lie on the map.
///
/// Files are indexed when the library is scanned but only parsed when an
/// attempt starts. A parsed level is cached; every attempt receives its own
/// copy of the cached map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::entity::Player;
use crate::domain::grid::{TileGrid, GRID_HEIGHT, GRID_WIDTH};
use crate::domain::tile::Tile;
use crate::error::LoadError;
use crate::sim::world::Attempt;

pub const BUILTIN_ID: &str = "builtin";

/// Validated level data. Never mutated after load.
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub spawn: (usize, usize),
    pub map: TileGrid,
}

impl LevelDef {
    pub fn collectible_total(&self) -> usize {
        self.map.collectible_count()
    }
}

/// On-disk level layout.
#[derive(Serialize, Deserialize, Debug)]
struct LevelFile {
    #[serde(rename = "playerSpawn")]
    player_spawn: (i64, i64),
    #[serde(rename = "levelMap")]
    level_map: Vec<Vec<i64>>,
}

#[derive(Clone, Debug)]
enum LevelSource {
    File(PathBuf),
    Builtin,
}

pub struct LevelLibrary {
    entries: Vec<(String, LevelSource)>,
    cache: HashMap<String, LevelDef>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Start a fresh attempt: an independent copy of the level map plus a new
/// player at the spawn.
pub fn start_attempt(
    library: &mut LevelLibrary,
    level_id: &str,
    queue_capacity: usize,
) -> Result<Attempt, LoadError> {
    let def = library.load(level_id)?;
    let (sx, sy) = def.spawn;
    log::debug!("starting attempt on level {level_id} at ({sx}, {sy})");
    Ok(Attempt {
        level_id: level_id.to_string(),
        grid: def.map.clone(),
        player: Player::new(sx, sy, queue_capacity),
        collectible_total: def.collectible_total(),
    })
}

/// Parse and validate a level file's contents.
pub fn parse_level(content: &str, path: &Path) -> Result<LevelDef, LoadError> {
    let file: LevelFile = serde_json::from_str(content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let rows = file.level_map.len();
    if rows != GRID_HEIGHT || file.level_map.iter().any(|r| r.len() != GRID_WIDTH) {
        let cols = file.level_map.iter()
            .map(|r| r.len())
            .find(|&len| len != GRID_WIDTH)
            .unwrap_or(GRID_WIDTH);
        return Err(LoadError::Dimensions { rows, cols });
    }

    let mut tiles = Vec::with_capacity(GRID_HEIGHT);
    for (y, row) in file.level_map.iter().enumerate() {
        let mut out = Vec::with_capacity(GRID_WIDTH);
        for (x, &code) in row.iter().enumerate() {
            let tile = Tile::from_code(code).ok_or(LoadError::UnknownTile { code, x, y })?;
            out.push(tile);
        }
        tiles.push(out);
    }
    let map = TileGrid::from_rows(tiles).ok_or(LoadError::Dimensions {
        rows: GRID_HEIGHT,
        cols: GRID_WIDTH,
    })?;

    let (x, y) = file.player_spawn;
    if x < 0 || y < 0 || x >= GRID_WIDTH as i64 || y >= GRID_HEIGHT as i64 {
        return Err(LoadError::SpawnOutOfBounds { x, y });
    }

    Ok(LevelDef { spawn: (x as usize, y as usize), map })
}

impl LevelLibrary {
    /// Index every `*.json` file in `dir`. Falls back to the built-in level
    /// when the directory is missing or holds no level files.
    pub fn scan(dir: &Path) -> Self {
        let mut entries = load_from_directory(dir);
        if entries.is_empty() {
            log::info!("no level files in {}, using built-in level", dir.display());
            entries.push((BUILTIN_ID.to_string(), LevelSource::Builtin));
        } else {
            log::info!("found {} level files in {}", entries.len(), dir.display());
        }
        LevelLibrary { entries, cache: HashMap::new() }
    }

    /// Library holding only the built-in level.
    pub fn builtin() -> Self {
        LevelLibrary {
            entries: vec![(BUILTIN_ID.to_string(), LevelSource::Builtin)],
            cache: HashMap::new(),
        }
    }

    /// Level ids in play order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn position(&self, level_id: &str) -> Option<usize> {
        self.entries.iter().position(|(id, _)| id == level_id)
    }

    /// Parsed level, loading it on first use.
    pub fn load(&mut self, level_id: &str) -> Result<&LevelDef, LoadError> {
        if !self.cache.contains_key(level_id) {
            let source = self.entries.iter()
                .find(|(id, _)| id == level_id)
                .map(|(_, src)| src.clone())
                .ok_or_else(|| LoadError::UnknownLevel(level_id.to_string()))?;
            let def = match source {
                LevelSource::File(path) => {
                    let content = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    parse_level(&content, &path)?
                }
                LevelSource::Builtin => builtin_level(),
            };
            log::info!("loaded level {level_id} ({} collectibles)", def.collectible_total());
            self.cache.insert(level_id.to_string(), def);
        }
        self.cache
            .get(level_id)
            .ok_or_else(|| LoadError::UnknownLevel(level_id.to_string()))
    }
}

// ══════════════════════════════════════════════════════════════
// Internal: directory scan + ordering
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<(String, LevelSource)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("cannot read levels directory {}: {e}", dir.display());
            return vec![];
        }
    };
    let mut levels: Vec<(String, LevelSource)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map_or(false, |x| x == "json"))
        .filter_map(|path| {
            let id = path.file_stem()?.to_string_lossy().to_string();
            Some((id, LevelSource::File(path)))
        })
        .collect();
    levels.sort_by(|a, b| level_order(&a.0, &b.0));
    levels
}

/// Numeric ids first (by value), then the rest lexically.
fn level_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

// ══════════════════════════════════════════════════════════════
// Built-in level
// ══════════════════════════════════════════════════════════════

/// Legend: see `Tile::from_glyph`, plus 'P' = player spawn.
/// The sketch sits in the top-left corner of an otherwise empty map;
/// its border walls keep the player inside.
const BUILTIN_SKETCH: &[&str] = &[
    "################",
    "#P     +#     X#",
    "#             ##",
    "#  ####O#      #",
    "#  #   +#  ~   #",
    "#  #    #      #",
    "#  # $  #      #",
    "#  ######   X  #",
    "#              #",
    "################",
];

fn builtin_level() -> LevelDef {
    let map = TileGrid::from_sketch(BUILTIN_SKETCH);
    let spawn = BUILTIN_SKETCH.iter()
        .enumerate()
        .find_map(|(y, row)| row.find('P').map(|x| (x, y)))
        .unwrap_or((1, 1));
    LevelDef { spawn, map }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
