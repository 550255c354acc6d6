/// Error types surfaced to the shell.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a level id into a playable attempt.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unknown level '{0}'")]
    UnknownLevel(String),

    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed level file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("level map must be 64x64, got {rows} rows x {cols} columns")]
    Dimensions { rows: usize, cols: usize },

    #[error("unknown tile code {code} at ({x}, {y})")]
    UnknownTile { code: i64, x: usize, y: usize },

    #[error("player spawn ({x}, {y}) lies outside the map")]
    SpawnOutOfBounds { x: i64, y: i64 },
}

/// Failure to persist the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
