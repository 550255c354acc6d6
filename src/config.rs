/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD), or from an
/// explicit `--config` path. Falls back to sensible defaults if the file is
/// missing or incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".local/share/gridglide";

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub movement: MovementConfig,
    pub levels_dir: PathBuf,
    pub records_file: PathBuf,
    pub unlock_all: bool,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    /// Simulation ticks per second. Every tick is exactly one step.
    pub fps: u32,
}

#[derive(Clone, Debug)]
pub struct MovementConfig {
    /// Intents buffered ahead of the current move. Always >= 1.
    pub queue_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// `env_logger` filter string, e.g. "warn" or "gridglide=debug".
    pub level: String,
    /// Log output. Always a file: stderr would draw over the game screen.
    pub file: PathBuf,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    movement: TomlMovement,
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    logging: TomlLogging,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_fps")]
    fps: u32,
}

#[derive(Deserialize, Debug)]
struct TomlMovement {
    #[serde(default = "default_queue_capacity")]
    queue_capacity: usize,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_records_file")]
    records_file: String,
    #[serde(default)]
    unlock_all: bool,
}

#[derive(Deserialize, Debug)]
struct TomlLogging {
    #[serde(default = "default_log_level")]
    level: String,
    #[serde(default = "default_log_file")]
    file: String,
}

// ── Defaults ──

fn default_fps() -> u32 { 60 }
fn default_queue_capacity() -> usize { 1 }
fn default_levels_dir() -> String { "levelFiles".into() }
fn default_records_file() -> String { "records.json".into() }
fn default_log_level() -> String { "warn".into() }
fn default_log_file() -> String { "gridglide.log".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed { fps: default_fps() }
    }
}

impl Default for TomlMovement {
    fn default() -> Self {
        TomlMovement { queue_capacity: default_queue_capacity() }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            records_file: default_records_file(),
            unlock_all: false,
        }
    }
}

impl Default for TomlLogging {
    fn default() -> Self {
        TomlLogging { level: default_log_level(), file: default_log_file() }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[], Path::new("."))
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `explicit`, or from the first `config.toml` found.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) ~/.local/share/gridglide.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = match explicit {
            Some(path) => read_toml(path).unwrap_or_default(),
            None => search_toml(&search_dirs),
        };
        GameConfig::from_toml(toml_cfg, &search_dirs, &data_dir())
    }

    #[cfg(test)]
    fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(cfg, &[], Path::new(".")))
    }

    fn from_toml(cfg: TomlConfig, search_dirs: &[PathBuf], data_dir: &Path) -> Self {
        // Resolve levels directory against the search path
        let levels_dir_str = &cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        let records_file = under_data_dir(&cfg.general.records_file, data_dir);
        let log_file = under_data_dir(&cfg.logging.file, data_dir);

        let mut queue_capacity = cfg.movement.queue_capacity;
        if queue_capacity == 0 {
            eprintln!("Warning: movement.queue_capacity must be at least 1, using 1.");
            queue_capacity = 1;
        }
        let mut fps = cfg.speed.fps;
        if fps == 0 {
            eprintln!("Warning: speed.fps must be at least 1, using {}.", default_fps());
            fps = default_fps();
        }

        GameConfig {
            speed: SpeedConfig { fps },
            movement: MovementConfig { queue_capacity },
            levels_dir,
            records_file,
            unlock_all: cfg.general.unlock_all,
            logging: LoggingConfig {
                level: cfg.logging.level,
                file: log_file,
            },
        }
    }
}

/// Relative paths live in the data directory.
fn under_data_dir(path: &str, data_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() { path } else { data_dir.join(path) }
}

/// Candidate directories to search: exe dir + CWD + XDG data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(APP_DIR);
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// First writable data directory, for the records and log files.
pub fn data_dir() -> PathBuf {
    // 1. Exe directory (local/portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let test_path = parent.join(".write_test_gridglide");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(APP_DIR);
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. Fallback to CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn read_toml(path: &Path) -> Option<TomlConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str::<TomlConfig>(&text) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                eprintln!("Warning: {} parse error: {e}", path.display());
                eprintln!("Using default settings.");
                None
            }
        },
        Err(e) => {
            eprintln!("Warning: could not read {}: {e}", path.display());
            None
        }
    }
}

/// Search for config.toml in candidate directories.
fn search_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    search_dirs.iter()
        .map(|dir| dir.join("config.toml"))
        .find(|path| path.exists())
        .and_then(|path| read_toml(&path))
        .unwrap_or_default()
}
