/// Entry point and game loop.

mod config;
mod domain;
mod error;
mod sim;
mod ui;

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::event::KeyCode;

use config::GameConfig;
use sim::event::GameEvent;
use sim::level::LevelLibrary;
use sim::records::RecordStore;
use sim::step;
use sim::world::{Phase, Screen, WorldState};
use ui::input::InputState;
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const MAX_LAG_TICKS: u32 = 4;

/// Message bar durations, in ticks.
const MSG_SHORT: u32 = 90;
const MSG_LONG: u32 = 240;

#[derive(Parser)]
#[command(name = "gridglide")]
#[command(about = "Grid puzzle-platformer: glide, collect, reach the goal")]
#[command(version)]
struct Cli {
    /// Configuration file (default: search for config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of level files, overrides the config
    #[arg(short, long)]
    levels: Option<PathBuf>,

    /// Start directly on this level id
    #[arg(long)]
    level: Option<String>,

    /// Erase all stored records and exit
    #[arg(long)]
    reset_records: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut config = GameConfig::load(cli.config.as_deref());
    if let Some(dir) = cli.levels {
        config.levels_dir = dir;
    }
    init_logging(&config);
    log::info!("levels from {}, records in {}", config.levels_dir.display(), config.records_file.display());

    let mut records = match RecordStore::open(&config.records_file) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("record store unavailable: {e}");
            eprintln!("Warning: {e}; records will not be saved.");
            RecordStore::in_memory()
        }
    };

    if cli.reset_records {
        match records.reset() {
            Ok(()) => println!("Records reset ({}).", config.records_file.display()),
            Err(e) => {
                eprintln!("Could not reset records: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let library = LevelLibrary::scan(&config.levels_dir);
    let mut world = WorldState::new(library, records, &config);

    if let Some(id) = &cli.level {
        let started = world.library.position(id)
            .ok_or_else(|| error::LoadError::UnknownLevel(id.clone()))
            .and_then(|idx| world.begin_attempt(idx));
        if let Err(e) = started {
            eprintln!("Cannot start level {id}: {e}");
            std::process::exit(1);
        }
    }

    let mut renderer = Renderer::new();

    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&mut world, &mut renderer, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        log::error!("game loop failed: {e}");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing gridglide! {} level records stored.", world.records.len());
}

/// Logger setup: config level as the base filter, `RUST_LOG` on top.
/// Every line goes to the log file, timestamped, so nothing lands on the
/// game screen. Logging is off when the file cannot be opened.
fn init_logging(config: &GameConfig) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.logging.level);
    builder.parse_default_env();

    let path = &config.logging.file;
    let opened = path.parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::OpenOptions::new().create(true).append(true).open(path));
    match opened {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}; logging disabled.", path.display());
            return;
        }
    }

    let _ = builder.try_init();
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_secs(1) / config.speed.fps.max(1);

    loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_meta(world, &kb) {
            break;
        }

        // At most one step per frame. The deadline advances by a whole tick
        // so overshoot carries into the next one; a stall resyncs instead of
        // replaying the backlog.
        if last_tick.elapsed() >= tick_rate {
            world.anim_tick = world.anim_tick.wrapping_add(1);
            tick_playing(world);
            world.tick_message();
            last_tick = next_deadline(last_tick, tick_rate, Instant::now());
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Start of the next tick period. Falls back to `now` once the loop is more
/// than `MAX_LAG_TICKS` behind.
fn next_deadline(last_tick: Instant, tick_rate: Duration, now: Instant) -> Instant {
    let next = last_tick + tick_rate;
    if now.saturating_duration_since(next) > tick_rate * MAX_LAG_TICKS {
        now
    } else {
        next
    }
}

/// One simulation step, then move a finished attempt to its end screen.
fn tick_playing(world: &mut WorldState) {
    let Screen::Playing(attempt) = &mut world.screen else { return };
    let events = step::step(attempt);
    log_events(&attempt.level_id, &events);

    if let Err(e) = world.finish_attempt(chrono::Utc::now().timestamp()) {
        log::warn!("could not save record: {e}");
        world.set_message(&format!("Record not saved: {e}"), MSG_LONG);
    }
}

fn log_events(level_id: &str, events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::Collected { total, .. } => log::debug!("level {level_id}: collected {total}"),
            GameEvent::TileHardened { x, y } => log::debug!("level {level_id}: ({x}, {y}) hardened"),
            GameEvent::TileRemoved { x, y } => log::debug!("level {level_id}: ({x}, {y}) removed"),
            _ => log::trace!("level {level_id}: {event:?}"),
        }
    }
}

// ── Key Constants ──

const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_RESET: &[KeyCode] = &[KeyCode::Char('x'), KeyCode::Char('X')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::Esc];

/// Start level `idx`, reporting a load failure on the message bar.
fn start_level(world: &mut WorldState, idx: usize) {
    let result = world.begin_attempt(idx);
    report_load(world, result);
}

fn restart_level(world: &mut WorldState) {
    let result = world.restart_attempt();
    report_load(world, result);
}

fn report_load(world: &mut WorldState, result: Result<(), error::LoadError>) {
    if let Err(e) = result {
        log::error!("cannot start level: {e}");
        world.back_to_select();
        world.set_message(&format!("Cannot load level: {e}"), MSG_LONG);
    }
}

/// Screen dispatcher. Returns true when the game should quit.
fn handle_meta(world: &mut WorldState, kb: &InputState) -> bool {
    let esc = kb.was_pressed(KeyCode::Esc);

    match world.phase() {
        Phase::LevelSelect => {
            let total = world.level_count();
            if kb.any_pressed(KEYS_QUIT) {
                return true;
            }
            if kb.any_pressed(KEYS_UP) && world.select_cursor > 0 {
                world.select_cursor -= 1;
            }
            if kb.any_pressed(KEYS_DOWN) && world.select_cursor + 1 < total {
                world.select_cursor += 1;
            }
            if kb.was_pressed(KeyCode::PageUp) {
                world.select_cursor = world.select_cursor.saturating_sub(10);
            }
            if kb.was_pressed(KeyCode::PageDown) {
                world.select_cursor = (world.select_cursor + 10).min(total.saturating_sub(1));
            }
            if kb.any_pressed(KEYS_RESET) {
                match world.records.reset() {
                    Ok(()) => world.set_message("All records erased", MSG_SHORT),
                    Err(e) => world.set_message(&format!("Reset failed: {e}"), MSG_LONG),
                }
                world.select_cursor = 0;
            }
            if kb.any_pressed(KEYS_CONFIRM) {
                let idx = world.select_cursor;
                if world.is_unlocked(idx) {
                    start_level(world, idx);
                } else {
                    world.set_message("Locked: finish the previous level first", MSG_SHORT);
                }
            }
        }

        Phase::Playing => {
            if esc {
                world.back_to_select();
                return false;
            }
            if kb.any_pressed(KEYS_RESTART) {
                restart_level(world);
                return false;
            }
            if let Screen::Playing(attempt) = &mut world.screen {
                for dir in kb.directions() {
                    attempt.push_intent(dir);
                }
            }
        }

        Phase::Died => {
            if esc {
                world.back_to_select();
            } else if kb.was_pressed(KeyCode::Char(' ')) || kb.any_pressed(KEYS_RESTART) {
                restart_level(world);
            }
        }

        Phase::Complete => {
            if esc {
                world.back_to_select();
            } else if kb.was_pressed(KeyCode::Enter) {
                let next = world.current_index() + 1;
                if next < world.level_count() && world.is_unlocked(next) {
                    start_level(world, next);
                } else {
                    world.back_to_select();
                    world.select_cursor = next.min(world.level_count().saturating_sub(1));
                }
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_keeps_overshoot() {
        let rate = Duration::from_millis(10);
        let t0 = Instant::now();
        // checked 3ms late: the next tick is still due 10ms after the last one
        assert_eq!(next_deadline(t0, rate, t0 + Duration::from_millis(13)), t0 + rate);
        assert_eq!(next_deadline(t0, rate, t0 + rate), t0 + rate);
    }

    #[test]
    fn deadline_averages_the_configured_rate() {
        let rate = Duration::from_millis(10);
        let t0 = Instant::now();
        let mut last = t0;
        let mut now = t0;
        let mut ticks = 0u32;
        // 7ms frames, one check per frame
        while now < t0 + Duration::from_millis(1000) {
            now += Duration::from_millis(7);
            if now.duration_since(last) >= rate {
                ticks += 1;
                last = next_deadline(last, rate, now);
            }
        }
        assert!((99..=100).contains(&ticks), "ticks = {ticks}");
    }

    #[test]
    fn deadline_resyncs_after_a_stall() {
        let rate = Duration::from_millis(10);
        let t0 = Instant::now();
        let late = t0 + Duration::from_millis(500);
        assert_eq!(next_deadline(t0, rate, late), late);
    }
}
