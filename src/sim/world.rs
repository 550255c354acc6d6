/// WorldState: the complete snapshot of a running game.
///
/// ## Screens
///
/// Navigation is a single `Screen` value replaced by the top-level
/// dispatcher. Screens that show a level own their `Attempt`; leaving for
/// the level select drops it.
///
/// ## Attempts
///
/// An `Attempt` owns its own copy of the level map. Tiles collected,
/// hardened or removed during one attempt never leak into the next:
/// restarting throws the attempt away and clones the cached level again.
///
/// ## Camera / Viewport
///
/// World coordinates and screen coordinates are separate:
///   - `camera`: viewport into the world (top-left corner + size)
///   - Renderer maps: `screen(sx, sy) = world(camera.x + sx, camera.y + sy)`
///   - Camera follows the player with a dead-zone approach
///   - Maps smaller than the viewport are centered

use crate::config::GameConfig;
use crate::domain::entity::{Direction, Player, Status};
use crate::domain::grid::TileGrid;
use crate::error::{LoadError, StoreError};
use super::level::{self, LevelLibrary};
use super::records::{CompletionRecord, RecordStore};

/// One run of one level, from spawn to a terminal status.
#[derive(Clone, Debug)]
pub struct Attempt {
    pub level_id: String,
    pub grid: TileGrid,
    pub player: Player,
    pub collectible_total: usize,
}

impl Attempt {
    /// Queue a directional intent for the player. Refused once the attempt
    /// is over.
    pub fn push_intent(&mut self, dir: Direction) -> bool {
        self.player.push_intent(dir)
    }

    pub fn is_terminal(&self) -> bool {
        self.player.status().is_terminal()
    }
}

#[derive(Debug)]
pub enum Screen {
    LevelSelect,
    Playing(Attempt),
    Died(Attempt),
    Complete {
        attempt: Attempt,
        /// The run replaced the stored record.
        new_best: bool,
    },
}

/// Payload-free tag of a `Screen`, for change detection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    LevelSelect,
    Playing,
    Died,
    Complete,
}

impl Screen {
    pub fn phase(&self) -> Phase {
        match self {
            Screen::LevelSelect => Phase::LevelSelect,
            Screen::Playing(_) => Phase::Playing,
            Screen::Died(_) => Phase::Died,
            Screen::Complete { .. } => Phase::Complete,
        }
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        match self {
            Screen::LevelSelect => None,
            Screen::Playing(a) | Screen::Died(a) | Screen::Complete { attempt: a, .. } => Some(a),
        }
    }
}

/// Camera: a viewport into the world.
///
/// `(x, y)` is the world coordinate of the top-left visible cell.
/// `(view_w, view_h)` is how many world cells fit in the viewport.
/// These are computed from terminal size and set during `render()`.
#[derive(Clone, Debug)]
pub struct Camera {
    pub x: i32,
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    pub fn new() -> Self {
        Camera { x: 0, y: 0, view_w: 0, view_h: 0 }
    }

    /// Follow a target with a dead zone: only scroll when the target comes
    /// within 20% of a viewport edge.
    pub fn follow(&mut self, target_x: usize, target_y: usize, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = follow_axis(self.x, self.view_w, target_x, world_w);
        self.y = follow_axis(self.y, self.view_h, target_y, world_h);
    }

    /// Snap directly onto a position. Used when an attempt starts.
    pub fn center_on(&mut self, target_x: usize, target_y: usize, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = center_axis(self.view_w, target_x, world_w);
        self.y = center_axis(self.view_h, target_y, world_h);
    }
}

fn follow_axis(origin: i32, view: usize, target: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    let margin = view as i32 / 5;
    let t = target as i32;
    let mut origin = origin;
    if t < origin + margin {
        origin = t - margin;
    } else if t > origin + view as i32 - margin - 1 {
        origin = t - view as i32 + margin + 1;
    }
    origin.clamp(0, world as i32 - view as i32)
}

fn center_axis(view: usize, target: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    (target as i32 - view as i32 / 2).clamp(0, world as i32 - view as i32)
}

pub struct WorldState {
    // ── Levels + records ──
    pub library: LevelLibrary,
    pub records: RecordStore,
    pub unlock_all: bool,
    pub queue_capacity: usize,
    pub fps: u32,

    pub screen: Screen,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
    pub anim_tick: u32,
    pub camera: Camera,

    // ── Level select ──
    pub select_cursor: usize,
    pub select_scroll: usize,
}

impl WorldState {
    pub fn new(library: LevelLibrary, records: RecordStore, config: &GameConfig) -> Self {
        WorldState {
            library,
            records,
            unlock_all: config.unlock_all,
            queue_capacity: config.movement.queue_capacity,
            fps: config.speed.fps,
            screen: Screen::LevelSelect,
            message: String::new(),
            message_timer: 0,
            anim_tick: 0,
            camera: Camera::new(),
            select_cursor: 0,
            select_scroll: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.screen.phase()
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    /// Count down the message bar. Called once per tick.
    pub fn tick_message(&mut self) {
        if self.message_timer > 0 {
            self.message_timer -= 1;
            if self.message_timer == 0 {
                self.message.clear();
            }
        }
    }

    pub fn level_count(&self) -> usize {
        self.library.len()
    }

    /// Level `idx` is playable when it is the first level, when the level
    /// before it has a stored record, or when everything is unlocked.
    pub fn is_unlocked(&self, idx: usize) -> bool {
        if self.unlock_all || idx == 0 {
            return true;
        }
        self.library.ids()
            .get(idx - 1)
            .is_some_and(|prev| self.records.get(prev).is_some())
    }

    pub fn best_for(&self, level_id: &str) -> Option<&CompletionRecord> {
        self.records.get(level_id)
    }

    /// Start a fresh attempt on level `idx` and switch to `Playing`.
    pub fn begin_attempt(&mut self, idx: usize) -> Result<(), LoadError> {
        let id = self.library.ids()
            .get(idx)
            .cloned()
            .ok_or_else(|| LoadError::UnknownLevel(format!("#{}", idx + 1)))?;
        let attempt = level::start_attempt(&mut self.library, &id, self.queue_capacity)?;
        let (sx, sy) = (attempt.player.x, attempt.player.y);
        self.camera.center_on(sx, sy, attempt.grid.width(), attempt.grid.height());
        self.screen = Screen::Playing(attempt);
        self.select_cursor = idx;
        Ok(())
    }

    /// Throw away the current attempt and start the same level again.
    pub fn restart_attempt(&mut self) -> Result<(), LoadError> {
        self.begin_attempt(self.current_index())
    }

    /// Index of the level on screen, or the select cursor.
    pub fn current_index(&self) -> usize {
        self.screen.attempt()
            .and_then(|a| self.library.position(&a.level_id))
            .unwrap_or(self.select_cursor)
    }

    pub fn back_to_select(&mut self) {
        self.screen = Screen::LevelSelect;
    }

    /// Move a finished attempt to its end screen. A win goes through the
    /// record store first; the attempt reaches `Complete` even when the
    /// store cannot be written.
    pub fn finish_attempt(&mut self, completed_at: i64) -> Result<(), StoreError> {
        let status = match &self.screen {
            Screen::Playing(a) => a.player.status(),
            _ => return Ok(()),
        };
        if status == Status::Alive {
            return Ok(());
        }
        let Screen::Playing(attempt) = std::mem::replace(&mut self.screen, Screen::LevelSelect) else {
            return Ok(());
        };

        if status == Status::Dead {
            log::info!("level {}: died after {} ticks", attempt.level_id, attempt.player.alive_ticks);
            self.screen = Screen::Died(attempt);
            return Ok(());
        }

        let recorded = self.records.record_completion(&attempt.level_id, &attempt.player, completed_at);
        let new_best = matches!(recorded, Ok(true));
        self.screen = Screen::Complete { attempt, new_best };
        recorded.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::step::step;

    fn world() -> WorldState {
        WorldState::new(LevelLibrary::builtin(), RecordStore::in_memory(), &GameConfig::default())
    }

    #[test]
    fn starts_on_level_select() {
        let w = world();
        assert_eq!(w.phase(), Phase::LevelSelect);
        assert!(w.screen.attempt().is_none());
        assert!(w.is_unlocked(0));
        assert_eq!(w.level_count(), 1);
    }

    #[test]
    fn begin_and_restart_give_fresh_attempts() {
        let mut w = world();
        w.begin_attempt(0).unwrap();
        assert_eq!(w.phase(), Phase::Playing);
        {
            let Screen::Playing(a) = &mut w.screen else { panic!("not playing") };
            a.push_intent(Direction::Right);
            for _ in 0..20 { step(a); }
            assert!(a.player.collected > 0);
        }
        w.restart_attempt().unwrap();
        let a = w.screen.attempt().unwrap();
        assert_eq!(a.player.collected, 0);
        assert_eq!(a.player.status(), Status::Alive);
        assert_eq!(a.player.alive_ticks, 0);
    }

    #[test]
    fn unknown_index_is_an_error() {
        let mut w = world();
        assert!(matches!(w.begin_attempt(5), Err(LoadError::UnknownLevel(_))));
        assert_eq!(w.phase(), Phase::LevelSelect);
    }

    /// Two-level library: "1" has its goal two cells right of the spawn,
    /// "2" a hazard right next to it.
    fn two_level_world(dir: &std::path::Path) -> WorldState {
        let mut goal = vec![vec![0; 64]; 64];
        goal[0][2] = 5;
        let mut hazard = vec![vec![0; 64]; 64];
        hazard[0][1] = 3;
        for (id, map) in [("1", goal), ("2", hazard)] {
            let json = serde_json::json!({ "playerSpawn": [0, 0], "levelMap": map });
            std::fs::write(dir.join(format!("{id}.json")), json.to_string()).unwrap();
        }
        WorldState::new(LevelLibrary::scan(dir), RecordStore::in_memory(), &GameConfig::default())
    }

    fn play_right(w: &mut WorldState, ticks: usize) {
        if let Screen::Playing(a) = &mut w.screen {
            a.push_intent(Direction::Right);
        }
        for _ in 0..ticks {
            if let Screen::Playing(a) = &mut w.screen {
                step(a);
            }
            w.finish_attempt(1_700_000_000).unwrap();
        }
    }

    #[test]
    fn win_records_and_unlocks_next_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = two_level_world(dir.path());
        assert!(!w.is_unlocked(1));

        w.begin_attempt(0).unwrap();
        play_right(&mut w, 5);
        let Screen::Complete { attempt, new_best } = &w.screen else { panic!("not complete") };
        assert!(*new_best);
        assert_eq!(attempt.player.alive_ticks, 2);
        assert_eq!(w.best_for("1").map(|r| r.timer), Some(2));
        assert!(w.is_unlocked(1));

        // same time again: no new best
        w.restart_attempt().unwrap();
        play_right(&mut w, 5);
        assert!(matches!(w.screen, Screen::Complete { new_best: false, .. }));
    }

    #[test]
    fn unsaved_win_does_not_unlock() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = two_level_world(dir.path());
        let store_path = dir.path().join("store").join("records.json");
        w.records = RecordStore::open(&store_path).unwrap();
        std::fs::remove_file(&store_path).unwrap();
        std::fs::create_dir(&store_path).unwrap();

        w.begin_attempt(0).unwrap();
        if let Screen::Playing(a) = &mut w.screen {
            a.push_intent(Direction::Right);
        }
        let mut failed = false;
        for _ in 0..5 {
            if let Screen::Playing(a) = &mut w.screen {
                step(a);
            }
            failed |= w.finish_attempt(0).is_err();
        }
        assert!(failed);
        assert!(matches!(w.screen, Screen::Complete { new_best: false, .. }));
        assert!(w.best_for("1").is_none());
        assert!(!w.is_unlocked(1));
    }

    #[test]
    fn death_moves_to_died_screen() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = two_level_world(dir.path());
        w.begin_attempt(1).unwrap();
        play_right(&mut w, 3);
        assert_eq!(w.phase(), Phase::Died);
        assert_eq!(w.current_index(), 1);
        assert!(w.best_for("2").is_none());

        w.restart_attempt().unwrap();
        assert_eq!(w.phase(), Phase::Playing);
        w.back_to_select();
        assert!(w.screen.attempt().is_none());
    }

    #[test]
    fn finish_is_a_no_op_while_alive() {
        let mut w = world();
        w.finish_attempt(0).unwrap();
        assert_eq!(w.phase(), Phase::LevelSelect);
        w.begin_attempt(0).unwrap();
        w.finish_attempt(0).unwrap();
        assert_eq!(w.phase(), Phase::Playing);
    }

    #[test]
    fn message_expires() {
        let mut w = world();
        w.set_message("hello", 2);
        w.tick_message();
        assert_eq!(w.message, "hello");
        w.tick_message();
        assert!(w.message.is_empty());
    }

    #[test]
    fn camera_centers_small_worlds_and_clamps_large() {
        let mut cam = Camera::new();
        cam.view_w = 80;
        cam.view_h = 20;
        cam.center_on(0, 0, 64, 64);
        assert_eq!(cam.x, -8);
        assert_eq!(cam.y, 0);
        cam.center_on(63, 63, 64, 64);
        assert_eq!(cam.y, 44);
    }

    #[test]
    fn camera_follow_scrolls_near_edges() {
        let mut cam = Camera::new();
        cam.view_w = 20;
        cam.view_h = 20;
        cam.center_on(0, 0, 64, 64);
        assert_eq!((cam.x, cam.y), (0, 0));
        cam.follow(10, 10, 64, 64);
        assert_eq!((cam.x, cam.y), (0, 0));
        cam.follow(17, 0, 64, 64);
        assert_eq!(cam.x, 2);
        cam.follow(63, 0, 64, 64);
        assert_eq!(cam.x, 44);
    }
}
