/// The step function: advances an attempt by one tick.
///
/// Processing order:
///   1. Consolidation (idle player takes one queued intent)
///   2. Alive-tick counter
///   3. Deferred tile removal
///   4. Entry evaluation (domain::rules)
///   5. Tile mutation + status effect
///   6. Commit or halt
///
/// A dead or winning player is frozen: the step returns immediately and
/// touches neither the grid nor the player.

use crate::domain::entity::Status;
use crate::domain::rules::{self, Entry};
use crate::domain::tile::{Tile, TileEffect};
use super::event::GameEvent;
use super::world::Attempt;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(attempt: &mut Attempt) -> Vec<GameEvent> {
    if attempt.is_terminal() { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();

    resolve_consolidation(attempt, &mut events);
    resolve_timer(attempt);
    if attempt.player.moving {
        resolve_pending_removal(attempt, &mut events);
        resolve_movement(attempt, &mut events);
    }

    events
}

// ══════════════════════════════════════════════════════════════
// Consolidation + timer
// ══════════════════════════════════════════════════════════════

fn resolve_consolidation(attempt: &mut Attempt, events: &mut Vec<GameEvent>) {
    if attempt.player.moving { return; }
    if let Some(dir) = attempt.player.consolidate() {
        events.push(GameEvent::IntentApplied { dir });
    }
}

/// The clock starts with the first tick of movement and then runs every
/// tick until the attempt ends, idle or not.
fn resolve_timer(attempt: &mut Attempt) {
    let p = &mut attempt.player;
    if p.moving || p.timer_started {
        p.timer_started = true;
        p.alive_ticks += 1;
    }
}

// ══════════════════════════════════════════════════════════════
// Tile side effects
// ══════════════════════════════════════════════════════════════

fn resolve_pending_removal(attempt: &mut Attempt, events: &mut Vec<GameEvent>) {
    for (x, y) in std::mem::take(&mut attempt.player.pending_removal) {
        attempt.grid.set(x, y, Tile::Empty);
        events.push(GameEvent::TileRemoved { x, y });
    }
}

fn resolve_movement(attempt: &mut Attempt, events: &mut Vec<GameEvent>) {
    let p = &attempt.player;
    let entry = rules::evaluate_entry(&attempt.grid, p.x, p.y, p.x_vel, p.y_vel);

    let commit = entry.commits();
    let Entry::Cell { x, y, becomes, effect, .. } = entry else {
        attempt.player.halt();
        events.push(GameEvent::LeftGrid);
        return;
    };

    if let Some(tile) = becomes {
        attempt.grid.set(x, y, tile);
        if tile == Tile::Wall {
            events.push(GameEvent::TileHardened { x, y });
        }
    }

    apply_effect(attempt, effect, x, y, events);

    if commit {
        attempt.player.x = x;
        attempt.player.y = y;
        events.push(GameEvent::Moved { x, y });
    } else {
        attempt.player.halt();
        events.push(GameEvent::Blocked { x, y });
    }
}

fn apply_effect(attempt: &mut Attempt, effect: TileEffect, x: usize, y: usize, events: &mut Vec<GameEvent>) {
    let p = &mut attempt.player;
    match effect {
        TileEffect::None => {}
        TileEffect::Collect => {
            p.collected += 1;
            events.push(GameEvent::Collected { x, y, total: p.collected });
        }
        TileEffect::Win => {
            log::debug!("goal reached at ({x}, {y}) after {} ticks", p.alive_ticks);
            p.status = Status::Won;
            events.push(GameEvent::GoalReached { x, y });
        }
        TileEffect::Kill => {
            log::debug!("player killed entering ({x}, {y})");
            p.status = Status::Dead;
            events.push(GameEvent::PlayerKilled { x, y });
        }
        TileEffect::ScheduleRemoval => {
            p.pending_removal.push((x, y));
            events.push(GameEvent::TileScheduled { x, y });
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Direction, Motion, Player};
    use crate::domain::grid::TileGrid;

    fn attempt_from(rows: &[&str], spawn: (usize, usize)) -> Attempt {
        let grid = TileGrid::from_sketch(rows);
        let collectible_total = grid.collectible_count();
        Attempt {
            level_id: "test".to_string(),
            grid,
            player: Player::new(spawn.0, spawn.1, 1),
            collectible_total,
        }
    }

    /// Queue `dir` and step until the glide ends or the attempt is over.
    fn slide(a: &mut Attempt, dir: Direction) -> Vec<GameEvent> {
        a.player.push_intent(dir);
        let mut all = vec![];
        for _ in 0..200 {
            all.extend(step(a));
            if a.player.status.is_terminal() { break; }
            if !a.player.moving && a.player.queue.is_empty() { break; }
        }
        all
    }

    fn pos(a: &Attempt) -> (usize, usize) {
        (a.player.x, a.player.y)
    }

    #[test]
    fn reaches_goal_in_two_ticks() {
        let mut a = attempt_from(&["  $"], (0, 0));
        a.player.push_intent(Direction::Right);
        a.player.push_intent(Direction::Right); // repeat, ignored
        step(&mut a);
        step(&mut a);
        assert_eq!(pos(&a), (2, 0));
        assert_eq!(a.player.status(), Status::Won);
        assert_eq!(a.player.alive_ticks, 2);
    }

    #[test]
    fn hazard_kills_without_moving() {
        let mut a = attempt_from(&[" X"], (0, 0));
        a.player.push_intent(Direction::Right);
        let events = step(&mut a);
        assert_eq!(a.player.status(), Status::Dead);
        assert_eq!(pos(&a), (0, 0));
        assert!(events.contains(&GameEvent::PlayerKilled { x: 1, y: 0 }));
        assert!(events.contains(&GameEvent::Blocked { x: 1, y: 0 }));
    }

    #[test]
    fn idle_player_does_not_tick() {
        let mut a = attempt_from(&["   "], (0, 0));
        for _ in 0..5 {
            assert!(step(&mut a).is_empty());
        }
        assert_eq!(a.player.alive_ticks, 0);
        assert_eq!(a.player.motion(), Motion::Idle);
    }

    #[test]
    fn clock_keeps_running_after_first_move() {
        let mut a = attempt_from(&["  #"], (0, 0));
        a.player.push_intent(Direction::Right);
        step(&mut a); // (1,0)
        step(&mut a); // blocked by wall, halts
        assert_eq!(a.player.motion(), Motion::Idle);
        step(&mut a);
        step(&mut a);
        assert_eq!(a.player.alive_ticks, 4);
    }

    #[test]
    fn glide_stops_at_wall() {
        let mut a = attempt_from(&["     #"], (0, 0));
        let events = slide(&mut a, Direction::Right);
        assert_eq!(pos(&a), (4, 0));
        assert_eq!((a.player.x_vel, a.player.y_vel), (0, 0));
        assert!(!a.player.moving);
        assert_eq!(events.iter().filter(|e| matches!(e, GameEvent::Moved { .. })).count(), 4);
        assert_eq!(events.last(), Some(&GameEvent::Blocked { x: 5, y: 0 }));
    }

    #[test]
    fn glide_stops_at_grid_edge() {
        let mut a = attempt_from(&[], (60, 10));
        let events = slide(&mut a, Direction::Right);
        assert_eq!(pos(&a), (63, 10));
        assert_eq!(events.last(), Some(&GameEvent::LeftGrid));

        let mut a = attempt_from(&[], (5, 2));
        slide(&mut a, Direction::Up);
        assert_eq!(pos(&a), (5, 0));
        assert_eq!(a.player.status(), Status::Alive);
    }

    #[test]
    fn collectibles_counted_and_cleared() {
        let mut a = attempt_from(&[" ++ +#"], (0, 0));
        slide(&mut a, Direction::Right);
        assert_eq!(a.player.collected, 3);
        assert_eq!(a.collectible_total, 3);
        for x in 0..5 {
            assert_eq!(a.grid.get(x, 0), Tile::Empty);
        }
    }

    #[test]
    fn softening_tile_becomes_wall() {
        // spawn at (0,1); O at (1,1); wall at (3,1)
        let mut a = attempt_from(&[
            "    ",
            " O #",
            "    ",
        ], (0, 1));
        let events = slide(&mut a, Direction::Right);
        assert!(events.contains(&GameEvent::TileHardened { x: 1, y: 1 }));
        assert_eq!(pos(&a), (2, 1));
        assert_eq!(a.grid.get(1, 1), Tile::Wall);

        // coming back from the other side: now blocked
        slide(&mut a, Direction::Left);
        assert_eq!(pos(&a), (2, 1));

        slide(&mut a, Direction::Up);
        slide(&mut a, Direction::Left);
        assert_eq!(pos(&a), (0, 0));
        slide(&mut a, Direction::Down);
        assert_eq!(pos(&a), (0, 63));
    }

    #[test]
    fn softening_blocks_vertical_entry() {
        let mut a = attempt_from(&[
            " ",
            "O",
            " ",
            "#",
        ], (0, 0));
        slide(&mut a, Direction::Down);
        assert_eq!(pos(&a), (0, 2));
        slide(&mut a, Direction::Up);
        assert_eq!(pos(&a), (0, 2));
        assert_eq!(a.grid.get(0, 1), Tile::Wall);
    }

    #[test]
    fn transient_tile_cleared_by_blocked_step() {
        // the step that hits the wall still counts as a movement step
        let mut a = attempt_from(&["  ~#"], (0, 0));
        a.player.push_intent(Direction::Right);
        step(&mut a);
        let events = step(&mut a);
        assert_eq!(events, vec![
            GameEvent::TileScheduled { x: 2, y: 0 },
            GameEvent::Moved { x: 2, y: 0 },
        ]);
        assert_eq!(a.grid.get(2, 0), Tile::Transient);
        assert_eq!(a.player.pending_removal, vec![(2, 0)]);

        let events = step(&mut a);
        assert_eq!(events, vec![
            GameEvent::TileRemoved { x: 2, y: 0 },
            GameEvent::Blocked { x: 3, y: 0 },
        ]);
        assert_eq!(pos(&a), (2, 0));
        assert_eq!(a.grid.get(2, 0), Tile::Empty);
        assert!(a.player.pending_removal.is_empty());
    }

    #[test]
    fn transient_tile_vanishes_behind_a_glide() {
        let mut a = attempt_from(&[" ~   #"], (0, 0));
        a.player.push_intent(Direction::Right);
        step(&mut a);
        assert_eq!(pos(&a), (1, 0));
        assert_eq!(a.grid.get(1, 0), Tile::Transient);
        step(&mut a);
        assert_eq!(pos(&a), (2, 0));
        assert_eq!(a.grid.get(1, 0), Tile::Empty);
    }

    #[test]
    fn terminal_states_freeze_everything() {
        let mut a = attempt_from(&[" X"], (0, 0));
        slide(&mut a, Direction::Right);
        assert_eq!(a.player.status(), Status::Dead);
        let before = (pos(&a), a.player.x_vel, a.player.y_vel, a.player.collected, a.player.alive_ticks);
        a.player.push_intent(Direction::Down);
        for _ in 0..10 {
            assert!(step(&mut a).is_empty());
        }
        let after = (pos(&a), a.player.x_vel, a.player.y_vel, a.player.collected, a.player.alive_ticks);
        assert_eq!(before, after);

        let mut a = attempt_from(&[" $+"], (0, 0));
        slide(&mut a, Direction::Right);
        assert_eq!(a.player.status(), Status::Won);
        let ticks = a.player.alive_ticks;
        for _ in 0..10 { step(&mut a); }
        assert_eq!(pos(&a), (1, 0));
        assert_eq!(a.player.collected, 0);
        assert_eq!(a.player.alive_ticks, ticks);
        assert_eq!(a.grid.get(2, 0), Tile::Collectible);
    }

    #[test]
    fn intent_buffered_during_glide() {
        let mut a = attempt_from(&[
            "    #",
            "     ",
        ], (0, 0));
        a.player.push_intent(Direction::Right);
        step(&mut a); // consolidated, at (1,0)
        assert!(a.player.push_intent(Direction::Down));
        assert!(!a.player.push_intent(Direction::Left)); // queue full
        step(&mut a); // (2,0)
        step(&mut a); // (3,0)
        step(&mut a); // blocked
        assert_eq!(pos(&a), (3, 0));
        let events = step(&mut a);
        assert_eq!(events.first(), Some(&GameEvent::IntentApplied { dir: Direction::Down }));
        assert_eq!(pos(&a), (3, 1));
    }

    #[test]
    fn collected_never_exceeds_total() {
        let rows = [
            "  +  ",
            " + + ",
            "+ X +",
            " + + ",
            "  +  ",
        ];
        let script = [
            Direction::Right, Direction::Down, Direction::Left, Direction::Up,
            Direction::Right, Direction::Down, Direction::Left, Direction::Up,
        ];
        let mut a = attempt_from(&rows, (0, 0));
        let mut last = 0;
        for dir in script {
            for _ in 0..80 {
                step(&mut a);
                assert!(a.player.collected >= last);
                last = a.player.collected;
            }
            a.player.push_intent(dir);
        }
        assert!(a.player.collected as usize <= a.collectible_total);
    }

    #[test]
    fn identical_scripts_replay_identically() {
        let rows = [
            "      +     #",
            " O   ~   +   ",
            "   #     ~  +",
            "+    #       ",
            "  X       $  ",
        ];
        let script: Vec<(u32, Direction)> = vec![
            (0, Direction::Right),
            (3, Direction::Down),
            (20, Direction::Left),
            (41, Direction::Up),
            (42, Direction::Right),
            (90, Direction::Down),
            (130, Direction::Right),
        ];
        let run = || {
            let mut a = attempt_from(&rows, (0, 0));
            let mut all = vec![];
            for tick in 0..300u32 {
                for &(at, dir) in &script {
                    if at == tick { a.player.push_intent(dir); }
                }
                all.extend(step(&mut a));
            }
            (a.player.alive_ticks, a.player.collected, a.player.status(), pos(&a), a.grid, all)
        };
        assert_eq!(run(), run());
    }
}
