/// Events emitted during a simulation step.
/// The shell consumes these for status messages and the debug log.

use crate::domain::entity::Direction;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameEvent {
    IntentApplied { dir: Direction },
    Moved { x: usize, y: usize },
    Blocked { x: usize, y: usize },
    LeftGrid,
    Collected { x: usize, y: usize, total: u32 },
    TileHardened { x: usize, y: usize },
    TileScheduled { x: usize, y: usize },
    TileRemoved { x: usize, y: usize },
    PlayerKilled { x: usize, y: usize },
    GoalReached { x: usize, y: usize },
}
