/// Player entity and its movement queue.
/// The state machine is tiny: Idle, Moving, Dead, Won.

use std::collections::VecDeque;

/// Movement direction. One intent = one direction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Grid-step delta (dx, dy). Row 0 is the top of the map.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up    => (0, -1),
            Direction::Down  => (0, 1),
            Direction::Left  => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Terminal status reported to the shell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Alive,
    Dead,
    Won,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        self != Status::Alive
    }
}

/// Full player state machine, derived from status + moving flag.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Motion {
    Idle,
    Moving,
    Dead,
    Won,
}

/// Bounded FIFO of pending intents.
///
/// An intent is refused when the queue is full, or when it repeats the last
/// accepted intent. The last accepted intent outlives its dequeue, so a
/// held or re-pressed key cannot flood the queue.
#[derive(Clone, Debug)]
pub struct MovementQueue {
    pending: VecDeque<Direction>,
    capacity: usize,
    last: Option<Direction>,
}

impl MovementQueue {
    /// Capacity below 1 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        MovementQueue {
            pending: VecDeque::with_capacity(capacity),
            capacity,
            last: None,
        }
    }

    /// Returns true if the intent was accepted.
    pub fn enqueue(&mut self, dir: Direction) -> bool {
        if self.pending.len() >= self.capacity {
            return false;
        }
        if self.last == Some(dir) {
            return false;
        }
        self.last = Some(dir);
        self.pending.push_back(dir);
        true
    }

    pub fn dequeue(&mut self) -> Option<Direction> {
        self.pending.pop_front()
    }

    #[cfg(test)]
    pub fn last_intent(&self) -> Option<Direction> {
        self.last
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub x: usize,
    pub y: usize,
    pub x_vel: i32,
    pub y_vel: i32,
    pub moving: bool,
    pub queue: MovementQueue,
    pub status: Status,
    pub collected: u32,
    /// Ticks elapsed since the first movement began.
    pub alive_ticks: u64,
    pub timer_started: bool,
    /// Cells cleared at the start of the next movement step.
    pub pending_removal: Vec<(usize, usize)>,
}

impl Player {
    pub fn new(x: usize, y: usize, queue_capacity: usize) -> Self {
        Player {
            x, y,
            x_vel: 0,
            y_vel: 0,
            moving: false,
            queue: MovementQueue::new(queue_capacity),
            status: Status::Alive,
            collected: 0,
            alive_ticks: 0,
            timer_started: false,
            pending_removal: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn motion(&self) -> Motion {
        match self.status {
            Status::Dead => Motion::Dead,
            Status::Won => Motion::Won,
            Status::Alive if self.moving => Motion::Moving,
            Status::Alive => Motion::Idle,
        }
    }

    /// Queue a directional intent. Ignored once the player is dead or has won.
    pub fn push_intent(&mut self, dir: Direction) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.queue.enqueue(dir)
    }

    /// Move the oldest intent into velocity. Returns the applied direction.
    pub fn consolidate(&mut self) -> Option<Direction> {
        let dir = self.queue.dequeue()?;
        let (dx, dy) = dir.delta();
        self.x_vel += dx;
        self.y_vel += dy;
        self.moving = true;
        Some(dir)
    }

    pub fn halt(&mut self) {
        self.moving = false;
        self.x_vel = 0;
        self.y_vel = 0;
    }

    /// Whole seconds on the clock at the given tick rate.
    pub fn elapsed_seconds(&self, fps: u32) -> u64 {
        self.alive_ticks / u64::from(fps.max(1))
    }
}
