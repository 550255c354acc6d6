/// Input state tracker.
///
/// Collects the key presses of one frame, in arrival order:
///   - Directional keys become movement intents
///   - Everything else is matched by the screen handlers (confirm, retry, quit)
///
/// Release events are ignored. Key repeat produces repeated presses, which
/// the movement queue already refuses as duplicates.

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::Direction;

pub struct InputState {
    /// Keys pressed during the most recent drain_events() call.
    presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for modifier checks.
    pub raw_events: Vec<KeyEvent>,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
        }
    }

    /// Drain all pending terminal events.
    /// Call this once per frame, before simulation ticks.
    pub fn drain_events(&mut self) {
        self.presses.clear();
        self.raw_events.clear();

        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                self.raw_events.push(key);
                self.presses.push(key.code);
            }
        }
    }

    /// Was this key pressed this frame?
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.presses.contains(&code)
    }

    /// Convenience: was any of these keys pressed?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Directional presses of this frame, oldest first.
    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.presses.iter().filter_map(|&code| direction_for(code))
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

/// Arrow keys and WASD.
pub fn direction_for(code: KeyCode) -> Option<Direction> {
    match code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(Direction::Up),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(Direction::Down),
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(Direction::Left),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(Direction::Right),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_and_wasd() {
        assert_eq!(direction_for(KeyCode::Up), Some(Direction::Up));
        assert_eq!(direction_for(KeyCode::Char('a')), Some(Direction::Left));
        assert_eq!(direction_for(KeyCode::Char('S')), Some(Direction::Down));
        assert_eq!(direction_for(KeyCode::Right), Some(Direction::Right));
        assert_eq!(direction_for(KeyCode::Char('r')), None);
        assert_eq!(direction_for(KeyCode::Enter), None);
    }

    #[test]
    fn directions_keep_press_order() {
        let mut input = InputState::new();
        input.presses = vec![KeyCode::Char('d'), KeyCode::Enter, KeyCode::Up];
        let dirs: Vec<Direction> = input.directions().collect();
        assert_eq!(dirs, vec![Direction::Right, Direction::Up]);
        assert!(input.was_pressed(KeyCode::Enter));
        assert!(input.any_pressed(&[KeyCode::Esc, KeyCode::Up]));
        assert!(!input.ctrl_c_pressed());
    }
}
