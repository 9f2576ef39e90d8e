//! Keyboard input tracking.
//!
//! Only what the frame loop needs: enough state to notice a quit key. Full
//! input-device abstraction belongs to the application layer.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Tracks which keys are held and which were pressed this iteration.
#[derive(Debug, Default)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
    just_pressed: HashSet<KeyCode>,
}

impl InputState {
    /// Create an empty input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the top of each loop iteration to age per-frame state.
    pub fn begin_frame(&mut self) {
        self.just_pressed.clear();
    }

    /// Handle a key press event.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    /// Handle a key release event.
    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    /// Whether a key is currently held.
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// Whether a key went down during the current iteration.
    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Escape);
        assert!(input.is_pressed(KeyCode::Escape));
        assert!(input.just_pressed(KeyCode::Escape));

        input.on_key_released(KeyCode::Escape);
        assert!(!input.is_pressed(KeyCode::Escape));
    }

    #[test]
    fn just_pressed_ages_out() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Escape);
        input.begin_frame();
        assert!(input.is_pressed(KeyCode::Escape));
        assert!(!input.just_pressed(KeyCode::Escape));
    }

    #[test]
    fn held_key_is_not_just_pressed_again() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        input.begin_frame();
        // Key repeat delivers another press while the key is still down.
        input.on_key_pressed(KeyCode::KeyW);
        assert!(!input.just_pressed(KeyCode::KeyW));
    }
}
