use std::collections::HashMap;
use winit::keyboard::KeyCode;

/// Held-key map keyed by DOM-style key codes ("KeyW", "ArrowUp", ...).
#[derive(Debug, Default)]
pub struct InputState {
    held: HashMap<String, bool>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, code: &str) {
        self.held.insert(code.to_owned(), true);
    }

    pub fn key_up(&mut self, code: &str) {
        self.held.insert(code.to_owned(), false);
    }

    pub fn is_held(&self, code: &str) -> bool {
        self.held.get(code).copied().unwrap_or(false)
    }

    /// Drops every held key, used when the window loses focus and the
    /// matching key-up events will never arrive.
    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

/// Winit's `KeyCode` variant names are the same strings the browser puts in
/// `KeyboardEvent.code`, so its `Debug` output is the tracker key.
pub fn key_code_name(code: KeyCode) -> String {
    format!("{:?}", code)
}

/// Which key codes drive each movement axis.
#[derive(Debug, Clone)]
pub struct MovementKeys {
    pub forward: &'static [&'static str],
    pub backward: &'static [&'static str],
    pub left: &'static [&'static str],
    pub right: &'static [&'static str],
}

impl Default for MovementKeys {
    fn default() -> Self {
        Self {
            forward: &["KeyW", "ArrowUp"],
            backward: &["KeyS", "ArrowDown"],
            left: &["KeyA", "ArrowLeft"],
            right: &["KeyD", "ArrowRight"],
        }
    }
}

impl MovementKeys {
    pub fn forward(&self, input: &InputState) -> bool {
        any_held(input, self.forward)
    }

    pub fn backward(&self, input: &InputState) -> bool {
        any_held(input, self.backward)
    }

    pub fn left(&self, input: &InputState) -> bool {
        any_held(input, self.left)
    }

    pub fn right(&self, input: &InputState) -> bool {
        any_held(input, self.right)
    }
}

fn any_held(input: &InputState, codes: &[&str]) -> bool {
    codes.iter().any(|code| input.is_held(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_down_then_up_toggles_held_flag() {
        let mut input = InputState::new();
        assert!(!input.is_held("KeyW"));

        input.key_down("KeyW");
        assert!(input.is_held("KeyW"));

        input.key_up("KeyW");
        assert!(!input.is_held("KeyW"));
    }

    #[test]
    fn unknown_codes_are_stored_but_do_not_move() {
        let mut input = InputState::new();
        input.key_down("F13");
        assert!(input.is_held("F13"));

        let keys = MovementKeys::default();
        assert!(!keys.forward(&input));
        assert!(!keys.backward(&input));
        assert!(!keys.left(&input));
        assert!(!keys.right(&input));
    }

    #[test]
    fn release_all_clears_every_key() {
        let mut input = InputState::new();
        input.key_down("KeyW");
        input.key_down("KeyD");
        input.release_all();
        assert!(!input.is_held("KeyW"));
        assert!(!input.is_held("KeyD"));
    }

    #[test]
    fn winit_key_codes_match_browser_codes() {
        assert_eq!(key_code_name(KeyCode::KeyW), "KeyW");
        assert_eq!(key_code_name(KeyCode::ArrowLeft), "ArrowLeft");
    }

    #[test]
    fn arrow_keys_are_alternate_bindings() {
        let mut input = InputState::new();
        input.key_down("ArrowUp");
        assert!(MovementKeys::default().forward(&input));
    }
}
