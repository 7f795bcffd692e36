use serde::{Deserialize, Serialize};

/// Windows virtual-key code of a keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const Q: KeyCode = KeyCode(0x51);
    pub const W: KeyCode = KeyCode(0x57);
    pub const E: KeyCode = KeyCode(0x45);
    pub const R: KeyCode = KeyCode(0x52);
    pub const T: KeyCode = KeyCode(0x54);
    pub const F: KeyCode = KeyCode(0x46);
    pub const G: KeyCode = KeyCode(0x47);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Key(KeyCode),
    /// Release-then-press of a held mouse button, used to restart a channel.
    MousePulse(MouseButton),
}

/// Delivers synthetic input to the game client. Fire-and-forget: the engine
/// never learns whether the action landed.
pub trait ActionDispatcher {
    fn press_key(&mut self, key: KeyCode);
    fn mouse_down(&mut self, button: MouseButton);
    fn mouse_up(&mut self, button: MouseButton);
}

impl Trigger {
    pub fn dispatch(self, dispatcher: &mut dyn ActionDispatcher) {
        match self {
            Trigger::Key(key) => dispatcher.press_key(key),
            Trigger::MousePulse(button) => {
                // Release first so the receiver sees an edge even if the
                // button is already held.
                dispatcher.mouse_up(button);
                dispatcher.mouse_down(button);
            }
        }
    }
}
