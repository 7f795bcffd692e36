use engine::{ActionDispatcher, KeyCode, MouseButton, Trigger};
use tracing::{debug, info};

/// Logs synthetic input instead of sending it to an OS and queues it for the
/// simulated world to react to after the frame.
#[derive(Debug, Default)]
pub(crate) struct SimDispatcher {
    pending: Vec<Trigger>,
    total_dispatched: u64,
}

impl SimDispatcher {
    pub(crate) fn drain(&mut self) -> Vec<Trigger> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn total_dispatched(&self) -> u64 {
        self.total_dispatched
    }
}

impl ActionDispatcher for SimDispatcher {
    fn press_key(&mut self, key: KeyCode) {
        info!(key = key.0, "key_pressed");
        self.pending.push(Trigger::Key(key));
        self.total_dispatched += 1;
    }

    fn mouse_down(&mut self, button: MouseButton) {
        info!(button = ?button, "mouse_pressed");
        self.pending.push(Trigger::MousePulse(button));
        self.total_dispatched += 1;
    }

    fn mouse_up(&mut self, button: MouseButton) {
        debug!(button = ?button, "mouse_released");
    }
}
