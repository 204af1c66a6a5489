//! Level debouncer for the panel buttons and the oil-level switch.
//!
//! Pure state machine over (level, now); the hardware adapter feeds raw GPIO
//! levels every cycle and reads back the stable level plus edges.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed,
    Released,
}

pub struct Debouncer {
    stable_window_ms: u32,
    stable: bool,
    candidate: bool,
    candidate_since_ms: u64,
}

impl Debouncer {
    pub fn new(stable_window_ms: u32, initial: bool) -> Self {
        Self {
            stable_window_ms,
            stable: initial,
            candidate: initial,
            candidate_since_ms: 0,
        }
    }

    /// Debounced level as of the last update.
    pub fn level(&self) -> bool {
        self.stable
    }

    /// Feed one raw sample. Returns the edge if the stable level flipped.
    pub fn update(&mut self, raw: bool, now_ms: u64) -> Option<ButtonEdge> {
        if raw != self.candidate {
            self.candidate = raw;
            self.candidate_since_ms = now_ms;
            return None;
        }
        if raw == self.stable {
            return None;
        }
        if now_ms.saturating_sub(self.candidate_since_ms) >= u64::from(self.stable_window_ms) {
            self.stable = raw;
            return Some(if raw {
                ButtonEdge::Pressed
            } else {
                ButtonEdge::Released
            });
        }
        None
    }
}
