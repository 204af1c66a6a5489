//! Delayed long-press override gate.
//!
//! When a power-on request is denied purely for the time window, the
//! operator can force the unit on by keeping the on-control asserted for
//! the full override wait. This is the tagged-variant replacement for the
//! boolean-plus-timestamp flag soup of earlier firmware generations:
//!
//! ```text
//!   Idle ──[denied: TimeWindow]──▶ Pending{deadline}
//!   Pending ──[released early]───▶ Idle          (abandoned)
//!   Pending ──[held at deadline]─▶ Expired       (fire: force power-on)
//!   Expired ──[released]─────────▶ Idle
//! ```
//!
//! A request denied for sensor error never arms the gate.

/// Gate state. `Pending` carries the absolute deadline so the whole cycle
/// compares against the single timestamp sampled at cycle start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Pending { deadline_ms: u64 },
    Expired,
}

/// What the caller must do after polling the gate this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    None,
    /// The on-control was released before the deadline.
    Abandoned,
    /// Deadline reached with the on-control still asserted: force power-on,
    /// bypassing the time-window denial only.
    Fire,
}

#[derive(Debug)]
pub struct ManualOverrideGate {
    state: GateState,
    wait_ms: u32,
}

impl ManualOverrideGate {
    pub fn new(wait_ms: u32) -> Self {
        Self {
            state: GateState::Idle,
            wait_ms,
        }
    }

    /// Arm the gate after a time-window denial. Returns `true` if a new
    /// override attempt started (the caller then flashes the power
    /// indicator). A gate already pending or expired is left alone.
    pub fn arm(&mut self, now_ms: u64) -> bool {
        if self.state == GateState::Idle {
            self.state = GateState::Pending {
                deadline_ms: now_ms + u64::from(self.wait_ms),
            };
            true
        } else {
            false
        }
    }

    /// Advance the gate by one cycle with the current debounced on-control
    /// level.
    pub fn poll(&mut self, now_ms: u64, on_control_held: bool) -> GateAction {
        match self.state {
            GateState::Idle => GateAction::None,
            GateState::Pending { deadline_ms } => {
                if !on_control_held {
                    self.state = GateState::Idle;
                    GateAction::Abandoned
                } else if now_ms >= deadline_ms {
                    self.state = GateState::Expired;
                    GateAction::Fire
                } else {
                    GateAction::None
                }
            }
            // Terminal for this request; re-arms only after release.
            GateState::Expired => {
                if !on_control_held {
                    self.state = GateState::Idle;
                }
                GateAction::None
            }
        }
    }

    /// True while an override attempt is counting down.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, GateState::Pending { .. })
    }
}
