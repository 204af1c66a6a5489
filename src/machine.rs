//! Machine-state model and top-level controller.
//!
//! Table-driven state machine in the classic embedded style: one
//! [`StateDescriptor`] row per state carrying the display label, the
//! maximum dwell time and the fail-over target reached when dwell expires.
//! The controller owns the current state, the entry timestamp and the
//! auto-power-off deadline; every transition is reported to the caller as
//! a [`Transition`] so the service can drive duration accounting, logging
//! and the report sink from a single place.
//!
//! ```text
//!   Booting ──connect──▶ SwitchedOff ──power-on + interlock──▶ Powered
//!                             ▲                                  │ ▲
//!       off / sensor error /  │                           opto   │ │ opto
//!       auto-timeout / stop ──┘                           load   ▼ │ gone
//!                                                              Running
//!
//!   any ──disconnect──▶ NoConnection ──120 s──▶ Reboot (external restart)
//! ```

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// All machine states. Ordering is load-bearing: `Powered < Running`, and a
/// state is *energized* (relay closed) exactly when it is `>= Powered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MachineState {
    Booting = 0,
    OutOfOrder = 1,
    Reboot = 2,
    TransientError = 3,
    NoConnection = 4,
    SwitchedOff = 5,
    Powered = 6,
    Running = 7,
}

impl MachineState {
    /// Total number of states; sizes the descriptor table.
    pub const COUNT: usize = 8;

    /// True while the relay is commanded closed.
    pub fn is_energized(self) -> bool {
        self >= Self::Powered
    }

    /// Display label from the descriptor table.
    pub fn label(self) -> &'static str {
        descriptor(self).label
    }
}

// ---------------------------------------------------------------------------
// State descriptor table
// ---------------------------------------------------------------------------

/// Static per-state metadata. Built once, immutable thereafter.
pub struct StateDescriptor {
    pub state: MachineState,
    /// Human-readable label used on the display and in reports.
    pub label: &'static str,
    /// Maximum dwell time before the fail-over transition; `None` = never.
    pub max_dwell_ms: Option<u32>,
    /// Where to go when dwell expires.
    pub failover: MachineState,
}

/// Dwell budget shared by all transient states.
const TRANSIENT_DWELL_MS: u32 = 120 * 1000;

/// The full state table, indexed by `MachineState as usize`.
pub static STATE_TABLE: [StateDescriptor; MachineState::COUNT] = [
    StateDescriptor {
        state: MachineState::Booting,
        label: "Booting",
        max_dwell_ms: Some(TRANSIENT_DWELL_MS),
        failover: MachineState::Reboot,
    },
    StateDescriptor {
        state: MachineState::OutOfOrder,
        label: "Out of order",
        max_dwell_ms: Some(TRANSIENT_DWELL_MS),
        failover: MachineState::Reboot,
    },
    StateDescriptor {
        state: MachineState::Reboot,
        label: "Rebooting",
        max_dwell_ms: Some(TRANSIENT_DWELL_MS),
        failover: MachineState::Reboot,
    },
    StateDescriptor {
        state: MachineState::TransientError,
        label: "Transient Error",
        max_dwell_ms: Some(TRANSIENT_DWELL_MS),
        failover: MachineState::Reboot,
    },
    StateDescriptor {
        state: MachineState::NoConnection,
        label: "No network",
        max_dwell_ms: Some(TRANSIENT_DWELL_MS),
        failover: MachineState::Reboot,
    },
    StateDescriptor {
        state: MachineState::SwitchedOff,
        label: "Compressor switched off",
        max_dwell_ms: None,
        failover: MachineState::SwitchedOff,
    },
    StateDescriptor {
        state: MachineState::Powered,
        label: "Powered - motor off",
        max_dwell_ms: None,
        failover: MachineState::Powered,
    },
    StateDescriptor {
        state: MachineState::Running,
        label: "Powered - motor running",
        max_dwell_ms: None,
        failover: MachineState::Running,
    },
];

/// Descriptor row for a state.
pub fn descriptor(state: MachineState) -> &'static StateDescriptor {
    &STATE_TABLE[state as usize]
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// How a power-on request reached the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOnSource {
    Button,
    Remote,
    /// Long-press override expiry (time-window denial bypassed).
    Override,
}

/// Why an energized state was left for `SwitchedOff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOffCause {
    Button,
    Remote,
    /// Confirmed sensor Error health. Unconditional, highest priority.
    SensorError,
    /// The auto-power-off deadline elapsed with no extend event.
    AutoTimeout,
}

/// What triggered a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    DwellTimeout,
    NetworkConnected,
    NetworkDisconnected,
    FatalError,
    PowerOn(PowerOnSource),
    PowerOff(PowerOffCause),
    MotorLoad,
    MotorUnload,
}

/// One observed state change, surfaced to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: MachineState,
    pub to: MachineState,
    pub cause: TransitionCause,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the current state, the dwell clock and the auto-power-off deadline.
pub struct MachineStateController {
    state: MachineState,
    /// Cycle timestamp at which the current state was entered.
    entered_at_ms: u64,
    /// Armed while energized; re-armed (never stacked) by extend events.
    auto_off_deadline_ms: Option<u64>,
    auto_timeout_ms: u32,
}

impl MachineStateController {
    pub fn new(auto_timeout_ms: u32, now_ms: u64) -> Self {
        Self {
            state: MachineState::Booting,
            entered_at_ms: now_ms,
            auto_off_deadline_ms: None,
            auto_timeout_ms,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Elapsed time in the current state.
    pub fn dwell_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_at_ms)
    }

    /// The armed auto-power-off deadline, if energized.
    pub fn auto_off_deadline_ms(&self) -> Option<u64> {
        self.auto_off_deadline_ms
    }

    // ── Per-cycle checks (priority order is the caller's contract) ──

    /// Highest-priority check: a confirmed sensor Error while energized is
    /// an unconditional, immediate shutdown.
    pub fn check_sensor_shutdown(&mut self, any_error: bool, now_ms: u64) -> Option<Transition> {
        if any_error && self.state.is_energized() {
            self.transition_to(
                MachineState::SwitchedOff,
                TransitionCause::PowerOff(PowerOffCause::SensorError),
                now_ms,
            )
        } else {
            None
        }
    }

    /// Auto-power-off deadline comparison.
    pub fn check_auto_timeout(&mut self, now_ms: u64) -> Option<Transition> {
        if !self.state.is_energized() {
            return None;
        }
        match self.auto_off_deadline_ms {
            Some(deadline) if now_ms > deadline => self.transition_to(
                MachineState::SwitchedOff,
                TransitionCause::PowerOff(PowerOffCause::AutoTimeout),
                now_ms,
            ),
            _ => None,
        }
    }

    /// Dwell-time fail-over from the descriptor table. Fires exactly once
    /// dwell is exceeded, never earlier.
    pub fn check_dwell(&mut self, now_ms: u64) -> Option<Transition> {
        let desc = descriptor(self.state);
        let max = desc.max_dwell_ms?;
        if self.dwell_ms(now_ms) > u64::from(max) {
            self.transition_to(desc.failover, TransitionCause::DwellTimeout, now_ms)
        } else {
            None
        }
    }

    // ── Event entry points ──

    /// Network (re)connected. Only a non-energized controller parks in
    /// `SwitchedOff`; a connection blip while powered is not a shutdown.
    pub fn on_connected(&mut self, now_ms: u64) -> Option<Transition> {
        if self.state.is_energized() || self.state == MachineState::SwitchedOff {
            return None;
        }
        self.transition_to(
            MachineState::SwitchedOff,
            TransitionCause::NetworkConnected,
            now_ms,
        )
    }

    /// Network lost: any state drops to `NoConnection` (de-energizing).
    pub fn on_disconnected(&mut self, now_ms: u64) -> Option<Transition> {
        self.transition_to(
            MachineState::NoConnection,
            TransitionCause::NetworkDisconnected,
            now_ms,
        )
    }

    /// Collaborator-reported fatal error.
    pub fn on_fatal_error(&mut self, now_ms: u64) -> Option<Transition> {
        self.transition_to(
            MachineState::TransientError,
            TransitionCause::FatalError,
            now_ms,
        )
    }

    /// Granted power-on request. The caller has already evaluated the
    /// interlock. Only `SwitchedOff` energizes; an already-energized
    /// controller re-arms the deadline instead (idempotent entry).
    pub fn power_on(&mut self, source: PowerOnSource, now_ms: u64) -> Option<Transition> {
        if self.state.is_energized() {
            self.extend(now_ms);
            return None;
        }
        if self.state != MachineState::SwitchedOff {
            return None;
        }
        let t = self.transition_to(
            MachineState::Powered,
            TransitionCause::PowerOn(source),
            now_ms,
        );
        self.auto_off_deadline_ms = Some(now_ms + u64::from(self.auto_timeout_ms));
        t
    }

    /// Re-arm the auto-power-off deadline (hold-to-extend / repeated
    /// remote poweron). Replaces the deadline, never stacks.
    pub fn extend(&mut self, now_ms: u64) {
        if self.state.is_energized() {
            self.auto_off_deadline_ms = Some(now_ms + u64::from(self.auto_timeout_ms));
        }
    }

    /// Operator or remote power-off.
    pub fn power_off(&mut self, cause: PowerOffCause, now_ms: u64) -> Option<Transition> {
        if !self.state.is_energized() {
            return None;
        }
        self.transition_to(
            MachineState::SwitchedOff,
            TransitionCause::PowerOff(cause),
            now_ms,
        )
    }

    /// Motor-current-sense ("opto") feedback: load toggles
    /// `Powered ⇄ Running`. The auto-off deadline is untouched.
    pub fn set_motor_load(&mut self, load: bool, now_ms: u64) -> Option<Transition> {
        match (self.state, load) {
            (MachineState::Powered, true) => {
                self.transition_to(MachineState::Running, TransitionCause::MotorLoad, now_ms)
            }
            (MachineState::Running, false) => {
                self.transition_to(MachineState::Powered, TransitionCause::MotorUnload, now_ms)
            }
            _ => None,
        }
    }

    // ── Internal ──

    fn transition_to(
        &mut self,
        to: MachineState,
        cause: TransitionCause,
        now_ms: u64,
    ) -> Option<Transition> {
        if to == self.state {
            return None;
        }
        let from = self.state;
        self.state = to;
        self.entered_at_ms = now_ms;
        if !to.is_energized() {
            self.auto_off_deadline_ms = None;
        }
        Some(Transition { from, to, cause })
    }
}
