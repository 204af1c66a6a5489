//! Events emitted by the service core toward the outside world.

use crate::interlock::DenyReason;
use crate::machine::{MachineState, PowerOnSource, TransitionCause};
use crate::report::Report;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The machine moved to a new state.
    StateChanged {
        from: MachineState,
        to: MachineState,
        cause: TransitionCause,
    },
    /// Periodic status snapshot, ready for publication.
    Report(Report),
    /// A power-on request was refused by the interlock.
    PowerOnDenied {
        source: PowerOnSource,
        reason: DenyReason,
    },
    /// The on-button is being held toward a late-hours override.
    OverrideArmed { deadline_ms: u64 },
    /// The override hold completed and forced the compressor on.
    OverrideForcedOn,
    /// The on-button was released before the override hold completed.
    OverrideAbandoned,
    /// The auto-off deadline was pushed out by a repeated power-on request.
    TimeoutExtended { deadline_ms: u64 },
    /// Both buttons held: calibration/info mode toggled.
    CalibrationMode { entered: bool },
}
