//! Power-on interlock policy.
//!
//! A pure function combining current sensor health and the time-of-day
//! restriction into an allow/deny decision. It is re-evaluated on every
//! power-on attempt (button, remote command, override expiry) and never
//! cached across cycles, since sensor health and the hour both change
//! asynchronously.

use crate::monitor::HealthLevel;

/// Why a power-on request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    None,
    /// At least one sensor has confirmed Error health. Never overridable.
    SensorError,
    /// Inside the configured late-hours window. Overridable via the
    /// long-press gate.
    TimeWindow,
}

/// The outcome of one interlock evaluation. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterlockDecision {
    pub allowed: bool,
    pub reason: DenyReason,
}

impl InterlockDecision {
    pub const ALLOW: Self = Self {
        allowed: true,
        reason: DenyReason::None,
    };

    pub fn denied(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// True when `hour` falls inside the restriction window. A window whose
/// start is not below its end wraps midnight (e.g. 23→5).
pub fn window_blocks(hour: u8, window_start: u8, window_end: u8) -> bool {
    if window_start < window_end {
        hour >= window_start && hour < window_end
    } else {
        hour >= window_start || hour < window_end
    }
}

/// Evaluate the interlock for one power-on attempt.
///
/// `current_hour` is `None` when the wall clock has not synced yet; the
/// time-window restriction is then skipped (the sensor gate still applies).
/// Sensor healths must only include probes that have ever reported; a
/// never-initialised probe is excluded by its bank, not silently Ok here.
pub fn evaluate(
    sensor_healths: impl IntoIterator<Item = HealthLevel>,
    current_hour: Option<u8>,
    late_hours_enabled: bool,
    window_start: u8,
    window_end: u8,
) -> InterlockDecision {
    if sensor_healths
        .into_iter()
        .any(|h| h == HealthLevel::Error)
    {
        return InterlockDecision::denied(DenyReason::SensorError);
    }

    if late_hours_enabled {
        if let Some(hour) = current_hour {
            if window_blocks(hour, window_start, window_end) {
                return InterlockDecision::denied(DenyReason::TimeWindow);
            }
        }
    }

    InterlockDecision::ALLOW
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::HealthLevel::{Error, Ok as HOk, Warning};

    #[test]
    fn allows_when_healthy_and_outside_window() {
        let d = evaluate([HOk, HOk], Some(10), true, 4, 5);
        assert!(d.allowed);
        assert_eq!(d.reason, DenyReason::None);
    }

    #[test]
    fn warning_does_not_block() {
        // Only confirmed Error health blocks power-on.
        let d = evaluate([Warning, HOk], Some(10), true, 4, 5);
        assert!(d.allowed);
    }

    #[test]
    fn sensor_error_blocks_regardless_of_hour() {
        let d = evaluate([HOk, Error], Some(10), true, 4, 5);
        assert!(!d.allowed);
        assert_eq!(d.reason, DenyReason::SensorError);
    }

    #[test]
    fn sensor_error_takes_priority_over_window() {
        let d = evaluate([Error], Some(4), true, 4, 5);
        assert_eq!(d.reason, DenyReason::SensorError);
    }

    #[test]
    fn window_blocks_during_late_hours() {
        let d = evaluate([HOk], Some(4), true, 4, 5);
        assert!(!d.allowed);
        assert_eq!(d.reason, DenyReason::TimeWindow);
        // End hour is exclusive.
        assert!(evaluate([HOk], Some(5), true, 4, 5).allowed);
    }

    #[test]
    fn window_ignored_when_disabled() {
        let d = evaluate([HOk], Some(4), false, 4, 5);
        assert!(d.allowed);
    }

    #[test]
    fn window_may_wrap_midnight() {
        assert!(window_blocks(23, 23, 5));
        assert!(window_blocks(0, 23, 5));
        assert!(window_blocks(4, 23, 5));
        assert!(!window_blocks(5, 23, 5));
        assert!(!window_blocks(12, 23, 5));
    }

    #[test]
    fn unsynced_clock_skips_window_check() {
        let d = evaluate([HOk], None, true, 4, 5);
        assert!(d.allowed);
        // But never the sensor gate.
        assert!(!evaluate([Error], None, true, 4, 5).allowed);
    }

    #[test]
    fn no_probes_means_no_sensor_block() {
        let d = evaluate([], Some(10), true, 4, 5);
        assert!(d.allowed);
    }
}
