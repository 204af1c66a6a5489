//! Oil-level monitor.
//!
//! The oil sensor is a debounced digital switch, not a numeric probe:
//! "too low" is immediately a Warning, confirmed to Error after its own
//! window, and cleared to Ok the instant the level recovers. The boolean
//! is mapped onto the shared [`HysteresisMonitor`] as a 0/1 level so both
//! tiers behave exactly like the temperature path.

use log::{error, info, warn};

use crate::monitor::{HealthEdge, HealthLevel, HysteresisMonitor};

pub struct OilLevelMonitor {
    monitor: HysteresisMonitor,
}

impl OilLevelMonitor {
    pub fn new(error_confirm_window_ms: u32) -> Self {
        // Thresholds chosen so that "too low" (1.0) sits above both tiers
        // and "ok" (0.0) below both.
        Self {
            monitor: HysteresisMonitor::new(0.5, 0.5, error_confirm_window_ms),
        }
    }

    pub fn level(&self) -> HealthLevel {
        self.monitor.level()
    }

    /// True while the switch reports too-low (Warning or Error).
    pub fn is_too_low(&self) -> bool {
        self.monitor.level() != HealthLevel::Ok
    }

    /// Feed the debounced switch level for this cycle.
    pub fn update(&mut self, too_low: bool, now_ms: u64) -> Option<HealthEdge> {
        let edge = self
            .monitor
            .update(if too_low { 1.0 } else { 0.0 }, now_ms);
        match edge {
            Some(HealthEdge::Warned) => warn!(
                "Warning: Oil level is too low; Compressor will be disabled soon if this \
                 issue is not solved"
            ),
            Some(HealthEdge::Raised) => error!(
                "ERROR: Oil level is too low; Compressor will be disabled; Please maintain \
                 the compressor by filling up the oil"
            ),
            Some(HealthEdge::Cleared) => info!("Oil level is OK now!"),
            // The 0/1 mapping cannot ease from Error without clearing fully.
            Some(HealthEdge::Eased) | None => {}
        }
        edge
    }
}
