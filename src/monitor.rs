//! Two-tier debounced health monitor.
//!
//! Converts a raw measurement stream into a three-level health signal.
//! The Warning tier is immediate in both directions; the Error tier is
//! asymmetric:
//!
//! ```text
//!            raw > error threshold, continuously for confirm window
//!   Warning ────────────────────────────────────────────────▶ Error
//!      ▲  ◀──────────────────────────────────────────────────── │
//!      │        raw <= error threshold (instant, no debounce)
//!      │
//!      ▼  raw <= warning threshold (instant, both directions)
//!     Ok
//! ```
//!
//! A dip below the error threshold before the window completes voids the
//! pending confirmation entirely; the timer restarts from zero on the next
//! excursion. Both temperature probes and the oil-level sensor share this
//! monitor; the oil sensor feeds it a 0/1 level (see `sensors::oil_level`).

/// Health of one monitored quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthLevel {
    Ok,
    Warning,
    Error,
}

/// Edge events produced by [`HysteresisMonitor::update`]. The controller
/// uses these to log once per transition and to request an immediate
/// display/report refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEdge {
    /// Quantity rose above the warning threshold.
    Warned,
    /// Error confirmed: quantity stayed above the error threshold for the
    /// full confirm window.
    Raised,
    /// Quantity dropped back under the error threshold; still Warning.
    Eased,
    /// Quantity back under the warning threshold; health is Ok again.
    Cleared,
}

/// Two-tier monitor with an error-confirmation window.
#[derive(Debug, Clone)]
pub struct HysteresisMonitor {
    warn_threshold: f32,
    error_threshold: f32,
    confirm_window_ms: u32,
    level: HealthLevel,
    /// Start of the current above-error excursion; unset while below.
    error_since_ms: Option<u64>,
}

impl HysteresisMonitor {
    pub fn new(warn_threshold: f32, error_threshold: f32, confirm_window_ms: u32) -> Self {
        Self {
            warn_threshold,
            error_threshold,
            confirm_window_ms,
            level: HealthLevel::Ok,
            error_since_ms: None,
        }
    }

    /// Current health level.
    pub fn level(&self) -> HealthLevel {
        self.level
    }

    /// Feed one raw sample. `now_ms` is the cycle timestamp sampled once at
    /// cycle start. Returns the edge crossed this update, if any.
    pub fn update(&mut self, raw: f32, now_ms: u64) -> Option<HealthEdge> {
        if raw <= self.warn_threshold {
            self.error_since_ms = None;
            let was = self.level;
            self.level = HealthLevel::Ok;
            return (was != HealthLevel::Ok).then_some(HealthEdge::Cleared);
        }

        if raw <= self.error_threshold {
            // Back under the error threshold: a pending confirmation is
            // voided, and a confirmed Error clears to Warning immediately.
            self.error_since_ms = None;
            let was = self.level;
            self.level = HealthLevel::Warning;
            return match was {
                HealthLevel::Ok => Some(HealthEdge::Warned),
                HealthLevel::Warning => None,
                HealthLevel::Error => Some(HealthEdge::Eased),
            };
        }

        // Above the error threshold.
        if self.level == HealthLevel::Error {
            return None;
        }
        let warned = self.level == HealthLevel::Ok;
        self.level = HealthLevel::Warning;

        let since = *self.error_since_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(since) >= u64::from(self.confirm_window_ms) {
            self.level = HealthLevel::Error;
            return Some(HealthEdge::Raised);
        }
        warned.then_some(HealthEdge::Warned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WARN: f32 = 28.0;
    const ERR: f32 = 30.0;
    const WINDOW: u32 = 10_000;

    fn monitor() -> HysteresisMonitor {
        HysteresisMonitor::new(WARN, ERR, WINDOW)
    }

    #[test]
    fn stays_ok_below_warning() {
        let mut m = monitor();
        assert_eq!(m.update(20.0, 0), None);
        assert_eq!(m.update(27.9, 1_000), None);
        assert_eq!(m.level(), HealthLevel::Ok);
    }

    #[test]
    fn warning_band_is_immediate_and_never_errors() {
        let mut m = monitor();
        assert_eq!(m.update(29.0, 0), Some(HealthEdge::Warned));
        for t in 1..20 {
            assert_eq!(m.update(29.0, t * 10_000), None);
        }
        assert_eq!(m.level(), HealthLevel::Warning);
    }

    #[test]
    fn error_only_after_full_window() {
        let mut m = monitor();
        assert_eq!(m.update(35.0, 0), Some(HealthEdge::Warned));
        assert_eq!(m.level(), HealthLevel::Warning);
        assert_eq!(m.update(35.0, 9_999), None);
        assert_eq!(m.level(), HealthLevel::Warning);
        assert_eq!(m.update(35.0, 10_000), Some(HealthEdge::Raised));
        assert_eq!(m.level(), HealthLevel::Error);
    }

    #[test]
    fn dip_voids_pending_confirmation() {
        let mut m = monitor();
        m.update(35.0, 0);
        m.update(35.0, 9_000);
        // Drop into the warning band just before confirmation.
        assert_eq!(m.update(29.5, 9_500), None);
        // Rising again restarts the window from scratch.
        m.update(35.0, 10_000);
        assert_eq!(m.update(35.0, 19_999), None);
        assert_eq!(m.level(), HealthLevel::Warning);
        assert_eq!(m.update(35.0, 20_000), Some(HealthEdge::Raised));
    }

    #[test]
    fn confirmed_error_eases_then_clears() {
        let mut m = monitor();
        m.update(35.0, 0);
        m.update(35.0, WINDOW as u64);
        assert_eq!(m.level(), HealthLevel::Error);
        // Back under the error threshold: Warning instantly.
        assert_eq!(m.update(29.0, 20_000), Some(HealthEdge::Eased));
        assert_eq!(m.level(), HealthLevel::Warning);
        // Under the warning threshold: Ok instantly, no debounce.
        assert_eq!(m.update(20.0, 20_001), Some(HealthEdge::Cleared));
        assert_eq!(m.level(), HealthLevel::Ok);
    }

    #[test]
    fn error_to_ok_in_one_step() {
        let mut m = monitor();
        m.update(35.0, 0);
        m.update(35.0, WINDOW as u64);
        assert_eq!(m.update(10.0, 30_000), Some(HealthEdge::Cleared));
        assert_eq!(m.level(), HealthLevel::Ok);
    }

    #[test]
    fn error_is_stable_while_hot() {
        let mut m = monitor();
        m.update(35.0, 0);
        m.update(35.0, WINDOW as u64);
        assert_eq!(m.update(40.0, 60_000), None);
        assert_eq!(m.level(), HealthLevel::Error);
    }
}

#[cfg(test)]
#[cfg(not(target_os = "espidf"))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Error is reachable only after the value stayed continuously above
        /// the error threshold for at least the confirm window.
        #[test]
        fn no_premature_error(samples in proptest::collection::vec((0.0f32..40.0, 1u64..2_000), 1..200)) {
            let mut m = HysteresisMonitor::new(28.0, 30.0, 10_000);
            let mut now = 0u64;
            let mut above_since: Option<u64> = None;

            for (raw, dt) in samples {
                now += dt;
                if raw > 30.0 {
                    above_since.get_or_insert(now);
                } else {
                    above_since = None;
                }
                let edge = m.update(raw, now);
                if edge == Some(HealthEdge::Raised) {
                    let since = above_since.expect("Raised while not above error threshold");
                    prop_assert!(now - since >= 10_000,
                        "Error confirmed after only {}ms", now - since);
                }
                if raw <= 30.0 {
                    prop_assert_ne!(m.level(), HealthLevel::Error);
                }
                if raw <= 28.0 {
                    prop_assert_eq!(m.level(), HealthLevel::Ok);
                }
            }
        }
    }
}
