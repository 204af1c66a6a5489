//! DS18B20-style temperature probe state.
//!
//! One [`TempProbe`] per configured bus position, self-contained:
//! thresholds, confirm timer and last health all live in the probe (no
//! parallel arrays indexed by sensor number). The bus driver hands the
//! domain a raw Celsius value per cycle; the disconnected sentinel is
//! handled here with a bounded retry budget.
//!
//! Availability rules:
//! - a probe that never produces a reading is declared unavailable after
//!   the retry budget and stays excluded from interlock decisions;
//! - a probe that goes silent after having reported is logged once but
//!   retains its last known health level.

use log::{error, info, warn};

use crate::app::ports::TEMP_DISCONNECTED_C;
use crate::config::ProbeConfig;
use crate::monitor::{HealthEdge, HealthLevel, HysteresisMonitor};

/// Probe availability lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// No reading yet; retries remaining before giving up.
    Detecting,
    /// Never answered; permanently excluded from interlock decisions.
    Unavailable,
    /// Reporting normally.
    Online,
    /// Went silent after having reported; last health level retained.
    Lost,
}

pub struct TempProbe {
    /// Stable small id assigned at configuration time (bus position).
    id: usize,
    label: String,
    monitor: HysteresisMonitor,
    status: ProbeStatus,
    last_temp_c: Option<f32>,
    retry_budget: u8,
    retries_left: u8,
}

impl TempProbe {
    pub fn new(id: usize, cfg: &ProbeConfig, retry_budget: u8) -> Self {
        Self {
            id,
            label: cfg.label.clone(),
            monitor: HysteresisMonitor::new(
                cfg.warn_threshold_c,
                cfg.error_threshold_c,
                cfg.error_confirm_window_ms,
            ),
            status: ProbeStatus::Detecting,
            last_temp_c: None,
            retry_budget,
            retries_left: retry_budget,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    /// Last valid temperature, if the probe ever reported.
    pub fn temperature_c(&self) -> Option<f32> {
        self.last_temp_c
    }

    /// Health for interlock decisions. `None` while the probe has never
    /// reported, excluded rather than silently Ok.
    pub fn health(&self) -> Option<HealthLevel> {
        match self.status {
            ProbeStatus::Detecting | ProbeStatus::Unavailable => None,
            ProbeStatus::Online | ProbeStatus::Lost => Some(self.monitor.level()),
        }
    }

    /// Feed one bus reading. Returns the health edge crossed, if any.
    pub fn update(&mut self, raw_c: f32, now_ms: u64) -> Option<HealthEdge> {
        if raw_c == TEMP_DISCONNECTED_C {
            self.on_missing_reading();
            return None;
        }

        match self.status {
            ProbeStatus::Unavailable => return None,
            ProbeStatus::Detecting => {
                info!("Temperature probe {} ({}) detected", self.id + 1, self.label);
            }
            ProbeStatus::Lost => {
                info!(
                    "Temperature probe {} ({}) is answering again",
                    self.id + 1,
                    self.label
                );
            }
            ProbeStatus::Online => {}
        }
        self.status = ProbeStatus::Online;
        self.retries_left = self.retry_budget;
        self.last_temp_c = Some(raw_c);

        let edge = self.monitor.update(raw_c, now_ms);
        match edge {
            Some(HealthEdge::Warned) => warn!(
                "WARNING: temperature probe {} ({}): temperature is above warning level. \
                 Please check the compressor",
                self.id + 1,
                self.label
            ),
            Some(HealthEdge::Raised) => error!(
                "ERROR: temperature probe {} ({}): temperature is too high, compressor is \
                 disabled. Please check the compressor!",
                self.id + 1,
                self.label
            ),
            Some(HealthEdge::Eased) => warn!(
                "Temperature probe {} ({}): temperature is below error level now, but still \
                 above warning level",
                self.id + 1,
                self.label
            ),
            Some(HealthEdge::Cleared) => info!(
                "Temperature probe {} ({}): temperature is OK now (below warning threshold)",
                self.id + 1,
                self.label
            ),
            None => {}
        }
        edge
    }

    fn on_missing_reading(&mut self) {
        match self.status {
            ProbeStatus::Detecting => {
                if self.retries_left > 0 {
                    self.retries_left -= 1;
                    if self.retries_left == 0 {
                        error!(
                            "Temperature probe {} ({}): not detected at init, excluded from \
                             interlock",
                            self.id + 1,
                            self.label
                        );
                        self.status = ProbeStatus::Unavailable;
                    }
                }
            }
            ProbeStatus::Online => {
                if self.retries_left > 0 {
                    self.retries_left -= 1;
                    if self.retries_left == 0 {
                        warn!(
                            "Temperature probe {} ({}): does not react, keeping last health",
                            self.id + 1,
                            self.label
                        );
                        self.status = ProbeStatus::Lost;
                    }
                }
            }
            ProbeStatus::Unavailable | ProbeStatus::Lost => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::TEMP_DISCONNECTED_C;

    fn probe() -> TempProbe {
        TempProbe::new(
            0,
            &ProbeConfig {
                label: "Compressor".to_string(),
                warn_threshold_c: 28.0,
                error_threshold_c: 30.0,
                error_confirm_window_ms: 10_000,
            },
            3,
        )
    }

    #[test]
    fn never_seen_probe_becomes_permanently_unavailable() {
        let mut p = probe();
        assert_eq!(p.health(), None);
        for t in 0..3 {
            p.update(TEMP_DISCONNECTED_C, t * 1000);
        }
        assert_eq!(p.status(), ProbeStatus::Unavailable);
        // A late reading does not resurrect it.
        p.update(25.0, 10_000);
        assert_eq!(p.status(), ProbeStatus::Unavailable);
        assert_eq!(p.health(), None);
    }

    #[test]
    fn detecting_probe_comes_online_within_budget() {
        let mut p = probe();
        p.update(TEMP_DISCONNECTED_C, 0);
        p.update(25.0, 1_000);
        assert_eq!(p.status(), ProbeStatus::Online);
        assert_eq!(p.health(), Some(HealthLevel::Ok));
        assert_eq!(p.temperature_c(), Some(25.0));
    }

    #[test]
    fn lost_probe_retains_last_health() {
        let mut p = probe();
        p.update(35.0, 0);
        p.update(35.0, 10_000);
        assert_eq!(p.health(), Some(HealthLevel::Error));
        for t in 0..3 {
            p.update(TEMP_DISCONNECTED_C, 11_000 + t * 1000);
        }
        assert_eq!(p.status(), ProbeStatus::Lost);
        assert_eq!(p.health(), Some(HealthLevel::Error));
        assert_eq!(p.temperature_c(), Some(35.0));
    }

    #[test]
    fn lost_probe_recovers_on_next_reading() {
        let mut p = probe();
        p.update(25.0, 0);
        for t in 0..3 {
            p.update(TEMP_DISCONNECTED_C, 1_000 + t * 1000);
        }
        assert_eq!(p.status(), ProbeStatus::Lost);
        p.update(26.0, 10_000);
        assert_eq!(p.status(), ProbeStatus::Online);
        assert_eq!(p.temperature_c(), Some(26.0));
    }

    #[test]
    fn single_missed_reading_is_tolerated() {
        let mut p = probe();
        p.update(25.0, 0);
        p.update(TEMP_DISCONNECTED_C, 1_000);
        assert_eq!(p.status(), ProbeStatus::Online);
        p.update(25.5, 2_000);
        assert_eq!(p.status(), ProbeStatus::Online);
    }
}
