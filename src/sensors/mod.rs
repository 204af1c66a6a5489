//! Sensor suite: temperature probes, oil-level switch, pressure transducer.
//!
//! [`SensorBank`] owns one monitor per physical input and fans a raw sample
//! set from the hardware port out to them each cycle. Health aggregation for
//! the power interlock happens here; probes that never came up are excluded
//! rather than treated as faulty.

pub mod oil_level;
pub mod pressure;
pub mod temperature;

use crate::app::ports::RawSamples;
use crate::config::SystemConfig;
use crate::monitor::HealthLevel;

pub use oil_level::OilLevelMonitor;
pub use pressure::PressureSensor;
pub use temperature::{ProbeStatus, TempProbe};

pub struct SensorBank {
    probes: Vec<TempProbe>,
    oil: OilLevelMonitor,
    pressure: PressureSensor,
}

impl SensorBank {
    pub fn new(cfg: &SystemConfig) -> Self {
        let probes = cfg
            .temp_probes
            .iter()
            .enumerate()
            .map(|(id, pc)| TempProbe::new(id, pc, cfg.sensor_retry_budget))
            .collect();
        Self {
            probes,
            oil: OilLevelMonitor::new(cfg.oil_error_confirm_window_ms),
            pressure: PressureSensor::new(cfg.pressure, cfg.pressure_sample_interval_ms),
        }
    }

    /// Feed one raw sample set. Returns true when any monitor crossed a
    /// health edge this cycle, a hint that the status report is stale.
    ///
    /// An empty or `None` temperature slot means the bus has no new sample
    /// this cycle; the probe is left untouched rather than penalised.
    pub fn update(&mut self, samples: &RawSamples, now_ms: u64) -> bool {
        let mut edged = false;
        for probe in &mut self.probes {
            if let Some(&Some(raw)) = samples.temperatures_c.get(probe.id()) {
                edged |= probe.update(raw, now_ms).is_some();
            }
        }
        edged |= self.oil.update(samples.oil_level_low, now_ms).is_some();
        self.pressure.update(samples.pressure_adc, now_ms);
        edged
    }

    /// Health levels that participate in the power interlock: every probe
    /// that has ever reported, plus the oil-level switch.
    pub fn interlock_healths(&self) -> impl Iterator<Item = HealthLevel> + '_ {
        self.probes
            .iter()
            .filter_map(TempProbe::health)
            .chain(core::iter::once(self.oil.level()))
    }

    pub fn any_error(&self) -> bool {
        self.interlock_healths().any(|h| h == HealthLevel::Error)
    }

    pub fn probes(&self) -> &[TempProbe] {
        &self.probes
    }

    pub fn oil(&self) -> &OilLevelMonitor {
        &self.oil
    }

    pub fn pressure(&self) -> &PressureSensor {
        &self.pressure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::TEMP_DISCONNECTED_C;

    fn samples(t0: f32, t1: f32, oil_low: bool, adc: u16) -> RawSamples {
        let mut temperatures_c = heapless::Vec::new();
        temperatures_c.push(Some(t0)).unwrap();
        temperatures_c.push(Some(t1)).unwrap();
        RawSamples {
            temperatures_c,
            oil_level_low: oil_low,
            pressure_adc: adc,
        }
    }

    #[test]
    fn healthy_samples_produce_no_errors() {
        let cfg = SystemConfig::default();
        let mut bank = SensorBank::new(&cfg);
        assert!(!bank.update(&samples(20.0, 21.0, false, 144), 0));
        assert!(!bank.any_error());
        assert_eq!(bank.interlock_healths().count(), 3);
    }

    #[test]
    fn missing_probe_is_excluded_from_interlock() {
        let cfg = SystemConfig::default();
        let mut bank = SensorBank::new(&cfg);
        // Probe 1 never answers; exhaust its retry budget.
        for i in 0..=u64::from(cfg.sensor_retry_budget) {
            bank.update(&samples(20.0, TEMP_DISCONNECTED_C, false, 144), i * 1_000);
        }
        assert_eq!(bank.probes()[1].status(), ProbeStatus::Unavailable);
        // One live probe plus the oil switch.
        assert_eq!(bank.interlock_healths().count(), 2);
        assert!(!bank.any_error());
    }

    #[test]
    fn pending_bus_samples_do_not_consume_retries() {
        let cfg = SystemConfig::default();
        let mut bank = SensorBank::new(&cfg);
        // Conversion in flight for many cycles: no slots filled at all.
        let pending = RawSamples {
            temperatures_c: heapless::Vec::new(),
            oil_level_low: false,
            pressure_adc: 144,
        };
        for i in 0..100 {
            bank.update(&pending, i * 10);
        }
        assert!(bank
            .probes()
            .iter()
            .all(|p| p.status() == ProbeStatus::Detecting));

        // Explicit None slots are equivalent to missing ones.
        let mut temperatures_c = heapless::Vec::new();
        temperatures_c.push(None).unwrap();
        temperatures_c.push(None).unwrap();
        bank.update(
            &RawSamples {
                temperatures_c,
                oil_level_low: false,
                pressure_adc: 144,
            },
            1_000,
        );
        assert!(bank
            .probes()
            .iter()
            .all(|p| p.status() == ProbeStatus::Detecting));

        // The first completed conversion brings the probes online.
        bank.update(&samples(20.0, 21.0, false, 144), 1_100);
        assert!(bank
            .probes()
            .iter()
            .all(|p| p.status() == ProbeStatus::Online));
    }

    #[test]
    fn confirmed_overheat_raises_bank_error() {
        let cfg = SystemConfig::default();
        let mut bank = SensorBank::new(&cfg);
        assert!(bank.update(&samples(35.0, 20.0, false, 144), 0));
        assert!(!bank.any_error(), "warning only until confirmed");
        assert!(bank.update(&samples(35.0, 20.0, false, 144), 10_000));
        assert!(bank.any_error());
    }

    #[test]
    fn edge_hint_fires_on_oil_transitions() {
        let cfg = SystemConfig::default();
        let mut bank = SensorBank::new(&cfg);
        assert!(bank.update(&samples(20.0, 20.0, true, 144), 0));
        assert!(!bank.update(&samples(20.0, 20.0, true, 144), 1_000));
        assert!(bank.update(&samples(20.0, 20.0, false, 144), 2_000));
    }
}
