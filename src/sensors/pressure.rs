//! Analog pressure transducer (0.5-4.5 V ratiometric, read through the ADC).
//!
//! The transducer is informational only: its reading goes into the status
//! report but never into the power interlock. Conversion runs in two steps,
//! raw ADC count to sensor voltage using the two calibration points, then
//! voltage to pressure over the 4 V span.

use crate::config::PressureCalibration;

pub struct PressureSensor {
    cal: PressureCalibration,
    sample_interval_ms: u32,
    last_sample_ms: Option<u64>,
    last_adc: u16,
    last_pressure_mpa: f32,
}

impl PressureSensor {
    pub fn new(cal: PressureCalibration, sample_interval_ms: u32) -> Self {
        Self {
            cal,
            sample_interval_ms,
            last_sample_ms: None,
            last_adc: cal.adc_at_0v5,
            last_pressure_mpa: 0.0,
        }
    }

    /// Convert a raw ADC count to pressure in MPa.
    ///
    /// Counts below the 0.5 V calibration point are clamped to zero rather
    /// than reported as negative pressure.
    pub fn pressure_from_adc(&self, adc: u16) -> f32 {
        let adc = adc.max(self.cal.adc_at_0v5);
        let span = f32::from(self.cal.adc_at_4v5 - self.cal.adc_at_0v5);
        let volts = f32::from(adc - self.cal.adc_at_0v5) * 4.0 / span + 0.5;
        (volts - 0.5) / 4.0 * self.cal.full_scale_mpa
    }

    /// Feed the ADC reading for this cycle. Readings between sample
    /// deadlines are ignored so the reported value stays steady.
    pub fn update(&mut self, adc: u16, now_ms: u64) {
        let due = match self.last_sample_ms {
            None => true,
            Some(at) => now_ms.saturating_sub(at) >= u64::from(self.sample_interval_ms),
        };
        if due {
            self.last_sample_ms = Some(now_ms);
            self.last_adc = adc;
            self.last_pressure_mpa = self.pressure_from_adc(adc);
        }
    }

    pub fn pressure_mpa(&self) -> f32 {
        self.last_pressure_mpa
    }

    pub fn last_adc(&self) -> u16 {
        self.last_adc
    }

    pub fn calibration(&self) -> &PressureCalibration {
        &self.cal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor() -> PressureSensor {
        PressureSensor::new(PressureCalibration::default(), 1_000)
    }

    #[test]
    fn zero_point_maps_to_zero_mpa() {
        let s = sensor();
        assert!(s.pressure_from_adc(144).abs() < 1e-6);
    }

    #[test]
    fn full_scale_maps_to_rated_pressure() {
        let s = sensor();
        let p = s.pressure_from_adc(2600);
        assert!((p - 1.2).abs() < 1e-5, "got {p}");
    }

    #[test]
    fn midpoint_is_half_scale() {
        let s = sensor();
        let p = s.pressure_from_adc((144 + 2600) / 2);
        assert!((p - 0.6).abs() < 1e-3, "got {p}");
    }

    #[test]
    fn counts_below_zero_point_clamp() {
        let s = sensor();
        assert!(s.pressure_from_adc(0).abs() < 1e-6);
        assert!(s.pressure_from_adc(100).abs() < 1e-6);
    }

    #[test]
    fn samples_respect_interval() {
        let mut s = sensor();
        s.update(2600, 0);
        let p = s.pressure_mpa();
        s.update(144, 500);
        assert_eq!(s.pressure_mpa(), p, "mid-interval reading must be held");
        s.update(144, 1_000);
        assert!(s.pressure_mpa().abs() < 1e-6);
    }
}
