//! System configuration parameters
//!
//! All tunable parameters for the compressor node. Values mirror the
//! deployment at the reference installation; they can be overridden via the
//! persisted config blob before the control loop starts.

use serde::{Deserialize, Serialize};

/// Per-probe temperature thresholds. The probe count is deployment
/// configuration: each probe gets its own thresholds and confirm window,
/// indexed by a stable small id assigned at startup (its position in
/// [`SystemConfig::temp_probes`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Label used in logging and reporting (e.g. "Compressor", "Motor").
    pub label: String,
    /// Temperature above which the probe health is at least Warning (°C).
    pub warn_threshold_c: f32,
    /// Temperature above which an Error confirmation starts (°C).
    pub error_threshold_c: f32,
    /// Continuous time above the error threshold before Error is confirmed.
    pub error_confirm_window_ms: u32,
}

/// Two-point ADC calibration for the 0.5–4.5 V ratiometric pressure sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PressureCalibration {
    /// ADC counts measured at 0.5 V sensor output.
    pub adc_at_0v5: u16,
    /// ADC counts measured at 4.5 V sensor output.
    pub adc_at_4v5: u16,
    /// Sensor full-scale pressure (MPa) at 4.5 V.
    pub full_scale_mpa: f32,
}

impl Default for PressureCalibration {
    /// Calibration of the sensor fitted at the reference installation
    /// (1.2 MPa full scale behind a resistive divider).
    fn default() -> Self {
        Self {
            adc_at_0v5: 144,
            adc_at_4v5: 2600,
            full_scale_mpa: 1.2,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Temperature probes ---
    /// One entry per connected DS18B20-style probe, in bus index order.
    pub temp_probes: Vec<ProbeConfig>,
    /// Read retries before a probe is reported unavailable.
    pub sensor_retry_budget: u8,

    // --- Oil level ---
    /// Continuous too-low time before the oil Warning is confirmed to Error.
    pub oil_error_confirm_window_ms: u32,

    // --- Pressure ---
    pub pressure: PressureCalibration,
    /// Pressure ADC sample cadence (milliseconds).
    pub pressure_sample_interval_ms: u32,

    // --- Interlock / time window ---
    /// Whether the late-hours window restriction is enforced at all.
    pub late_hours_enabled: bool,
    /// Hour (0-23) from which automatic/manual power-on is blocked.
    pub disabled_window_start_hour: u8,
    /// Hour (0-23) up to which power-on is blocked. May be below the start
    /// hour, in which case the window wraps midnight.
    pub disabled_window_end_hour: u8,

    // --- Manual override ---
    /// How long the on-control must stay asserted to override a
    /// time-window denial (milliseconds).
    pub override_wait_ms: u32,
    /// Power-indicator flash period while an override is pending.
    pub override_blink_period_ms: u32,
    /// How long the denied-power-on flash is shown.
    pub override_blink_duration_ms: u32,

    // --- Indicators ---
    /// Blink period of both LEDs while switched off with a confirmed
    /// sensor error.
    pub error_blink_period_ms: u32,

    // --- Power timing ---
    /// Auto power-off deadline armed on every power-on or extend event.
    pub auto_timeout_ms: u32,

    // --- Persistence / reporting ---
    /// Duration-counter flush cadence (seconds).
    pub flush_interval_secs: u32,
    /// Status report / logging cadence (milliseconds).
    pub report_interval_ms: u32,
    /// How long both controls must be held to toggle calibration/info mode.
    pub calibration_hold_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            temp_probes: vec![
                ProbeConfig {
                    label: "Compressor".to_string(),
                    warn_threshold_c: 28.0,
                    error_threshold_c: 30.0,
                    error_confirm_window_ms: 10_000,
                },
                ProbeConfig {
                    label: "Motor".to_string(),
                    warn_threshold_c: 28.0,
                    error_threshold_c: 30.0,
                    error_confirm_window_ms: 10_000,
                },
            ],
            sensor_retry_budget: 3,

            oil_error_confirm_window_ms: 10_000,

            pressure: PressureCalibration::default(),
            pressure_sample_interval_ms: 1_000,

            late_hours_enabled: true,
            disabled_window_start_hour: 4,
            disabled_window_end_hour: 5,

            override_wait_ms: 10_000,
            override_blink_period_ms: 200,
            override_blink_duration_ms: 5_000,

            error_blink_period_ms: 600,

            auto_timeout_ms: 30 * 60 * 1000,

            flush_interval_secs: 86_400,
            report_interval_ms: 20_000,
            calibration_hold_ms: 5_000,
        }
    }
}

impl SystemConfig {
    /// Range-check the configuration before it is allowed to drive the
    /// interlock. Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.temp_probes.is_empty() {
            return Err("at least one temperature probe must be configured");
        }
        for p in &self.temp_probes {
            if p.warn_threshold_c >= p.error_threshold_c {
                return Err("probe warn threshold must be below error threshold");
            }
            if p.error_confirm_window_ms == 0 {
                return Err("probe error confirm window must be non-zero");
            }
        }
        if self.disabled_window_start_hour > 23 || self.disabled_window_end_hour > 23 {
            return Err("disabled window hours must be 0-23");
        }
        if self.pressure.adc_at_0v5 >= self.pressure.adc_at_4v5 {
            return Err("pressure calibration points must be increasing");
        }
        if self.auto_timeout_ms == 0 {
            return Err("auto timeout must be non-zero");
        }
        if self.override_wait_ms == 0 {
            return Err("override wait must be non-zero");
        }
        Ok(())
    }
}
