//! Periodic status report.
//!
//! The report is assembled as a typed snapshot and only rendered to JSON at
//! the transport boundary. Field names follow the convention the monitoring
//! side already scrapes: `temperature_sensor_<n>_(<label>)` per probe, with
//! `_warning`/`_error` companions that appear only while that tier is
//! active.

use serde_json::{json, Map, Value};

use crate::duration::DurationCounters;
use crate::monitor::HealthLevel;
use crate::sensors::{ProbeStatus, SensorBank};

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeEntry {
    pub label: String,
    pub temperature_c: Option<f32>,
    pub health: Option<HealthLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub state_label: &'static str,
    pub powered_hours: f64,
    pub running_hours: f64,
    pub probes: Vec<ProbeEntry>,
    pub oil_level: HealthLevel,
    pub pressure_mpa: f32,
    pub motor_load: bool,
    pub ota: bool,
}

impl Report {
    pub fn build(
        state_label: &'static str,
        totals: DurationCounters,
        sensors: &SensorBank,
        motor_load: bool,
        ota: bool,
    ) -> Self {
        let probes = sensors
            .probes()
            .iter()
            .map(|p| ProbeEntry {
                label: p.label().to_owned(),
                temperature_c: match p.status() {
                    ProbeStatus::Online => p.temperature_c(),
                    _ => None,
                },
                health: p.health(),
            })
            .collect();
        Self {
            state_label,
            powered_hours: totals.powered_hours(),
            running_hours: totals.running_hours(),
            probes,
            oil_level: sensors.oil().level(),
            pressure_mpa: sensors.pressure().pressure_mpa(),
            motor_load,
            ota,
        }
    }

    /// Render to the wire shape.
    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("state".into(), json!(self.state_label));
        doc.insert(
            "powered_time".into(),
            json!(format!("{} hours", self.powered_hours)),
        );
        doc.insert(
            "running_time".into(),
            json!(format!("{} hours", self.running_hours)),
        );

        for (n, probe) in self.probes.iter().enumerate() {
            let key = format!(
                "temperature_sensor_{}_({})",
                n + 1,
                probe.label.to_lowercase()
            );
            match probe.temperature_c {
                Some(t) => {
                    match probe.health {
                        Some(HealthLevel::Error) => {
                            doc.insert(
                                format!("{key}_error"),
                                json!(format!(
                                    "ERROR: Temperature sensor {} ({}) is too high, \
                                     compressor is disabled!",
                                    n + 1,
                                    probe.label
                                )),
                            );
                        }
                        Some(HealthLevel::Warning) => {
                            doc.insert(
                                format!("{key}_warning"),
                                json!(format!(
                                    "WARNING: Temperature sensor {} ({}) is very high!",
                                    n + 1,
                                    probe.label
                                )),
                            );
                        }
                        _ => {}
                    }
                    doc.insert(key, json!(format!("{t} degrees Celcius")));
                }
                None => {
                    doc.insert(
                        key,
                        json!(format!(
                            "Error reading temperature sensor {} ({}), perhaps not connected?",
                            n + 1,
                            probe.label
                        )),
                    );
                }
            }
        }

        match self.oil_level {
            HealthLevel::Ok => {
                doc.insert("oil_level_sensor".into(), json!("oil level is OK!"));
            }
            HealthLevel::Warning => {
                doc.insert(
                    "oil_level_sensor_warning".into(),
                    json!("WARNING: Oil level is too low!"),
                );
            }
            HealthLevel::Error => {
                doc.insert(
                    "oil_level_sensor_error".into(),
                    json!("ERROR: Oil level is too low, compressor is disabled"),
                );
            }
        }

        doc.insert(
            "pressure_sensor".into(),
            json!(format!("{:5.3} MPa", self.pressure_mpa)),
        );
        doc.insert("ota".into(), json!(self.ota));
        doc.insert("opto1".into(), json!(self.motor_load));
        Value::Object(doc)
    }
}
