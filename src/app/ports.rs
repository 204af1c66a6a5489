//! Port traits: the boundary between the decision core and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CompressorService (domain)
//! ```
//!
//! Driven adapters (GPIO, flash storage, MQTT, NTP) implement these traits.
//! The [`CompressorService`](super::service::CompressorService) consumes
//! them via generics, so the decision core never touches hardware, sockets
//! or the filesystem directly. Everything here is synchronous: one control
//! cycle runs the full read→decide→act→report pipeline to completion.

use heapless::Vec;

/// Capacity of the per-cycle temperature sample buffer. The deployed probe
/// count is configuration; this is only the transport ceiling.
pub const MAX_TEMP_PROBES: usize = 4;

/// DS18B20 "no probe answered" sentinel, as delivered by the bus driver.
pub const TEMP_DISCONNECTED_C: f32 = -127.0;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw samples for one control cycle. Levels are already debounced by the
/// adapter; the domain consumes clean signals only.
#[derive(Debug, Clone, Default)]
pub struct RawSamples {
    /// One slot per configured probe, in bus index order. `None` means no
    /// new sample this cycle (a bus conversion is still in flight) and is
    /// skipped by the consumer; [`TEMP_DISCONNECTED_C`] marks a probe that
    /// failed a completed conversion and counts against its retry budget.
    pub temperatures_c: Vec<Option<f32>, MAX_TEMP_PROBES>,
    /// Debounced oil-level switch: `true` = level too low.
    pub oil_level_low: bool,
    /// Raw pressure ADC counts.
    pub pressure_adc: u16,
}

/// Read-side port: the domain calls this once per cycle.
pub trait SensorPort {
    fn read_all(&mut self) -> RawSamples;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: relay and the two indicator LEDs. Adapters must treat
/// repeated writes of the same level as no-ops on the physical pins.
pub trait ActuatorPort {
    /// Close (`true`) or open the compressor relay.
    fn set_relay(&mut self, closed: bool);

    /// Power indicator (LED1 on the reference node).
    fn set_power_led(&mut self, on: bool);

    /// Motor-running indicator (LED2 on the reference node).
    fn set_running_led(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, MQTT
/// report topic, display status line).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Wall clock port (driven adapter: NTP → domain)
// ───────────────────────────────────────────────────────────────

/// Time-of-day source for the late-hours restriction.
pub trait WallClock {
    /// Current local hour (0–23), or `None` before the clock has synced.
    fn current_hour(&self) -> Option<u8>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ flash file)
// ───────────────────────────────────────────────────────────────

/// Byte-oriented persistence for the duration-counter record. Writes are
/// synchronous and blocking; a failed write leaves in-memory counters
/// untouched and is retried on the next scheduled flush.
pub trait StoragePort {
    /// Read the record into `buf`. Returns the number of bytes read.
    fn load(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace the record atomically.
    fn save(&mut self, data: &[u8]) -> Result<(), StorageError>;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No record exists yet (first boot, or wiped).
    NotFound,
    /// Fewer bytes were written than requested.
    ShortWrite,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::ShortWrite => write!(f, "short write"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Restart port (driven adapter: domain → platform reset)
// ───────────────────────────────────────────────────────────────

/// Invoked once when the controller reaches `Reboot`. `Reboot` is terminal
/// for the controller; the platform restart takes it from there.
pub trait RestartPort {
    fn restart(&mut self);
}
