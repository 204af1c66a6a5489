//! Application service, the hardware-agnostic core.
//!
//! [`CompressorService`] owns the machine-state controller, the sensor
//! bank, the override gate and the duration accountant. All I/O flows
//! through port traits injected at call sites, so the whole cycle runs
//! under test with mock adapters.
//!
//! ```text
//!   SensorPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!   WallClock  ──▶ │     CompressorService     │ ──▶ ActuatorPort
//!   StoragePort ◀─▶│ state · interlock · hours │ ──▶ RestartPort
//!                  └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::SystemConfig;
use crate::drivers::LedMode;
use crate::duration::DurationAccountant;
use crate::interlock::{self, DenyReason};
use crate::machine::{
    MachineState, MachineStateController, PowerOffCause, PowerOnSource, Transition,
};
use crate::override_gate::{GateAction, ManualOverrideGate};
use crate::report::Report;
use crate::sensors::SensorBank;

use super::commands::{CmdOutcome, RemoteCommand};
use super::events::AppEvent;
use super::ports::{
    ActuatorPort, EventSink, RestartPort, SensorPort, StoragePort, WallClock,
};

/// Tells the display collaborator whether anything it shows moved this
/// cycle, replacing implicit "needs redraw" flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRefreshHint {
    Unchanged,
    Refresh,
}

/// Debounced panel inputs for one control cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleInputs {
    pub now_ms: u64,
    /// Green on-button, debounced level.
    pub on_control: bool,
    /// Red off-button, debounced level.
    pub off_control: bool,
    /// Opto-coupled motor-contactor sense.
    pub motor_load: bool,
}

pub struct CompressorService {
    config: SystemConfig,
    controller: MachineStateController,
    sensors: SensorBank,
    gate: ManualOverrideGate,
    accountant: DurationAccountant,

    prev_on: bool,
    prev_off: bool,
    both_held_since_ms: Option<u64>,
    calibration_toggled_this_hold: bool,
    calibration_mode: bool,
    deny_flash_until_ms: Option<u64>,
    next_report_at_ms: u64,
}

impl CompressorService {
    pub fn new(config: SystemConfig, now_ms: u64) -> Self {
        let controller = MachineStateController::new(config.auto_timeout_ms, now_ms);
        let sensors = SensorBank::new(&config);
        let gate = ManualOverrideGate::new(config.override_wait_ms);
        let accountant = DurationAccountant::new(config.flush_interval_secs, now_ms);
        let next_report_at_ms = now_ms + u64::from(config.report_interval_ms);
        Self {
            config,
            controller,
            sensors,
            gate,
            accountant,
            prev_on: false,
            prev_off: false,
            both_held_since_ms: None,
            calibration_toggled_this_hold: false,
            calibration_mode: false,
            deny_flash_until_ms: None,
            next_report_at_ms,
        }
    }

    /// Restore persisted duration counters. Call once before the first tick.
    pub fn boot(&mut self, storage: &mut impl StoragePort) {
        self.accountant.load(storage);
        info!(
            "Compressor node starting in state '{}'",
            self.controller.state().label()
        );
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> MachineState {
        self.controller.state()
    }

    pub fn calibration_mode(&self) -> bool {
        self.calibration_mode
    }

    pub fn sensors(&self) -> &SensorBank {
        &self.sensors
    }

    // ── Network / fault notifications ─────────────────────────

    pub fn on_connected(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if let Some(t) = self.controller.on_connected(now_ms) {
            self.record_transition(t, now_ms, sink);
        }
    }

    pub fn on_disconnected(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if let Some(t) = self.controller.on_disconnected(now_ms) {
            self.record_transition(t, now_ms, sink);
        }
    }

    pub fn on_fatal_error(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        if let Some(t) = self.controller.on_fatal_error(now_ms) {
            self.record_transition(t, now_ms, sink);
        }
    }

    // ── Remote commands ───────────────────────────────────────

    /// Handle one raw command string from the node link. Unrecognized
    /// commands are declined, leaving them for another handler.
    pub fn handle_command(
        &mut self,
        raw: &str,
        now_ms: u64,
        clock: &impl WallClock,
        sink: &mut impl EventSink,
    ) -> CmdOutcome {
        let Some(cmd) = RemoteCommand::parse(raw) else {
            return CmdOutcome::Declined;
        };
        match cmd {
            RemoteCommand::Stop => {
                if self.controller.state().is_energized() {
                    if let Some(t) = self
                        .controller
                        .power_off(PowerOffCause::Remote, now_ms)
                    {
                        self.record_transition(t, now_ms, sink);
                    }
                }
                CmdOutcome::Claimed
            }
            RemoteCommand::PowerOn => {
                self.request_power_on(PowerOnSource::Remote, now_ms, clock, sink);
                CmdOutcome::Claimed
            }
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle: sensors, guards, controls, outputs.
    ///
    /// `hw` satisfies both [`SensorPort`] and [`ActuatorPort`], avoiding a
    /// double mutable borrow while keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        inputs: CycleInputs,
        hw: &mut (impl SensorPort + ActuatorPort),
        clock: &impl WallClock,
        storage: &mut impl StoragePort,
        restart: &mut impl RestartPort,
        sink: &mut impl EventSink,
    ) -> DisplayRefreshHint {
        let now_ms = inputs.now_ms;
        let state_at_entry = self.controller.state();

        // 1. Sensors.
        let samples = hw.read_all();
        let health_edged = self.sensors.update(&samples, now_ms);

        // 2. Guards, highest priority first.
        if let Some(t) = self
            .controller
            .check_sensor_shutdown(self.sensors.any_error(), now_ms)
        {
            self.record_transition(t, now_ms, sink);
        }
        if let Some(t) = self.controller.check_auto_timeout(now_ms) {
            self.record_transition(t, now_ms, sink);
        }
        if let Some(t) = self.controller.check_dwell(now_ms) {
            self.record_transition(t, now_ms, sink);
        }

        // 3. Motor contactor sense.
        if let Some(t) = self.controller.set_motor_load(inputs.motor_load, now_ms) {
            self.record_transition(t, now_ms, sink);
        }

        // 4. Panel buttons.
        let on_pressed = inputs.on_control && !self.prev_on;
        let off_pressed = inputs.off_control && !self.prev_off;
        self.prev_on = inputs.on_control;
        self.prev_off = inputs.off_control;

        if on_pressed && !inputs.off_control {
            self.request_power_on(PowerOnSource::Button, now_ms, clock, sink);
        }
        if off_pressed {
            self.deny_flash_until_ms = None;
            if self.controller.state().is_energized() {
                if let Some(t) = self
                    .controller
                    .power_off(PowerOffCause::Button, now_ms)
                {
                    self.record_transition(t, now_ms, sink);
                }
            }
        }
        self.track_calibration_hold(&inputs, storage, sink);

        // 5. Override gate.
        match self.gate.poll(now_ms, inputs.on_control) {
            GateAction::None => {}
            GateAction::Abandoned => sink.emit(&AppEvent::OverrideAbandoned),
            GateAction::Fire => self.fire_override(now_ms, clock, sink),
        }

        // 6. Persistence cadence.
        if self.accountant.flush_due(now_ms) {
            self.accountant.flush(storage, now_ms);
        }

        // 7. Status report, on cadence or when a health edge made it stale.
        if health_edged || now_ms >= self.next_report_at_ms {
            self.next_report_at_ms = now_ms + u64::from(self.config.report_interval_ms);
            let report = Report::build(
                self.controller.state().label(),
                self.accountant.live_totals(now_ms),
                &self.sensors,
                inputs.motor_load,
                cfg!(feature = "espidf"),
            );
            sink.emit(&AppEvent::Report(report));
        }

        // 8. Outputs.
        self.apply_outputs(now_ms, hw);

        // 9. Reboot is terminal for this process image.
        if self.controller.state() == MachineState::Reboot {
            self.accountant.flush(storage, now_ms);
            restart.restart();
        }

        if health_edged || self.controller.state() != state_at_entry {
            DisplayRefreshHint::Refresh
        } else {
            DisplayRefreshHint::Unchanged
        }
    }

    // ── Internals ─────────────────────────────────────────────

    fn request_power_on(
        &mut self,
        source: PowerOnSource,
        now_ms: u64,
        clock: &impl WallClock,
        sink: &mut impl EventSink,
    ) {
        if self.controller.state().is_energized() {
            self.controller.extend(now_ms);
            if let Some(deadline_ms) = self.controller.auto_off_deadline_ms() {
                sink.emit(&AppEvent::TimeoutExtended { deadline_ms });
            }
            return;
        }

        let decision = interlock::evaluate(
            self.sensors.interlock_healths(),
            clock.current_hour(),
            self.config.late_hours_enabled,
            self.config.disabled_window_start_hour,
            self.config.disabled_window_end_hour,
        );
        if decision.allowed {
            if let Some(t) = self.controller.power_on(source, now_ms) {
                self.record_transition(t, now_ms, sink);
            }
            return;
        }

        warn!("Power-on denied ({:?})", decision.reason);
        sink.emit(&AppEvent::PowerOnDenied {
            source,
            reason: decision.reason,
        });
        self.deny_flash_until_ms =
            Some(now_ms + u64::from(self.config.override_blink_duration_ms));
        if decision.reason == DenyReason::TimeWindow
            && source == PowerOnSource::Button
            && self.gate.arm(now_ms)
        {
            sink.emit(&AppEvent::OverrideArmed {
                deadline_ms: now_ms + u64::from(self.config.override_wait_ms),
            });
        }
    }

    /// The long-press completed: force power-on past the time window. A
    /// confirmed sensor error still wins.
    fn fire_override(
        &mut self,
        now_ms: u64,
        clock: &impl WallClock,
        sink: &mut impl EventSink,
    ) {
        let decision = interlock::evaluate(
            self.sensors.interlock_healths(),
            clock.current_hour(),
            self.config.late_hours_enabled,
            self.config.disabled_window_start_hour,
            self.config.disabled_window_end_hour,
        );
        if decision.reason == DenyReason::SensorError {
            sink.emit(&AppEvent::PowerOnDenied {
                source: PowerOnSource::Override,
                reason: decision.reason,
            });
            return;
        }
        self.deny_flash_until_ms = None;
        if let Some(t) = self.controller.power_on(PowerOnSource::Override, now_ms) {
            sink.emit(&AppEvent::OverrideForcedOn);
            self.record_transition(t, now_ms, sink);
        }
    }

    /// Both-controls hold toggles calibration/info mode. The toggle also
    /// forces a duration-counter flush so an operator reading out the
    /// machine gets up-to-date persisted hours.
    fn track_calibration_hold(
        &mut self,
        inputs: &CycleInputs,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if inputs.on_control && inputs.off_control {
            let since = *self.both_held_since_ms.get_or_insert(inputs.now_ms);
            let held = inputs.now_ms.saturating_sub(since);
            if held >= u64::from(self.config.calibration_hold_ms)
                && !self.calibration_toggled_this_hold
            {
                self.calibration_toggled_this_hold = true;
                self.calibration_mode = !self.calibration_mode;
                self.accountant.flush(storage, inputs.now_ms);
                if self.calibration_mode {
                    let cal = self.sensors.pressure().calibration();
                    info!(
                        "Pressure calibration: adc@0.5V={} adc@4.5V={} full-scale={} MPa, \
                         last raw adc={}",
                        cal.adc_at_0v5,
                        cal.adc_at_4v5,
                        cal.full_scale_mpa,
                        self.sensors.pressure().last_adc()
                    );
                }
                sink.emit(&AppEvent::CalibrationMode {
                    entered: self.calibration_mode,
                });
            }
        } else {
            self.both_held_since_ms = None;
            self.calibration_toggled_this_hold = false;
        }
    }

    fn record_transition(&mut self, t: Transition, now_ms: u64, sink: &mut impl EventSink) {
        self.accountant.on_state_changed(t.from, t.to, now_ms);
        sink.emit(&AppEvent::StateChanged {
            from: t.from,
            to: t.to,
            cause: t.cause,
        });
    }

    fn apply_outputs(&mut self, now_ms: u64, hw: &mut impl ActuatorPort) {
        let state = self.controller.state();
        hw.set_relay(state.is_energized());

        let error_blink = state == MachineState::SwitchedOff && self.sensors.any_error();
        let deny_flash = self
            .deny_flash_until_ms
            .is_some_and(|until| now_ms < until);

        let power_led = if self.gate.is_pending() || deny_flash {
            LedMode::Blink {
                period_ms: self.config.override_blink_period_ms,
            }
        } else if error_blink {
            LedMode::Blink {
                period_ms: self.config.error_blink_period_ms,
            }
        } else if state.is_energized() {
            LedMode::On
        } else {
            LedMode::Off
        };

        let running_led = if error_blink {
            LedMode::Blink {
                period_ms: self.config.error_blink_period_ms,
            }
        } else if state == MachineState::Running {
            LedMode::On
        } else {
            LedMode::Off
        };

        hw.set_power_led(power_led.level(now_ms));
        hw.set_running_led(running_led.level(now_ms));
    }
}
