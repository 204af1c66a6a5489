//! Compressor node firmware, main entry point.
//!
//! Hexagonal wiring: the hardware adapter, NVS storage, wall clock and
//! event sinks are constructed here and injected into
//! [`CompressorService`], which owns every piece of domain logic.
//!
//! ```text
//!  HardwareAdapter   NvsAdapter   Esp32TimeAdapter   MqttSink
//!  (Sensor+Actuator) (StoragePort) (WallClock)       (EventSink)
//!  ───────────────────── port boundary ─────────────────────
//!                  CompressorService (pure logic)
//! ```

#![deny(unused_must_use)]

use std::sync::mpsc;

use anyhow::{Context, Result};
use log::{info, warn};

use esp_idf_hal::adc::oneshot::AdcDriver;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Pin};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration, QoS};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use compressornode::adapters::hardware::{HardwareAdapter, PinMap};
use compressornode::adapters::{Esp32TimeAdapter, LogSink, NvsAdapter, SystemRestart};
use compressornode::app::events::AppEvent;
use compressornode::app::ports::EventSink;
use compressornode::app::{CmdOutcome, CompressorService, CycleInputs};
use compressornode::config::SystemConfig;

const MQTT_URL: &str = match option_env!("MQTT_URL") {
    Some(v) => v,
    None => "mqtt://space.makerspaceleiden.nl:1883",
};
const NODE_NAME: &str = "compressornode";
const BUTTON_DEBOUNCE_MS: u32 = 50;
const CYCLE_MS: u32 = 10;

/// Event sink that publishes reports over MQTT and logs everything else.
struct MqttSink {
    client: EspMqttClient<'static>,
    log: LogSink,
}

impl EventSink for MqttSink {
    fn emit(&mut self, event: &AppEvent) {
        self.log.emit(event);
        if let AppEvent::Report(report) = event {
            let topic = format!("ac/report/{NODE_NAME}");
            let payload = report.to_json().to_string();
            if let Err(e) =
                self.client
                    .enqueue(&topic, QoS::AtMostOnce, false, payload.as_bytes())
            {
                warn!("MQTT report publish failed: {e}");
            }
        }
    }
}

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init().context("logger init")?;

    info!("Compressor node v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take().context("peripherals")?;
    let sys_loop = EspSystemEventLoop::take().context("event loop")?;
    let nvs_partition = EspDefaultNvsPartition::take().context("nvs partition")?;

    // ── Persistent storage and configuration ──────────────────
    let mut nvs = NvsAdapter::new().context("nvs adapter")?;
    let config = match nvs.load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({e}), using defaults");
            SystemConfig::default()
        }
    };

    // ── Hardware ──────────────────────────────────────────────
    let pins = peripherals.pins;
    let pin_map = PinMap {
        relay: unsafe { AnyOutputPin::new(pins.gpio14.pin()) },
        on_button: unsafe { AnyInputPin::new(pins.gpio15.pin()) },
        off_button: unsafe { AnyInputPin::new(pins.gpio5.pin()) },
        opto: unsafe { AnyInputPin::new(pins.gpio36.pin()) },
        power_led: unsafe { AnyOutputPin::new(pins.gpio32.pin()) },
        running_led: unsafe { AnyOutputPin::new(pins.gpio33.pin()) },
        oil_level: unsafe { AnyInputPin::new(pins.gpio39.pin()) },
        temp_bus: unsafe { AnyIOPin::new(pins.gpio4.pin()) },
    };
    let adc = AdcDriver::new(peripherals.adc1).context("adc")?;
    let mut hw = HardwareAdapter::new(
        pin_map,
        adc,
        pins.gpio35,
        config.temp_probes.len(),
        BUTTON_DEBOUNCE_MS,
    )
    .context("hardware adapter")?;

    // ── Network ───────────────────────────────────────────────
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs_partition))?,
        sys_loop,
    )?;
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: option_env!("WIFI_SSID")
            .unwrap_or("makerspace")
            .try_into()
            .unwrap_or_default(),
        password: option_env!("WIFI_PASS")
            .unwrap_or("")
            .try_into()
            .unwrap_or_default(),
        ..Default::default()
    }))?;
    wifi.start()?;
    let mut connected = match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
        Ok(()) => {
            info!("Network up");
            true
        }
        Err(e) => {
            warn!("Network connect failed: {e}");
            false
        }
    };

    // Keep the SNTP service alive for the whole run; the wall clock stays
    // unsynced (and the time-window interlock fails open) until it syncs.
    let _sntp = EspSntp::new_default().context("sntp")?;

    // ── MQTT command channel ──────────────────────────────────
    let (cmd_tx, cmd_rx) = mpsc::channel::<String>();
    let mqtt_conf = MqttClientConfiguration {
        client_id: Some(NODE_NAME),
        ..Default::default()
    };
    let client = EspMqttClient::new_cb(MQTT_URL, &mqtt_conf, move |notification| {
        use esp_idf_svc::mqtt::client::EventPayload;
        if let EventPayload::Received { data, .. } = notification.payload() {
            if let Ok(text) = core::str::from_utf8(data) {
                let _ = cmd_tx.send(text.trim().to_owned());
            }
        }
    })
    .context("mqtt client")?;
    let mut sink = MqttSink {
        client,
        log: LogSink,
    };
    sink.client
        .subscribe(&format!("ac/to/{NODE_NAME}"), QoS::AtMostOnce)
        .context("mqtt subscribe")?;

    // ── Service ───────────────────────────────────────────────
    let time = Esp32TimeAdapter::new();
    let mut restart = SystemRestart;
    let mut service = CompressorService::new(config, time.uptime_ms());
    service.boot(&mut nvs);
    if connected {
        service.on_connected(time.uptime_ms(), &mut sink);
    }

    info!("System ready. Entering control loop.");

    loop {
        let now_ms = time.uptime_ms();

        // Network edges.
        let up = wifi.is_connected().unwrap_or(false);
        if up != connected {
            connected = up;
            if up {
                service.on_connected(now_ms, &mut sink);
            } else {
                service.on_disconnected(now_ms, &mut sink);
            }
        }

        // Remote commands.
        while let Ok(raw) = cmd_rx.try_recv() {
            if service.handle_command(&raw, now_ms, &time, &mut sink) == CmdOutcome::Declined {
                info!("Ignoring unclaimed command '{raw}'");
            }
        }

        // One control cycle.
        let (on_control, off_control, motor_load) = hw.poll_controls(now_ms);
        service.tick(
            CycleInputs {
                now_ms,
                on_control,
                off_control,
                motor_load,
            },
            &mut hw,
            &time,
            &mut nvs,
            &mut restart,
            &mut sink,
        );

        FreeRtos::delay_ms(CYCLE_MS);
    }
}
