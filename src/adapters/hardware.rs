//! Hardware adapter for the compressor node board.
//!
//! Bridges real peripherals to the domain port traits. This is the only
//! module that touches GPIO and the ADC; everything above it sees
//! [`SensorPort`] and [`ActuatorPort`]. ESP-IDF only.

use embedded_hal::delay::DelayNs;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{
    AnyIOPin, AnyInputPin, AnyOutputPin, Input, Output, PinDriver, Pull,
};
use log::warn;

use crate::app::ports::{
    ActuatorPort, RawSamples, SensorPort, MAX_TEMP_PROBES, TEMP_DISCONNECTED_C,
};
use crate::drivers::Debouncer;
use crate::error::{Error, Result};

/// Board pin assignment. Numbers match the deployed controller PCB.
pub struct PinMap {
    pub relay: AnyOutputPin,       // GPIO 14
    pub on_button: AnyInputPin,    // GPIO 15
    pub off_button: AnyInputPin,   // GPIO 5
    pub opto: AnyInputPin,         // GPIO 36
    pub power_led: AnyOutputPin,   // GPIO 32
    pub running_led: AnyOutputPin, // GPIO 33
    pub oil_level: AnyInputPin,    // GPIO 39
    pub temp_bus: AnyIOPin,        // GPIO 4, 1-Wire
}

pub struct HardwareAdapter<'d> {
    relay: PinDriver<'d, AnyOutputPin, Output>,
    power_led: PinDriver<'d, AnyOutputPin, Output>,
    running_led: PinDriver<'d, AnyOutputPin, Output>,
    on_button: PinDriver<'d, AnyInputPin, Input>,
    off_button: PinDriver<'d, AnyInputPin, Input>,
    opto: PinDriver<'d, AnyInputPin, Input>,
    oil_level: PinDriver<'d, AnyInputPin, Input>,
    temp_bus: OneWireBus<'d>,
    pressure_ch: AdcChannelDriver<'d, esp_idf_hal::gpio::Gpio35, AdcDriver<'d, ADC1>>,

    on_debounce: Debouncer,
    off_debounce: Debouncer,
    oil_debounce: Debouncer,
    probe_count: usize,
}

impl<'d> HardwareAdapter<'d> {
    pub fn new(
        pins: PinMap,
        adc: AdcDriver<'d, ADC1>,
        pressure_pin: esp_idf_hal::gpio::Gpio35,
        probe_count: usize,
        debounce_ms: u32,
    ) -> Result<Self> {
        let mut on_button =
            PinDriver::input(pins.on_button).map_err(|_| Error::Init("on button"))?;
        on_button
            .set_pull(Pull::Up)
            .map_err(|_| Error::Init("on button pull"))?;
        let mut off_button =
            PinDriver::input(pins.off_button).map_err(|_| Error::Init("off button"))?;
        off_button
            .set_pull(Pull::Up)
            .map_err(|_| Error::Init("off button pull"))?;

        let pressure_ch =
            AdcChannelDriver::new(adc, pressure_pin, &AdcChannelConfig::default())
                .map_err(|_| Error::Init("pressure adc channel"))?;

        Ok(Self {
            relay: PinDriver::output(pins.relay).map_err(|_| Error::Init("relay"))?,
            power_led: PinDriver::output(pins.power_led)
                .map_err(|_| Error::Init("power led"))?,
            running_led: PinDriver::output(pins.running_led)
                .map_err(|_| Error::Init("running led"))?,
            on_button,
            off_button,
            opto: PinDriver::input(pins.opto).map_err(|_| Error::Init("opto"))?,
            oil_level: PinDriver::input(pins.oil_level)
                .map_err(|_| Error::Init("oil level"))?,
            temp_bus: OneWireBus::new(pins.temp_bus)?,
            pressure_ch,
            on_debounce: Debouncer::new(debounce_ms, false),
            off_debounce: Debouncer::new(debounce_ms, false),
            oil_debounce: Debouncer::new(debounce_ms, false),
            probe_count,
        })
    }

    /// Debounced panel levels. Buttons are active-low; the oil switch is
    /// debounced here too so `read_all` sees a stable level.
    pub fn poll_controls(&mut self, now_ms: u64) -> (bool, bool, bool) {
        self.on_debounce.update(self.on_button.is_low(), now_ms);
        self.off_debounce.update(self.off_button.is_low(), now_ms);
        self.oil_debounce.update(self.oil_level.is_high(), now_ms);
        let motor_load = self.opto.is_high();
        (
            self.on_debounce.level(),
            self.off_debounce.level(),
            motor_load,
        )
    }
}

impl SensorPort for HardwareAdapter<'_> {
    fn read_all(&mut self) -> RawSamples {
        self.temp_bus.poll(self.probe_count);
        let mut temperatures_c = heapless::Vec::new();
        for idx in 0..self.probe_count {
            if temperatures_c.push(self.temp_bus.sample(idx)).is_err() {
                break;
            }
        }

        let pressure_adc = match self.pressure_ch.read() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Pressure ADC read failed: {e}");
                0
            }
        };

        RawSamples {
            temperatures_c,
            oil_level_low: self.oil_debounce.level(),
            pressure_adc,
        }
    }
}

impl ActuatorPort for HardwareAdapter<'_> {
    fn set_relay(&mut self, closed: bool) {
        let _ = if closed {
            self.relay.set_high()
        } else {
            self.relay.set_low()
        };
    }

    fn set_power_led(&mut self, on: bool) {
        let _ = if on {
            self.power_led.set_high()
        } else {
            self.power_led.set_low()
        };
    }

    fn set_running_led(&mut self, on: bool) {
        let _ = if on {
            self.running_led.set_high()
        } else {
            self.running_led.set_low()
        };
    }
}

// ── 1-Wire temperature bus ────────────────────────────────────

/// Bit-banged 1-Wire master for the DS18B20 probes on GPIO 4.
///
/// Conversions take up to 750 ms at 12-bit resolution, so the bus runs a
/// sample-and-hold cycle: a broadcast Convert T is kicked off, and while
/// it is in flight [`OneWireBus::sample`] keeps returning the last good
/// reading per probe. Only when a window completes are the scratchpads
/// read; a failed read (CRC, missing ROM, dead bus) marks its probe
/// failed for exactly one sample, so the retry budget upstairs counts
/// conversion windows, not control cycles. Timing follows the DS18B20
/// datasheet.
struct OneWireBus<'d> {
    pin: PinDriver<'d, AnyIOPin, esp_idf_hal::gpio::InputOutput>,
    roms: heapless::Vec<[u8; 8], MAX_TEMP_PROBES>,
    latest: [Option<f32>; MAX_TEMP_PROBES],
    failed: [bool; MAX_TEMP_PROBES],
    converted_at: Option<std::time::Instant>,
    bus_ok: bool,
}

impl<'d> OneWireBus<'d> {
    fn new(pin: AnyIOPin) -> Result<Self> {
        let mut pin =
            PinDriver::input_output_od(pin).map_err(|_| Error::Init("temp bus"))?;
        let _ = pin.set_high();
        let mut bus = Self {
            pin,
            roms: heapless::Vec::new(),
            latest: [None; MAX_TEMP_PROBES],
            failed: [false; MAX_TEMP_PROBES],
            converted_at: None,
            bus_ok: false,
        };
        bus.enumerate();
        Ok(bus)
    }

    fn enumerate(&mut self) {
        self.roms.clear();
        let mut search = RomSearch::default();
        while let Some(rom) = self.search_next(&mut search) {
            if self.roms.push(rom).is_err() {
                break;
            }
        }
    }

    /// Advance the conversion cycle. Harvests a completed window into the
    /// hold registers and starts the next conversion; returns immediately
    /// while one is still in flight.
    fn poll(&mut self, probe_count: usize) {
        if let Some(at) = self.converted_at {
            if at.elapsed().as_millis() < 750 {
                return;
            }
            for idx in 0..probe_count.min(MAX_TEMP_PROBES) {
                let rom = if self.bus_ok {
                    self.roms.get(idx).copied()
                } else {
                    None
                };
                match rom.and_then(|rom| self.read_scratchpad(&rom)) {
                    Some(raw) => self.latest[idx] = Some(f32::from(raw) / 16.0),
                    None => self.failed[idx] = true,
                }
            }
        }
        self.start_conversion();
    }

    /// Sample-and-hold output for probe `idx`: the last good reading, the
    /// disconnect sentinel exactly once after a failed window, or `None`
    /// while nothing has completed yet.
    fn sample(&mut self, idx: usize) -> Option<f32> {
        if idx >= MAX_TEMP_PROBES {
            return None;
        }
        if core::mem::take(&mut self.failed[idx]) {
            return Some(TEMP_DISCONNECTED_C);
        }
        self.latest[idx]
    }

    fn start_conversion(&mut self) {
        self.bus_ok = self.reset();
        if self.bus_ok {
            self.write_byte(0xCC); // Skip ROM
            self.write_byte(0x44); // Convert T
        }
        // A dead bus still opens a window so the failure is marked once
        // per window, not once per control cycle.
        self.converted_at = Some(std::time::Instant::now());
    }

    fn read_scratchpad(&mut self, rom: &[u8; 8]) -> Option<i16> {
        if !self.reset() {
            return None;
        }
        self.write_byte(0x55); // Match ROM
        for b in rom {
            self.write_byte(*b);
        }
        self.write_byte(0xBE); // Read Scratchpad
        let mut pad = [0u8; 9];
        for b in &mut pad {
            *b = self.read_byte();
        }
        if crc8(&pad[..8]) != pad[8] {
            return None;
        }
        Some(i16::from_le_bytes([pad[0], pad[1]]))
    }

    fn reset(&mut self) -> bool {
        let _ = self.pin.set_low();
        Ets.delay_us(480);
        let _ = self.pin.set_high();
        Ets.delay_us(70);
        let present = self.pin.is_low();
        Ets.delay_us(410);
        present
    }

    fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            let bit = (byte >> i) & 1 == 1;
            let _ = self.pin.set_low();
            if bit {
                Ets.delay_us(6);
                let _ = self.pin.set_high();
                Ets.delay_us(64);
            } else {
                Ets.delay_us(60);
                let _ = self.pin.set_high();
                Ets.delay_us(10);
            }
        }
    }

    fn read_byte(&mut self) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            let _ = self.pin.set_low();
            Ets.delay_us(6);
            let _ = self.pin.set_high();
            Ets.delay_us(9);
            if self.pin.is_high() {
                byte |= 1 << i;
            }
            Ets.delay_us(55);
        }
        byte
    }

    fn search_next(&mut self, search: &mut RomSearch) -> Option<[u8; 8]> {
        if search.done || !self.reset() {
            return None;
        }
        self.write_byte(0xF0); // Search ROM

        let mut rom = [0u8; 8];
        let mut last_zero = 0u8;
        for bit_idx in 0..64u8 {
            let bit = self.read_bit();
            let complement = self.read_bit();
            let chosen = match (bit, complement) {
                (true, true) => return None, // no device answered
                (false, false) => {
                    // Discrepancy: branch per the standard search tree.
                    let take_one = match bit_idx.cmp(&search.last_discrepancy) {
                        core::cmp::Ordering::Less => {
                            rom_bit(&search.last_rom, bit_idx)
                        }
                        core::cmp::Ordering::Equal => true,
                        core::cmp::Ordering::Greater => false,
                    };
                    if !take_one {
                        last_zero = bit_idx;
                    }
                    take_one
                }
                (b, _) => b,
            };
            if chosen {
                rom[usize::from(bit_idx / 8)] |= 1 << (bit_idx % 8);
            }
            self.write_bit(chosen);
        }

        if crc8(&rom[..7]) != rom[7] {
            search.done = true;
            return None;
        }
        search.last_discrepancy = last_zero;
        search.last_rom = rom;
        if last_zero == 0 {
            search.done = true;
        }
        Some(rom)
    }

    fn read_bit(&mut self) -> bool {
        let _ = self.pin.set_low();
        Ets.delay_us(6);
        let _ = self.pin.set_high();
        Ets.delay_us(9);
        let bit = self.pin.is_high();
        Ets.delay_us(55);
        bit
    }

    fn write_bit(&mut self, bit: bool) {
        let _ = self.pin.set_low();
        if bit {
            Ets.delay_us(6);
            let _ = self.pin.set_high();
            Ets.delay_us(64);
        } else {
            Ets.delay_us(60);
            let _ = self.pin.set_high();
            Ets.delay_us(10);
        }
    }
}

#[derive(Default)]
struct RomSearch {
    last_discrepancy: u8,
    last_rom: [u8; 8],
    done: bool,
}

fn rom_bit(rom: &[u8; 8], idx: u8) -> bool {
    rom[usize::from(idx / 8)] >> (idx % 8) & 1 == 1
}

/// Dallas/Maxim CRC-8, polynomial 0x31 reflected.
fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for byte in data {
        let mut b = *byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}
