//! ESP32 time adapter.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` for the
//!   monotonic tick and `gettimeofday`/`localtime_r` for the wall-clock
//!   hour (valid only after SNTP sync).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing; the wall clock reads as never-synced.

use crate::app::ports::WallClock;

pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl WallClock for Esp32TimeAdapter {
    /// Current hour-of-day (0-23). `None` while the wall clock has not
    /// synced (pre-NTP), which lets the time-window interlock fail open.
    #[cfg(target_os = "espidf")]
    fn current_hour(&self) -> Option<u8> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Reject obviously unsynced time (before 2020-01-01).
        const EPOCH_2020: i64 = 1_577_836_800;
        if i64::from(tv.tv_sec) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        u8::try_from(tm.tm_hour).ok().filter(|h| *h < 24)
    }

    #[cfg(not(target_os = "espidf"))]
    fn current_hour(&self) -> Option<u8> {
        None
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn uptime_is_monotonic() {
        let t = Esp32TimeAdapter::new();
        let a = t.uptime_ms();
        let b = t.uptime_ms();
        assert!(b >= a);
    }

    #[test]
    fn host_wall_clock_reads_unsynced() {
        assert_eq!(Esp32TimeAdapter::new().current_hour(), None);
    }
}
