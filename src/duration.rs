//! Powered/running duration accounting.
//!
//! Tracks cumulative powered-time and running-time in whole seconds.
//! Interval starts are recorded on entry into the corresponding state and
//! folded into the totals on exit; [`DurationAccountant::live_totals`]
//! adds any open interval without mutating the stored totals, so reports
//! never double-count.
//!
//! The persisted record is two consecutive little-endian `u32`s
//! (`powered_total_secs` then `running_total_secs`), no header, no
//! checksum, byte-compatible with the reference node's flash file.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::machine::MachineState;

/// The two persisted counters, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurationCounters {
    pub powered_total_secs: u32,
    pub running_total_secs: u32,
}

impl DurationCounters {
    /// On-flash record size.
    pub const RECORD_LEN: usize = 8;

    pub fn to_bytes(self) -> [u8; Self::RECORD_LEN] {
        let mut out = [0u8; Self::RECORD_LEN];
        out[..4].copy_from_slice(&self.powered_total_secs.to_le_bytes());
        out[4..].copy_from_slice(&self.running_total_secs.to_le_bytes());
        out
    }

    /// Decode a record. `None` on a short buffer.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::RECORD_LEN {
            return None;
        }
        Some(Self {
            powered_total_secs: u32::from_le_bytes(buf[..4].try_into().ok()?),
            running_total_secs: u32::from_le_bytes(buf[4..8].try_into().ok()?),
        })
    }

    /// Totals as floating-point hours, for reports and the display.
    pub fn powered_hours(self) -> f64 {
        f64::from(self.powered_total_secs) / 3600.0
    }

    pub fn running_hours(self) -> f64 {
        f64::from(self.running_total_secs) / 3600.0
    }
}

/// Observes state transitions and owns the flush cadence.
pub struct DurationAccountant {
    totals: DurationCounters,
    /// Set while the machine is energized (`>= Powered`).
    powered_since_ms: Option<u64>,
    /// Set while the machine is in `Running`.
    running_since_ms: Option<u64>,
    flush_interval_secs: u32,
    next_flush_at_secs: u64,
    /// What the storage holds after the last successful save; unchanged
    /// totals skip the write.
    last_saved: Option<DurationCounters>,
}

impl DurationAccountant {
    pub fn new(flush_interval_secs: u32, now_ms: u64) -> Self {
        Self {
            totals: DurationCounters::default(),
            powered_since_ms: None,
            running_since_ms: None,
            flush_interval_secs,
            next_flush_at_secs: now_ms / 1000 + u64::from(flush_interval_secs),
            last_saved: None,
        }
    }

    /// Best-effort load at boot. A missing or short record is logged and
    /// treated as zero totals.
    pub fn load(&mut self, storage: &mut impl StoragePort) {
        let mut buf = [0u8; DurationCounters::RECORD_LEN];
        match storage.load(&mut buf) {
            Ok(n) => match DurationCounters::from_bytes(&buf[..n]) {
                Some(counters) => {
                    self.totals = counters;
                    self.last_saved = Some(counters);
                    info!(
                        "Duration counters loaded: powered={}s running={}s",
                        counters.powered_total_secs, counters.running_total_secs
                    );
                }
                None => {
                    warn!("Duration record too short ({n} bytes), starting from zero");
                }
            },
            Err(StorageError::NotFound) => {
                info!("No duration record yet, starting from zero");
            }
            Err(e) => {
                warn!("Duration record load failed ({e}), starting from zero");
            }
        }
    }

    /// Observe one state transition. Entering an energized state opens the
    /// powered interval; leaving closes it into the total. `Running` uses
    /// the same rule on its own interval.
    pub fn on_state_changed(&mut self, old: MachineState, new: MachineState, now_ms: u64) {
        if new.is_energized() && !old.is_energized() {
            self.powered_since_ms = Some(now_ms);
        } else if old.is_energized() && !new.is_energized() {
            if let Some(since) = self.powered_since_ms.take() {
                self.totals.powered_total_secs = self
                    .totals
                    .powered_total_secs
                    .saturating_add(elapsed_secs(since, now_ms));
            }
        }

        if new == MachineState::Running && old != MachineState::Running {
            self.running_since_ms = Some(now_ms);
        } else if old == MachineState::Running && new != MachineState::Running {
            if let Some(since) = self.running_since_ms.take() {
                self.totals.running_total_secs = self
                    .totals
                    .running_total_secs
                    .saturating_add(elapsed_secs(since, now_ms));
            }
        }
    }

    /// Accumulated totals plus any interval currently open. Pure query.
    pub fn live_totals(&self, now_ms: u64) -> DurationCounters {
        let mut t = self.totals;
        if let Some(since) = self.powered_since_ms {
            t.powered_total_secs = t.powered_total_secs.saturating_add(elapsed_secs(since, now_ms));
        }
        if let Some(since) = self.running_since_ms {
            t.running_total_secs = t.running_total_secs.saturating_add(elapsed_secs(since, now_ms));
        }
        t
    }

    /// The start of the currently open powered interval, if any.
    pub fn powered_since_ms(&self) -> Option<u64> {
        self.powered_since_ms
    }

    /// True once the flush cadence has elapsed.
    pub fn flush_due(&self, now_ms: u64) -> bool {
        now_ms / 1000 > self.next_flush_at_secs
    }

    /// Write the live totals through the storage port and re-arm the
    /// cadence. Unchanged totals skip the write. A failed write is logged;
    /// in-memory totals stay intact and the next flush retries.
    pub fn flush(&mut self, storage: &mut impl StoragePort, now_ms: u64) {
        self.next_flush_at_secs = now_ms / 1000 + u64::from(self.flush_interval_secs);

        let live = self.live_totals(now_ms);
        if self.last_saved == Some(live) {
            return;
        }
        match storage.save(&live.to_bytes()) {
            Ok(()) => {
                self.last_saved = Some(live);
                info!(
                    "Duration counters saved: powered={}s running={}s",
                    live.powered_total_secs, live.running_total_secs
                );
            }
            Err(e) => {
                warn!("Duration counter save failed ({e}), will retry on next flush");
            }
        }
    }
}

fn elapsed_secs(since_ms: u64, now_ms: u64) -> u32 {
    (now_ms.saturating_sub(since_ms) / 1000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineState::{NoConnection, Powered, Running, SwitchedOff};

    struct MemStorage {
        record: Option<std::vec::Vec<u8>>,
        fail_saves: bool,
        saves: usize,
    }

    impl MemStorage {
        fn new() -> Self {
            Self {
                record: None,
                fail_saves: false,
                saves: 0,
            }
        }
    }

    impl StoragePort for MemStorage {
        fn load(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
            match &self.record {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => Err(StorageError::NotFound),
            }
        }
        fn save(&mut self, data: &[u8]) -> Result<(), StorageError> {
            if self.fail_saves {
                return Err(StorageError::IoError);
            }
            self.saves += 1;
            self.record = Some(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn record_roundtrip_is_byte_exact() {
        let c = DurationCounters {
            powered_total_secs: 123_456,
            running_total_secs: 78_901,
        };
        let bytes = c.to_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(DurationCounters::from_bytes(&bytes), Some(c));
        // Little-endian layout, powered first.
        assert_eq!(&bytes[..4], &123_456u32.to_le_bytes());
        assert_eq!(&bytes[4..], &78_901u32.to_le_bytes());
    }

    #[test]
    fn short_record_decodes_to_none() {
        assert_eq!(DurationCounters::from_bytes(&[1, 2, 3]), None);
    }

    #[test]
    fn load_defaults_to_zero_on_missing_or_short() {
        let mut acc = DurationAccountant::new(86_400, 0);
        let mut storage = MemStorage::new();
        acc.load(&mut storage);
        assert_eq!(acc.live_totals(0), DurationCounters::default());

        storage.record = Some(vec![1, 2, 3]);
        acc.load(&mut storage);
        assert_eq!(acc.live_totals(0), DurationCounters::default());
    }

    #[test]
    fn powered_interval_accumulates_on_exit() {
        let mut acc = DurationAccountant::new(86_400, 0);
        acc.on_state_changed(SwitchedOff, Powered, 10_000);
        acc.on_state_changed(Powered, SwitchedOff, 70_000);
        assert_eq!(acc.live_totals(70_000).powered_total_secs, 60);
        assert_eq!(acc.live_totals(70_000).running_total_secs, 0);
    }

    #[test]
    fn running_interval_is_nested_in_powered() {
        let mut acc = DurationAccountant::new(86_400, 0);
        acc.on_state_changed(SwitchedOff, Powered, 0);
        acc.on_state_changed(Powered, Running, 10_000);
        acc.on_state_changed(Running, Powered, 40_000);
        acc.on_state_changed(Powered, SwitchedOff, 60_000);
        let t = acc.live_totals(60_000);
        assert_eq!(t.powered_total_secs, 60);
        assert_eq!(t.running_total_secs, 30);
    }

    #[test]
    fn powered_to_running_keeps_powered_interval_open() {
        let mut acc = DurationAccountant::new(86_400, 0);
        acc.on_state_changed(SwitchedOff, Powered, 0);
        let opened = acc.powered_since_ms();
        acc.on_state_changed(Powered, Running, 30_000);
        assert_eq!(acc.powered_since_ms(), opened);
    }

    #[test]
    fn disconnect_closes_both_intervals() {
        let mut acc = DurationAccountant::new(86_400, 0);
        acc.on_state_changed(SwitchedOff, Powered, 0);
        acc.on_state_changed(Powered, Running, 10_000);
        acc.on_state_changed(Running, NoConnection, 30_000);
        let t = acc.live_totals(30_000);
        assert_eq!(t.powered_total_secs, 30);
        assert_eq!(t.running_total_secs, 20);
    }

    #[test]
    fn live_totals_do_not_mutate() {
        let mut acc = DurationAccountant::new(86_400, 0);
        acc.on_state_changed(SwitchedOff, Powered, 0);
        assert_eq!(acc.live_totals(45_000).powered_total_secs, 45);
        assert_eq!(acc.live_totals(45_000).powered_total_secs, 45);
        // Closing the interval yields the same figure, not double.
        acc.on_state_changed(Powered, SwitchedOff, 45_000);
        assert_eq!(acc.live_totals(45_000).powered_total_secs, 45);
    }

    #[test]
    fn flush_cadence_and_rearm() {
        let acc = DurationAccountant::new(100, 0);
        assert!(!acc.flush_due(100_000));
        assert!(acc.flush_due(101_000));
    }

    #[test]
    fn flush_writes_live_totals_and_skips_unchanged() {
        let mut acc = DurationAccountant::new(100, 0);
        let mut storage = MemStorage::new();
        acc.on_state_changed(SwitchedOff, Powered, 0);
        acc.flush(&mut storage, 30_000);
        assert_eq!(storage.saves, 1);
        assert_eq!(
            DurationCounters::from_bytes(storage.record.as_deref().unwrap())
                .unwrap()
                .powered_total_secs,
            30
        );
        // Same totals again: write skipped.
        acc.flush(&mut storage, 30_000);
        assert_eq!(storage.saves, 1);
    }

    #[test]
    fn failed_flush_keeps_memory_and_retries() {
        let mut acc = DurationAccountant::new(100, 0);
        let mut storage = MemStorage::new();
        storage.fail_saves = true;
        acc.on_state_changed(SwitchedOff, Powered, 0);
        acc.flush(&mut storage, 30_000);
        assert_eq!(storage.saves, 0);
        assert_eq!(acc.live_totals(30_000).powered_total_secs, 30);
        // Next flush succeeds and persists.
        storage.fail_saves = false;
        acc.flush(&mut storage, 40_000);
        assert_eq!(storage.saves, 1);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let mut storage = MemStorage::new();
        let mut acc = DurationAccountant::new(100, 0);
        acc.on_state_changed(SwitchedOff, Powered, 0);
        acc.on_state_changed(Powered, Running, 1_000);
        acc.on_state_changed(Running, SwitchedOff, 61_000);
        acc.flush(&mut storage, 61_000);

        let mut fresh = DurationAccountant::new(100, 0);
        fresh.load(&mut storage);
        let t = fresh.live_totals(0);
        assert_eq!(t.powered_total_secs, 61);
        assert_eq!(t.running_total_secs, 60);
    }
}
