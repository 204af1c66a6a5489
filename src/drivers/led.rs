//! Front-panel LED patterns.
//!
//! The service decides a [`LedMode`] per LED each cycle; the hardware
//! adapter evaluates it against the monotonic clock so blinking needs no
//! timers of its own.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    Off,
    On,
    /// Square wave, on for half of `period_ms`.
    Blink { period_ms: u32 },
}

impl LedMode {
    /// The drive level this mode calls for at `now_ms`.
    pub fn level(self, now_ms: u64) -> bool {
        match self {
            Self::Off => false,
            Self::On => true,
            Self::Blink { period_ms } => {
                let period = u64::from(period_ms.max(2));
                now_ms % period < period / 2
            }
        }
    }
}
