//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. On machines
/// where the CPU is the only clock source (the Vectrex runs its 6809 and
/// VIA from one 1.5 MHz clock) a tick and a CPU cycle are the same thing.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g., `1_500_000` for the Vectrex).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Ticks per frame at the given frame rate (integer division).
    #[must_use]
    pub const fn ticks_per_frame(&self, frames_per_second: u64) -> Ticks {
        Ticks::new(self.frequency_hz / frames_per_second)
    }

    /// Ticks in a slice of wall-clock time given in milliseconds.
    #[must_use]
    pub const fn ticks_per_millis(&self, millis: u64) -> Ticks {
        Ticks::new(self.frequency_hz / 1000 * millis)
    }
}
