//! Vectrex configuration and timing.

use emu_core::MasterClock;

/// The 6809 and VIA share one 1.5 MHz clock.
pub const CLOCK: MasterClock = MasterClock::new(1_500_000);

/// Cycles between vector frame boundaries (30 Hz phosphor decay).
pub const FRAME_CYCLES: i64 = CLOCK.ticks_per_frame(30).as_budget();

/// Cycles the host runs per display refresh (20 ms).
pub const HOST_FRAME_CYCLES: u64 = CLOCK.ticks_per_millis(20).get();

/// Host audio rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Audio samples pulled per host frame.
pub const SAMPLES_PER_HOST_FRAME: usize = SAMPLE_RATE as usize / 50;

/// Size of the system ROM.
pub const BIOS_SIZE: usize = 0x2000;

/// Largest cartridge image, two 32 KB banks.
pub const CARTRIDGE_SIZE: usize = 0x1_0000;

/// Configuration for constructing a Vectrex instance.
pub struct VectrexConfig {
    /// System ROM (8,192 bytes), mapped at $E000-$FFFF.
    pub bios: Vec<u8>,
    /// Optional cartridge image (1 to 65,536 bytes).
    pub cartridge: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_timing() {
        assert_eq!(FRAME_CYCLES, 50_000);
        assert_eq!(HOST_FRAME_CYCLES, 30_000);
        assert_eq!(SAMPLES_PER_HOST_FRAME, 882);
    }
}
