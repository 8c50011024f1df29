//! PSG output conversion for hosts that want signed PCM.

#![allow(clippy::cast_possible_truncation)]

/// Convert one PSG level (0-15) to signed 16-bit PCM, centred on the
/// middle of the PSG's range.
#[must_use]
pub fn sample_to_pcm16(level: u8) -> i16 {
    ((i32::from(level) << 8) - 0x7FF) as i16
}

/// Convert a block of PSG levels.
#[must_use]
pub fn to_pcm16(levels: &[u8]) -> Vec<i16> {
    levels.iter().copied().map(sample_to_pcm16).collect()
}
