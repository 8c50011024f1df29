//! 6809 condition code register (CC).
//!
//! Bit layout, high to low: `E F H I N Z V C`.

/// Entire flag - set when the stacked frame holds every register.
///
/// RTI looks at this bit to decide whether to pull the full frame or only
/// CC and PC.
pub const E: u8 = 0x80;

/// FIRQ mask - when set, the fast interrupt line is ignored.
pub const F: u8 = 0x40;

/// Half carry - carry out of bit 3 on 8-bit additions and subtractions.
pub const H: u8 = 0x20;

/// IRQ mask - when set, the normal interrupt line is ignored.
pub const I: u8 = 0x10;

/// Negative - bit 7 (or bit 15) of the result.
pub const N: u8 = 0x08;

/// Zero - result is zero.
pub const Z: u8 = 0x04;

/// Overflow - signed result does not fit.
pub const V: u8 = 0x02;

/// Carry - carry out of the top bit, or borrow on subtraction.
pub const C: u8 = 0x01;

/// Set or clear `flag` in `cc`.
#[must_use]
pub const fn with(cc: u8, flag: u8, set: bool) -> u8 {
    if set { cc | flag } else { cc & !flag }
}
