//! ALU operations for the 6809.
//!
//! Every arithmetic instruction is expressed as an addition: subtraction adds
//! the one's complement of the operand plus a carry-in, negation subtracts
//! from zero, decrement adds 0xFF. The flags then fall out of three bit tests
//! on the two adder inputs and the result:
//!
//! - carry: one input is 1 and the result bit is 0, or both inputs are 1
//!   (inverted for subtraction, where the 6809 carry means borrow);
//! - overflow: the inputs agree in sign and the result does not;
//! - half carry: the carry test applied to bit 3, by shifting everything
//!   left four places.
//!
//! The helpers work on `u32` so that the complemented operand keeps its
//! upper one bits, exactly as the adder would see them. Only bit 7 of each
//! word (bit 15 for 16-bit operations, tested after shifting right by 8)
//! contributes to a flag, so this cannot leak into the result.

use crate::flags::{C, H, N, V, Z};

const HNZVC: u8 = H | N | Z | V | C;
const NZVC: u8 = N | Z | V | C;
const NZV: u8 = N | Z | V;
const NZC: u8 = N | Z | C;

/// Result of an 8-bit ALU operation with the updated condition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub cc: u8,
}

/// Result of a 16-bit ALU operation with the updated condition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult16 {
    pub value: u16,
    pub cc: u8,
}

/// Carry out of bit 7.
#[must_use]
pub const fn test_c(i0: u32, i1: u32, r: u32, sub: bool) -> bool {
    let flag = ((i0 | i1) & !r) | (i0 & i1);
    ((flag >> 7) & 1 != 0) ^ sub
}

/// Carry out of bit 3.
#[must_use]
pub const fn test_h(i0: u32, i1: u32, r: u32) -> bool {
    test_c(i0 << 4, i1 << 4, r << 4, false)
}

/// Signed overflow at bit 7.
#[must_use]
pub const fn test_v(i0: u32, i1: u32, r: u32) -> bool {
    let flag = !(i0 ^ i1) & (i0 ^ r);
    (flag >> 7) & 1 != 0
}

#[must_use]
pub const fn test_n(r: u32) -> bool {
    (r >> 7) & 1 != 0
}

#[must_use]
pub const fn test_z8(r: u32) -> bool {
    r & 0xFF == 0
}

#[must_use]
pub const fn test_z16(r: u32) -> bool {
    r & 0xFFFF == 0
}

/// Merge `flags` into `cc`, touching only the bits in `affects`.
const fn merge(cc: u8, affects: u8, flags: u8) -> u8 {
    (cc & !affects) | (flags & affects)
}

const fn bit(set: bool, flag: u8) -> u8 {
    if set { flag } else { 0 }
}

/// The 8-bit adder. `affects` selects which of H, N, Z, V, C the caller's
/// instruction actually updates.
const fn adder8(cc: u8, i0: u32, i1: u32, carry_in: u32, sub: bool, affects: u8) -> AluResult {
    let r = i0.wrapping_add(i1).wrapping_add(carry_in);
    let flags = bit(test_h(i0, i1, r), H)
        | bit(test_n(r), N)
        | bit(test_z8(r), Z)
        | bit(test_v(i0, i1, r), V)
        | bit(test_c(i0, i1, r, sub), C);
    AluResult {
        value: r as u8,
        cc: merge(cc, affects, flags),
    }
}

/// The 16-bit adder. Flags are taken from the high byte; there is no H.
const fn adder16(cc: u8, i0: u32, i1: u32, carry_in: u32, sub: bool) -> AluResult16 {
    let r = i0.wrapping_add(i1).wrapping_add(carry_in);
    let flags = bit(test_n(r >> 8), N)
        | bit(test_z16(r), Z)
        | bit(test_v(i0 >> 8, i1 >> 8, r >> 8), V)
        | bit(test_c(i0 >> 8, i1 >> 8, r >> 8, sub), C);
    AluResult16 {
        value: r as u16,
        cc: merge(cc, NZVC, flags),
    }
}

const fn carry(cc: u8) -> u32 {
    (cc & C) as u32
}

// --- Read-modify-write ---

/// NEG: 0 - data.
#[must_use]
pub const fn neg(cc: u8, data: u8) -> AluResult {
    adder8(cc, 0, !(data as u32), 1, true, HNZVC)
}

/// COM: one's complement. V is cleared and C is always set.
#[must_use]
pub const fn com(cc: u8, data: u8) -> AluResult {
    let r = !data;
    let flags = bit(test_n(r as u32), N) | bit(test_z8(r as u32), Z) | C;
    AluResult {
        value: r,
        cc: merge(cc, NZVC, flags),
    }
}

/// LSR: logical shift right, bit 0 into C. N is always cleared.
#[must_use]
pub const fn lsr(cc: u8, data: u8) -> AluResult {
    let r = (data >> 1) & 0x7F;
    let flags = bit(test_z8(r as u32), Z) | bit(data & 1 != 0, C);
    AluResult {
        value: r,
        cc: merge(cc, NZC, flags),
    }
}

/// ROR: rotate right through carry.
#[must_use]
pub const fn ror(cc: u8, data: u8) -> AluResult {
    let r = ((data >> 1) & 0x7F) | ((cc & C) << 7);
    let flags = bit(test_n(r as u32), N) | bit(test_z8(r as u32), Z) | bit(data & 1 != 0, C);
    AluResult {
        value: r,
        cc: merge(cc, NZC, flags),
    }
}

/// ASR: arithmetic shift right, sign bit preserved.
#[must_use]
pub const fn asr(cc: u8, data: u8) -> AluResult {
    let r = ((data >> 1) & 0x7F) | (data & 0x80);
    let flags = bit(test_n(r as u32), N) | bit(test_z8(r as u32), Z) | bit(data & 1 != 0, C);
    AluResult {
        value: r,
        cc: merge(cc, NZC, flags),
    }
}

/// ASL/LSL: data + data. Sets H as a side effect of the adder.
#[must_use]
pub const fn asl(cc: u8, data: u8) -> AluResult {
    adder8(cc, data as u32, data as u32, 0, false, HNZVC)
}

/// ROL: data + data + C.
#[must_use]
pub const fn rol(cc: u8, data: u8) -> AluResult {
    adder8(cc, data as u32, data as u32, carry(cc), false, NZVC)
}

/// DEC: data + 0xFF. C is not affected.
#[must_use]
pub const fn dec(cc: u8, data: u8) -> AluResult {
    adder8(cc, data as u32, 0xFF, 0, false, NZV)
}

/// INC: data + 1. C is not affected.
#[must_use]
pub const fn inc(cc: u8, data: u8) -> AluResult {
    adder8(cc, data as u32, 1, 0, false, NZV)
}

/// TST on a byte: N and Z from the value, V cleared.
#[must_use]
pub const fn tst8(cc: u8, data: u8) -> u8 {
    merge(cc, NZV, bit(test_n(data as u32), N) | bit(test_z8(data as u32), Z))
}

/// TST on a word: N from bit 15, Z from all 16 bits, V cleared.
#[must_use]
pub const fn tst16(cc: u8, data: u16) -> u8 {
    let data = data as u32;
    merge(cc, NZV, bit(test_n(data >> 8), N) | bit(test_z16(data), Z))
}

/// CLR: N=0 Z=1 V=0 C=0.
#[must_use]
pub const fn clr(cc: u8) -> u8 {
    merge(cc, NZVC, Z)
}

// --- Two-operand byte operations ---

/// SUB/CMP: data0 - data1.
#[must_use]
pub const fn sub8(cc: u8, data0: u8, data1: u8) -> AluResult {
    adder8(cc, data0 as u32, !(data1 as u32), 1, true, HNZVC)
}

/// SBC: data0 - data1 - C.
#[must_use]
pub const fn sbc(cc: u8, data0: u8, data1: u8) -> AluResult {
    adder8(cc, data0 as u32, !(data1 as u32), 1 - carry(cc), true, HNZVC)
}

/// AND/BIT.
#[must_use]
pub const fn and(cc: u8, data0: u8, data1: u8) -> AluResult {
    let r = data0 & data1;
    AluResult {
        value: r,
        cc: tst8(cc, r),
    }
}

/// EOR.
#[must_use]
pub const fn eor(cc: u8, data0: u8, data1: u8) -> AluResult {
    let r = data0 ^ data1;
    AluResult {
        value: r,
        cc: tst8(cc, r),
    }
}

/// OR.
#[must_use]
pub const fn or(cc: u8, data0: u8, data1: u8) -> AluResult {
    let r = data0 | data1;
    AluResult {
        value: r,
        cc: tst8(cc, r),
    }
}

/// ADC: data0 + data1 + C.
#[must_use]
pub const fn adc(cc: u8, data0: u8, data1: u8) -> AluResult {
    adder8(cc, data0 as u32, data1 as u32, carry(cc), false, HNZVC)
}

/// ADD: data0 + data1.
#[must_use]
pub const fn add8(cc: u8, data0: u8, data1: u8) -> AluResult {
    adder8(cc, data0 as u32, data1 as u32, 0, false, HNZVC)
}

// --- Word operations ---

/// ADDD.
#[must_use]
pub const fn add16(cc: u8, data0: u16, data1: u16) -> AluResult16 {
    adder16(cc, data0 as u32, data1 as u32, 0, false)
}

/// SUBD and the 16-bit compares.
#[must_use]
pub const fn sub16(cc: u8, data0: u16, data1: u16) -> AluResult16 {
    adder16(cc, data0 as u32, !(data1 as u32), 1, true)
}

// --- Inherent specials ---

/// MUL: D = A * B. Z from the product, C from bit 7 of the product.
#[must_use]
pub const fn mul(cc: u8, a: u8, b: u8) -> AluResult16 {
    let r = a as u32 * b as u32;
    let flags = bit(test_z16(r), Z) | bit((r >> 7) & 1 != 0, C);
    AluResult16 {
        value: r as u16,
        cc: merge(cc, Z | C, flags),
    }
}

/// SEX: sign-extend B into D. N from the resulting A, Z from D.
#[must_use]
pub const fn sex(cc: u8, b: u8) -> AluResult16 {
    let d = b as i8 as i16 as u16;
    let flags = bit(test_n((d >> 8) as u32), N) | bit(test_z16(d as u32), Z);
    AluResult16 {
        value: d,
        cc: merge(cc, N | Z, flags),
    }
}

/// DAA: decimal-adjust A after a BCD addition.
#[must_use]
pub const fn daa(cc: u8, a: u8) -> AluResult {
    let lo = a & 0x0F;
    let hi = a & 0xF0;
    let mut adjust: u8 = 0;
    if lo > 0x09 || cc & H != 0 {
        adjust |= 0x06;
    }
    if hi > 0x80 && lo > 0x09 {
        adjust |= 0x60;
    }
    if hi > 0x90 || cc & C != 0 {
        adjust |= 0x60;
    }
    let i0 = a as u32;
    let i1 = adjust as u32;
    let r = i0 + i1;
    let flags =
        bit(test_n(r), N) | bit(test_z8(r), Z) | bit(test_c(i0, i1, r, false), C);
    AluResult {
        value: r as u8,
        cc: merge(cc, NZVC, flags),
    }
}
