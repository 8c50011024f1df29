//! Effective-address calculation.

use emu_core::Bus;

use super::Mc6809;

/// Operand addressing mode of a two-operand instruction, from opcode bits 4-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    Immediate,
    Direct,
    Indexed,
    Extended,
}

impl Mode {
    pub(super) const fn from_opcode(op: u8) -> Self {
        match op & 0x30 {
            0x00 => Self::Immediate,
            0x10 => Self::Direct,
            0x20 => Self::Indexed,
            _ => Self::Extended,
        }
    }

    /// Pick the base cycle count for this mode from an
    /// `[immediate, direct, indexed, extended]` row.
    pub(super) const fn cycles(self, row: [u32; 4]) -> u32 {
        match self {
            Self::Immediate => row[0],
            Self::Direct => row[1],
            Self::Indexed => row[2],
            Self::Extended => row[3],
        }
    }
}

impl Mc6809 {
    /// DP:byte.
    pub(super) fn ea_direct<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch8(bus);
        u16::from_be_bytes([self.regs.dp, lo])
    }

    /// Absolute 16-bit address.
    pub(super) fn ea_extended<B: Bus>(&mut self, bus: &mut B) -> u16 {
        self.fetch16(bus)
    }

    /// Effective address for a memory mode, with any indexed surcharge
    /// added to `cycles`. Immediate mode has no address and is never passed.
    pub(super) fn ea<B: Bus>(&mut self, bus: &mut B, mode: Mode, cycles: &mut u32) -> u16 {
        match mode {
            Mode::Direct => self.ea_direct(bus),
            Mode::Indexed => self.ea_indexed(bus, cycles),
            Mode::Extended | Mode::Immediate => self.ea_extended(bus),
        }
    }

    fn index_reg(&self, r: u8) -> u16 {
        match r {
            0 => self.regs.x,
            1 => self.regs.y,
            2 => self.regs.u,
            _ => self.regs.s,
        }
    }

    fn set_index_reg(&mut self, r: u8, value: u16) {
        match r {
            0 => self.regs.x = value,
            1 => self.regs.y = value,
            2 => self.regs.u = value,
            _ => self.regs.s = value,
        }
    }

    /// Decode an indexed post-byte and return the effective address.
    ///
    /// Post-byte bits 5-6 select X, Y, U or S. Bit 4 of the non-5-bit forms
    /// adds an indirection through the computed address. Each form adds its
    /// own surcharge to `cycles`. Post-bytes with no defined form yield
    /// address 0 at no extra cost.
    pub(super) fn ea_indexed<B: Bus>(&mut self, bus: &mut B, cycles: &mut u32) -> u16 {
        let post = self.fetch8(bus);
        let r = (post >> 5) & 3;
        let base = self.index_reg(r);

        if post & 0x80 == 0 {
            // 5-bit signed offset in bits 0-4.
            let offset = u16::from(post & 0x0F);
            *cycles += 1;
            return if post & 0x10 == 0 {
                base.wrapping_add(offset)
            } else {
                base.wrapping_add(offset).wrapping_sub(0x10)
            };
        }

        let (ea, extra) = match post & 0x1F {
            // ,R+ / ,R++
            0x00 | 0x01 => {
                let step = 1 + u16::from(post & 1);
                self.set_index_reg(r, base.wrapping_add(step));
                (base, 2 + u32::from(post & 1))
            }
            // [,R+] / [,R++]
            0x10 | 0x11 => {
                let step = 1 + u16::from(post & 1);
                let ea = Self::read16(bus, base);
                self.set_index_reg(r, base.wrapping_add(step));
                (ea, 5 + u32::from(post & 1))
            }
            // ,-R / ,--R
            0x02 | 0x03 => {
                let reg = base.wrapping_sub(1 + u16::from(post & 1));
                self.set_index_reg(r, reg);
                (reg, 2 + u32::from(post & 1))
            }
            // [,-R] / [,--R]
            0x12 | 0x13 => {
                let reg = base.wrapping_sub(1 + u16::from(post & 1));
                self.set_index_reg(r, reg);
                (Self::read16(bus, reg), 5 + u32::from(post & 1))
            }
            // ,R
            0x04 => (base, 0),
            0x14 => (Self::read16(bus, base), 3),
            // B,R
            0x05 => (base.wrapping_add(sign_extend(self.regs.b)), 1),
            0x15 => (Self::read16(bus, base.wrapping_add(sign_extend(self.regs.b))), 4),
            // A,R
            0x06 => (base.wrapping_add(sign_extend(self.regs.a)), 1),
            0x16 => (Self::read16(bus, base.wrapping_add(sign_extend(self.regs.a))), 4),
            // n8,R
            0x08 => {
                let offset = sign_extend(self.fetch8(bus));
                (base.wrapping_add(offset), 1)
            }
            0x18 => {
                let offset = sign_extend(self.fetch8(bus));
                (Self::read16(bus, base.wrapping_add(offset)), 4)
            }
            // n16,R
            0x09 => {
                let offset = self.fetch16(bus);
                (base.wrapping_add(offset), 4)
            }
            0x19 => {
                let offset = self.fetch16(bus);
                (Self::read16(bus, base.wrapping_add(offset)), 7)
            }
            // D,R
            0x0B => (base.wrapping_add(self.regs.d()), 4),
            0x1B => (Self::read16(bus, base.wrapping_add(self.regs.d())), 7),
            // n8,PC (PC after the offset byte)
            0x0C => {
                let offset = sign_extend(self.fetch8(bus));
                (self.regs.pc.wrapping_add(offset), 1)
            }
            0x1C => {
                let offset = sign_extend(self.fetch8(bus));
                (Self::read16(bus, self.regs.pc.wrapping_add(offset)), 4)
            }
            // n16,PC
            0x0D => {
                let offset = self.fetch16(bus);
                (self.regs.pc.wrapping_add(offset), 5)
            }
            0x1D => {
                let offset = self.fetch16(bus);
                (Self::read16(bus, self.regs.pc.wrapping_add(offset)), 8)
            }
            // [n16] is only defined with the X register bits clear.
            0x1F if post == 0x9F => {
                let address = self.fetch16(bus);
                (Self::read16(bus, address), 5)
            }
            _ => (0, 0),
        };

        *cycles += extra;
        ea
    }
}

/// Sign-extend an 8-bit offset to 16 bits.
pub(super) const fn sign_extend(value: u8) -> u16 {
    value as i8 as i16 as u16
}
