//! Instruction decode and execution.
//!
//! The 6809 opcode map is regular enough to decode by field rather than by
//! a 256-entry table:
//!
//! - `0x00-0x0F`, `0x60-0x7F`: read-modify-write on memory (direct, indexed,
//!   extended), selected by the low nibble.
//! - `0x40-0x5F`: the same operations on A and B.
//! - `0x20-0x2F`: short branches.
//! - `0x80-0xFF`: two-operand instructions. Bit 6 selects A or B (or the
//!   16-bit register pair for that column), bits 4-5 the addressing mode.
//! - `0x10`, `0x11`: prefixes for the 16-bit compares, Y and S loads and
//!   stores, long branches and SWI2/SWI3.
//!
//! Everything else is a one-off. Undefined opcodes cost nothing and touch
//! nothing but PC.

use emu_core::Bus;

use super::addressing::{Mode, sign_extend};
use super::{Mc6809, STACK_ALL, STACK_PC_CC, Stack};
use crate::alu::{self, AluResult};
use crate::flags::{C, E, F, I, N, V, Z};
use crate::registers::IrqStatus;

const VECTOR_SWI: u16 = 0xFFFA;
const VECTOR_SWI2: u16 = 0xFFF4;
const VECTOR_SWI3: u16 = 0xFFF2;

/// Base cycles per addressing mode: `[immediate, direct, indexed, extended]`.
const CYCLES_ALU8: [u32; 4] = [2, 4, 4, 5];
const CYCLES_ARITH16: [u32; 4] = [4, 6, 6, 7];
const CYCLES_LOAD16: [u32; 4] = [3, 5, 5, 6];
const CYCLES_STORE16: [u32; 4] = [0, 5, 5, 6];
const CYCLES_JSR: [u32; 4] = [0, 7, 7, 8];
const CYCLES_CMP16_PREFIXED: [u32; 4] = [5, 7, 7, 8];
const CYCLES_LOAD16_PREFIXED: [u32; 4] = [4, 6, 6, 7];
const CYCLES_STORE16_PREFIXED: [u32; 4] = [0, 6, 6, 7];

/// Single-operand operations sharing the `0x00/0x40/0x50/0x60/0x70` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unary {
    Neg,
    Com,
    Lsr,
    Ror,
    Asr,
    Asl,
    Rol,
    Dec,
    Inc,
    Tst,
    Jmp,
    Clr,
}

impl Unary {
    const fn decode(op: u8) -> Option<Self> {
        Some(match op & 0x0F {
            0x0 => Self::Neg,
            0x3 => Self::Com,
            0x4 => Self::Lsr,
            0x6 => Self::Ror,
            0x7 => Self::Asr,
            0x8 => Self::Asl,
            0x9 => Self::Rol,
            0xA => Self::Dec,
            0xC => Self::Inc,
            0xD => Self::Tst,
            0xE => Self::Jmp,
            0xF => Self::Clr,
            _ => return None,
        })
    }

    /// Result and flags. TST returns its operand unchanged.
    const fn apply(self, cc: u8, data: u8) -> AluResult {
        match self {
            Self::Neg => alu::neg(cc, data),
            Self::Com => alu::com(cc, data),
            Self::Lsr => alu::lsr(cc, data),
            Self::Ror => alu::ror(cc, data),
            Self::Asr => alu::asr(cc, data),
            Self::Asl => alu::asl(cc, data),
            Self::Rol => alu::rol(cc, data),
            Self::Dec => alu::dec(cc, data),
            Self::Inc => alu::inc(cc, data),
            Self::Tst | Self::Jmp => AluResult {
                value: data,
                cc: alu::tst8(cc, data),
            },
            Self::Clr => AluResult {
                value: 0,
                cc: alu::clr(cc),
            },
        }
    }
}

impl Mc6809 {
    /// Fetch, decode and execute one instruction. Returns its cycle cost.
    pub(super) fn execute<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch8(bus);
        match op {
            0x10 => self.execute_page10(bus),
            0x11 => self.execute_page11(bus),
            0x00..=0x0F | 0x60..=0x7F => self.execute_unary_memory(bus, op),
            0x40..=0x5F => self.execute_unary_inherent(op),
            0x20..=0x2F => {
                let offset = sign_extend(self.fetch8(bus));
                if self.branch_taken(op) {
                    self.regs.pc = self.regs.pc.wrapping_add(offset);
                }
                3
            }
            0x80..=0xFF => self.execute_two_operand(bus, op),
            _ => self.execute_misc(bus, op),
        }
    }

    /// Branch condition for a branch opcode. Even opcodes branch when the
    /// tested expression is false, odd ones when it is true.
    fn branch_taken(&self, op: u8) -> bool {
        let r = &self.regs;
        let n_xor_v = r.flag(N) ^ r.flag(V);
        let test = match (op >> 1) & 7 {
            0 => false,
            1 => r.flag(C) | r.flag(Z),
            2 => r.flag(C),
            3 => r.flag(Z),
            4 => r.flag(V),
            5 => r.flag(N),
            6 => n_xor_v,
            _ => r.flag(Z) | n_xor_v,
        };
        test == (op & 1 != 0)
    }

    fn execute_unary_memory<B: Bus>(&mut self, bus: &mut B, op: u8) -> u32 {
        let Some(kind) = Unary::decode(op) else {
            return 0;
        };
        let (mode, mut cycles) = match op >> 4 {
            0x0 => (Mode::Direct, 6),
            0x6 => (Mode::Indexed, 6),
            _ => (Mode::Extended, 7),
        };
        if kind == Unary::Jmp {
            cycles -= 3;
        }

        let ea = self.ea(bus, mode, &mut cycles);
        match kind {
            Unary::Jmp => self.regs.pc = ea,
            // CLR writes without reading first.
            Unary::Clr => {
                self.regs.cc = alu::clr(self.regs.cc);
                bus.write(ea, 0);
            }
            Unary::Tst => {
                let data = bus.read(ea);
                self.regs.cc = alu::tst8(self.regs.cc, data);
            }
            _ => {
                let data = bus.read(ea);
                let r = kind.apply(self.regs.cc, data);
                self.regs.cc = r.cc;
                bus.write(ea, r.value);
            }
        }
        cycles
    }

    fn execute_unary_inherent(&mut self, op: u8) -> u32 {
        match Unary::decode(op) {
            Some(Unary::Jmp) | None => 0,
            Some(kind) => {
                let use_b = op & 0x10 != 0;
                let r = kind.apply(self.regs.cc, self.acc(use_b));
                self.regs.cc = r.cc;
                self.set_acc(use_b, r.value);
                2
            }
        }
    }

    fn acc(&self, use_b: bool) -> u8 {
        if use_b { self.regs.b } else { self.regs.a }
    }

    fn set_acc(&mut self, use_b: bool, value: u8) {
        if use_b {
            self.regs.b = value;
        } else {
            self.regs.a = value;
        }
    }

    fn operand8<B: Bus>(&mut self, bus: &mut B, mode: Mode, cycles: &mut u32) -> u8 {
        if mode == Mode::Immediate {
            self.fetch8(bus)
        } else {
            let ea = self.ea(bus, mode, cycles);
            bus.read(ea)
        }
    }

    fn operand16<B: Bus>(&mut self, bus: &mut B, mode: Mode, cycles: &mut u32) -> u16 {
        if mode == Mode::Immediate {
            self.fetch16(bus)
        } else {
            let ea = self.ea(bus, mode, cycles);
            Self::read16(bus, ea)
        }
    }

    /// Store a 16-bit register, setting N and Z from it. Returns the cycles,
    /// or 0 for the undefined immediate form.
    fn store16<B: Bus>(&mut self, bus: &mut B, mode: Mode, row: [u32; 4], value: u16) -> u32 {
        if mode == Mode::Immediate {
            return 0;
        }
        let mut cycles = mode.cycles(row);
        let ea = self.ea(bus, mode, &mut cycles);
        Self::write16(bus, ea, value);
        self.regs.cc = alu::tst16(self.regs.cc, value);
        cycles
    }

    /// Load a 16-bit operand, setting N and Z from it.
    fn load16<B: Bus>(&mut self, bus: &mut B, mode: Mode, row: [u32; 4]) -> (u16, u32) {
        let mut cycles = mode.cycles(row);
        let value = self.operand16(bus, mode, &mut cycles);
        self.regs.cc = alu::tst16(self.regs.cc, value);
        (value, cycles)
    }

    /// 16-bit compare: flags from `register - operand`, result discarded.
    fn compare16<B: Bus>(&mut self, bus: &mut B, mode: Mode, row: [u32; 4], register: u16) -> u32 {
        let mut cycles = mode.cycles(row);
        let operand = self.operand16(bus, mode, &mut cycles);
        self.regs.cc = alu::sub16(self.regs.cc, register, operand).cc;
        cycles
    }

    fn execute_two_operand<B: Bus>(&mut self, bus: &mut B, op: u8) -> u32 {
        let mode = Mode::from_opcode(op);
        let use_b = op & 0x40 != 0;

        match op & 0x0F {
            0x7 => {
                // STA/STB
                if mode == Mode::Immediate {
                    return 0;
                }
                let mut cycles = mode.cycles(CYCLES_ALU8);
                let ea = self.ea(bus, mode, &mut cycles);
                let value = self.acc(use_b);
                bus.write(ea, value);
                self.regs.cc = alu::tst8(self.regs.cc, value);
                cycles
            }
            0x3 => {
                // SUBD (A column) / ADDD (B column)
                let mut cycles = mode.cycles(CYCLES_ARITH16);
                let operand = self.operand16(bus, mode, &mut cycles);
                let d = self.regs.d();
                let r = if use_b {
                    alu::add16(self.regs.cc, d, operand)
                } else {
                    alu::sub16(self.regs.cc, d, operand)
                };
                self.regs.set_d(r.value);
                self.regs.cc = r.cc;
                cycles
            }
            0xC => {
                if use_b {
                    let (value, cycles) = self.load16(bus, mode, CYCLES_LOAD16);
                    self.regs.set_d(value);
                    cycles
                } else {
                    let x = self.regs.x;
                    self.compare16(bus, mode, CYCLES_ARITH16, x)
                }
            }
            0xD => {
                if use_b {
                    let d = self.regs.d();
                    self.store16(bus, mode, CYCLES_STORE16, d)
                } else if mode == Mode::Immediate {
                    // BSR
                    let offset = sign_extend(self.fetch8(bus));
                    self.push16(bus, Stack::S, self.regs.pc);
                    self.regs.pc = self.regs.pc.wrapping_add(offset);
                    7
                } else {
                    // JSR
                    let mut cycles = mode.cycles(CYCLES_JSR);
                    let ea = self.ea(bus, mode, &mut cycles);
                    self.push16(bus, Stack::S, self.regs.pc);
                    self.regs.pc = ea;
                    cycles
                }
            }
            0xE => {
                let (value, cycles) = self.load16(bus, mode, CYCLES_LOAD16);
                if use_b {
                    self.regs.u = value;
                } else {
                    self.regs.x = value;
                }
                cycles
            }
            0xF => {
                let value = if use_b { self.regs.u } else { self.regs.x };
                self.store16(bus, mode, CYCLES_STORE16, value)
            }
            low => {
                let mut cycles = mode.cycles(CYCLES_ALU8);
                let operand = self.operand8(bus, mode, &mut cycles);
                let acc = self.acc(use_b);
                let cc = self.regs.cc;
                let (r, store) = match low {
                    0x0 => (alu::sub8(cc, acc, operand), true),
                    0x1 => (alu::sub8(cc, acc, operand), false),
                    0x2 => (alu::sbc(cc, acc, operand), true),
                    0x4 => (alu::and(cc, acc, operand), true),
                    0x5 => (alu::and(cc, acc, operand), false),
                    0x6 => (
                        AluResult {
                            value: operand,
                            cc: alu::tst8(cc, operand),
                        },
                        true,
                    ),
                    0x8 => (alu::eor(cc, acc, operand), true),
                    0x9 => (alu::adc(cc, acc, operand), true),
                    0xA => (alu::or(cc, acc, operand), true),
                    _ => (alu::add8(cc, acc, operand), true),
                };
                self.regs.cc = r.cc;
                if store {
                    self.set_acc(use_b, r.value);
                }
                cycles
            }
        }
    }

    /// Value of a register named by an EXG/TFR nibble. 8-bit registers read
    /// with 0xFF in the high byte; unknown codes read 0xFFFF.
    fn transfer_read(&self, code: u8) -> u16 {
        let r = &self.regs;
        match code {
            0x0 => r.d(),
            0x1 => r.x,
            0x2 => r.y,
            0x3 => r.u,
            0x4 => r.s,
            0x5 => r.pc,
            0x8 => 0xFF00 | u16::from(r.a),
            0x9 => 0xFF00 | u16::from(r.b),
            0xA => 0xFF00 | u16::from(r.cc),
            0xB => 0xFF00 | u16::from(r.dp),
            _ => 0xFFFF,
        }
    }

    /// Write a register named by an EXG/TFR nibble. 8-bit registers take
    /// the low byte; unknown codes are ignored.
    fn transfer_write(&mut self, code: u8, value: u16) {
        let r = &mut self.regs;
        match code {
            0x0 => r.set_d(value),
            0x1 => r.x = value,
            0x2 => r.y = value,
            0x3 => r.u = value,
            0x4 => r.s = value,
            0x5 => r.pc = value,
            0x8 => r.a = value as u8,
            0x9 => r.b = value as u8,
            0xA => r.cc = value as u8,
            0xB => r.dp = value as u8,
            _ => {}
        }
    }

    /// Software interrupt: stack everything with E set and vector.
    fn software_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16, mask_interrupts: bool) -> u32 {
        self.regs.set_flag(E, true);
        let cycles = self.push_registers(bus, STACK_ALL, Stack::S);
        if mask_interrupts {
            self.regs.set_flag(I, true);
            self.regs.set_flag(F, true);
        }
        self.regs.pc = Self::read16(bus, vector);
        cycles
    }

    fn execute_misc<B: Bus>(&mut self, bus: &mut B, op: u8) -> u32 {
        match op {
            // NOP
            0x12 => 2,
            // SYNC
            0x13 => {
                self.irq_status = IrqStatus::Sync;
                2
            }
            // LBRA
            0x16 => {
                let offset = self.fetch16(bus);
                self.regs.pc = self.regs.pc.wrapping_add(offset);
                5
            }
            // LBSR
            0x17 => {
                let offset = self.fetch16(bus);
                self.push16(bus, Stack::S, self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add(offset);
                9
            }
            // DAA
            0x19 => {
                let r = alu::daa(self.regs.cc, self.regs.a);
                self.regs.a = r.value;
                self.regs.cc = r.cc;
                2
            }
            // ORCC
            0x1A => {
                self.regs.cc |= self.fetch8(bus);
                3
            }
            // ANDCC
            0x1C => {
                self.regs.cc &= self.fetch8(bus);
                3
            }
            // SEX
            0x1D => {
                let r = alu::sex(self.regs.cc, self.regs.b);
                self.regs.set_d(r.value);
                self.regs.cc = r.cc;
                2
            }
            // EXG
            0x1E => {
                let post = self.fetch8(bus);
                let (src, dst) = (post >> 4, post & 0x0F);
                let saved = self.transfer_read(dst);
                self.transfer_write(dst, self.transfer_read(src));
                self.transfer_write(src, saved);
                8
            }
            // TFR
            0x1F => {
                let post = self.fetch8(bus);
                self.transfer_write(post & 0x0F, self.transfer_read(post >> 4));
                6
            }
            // LEAX, LEAY, LEAS, LEAU
            0x30..=0x33 => {
                let mut cycles = 4;
                let ea = self.ea_indexed(bus, &mut cycles);
                match op {
                    0x30 => {
                        self.regs.x = ea;
                        self.regs.set_flag(Z, ea == 0);
                    }
                    0x31 => {
                        self.regs.y = ea;
                        self.regs.set_flag(Z, ea == 0);
                    }
                    0x32 => self.regs.s = ea,
                    _ => self.regs.u = ea,
                }
                cycles
            }
            // PSHS, PULS, PSHU, PULU
            0x34..=0x37 => {
                let mask = self.fetch8(bus);
                let stack = if op < 0x36 { Stack::S } else { Stack::U };
                let extra = if op & 1 == 0 {
                    self.push_registers(bus, mask, stack)
                } else {
                    self.pull_registers(bus, mask, stack)
                };
                5 + extra
            }
            // RTS
            0x39 => {
                self.regs.pc = self.pull16(bus, Stack::S);
                5
            }
            // ABX
            0x3A => {
                self.regs.x = self.regs.x.wrapping_add(u16::from(self.regs.b));
                3
            }
            // RTI
            0x3B => {
                let mask = if self.regs.flag(E) { STACK_ALL } else { STACK_PC_CC };
                3 + self.pull_registers(bus, mask, Stack::S)
            }
            // CWAI
            0x3C => {
                self.regs.cc &= self.fetch8(bus);
                self.regs.set_flag(E, true);
                let extra = self.push_registers(bus, STACK_ALL, Stack::S);
                self.irq_status = IrqStatus::Cwai;
                4 + extra
            }
            // MUL
            0x3D => {
                let r = alu::mul(self.regs.cc, self.regs.a, self.regs.b);
                self.regs.set_d(r.value);
                self.regs.cc = r.cc;
                11
            }
            // SWI
            0x3F => 7 + self.software_interrupt(bus, VECTOR_SWI, true),
            _ => 0,
        }
    }

    /// Instructions behind the 0x10 prefix.
    fn execute_page10<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch8(bus);
        let mode = Mode::from_opcode(op);
        match op {
            // Long branches
            0x20..=0x2F => {
                let offset = self.fetch16(bus);
                if self.branch_taken(op) {
                    self.regs.pc = self.regs.pc.wrapping_add(offset);
                    6
                } else {
                    5
                }
            }
            // SWI2
            0x3F => 8 + self.software_interrupt(bus, VECTOR_SWI2, false),
            // CMPD
            0x83 | 0x93 | 0xA3 | 0xB3 => {
                let d = self.regs.d();
                self.compare16(bus, mode, CYCLES_CMP16_PREFIXED, d)
            }
            // CMPY
            0x8C | 0x9C | 0xAC | 0xBC => {
                let y = self.regs.y;
                self.compare16(bus, mode, CYCLES_CMP16_PREFIXED, y)
            }
            // LDY
            0x8E | 0x9E | 0xAE | 0xBE => {
                let (value, cycles) = self.load16(bus, mode, CYCLES_LOAD16_PREFIXED);
                self.regs.y = value;
                cycles
            }
            // STY
            0x9F | 0xAF | 0xBF => {
                let y = self.regs.y;
                self.store16(bus, mode, CYCLES_STORE16_PREFIXED, y)
            }
            // LDS
            0xCE | 0xDE | 0xEE | 0xFE => {
                let (value, cycles) = self.load16(bus, mode, CYCLES_LOAD16_PREFIXED);
                self.regs.s = value;
                cycles
            }
            // STS
            0xDF | 0xEF | 0xFF => {
                let s = self.regs.s;
                self.store16(bus, mode, CYCLES_STORE16_PREFIXED, s)
            }
            _ => 0,
        }
    }

    /// Instructions behind the 0x11 prefix.
    fn execute_page11<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch8(bus);
        let mode = Mode::from_opcode(op);
        match op {
            // SWI3
            0x3F => 8 + self.software_interrupt(bus, VECTOR_SWI3, false),
            // CMPU
            0x83 | 0x93 | 0xA3 | 0xB3 => {
                let u = self.regs.u;
                self.compare16(bus, mode, CYCLES_CMP16_PREFIXED, u)
            }
            // CMPS
            0x8C | 0x9C | 0xAC | 0xBC => {
                let s = self.regs.s;
                self.compare16(bus, mode, CYCLES_CMP16_PREFIXED, s)
            }
            _ => 0,
        }
    }
}
