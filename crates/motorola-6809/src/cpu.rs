//! 6809 CPU core with per-instruction execution.

mod addressing;
mod execute;

use emu_core::{Bus, Cpu, Observable, StateError, StateReader, StateWriter, Value};

use crate::flags::{C, E, F, H, I, N, V, Z};
use crate::registers::{IrqStatus, Registers};

/// Reset vector.
const VECTOR_RESET: u16 = 0xFFFE;
/// Fast interrupt vector.
const VECTOR_FIRQ: u16 = 0xFFF6;
/// Normal interrupt vector.
const VECTOR_IRQ: u16 = 0xFFF8;

/// PSH/PUL post-byte selecting every register.
const STACK_ALL: u8 = 0xFF;
/// PSH/PUL post-byte selecting PC and CC only (the FIRQ frame).
const STACK_PC_CC: u8 = 0x81;

/// Which stack pointer a push or pull runs against.
///
/// The post-byte bit 0x40 always names the *other* stack pointer: U when
/// working on S, S when working on U.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stack {
    S,
    U,
}

/// Motorola 6809 CPU.
///
/// The CPU does not own the bus. It is lent to `step()` for the duration of
/// one instruction so that the machine can route accesses to its memory map
/// and peripherals.
#[derive(Debug, Clone, Default)]
pub struct Mc6809 {
    /// Register file.
    pub regs: Registers,
    /// SYNC/CWAI wait state.
    irq_status: IrqStatus,
    /// Cycles executed since construction, for observation only.
    total_cycles: u64,
}

impl Mc6809 {
    /// Create a CPU with all registers cleared.
    ///
    /// Call [`Cpu::reset`] before stepping to load PC from the reset vector
    /// and mask interrupts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wait state.
    #[must_use]
    pub fn irq_status(&self) -> IrqStatus {
        self.irq_status
    }

    /// Total cycles executed.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    // --- Bus helpers ---

    fn read16<B: Bus>(bus: &mut B, address: u16) -> u16 {
        bus.read_word(address)
    }

    fn write16<B: Bus>(bus: &mut B, address: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        bus.write(address, hi);
        bus.write(address.wrapping_add(1), lo);
    }

    fn fetch8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = bus.read_word(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        value
    }

    // --- Stack ---

    fn sp_mut(&mut self, stack: Stack) -> &mut u16 {
        match stack {
            Stack::S => &mut self.regs.s,
            Stack::U => &mut self.regs.u,
        }
    }

    fn other_sp(&self, stack: Stack) -> u16 {
        match stack {
            Stack::S => self.regs.u,
            Stack::U => self.regs.s,
        }
    }

    fn set_other_sp(&mut self, stack: Stack, value: u16) {
        match stack {
            Stack::S => self.regs.u = value,
            Stack::U => self.regs.s = value,
        }
    }

    fn push8<B: Bus>(&mut self, bus: &mut B, stack: Stack, value: u8) {
        let sp = self.sp_mut(stack);
        *sp = sp.wrapping_sub(1);
        let address = *sp;
        bus.write(address, value);
    }

    fn pull8<B: Bus>(&mut self, bus: &mut B, stack: Stack) -> u8 {
        let sp = self.sp_mut(stack);
        let address = *sp;
        *sp = sp.wrapping_add(1);
        bus.read(address)
    }

    fn push16<B: Bus>(&mut self, bus: &mut B, stack: Stack, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.push8(bus, stack, lo);
        self.push8(bus, stack, hi);
    }

    fn pull16<B: Bus>(&mut self, bus: &mut B, stack: Stack) -> u16 {
        let hi = self.pull8(bus, stack);
        let lo = self.pull8(bus, stack);
        u16::from_be_bytes([hi, lo])
    }

    /// Push the registers selected by `mask` in hardware order
    /// (PC, U/S, Y, X, DP, B, A, CC). Returns the extra cycles.
    fn push_registers<B: Bus>(&mut self, bus: &mut B, mask: u8, stack: Stack) -> u32 {
        let mut cycles = 0;
        if mask & 0x80 != 0 {
            self.push16(bus, stack, self.regs.pc);
            cycles += 2;
        }
        if mask & 0x40 != 0 {
            let other = self.other_sp(stack);
            self.push16(bus, stack, other);
            cycles += 2;
        }
        if mask & 0x20 != 0 {
            self.push16(bus, stack, self.regs.y);
            cycles += 2;
        }
        if mask & 0x10 != 0 {
            self.push16(bus, stack, self.regs.x);
            cycles += 2;
        }
        if mask & 0x08 != 0 {
            self.push8(bus, stack, self.regs.dp);
            cycles += 1;
        }
        if mask & 0x04 != 0 {
            self.push8(bus, stack, self.regs.b);
            cycles += 1;
        }
        if mask & 0x02 != 0 {
            self.push8(bus, stack, self.regs.a);
            cycles += 1;
        }
        if mask & 0x01 != 0 {
            self.push8(bus, stack, self.regs.cc);
            cycles += 1;
        }
        cycles
    }

    /// Pull the registers selected by `mask` in reverse hardware order.
    /// Returns the extra cycles.
    fn pull_registers<B: Bus>(&mut self, bus: &mut B, mask: u8, stack: Stack) -> u32 {
        let mut cycles = 0;
        if mask & 0x01 != 0 {
            self.regs.cc = self.pull8(bus, stack);
            cycles += 1;
        }
        if mask & 0x02 != 0 {
            self.regs.a = self.pull8(bus, stack);
            cycles += 1;
        }
        if mask & 0x04 != 0 {
            self.regs.b = self.pull8(bus, stack);
            cycles += 1;
        }
        if mask & 0x08 != 0 {
            self.regs.dp = self.pull8(bus, stack);
            cycles += 1;
        }
        if mask & 0x10 != 0 {
            self.regs.x = self.pull16(bus, stack);
            cycles += 2;
        }
        if mask & 0x20 != 0 {
            self.regs.y = self.pull16(bus, stack);
            cycles += 2;
        }
        if mask & 0x40 != 0 {
            let other = self.pull16(bus, stack);
            self.set_other_sp(stack, other);
            cycles += 2;
        }
        if mask & 0x80 != 0 {
            self.regs.pc = self.pull16(bus, stack);
            cycles += 2;
        }
        cycles
    }

    // --- Interrupts ---

    /// Service the interrupt lines. Returns the cycles spent stacking and
    /// vectoring (zero if nothing was taken).
    fn service_interrupts<B: Bus>(&mut self, bus: &mut B, irq: bool, firq: bool) -> u32 {
        let mut cycles = 0;

        if firq {
            if self.regs.flag(F) {
                if self.irq_status == IrqStatus::Sync {
                    self.irq_status = IrqStatus::Normal;
                }
            } else {
                if self.irq_status != IrqStatus::Cwai {
                    self.regs.set_flag(E, false);
                    cycles += self.push_registers(bus, STACK_PC_CC, Stack::S);
                }
                self.regs.set_flag(I, true);
                self.regs.set_flag(F, true);
                self.regs.pc = Self::read16(bus, VECTOR_FIRQ);
                self.irq_status = IrqStatus::Normal;
                cycles += 7;
            }
        }

        if irq {
            if self.regs.flag(I) {
                if self.irq_status == IrqStatus::Sync {
                    self.irq_status = IrqStatus::Normal;
                }
            } else {
                if self.irq_status != IrqStatus::Cwai {
                    self.regs.set_flag(E, true);
                    cycles += self.push_registers(bus, STACK_ALL, Stack::S);
                }
                self.regs.set_flag(I, true);
                self.regs.pc = Self::read16(bus, VECTOR_IRQ);
                self.irq_status = IrqStatus::Normal;
                cycles += 7;
            }
        }

        cycles
    }

    // --- Save state ---

    /// Append the register block: `x y u s pc` (u16), `a b dp cc` (u8),
    /// then the wait state.
    pub fn save_state(&self, w: &mut StateWriter) {
        let r = &self.regs;
        for word in [r.x, r.y, r.u, r.s, r.pc] {
            w.put_u16(word);
        }
        for byte in [r.a, r.b, r.dp, r.cc] {
            w.put_u8(byte);
        }
        w.put_u8(self.irq_status.to_byte());
    }

    /// Size of the block written by [`save_state`](Self::save_state).
    pub const STATE_SIZE: usize = 5 * 2 + 4 + 1;

    /// Restore the register block. On error the CPU is unchanged.
    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        let x = r.u16()?;
        let y = r.u16()?;
        let u = r.u16()?;
        let s = r.u16()?;
        let pc = r.u16()?;
        let a = r.u8()?;
        let b = r.u8()?;
        let dp = r.u8()?;
        let cc = r.u8()?;
        let status_byte = r.u8()?;
        let irq_status =
            IrqStatus::from_byte(status_byte).ok_or(StateError::InvalidField {
                field: "cpu.irq_status",
                value: u32::from(status_byte),
            })?;

        self.regs = Registers {
            a,
            b,
            dp,
            cc,
            x,
            y,
            u,
            s,
            pc,
        };
        self.irq_status = irq_status;
        Ok(())
    }
}

impl Cpu for Mc6809 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B, irq: bool, firq: bool) -> u32 {
        let mut cycles = self.service_interrupts(bus, irq, firq);

        if self.irq_status == IrqStatus::Normal {
            cycles += self.execute(bus);
        } else {
            cycles += 1;
        }

        self.total_cycles += u64::from(cycles);
        cycles
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_waiting(&self) -> bool {
        self.irq_status != IrqStatus::Normal
    }

    fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs = Registers {
            cc: I | F,
            ..Registers::default()
        };
        self.irq_status = IrqStatus::Normal;
        self.regs.pc = Self::read16(bus, VECTOR_RESET);
    }
}

const CPU_QUERY_PATHS: &[&str] = &[
    "pc",
    "a",
    "b",
    "d",
    "x",
    "y",
    "u",
    "s",
    "dp",
    "cc",
    "flags.e",
    "flags.f",
    "flags.h",
    "flags.i",
    "flags.n",
    "flags.z",
    "flags.v",
    "flags.c",
    "irq_status",
    "cycles",
];

impl Observable for Mc6809 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        match path {
            "pc" => Some(r.pc.into()),
            "a" => Some(r.a.into()),
            "b" => Some(r.b.into()),
            "d" => Some(r.d().into()),
            "x" => Some(r.x.into()),
            "y" => Some(r.y.into()),
            "u" => Some(r.u.into()),
            "s" => Some(r.s.into()),
            "dp" => Some(r.dp.into()),
            "cc" => Some(r.cc.into()),
            "flags.e" => Some(r.flag(E).into()),
            "flags.f" => Some(r.flag(F).into()),
            "flags.h" => Some(r.flag(H).into()),
            "flags.i" => Some(r.flag(I).into()),
            "flags.n" => Some(r.flag(N).into()),
            "flags.z" => Some(r.flag(Z).into()),
            "flags.v" => Some(r.flag(V).into()),
            "flags.c" => Some(r.flag(C).into()),
            "irq_status" => Some(
                match self.irq_status {
                    IrqStatus::Normal => "normal",
                    IrqStatus::Sync => "sync",
                    IrqStatus::Cwai => "cwai",
                }
                .into(),
            ),
            "cycles" => Some(self.total_cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        CPU_QUERY_PATHS
    }
}
