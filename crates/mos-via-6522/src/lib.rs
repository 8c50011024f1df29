//! MOS 6522 Versatile Interface Adapter (VIA).
//!
//! The 6522 provides two 8-bit I/O ports, two 16-bit timers, a serial
//! shift register, and an interrupt controller. In the Vectrex it is the
//! CPU's only window onto the rest of the machine: port A is the DAC and
//! sound-chip data bus, port B selects the analog multiplexer and sound-chip
//! mode, PB7 gates the integrator ramp, CA2 zeroes the integrators, and
//! CB2 (driven by the shift register) blanks the beam.
//!
//! The chip only models its own register file. Routing port writes to the
//! DAC or sound chip is the machine's job; it calls [`Via6522::write`] and
//! then acts on the new port values.
//!
//! # Registers ($0-$F)
//!
//! | Reg | Name | Description                         |
//! |-----|------|-------------------------------------|
//! | $0  | ORB  | Port B data (bit 5 is the comparator input) |
//! | $1  | ORA  | Port A data (handshake on access)   |
//! | $2  | DDRB | Port B data direction (1 = output)  |
//! | $3  | DDRA | Port A data direction (1 = output)  |
//! | $4  | T1CL | Timer 1 counter low (read clears T1 IRQ) |
//! | $5  | T1CH | Timer 1 counter high (write starts T1) |
//! | $6  | T1LL | Timer 1 latch low                   |
//! | $7  | T1LH | Timer 1 latch high                  |
//! | $8  | T2CL | Timer 2 counter low (read clears T2 IRQ) |
//! | $9  | T2CH | Timer 2 counter high (write starts T2) |
//! | $A  | SR   | Shift register                      |
//! | $B  | ACR  | Auxiliary control register          |
//! | $C  | PCR  | Peripheral control register         |
//! | $D  | IFR  | Interrupt flag register             |
//! | $E  | IER  | Interrupt enable register           |
//! | $F  | ORA  | Port A data (no handshake)          |

#![allow(clippy::cast_possible_truncation)]

use emu_core::{Observable, StateError, StateReader, StateWriter, Value};

// IFR/IER bit masks
const IFR_SR: u8 = 0x04;
const IFR_T2: u8 = 0x20;
const IFR_T1: u8 = 0x40;
const IFR_IRQ: u8 = 0x80;

/// Shift-register operating mode, from ACR bits 2-4.
///
/// The CB1-clocked modes are accepted but never shift: nothing in the
/// machine drives CB1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftMode {
    Disabled,
    InUnderT2,
    InUnderSystemClock,
    InUnderCb1,
    OutFreeRunningT2,
    OutUnderT2,
    OutUnderSystemClock,
    OutUnderCb1,
}

impl ShiftMode {
    #[must_use]
    pub const fn from_acr(acr: u8) -> Self {
        match acr & 0x1C {
            0x00 => Self::Disabled,
            0x04 => Self::InUnderT2,
            0x08 => Self::InUnderSystemClock,
            0x0C => Self::InUnderCb1,
            0x10 => Self::OutFreeRunningT2,
            0x14 => Self::OutUnderT2,
            0x18 => Self::OutUnderSystemClock,
            _ => Self::OutUnderCb1,
        }
    }
}

/// MOS 6522 Versatile Interface Adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via6522 {
    /// Port A output register.
    ora: u8,
    /// Port B output register.
    orb: u8,
    /// Port A data direction register (1 = output).
    ddra: u8,
    /// Port B data direction register (1 = output).
    ddrb: u8,

    /// Timer 1 counter (16-bit, counts down).
    t1_counter: u16,
    t1_latch_lo: u8,
    t1_latch_hi: u8,
    /// Timer 1 is counting.
    t1_running: bool,
    /// Timer 1 may still raise its one-shot interrupt.
    t1_irq_armed: bool,
    /// Timer-controlled PB7 level.
    t1_pb7: bool,

    /// Timer 2 counter (16-bit, counts down).
    t2_counter: u16,
    /// Timer 2 latch low byte. Also the shift-clock divider reload value.
    t2_latch_lo: u8,
    t2_running: bool,
    t2_irq_armed: bool,

    /// Shift register.
    sr: u8,
    /// Bits shifted since the last SR access (stops at 8).
    sr_bits: u8,
    /// Shift clock divider, reloaded from the T2 low latch.
    sr_divider: u8,
    /// Shift clock phase; a shift happens on every other divider wrap.
    sr_clock: bool,

    /// Auxiliary control register (ACR).
    /// Bit 7: T1 drives PB7
    /// Bit 6: T1 continuous (1) or one-shot (0)
    /// Bit 5: T2 counts PB6 pulses (1) or system clock (0)
    /// Bits 4-2: shift register mode
    acr: u8,

    /// Peripheral control register (PCR).
    /// Bits 7-5: CB2 control
    /// Bits 3-1: CA2 control
    pcr: u8,

    /// Interrupt flag register (IFR). Bit 7 is kept equal to
    /// `ifr & ier & 0x7F != 0` after every change.
    ifr: u8,
    /// Interrupt enable register (IER).
    ier: u8,

    /// CA2 output level.
    ca2: bool,
    /// CB2 output level under handshake control.
    cb2_handshake: bool,
    /// CB2 output level under shift-register control.
    cb2_shift: bool,

    /// PB5 input (the Vectrex wires the analog comparator here).
    pb5_input: bool,
}

impl Via6522 {
    /// Create a VIA in its reset state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ora: 0,
            orb: 0,
            ddra: 0,
            ddrb: 0,
            t1_counter: 0,
            t1_latch_lo: 0,
            t1_latch_hi: 0,
            t1_running: false,
            t1_irq_armed: false,
            t1_pb7: true,
            t2_counter: 0,
            t2_latch_lo: 0,
            t2_running: false,
            t2_irq_armed: false,
            sr: 0,
            sr_bits: 8,
            sr_divider: 0,
            sr_clock: false,
            acr: 0,
            pcr: 0,
            ifr: 0,
            ier: 0,
            ca2: true,
            cb2_handshake: true,
            cb2_shift: false,
            pb5_input: false,
        }
    }

    /// Return every register and line to its reset state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Recompute IFR bit 7 from the flag and enable bits.
    fn update_irq(&mut self) {
        if self.ifr & self.ier & 0x7F != 0 {
            self.ifr |= IFR_IRQ;
        } else {
            self.ifr &= !IFR_IRQ;
        }
    }

    /// Check if the VIA has an active (and enabled) interrupt.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.ifr & IFR_IRQ != 0
    }

    /// Read a VIA register.
    ///
    /// Port A always reads back the output register here; when port A is
    /// being driven by another chip the machine substitutes that value.
    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x0F {
            0x00 => {
                let compare = if self.pb5_input { 0x20 } else { 0 };
                if self.acr & 0x80 != 0 {
                    // Timer 1 has control of bit 7
                    (self.orb & 0x5F) | self.t1_pb7_bit() | compare
                } else {
                    (self.orb & 0xDF) | compare
                }
            }
            0x01 => {
                // Handshake mode: CA2 goes low on access.
                if self.pcr & 0x0E == 0x08 {
                    self.ca2 = false;
                }
                self.ora
            }
            0x02 => self.ddrb,
            0x03 => self.ddra,
            0x04 => {
                // T1C-L: read clears the T1 flag and stops the one-shot
                self.ifr &= !IFR_T1;
                self.t1_running = false;
                self.t1_irq_armed = false;
                self.t1_pb7 = true;
                self.update_irq();
                self.t1_counter as u8
            }
            0x05 => (self.t1_counter >> 8) as u8,
            0x06 => self.t1_latch_lo,
            0x07 => self.t1_latch_hi,
            0x08 => {
                // T2C-L: read clears the T2 flag and stops the timer
                self.ifr &= !IFR_T2;
                self.t2_running = false;
                self.t2_irq_armed = false;
                self.update_irq();
                self.t2_counter as u8
            }
            0x09 => (self.t2_counter >> 8) as u8,
            0x0A => {
                let value = self.sr;
                self.restart_shift();
                value
            }
            0x0B => self.acr,
            0x0C => self.pcr,
            0x0D => self.ifr,
            0x0E => {
                // IER: bit 7 always reads as 1
                self.ier | 0x80
            }
            _ => self.ora,
        }
    }

    /// Write a VIA register.
    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x0F {
            0x00 => {
                self.orb = value;
                // Pulse mode: CB2 goes low for one cycle.
                if self.pcr & 0xE0 == 0x80 {
                    self.cb2_handshake = false;
                }
            }
            0x01 => {
                if self.pcr & 0x0E == 0x08 {
                    self.ca2 = false;
                }
                self.ora = value;
            }
            0x02 => self.ddrb = value,
            0x03 => self.ddra = value,
            0x04 | 0x06 => self.t1_latch_lo = value,
            0x05 => {
                // T1C-H: load counter from latch, start timer, clear flag
                self.t1_latch_hi = value;
                self.t1_counter = u16::from_be_bytes([self.t1_latch_hi, self.t1_latch_lo]);
                self.ifr &= !IFR_T1;
                self.t1_running = true;
                self.t1_irq_armed = true;
                self.t1_pb7 = false;
                self.update_irq();
            }
            0x07 => self.t1_latch_hi = value,
            0x08 => self.t2_latch_lo = value,
            0x09 => {
                // T2C-H: load counter (high from value, low from latch),
                // start timer, clear flag
                self.t2_counter = u16::from_be_bytes([value, self.t2_latch_lo]);
                self.ifr &= !IFR_T2;
                self.t2_running = true;
                self.t2_irq_armed = true;
                self.update_irq();
            }
            0x0A => {
                self.sr = value;
                self.restart_shift();
            }
            0x0B => self.acr = value,
            0x0C => {
                self.pcr = value;
                // Manual output low; every other mode idles high.
                self.ca2 = self.pcr & 0x0E != 0x0C;
                self.cb2_handshake = self.pcr & 0xE0 != 0xC0;
            }
            0x0D => {
                // IFR: writing 1s clears the corresponding flags
                self.ifr &= !(value & 0x7F);
                self.update_irq();
            }
            0x0E => {
                // IER: bit 7 selects set (1) or clear (0) mode
                if value & 0x80 != 0 {
                    self.ier |= value & 0x7F;
                } else {
                    self.ier &= !(value & 0x7F);
                }
                self.update_irq();
            }
            _ => self.ora = value,
        }
    }

    /// SR access: clear the flag and start a new 8-bit transfer.
    fn restart_shift(&mut self) {
        self.ifr &= !IFR_SR;
        self.sr_bits = 0;
        self.sr_clock = true;
        self.update_irq();
    }

    /// First half of a clock cycle: timers and shift register.
    pub fn tick_phase0(&mut self) {
        self.tick_timer1();
        self.tick_timer2();
        let t2_shift = self.tick_shift_clock();
        if self.sr_bits < 8 {
            self.tick_shift_register(t2_shift);
        }
    }

    /// Second half of a clock cycle: end any one-cycle CA2/CB2 pulse.
    pub fn tick_phase1(&mut self) {
        if self.pcr & 0x0E == 0x0A {
            self.ca2 = true;
        }
        if self.pcr & 0xE0 == 0xA0 {
            self.cb2_handshake = true;
        }
    }

    fn tick_timer1(&mut self) {
        if !self.t1_running {
            return;
        }
        let (counter, underflow) = self.t1_counter.overflowing_sub(1);
        self.t1_counter = counter;
        if !underflow {
            return;
        }

        if self.acr & 0x40 != 0 {
            // Continuous: flag, toggle PB7 and reload
            self.ifr |= IFR_T1;
            self.update_irq();
            self.t1_pb7 = !self.t1_pb7;
            self.t1_counter = u16::from_be_bytes([self.t1_latch_hi, self.t1_latch_lo]);
        } else if self.t1_irq_armed {
            // One-shot: flag once, PB7 back high, keep counting
            self.ifr |= IFR_T1;
            self.update_irq();
            self.t1_pb7 = true;
            self.t1_irq_armed = false;
        }
    }

    fn tick_timer2(&mut self) {
        // ACR bit 5: 0 = timed (counts every tick), 1 = count PB6 pulses
        if !self.t2_running || self.acr & 0x20 != 0 {
            return;
        }
        let (counter, underflow) = self.t2_counter.overflowing_sub(1);
        self.t2_counter = counter;
        if underflow && self.t2_irq_armed {
            self.ifr |= IFR_T2;
            self.update_irq();
            self.t2_irq_armed = false;
        }
    }

    /// Advance the T2-rate shift clock. Returns true on the cycles where a
    /// T2-clocked shift happens.
    fn tick_shift_clock(&mut self) -> bool {
        self.sr_divider = self.sr_divider.wrapping_sub(1);
        if self.sr_divider != 0xFF {
            return false;
        }
        self.sr_divider = self.t2_latch_lo;
        let shift = self.sr_clock;
        self.sr_clock = !self.sr_clock;
        shift
    }

    fn tick_shift_register(&mut self, t2_shift: bool) {
        match ShiftMode::from_acr(self.acr) {
            ShiftMode::Disabled | ShiftMode::InUnderCb1 | ShiftMode::OutUnderCb1 => {}
            ShiftMode::InUnderT2 => {
                if t2_shift {
                    // CB2 is an output, so zeros shift in
                    self.sr <<= 1;
                    self.sr_bits += 1;
                }
            }
            ShiftMode::InUnderSystemClock => {
                self.sr <<= 1;
                self.sr_bits += 1;
            }
            ShiftMode::OutFreeRunningT2 => {
                if t2_shift {
                    self.rotate_out();
                }
            }
            ShiftMode::OutUnderT2 => {
                if t2_shift {
                    self.rotate_out();
                    self.sr_bits += 1;
                }
            }
            ShiftMode::OutUnderSystemClock => {
                self.rotate_out();
                self.sr_bits += 1;
            }
        }

        if self.sr_bits == 8 {
            self.ifr |= IFR_SR;
            self.update_irq();
        }
    }

    /// Shift bit 7 out onto CB2 and back into bit 0.
    fn rotate_out(&mut self) {
        self.cb2_shift = self.sr & 0x80 != 0;
        self.sr = self.sr.rotate_left(1);
    }

    fn t1_pb7_bit(&self) -> u8 {
        if self.t1_pb7 { 0x80 } else { 0 }
    }

    // --- Pin-level outputs ---

    /// Port A output register.
    #[must_use]
    pub fn ora(&self) -> u8 {
        self.ora
    }

    /// Port B output register.
    #[must_use]
    pub fn orb(&self) -> u8 {
        self.orb
    }

    /// Level on PB7: the timer-controlled level when ACR bit 7 is set,
    /// otherwise ORB bit 7.
    #[must_use]
    pub fn pb7(&self) -> bool {
        if self.acr & 0x80 != 0 {
            self.t1_pb7
        } else {
            self.orb & 0x80 != 0
        }
    }

    /// Level on CA2.
    #[must_use]
    pub fn ca2(&self) -> bool {
        self.ca2
    }

    /// Level on CB2: shift-register output when ACR bit 4 is set,
    /// otherwise the handshake/manual level.
    #[must_use]
    pub fn cb2(&self) -> bool {
        if self.acr & 0x10 != 0 {
            self.cb2_shift
        } else {
            self.cb2_handshake
        }
    }

    /// Drive the PB5 input.
    pub fn set_pb5(&mut self, level: bool) {
        self.pb5_input = level;
    }

    #[must_use]
    pub fn ifr(&self) -> u8 {
        self.ifr
    }

    #[must_use]
    pub fn ier(&self) -> u8 {
        self.ier
    }

    #[must_use]
    pub fn acr(&self) -> u8 {
        self.acr
    }

    #[must_use]
    pub fn pcr(&self) -> u8 {
        self.pcr
    }

    // --- Save state ---

    /// Append the register file, timers, shift register and line levels.
    pub fn save_state(&self, w: &mut StateWriter) {
        for byte in [self.ora, self.orb, self.ddra, self.ddrb] {
            w.put_u8(byte);
        }
        w.put_u16(self.t1_counter);
        w.put_u8(self.t1_latch_lo);
        w.put_u8(self.t1_latch_hi);
        w.put_bool(self.t1_running);
        w.put_bool(self.t1_irq_armed);
        w.put_bool(self.t1_pb7);
        w.put_u16(self.t2_counter);
        w.put_u8(self.t2_latch_lo);
        w.put_bool(self.t2_running);
        w.put_bool(self.t2_irq_armed);
        w.put_u8(self.sr);
        w.put_u8(self.sr_bits);
        w.put_u8(self.sr_divider);
        w.put_bool(self.sr_clock);
        for byte in [self.acr, self.pcr, self.ifr, self.ier] {
            w.put_u8(byte);
        }
        w.put_bool(self.ca2);
        w.put_bool(self.cb2_handshake);
        w.put_bool(self.cb2_shift);
        w.put_bool(self.pb5_input);
    }

    /// Size of the block written by [`save_state`](Self::save_state).
    pub const STATE_SIZE: usize = 4 + 2 + 5 + 2 + 3 + 4 + 4 + 4;

    /// Restore the block written by [`save_state`](Self::save_state).
    /// On error the VIA is unchanged.
    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        let mut via = Self::new();
        via.ora = r.u8()?;
        via.orb = r.u8()?;
        via.ddra = r.u8()?;
        via.ddrb = r.u8()?;
        via.t1_counter = r.u16()?;
        via.t1_latch_lo = r.u8()?;
        via.t1_latch_hi = r.u8()?;
        via.t1_running = r.bool("via.t1_running")?;
        via.t1_irq_armed = r.bool("via.t1_irq_armed")?;
        via.t1_pb7 = r.bool("via.t1_pb7")?;
        via.t2_counter = r.u16()?;
        via.t2_latch_lo = r.u8()?;
        via.t2_running = r.bool("via.t2_running")?;
        via.t2_irq_armed = r.bool("via.t2_irq_armed")?;
        via.sr = r.u8()?;
        via.sr_bits = r.u8()?;
        if via.sr_bits > 8 {
            return Err(StateError::InvalidField {
                field: "via.sr_bits",
                value: u32::from(via.sr_bits),
            });
        }
        via.sr_divider = r.u8()?;
        via.sr_clock = r.bool("via.sr_clock")?;
        via.acr = r.u8()?;
        via.pcr = r.u8()?;
        via.ifr = r.u8()?;
        via.ier = r.u8()?;
        via.ca2 = r.bool("via.ca2")?;
        via.cb2_handshake = r.bool("via.cb2_handshake")?;
        via.cb2_shift = r.bool("via.cb2_shift")?;
        via.pb5_input = r.bool("via.pb5_input")?;
        via.update_irq();
        *self = via;
        Ok(())
    }
}

impl Default for Via6522 {
    fn default() -> Self {
        Self::new()
    }
}

const VIA_QUERY_PATHS: &[&str] = &[
    "orb",
    "ora",
    "ddrb",
    "ddra",
    "t1.counter",
    "t1.latch",
    "t2.counter",
    "sr",
    "acr",
    "pcr",
    "ifr",
    "ier",
    "ca2",
    "cb2",
];

impl Observable for Via6522 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "orb" => Some(self.orb.into()),
            "ora" => Some(self.ora.into()),
            "ddrb" => Some(self.ddrb.into()),
            "ddra" => Some(self.ddra.into()),
            "t1.counter" => Some(self.t1_counter.into()),
            "t1.latch" => Some(u16::from_be_bytes([self.t1_latch_hi, self.t1_latch_lo]).into()),
            "t2.counter" => Some(self.t2_counter.into()),
            "sr" => Some(self.sr.into()),
            "acr" => Some(self.acr.into()),
            "pcr" => Some(self.pcr.into()),
            "ifr" => Some(self.ifr.into()),
            "ier" => Some(self.ier.into()),
            "ca2" => Some(self.ca2.into()),
            "cb2" => Some(self.cb2().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        VIA_QUERY_PATHS
    }
}
