//! Vectrex bus: memory map and I/O routing.
//!
//! | Range         | Device                                         |
//! |---------------|------------------------------------------------|
//! | $0000-$7FFF   | Cartridge (through the bank-switch offset)     |
//! | $8000-$BFFF   | Unmapped (reads $FF)                           |
//! | $C000-$DFFF   | RAM when A11 is set, VIA when A12 is set       |
//! | $E000-$FFFF   | System ROM                                     |
//!
//! The RAM and VIA selects are decoded independently, so a write with both
//! A11 and A12 set lands in both. A read with both set returns RAM.
//!
//! The VIA is the only path to the rest of the machine. After a port write
//! the bus forwards the new port values to the sound chip latch and the
//! analog multiplexer, and feeds the comparator back into PB5.

#![allow(clippy::cast_possible_truncation)]

use emu_core::{Bus, StateError, StateReader, StateWriter};
use gi_ay_3_8910::Ay38910;
use mos_via_6522::Via6522;

use crate::analog::Analog;
use crate::bank_switch::BankSwitch;
use crate::config::{BIOS_SIZE, CARTRIDGE_SIZE};

pub const RAM_SIZE: usize = 0x400;

/// Register the CPU cannot write through the sound latch: the button port.
const REG_BUTTONS: u8 = 14;

/// The Vectrex bus, implementing `emu_core::Bus`.
///
/// Owns all memory and peripherals. The CPU borrows it for each step.
pub struct VectrexBus {
    rom: Box<[u8; BIOS_SIZE]>,
    ram: [u8; RAM_SIZE],
    cartridge: Box<[u8; CARTRIDGE_SIZE]>,
    /// Set when the image has data in its upper 32 KB.
    big: bool,
    bank: BankSwitch,
    pub via: Via6522,
    pub psg: Ay38910,
    pub analog: Analog,
    /// PSG register addressed by the last latch cycle.
    sound_select: u8,
}

impl VectrexBus {
    /// Create a bus around a system ROM image of exactly [`BIOS_SIZE`]
    /// bytes. Shorter images are zero-filled.
    #[must_use]
    pub fn new(bios: &[u8]) -> Self {
        let mut rom = Box::new([0; BIOS_SIZE]);
        let len = bios.len().min(BIOS_SIZE);
        rom[..len].copy_from_slice(&bios[..len]);
        Self {
            rom,
            ram: [0; RAM_SIZE],
            cartridge: Box::new([0; CARTRIDGE_SIZE]),
            big: false,
            bank: BankSwitch::new(),
            via: Via6522::new(),
            psg: Ay38910::new(),
            analog: Analog::new(),
            sound_select: 0,
        }
    }

    /// Power-on state for everything but the CPU and cartridge contents.
    pub fn reset(&mut self) {
        for (i, byte) in self.ram.iter_mut().enumerate() {
            *byte = i as u8;
        }
        self.psg.reset();
        for reg in 0..16 {
            self.psg.write_register(reg, 0);
        }
        self.psg.write_register(REG_BUTTONS, 0xFF);
        self.sound_select = 0;
        self.via.reset();
        self.analog.reset();
        self.via.set_pb5(self.analog.compare());
        self.bank = BankSwitch::new();
    }

    /// Copy a cartridge image (at most [`CARTRIDGE_SIZE`] bytes) into a
    /// zeroed cartridge space.
    pub fn install_cartridge(&mut self, image: &[u8]) {
        self.cartridge.fill(0);
        let len = image.len().min(CARTRIDGE_SIZE);
        self.cartridge[..len].copy_from_slice(&image[..len]);
        self.big = self.cartridge[0x8000] != 0;
    }

    pub fn remove_cartridge(&mut self) {
        self.cartridge.fill(0);
        self.big = false;
    }

    /// True for 64 KB bank-switched images.
    #[must_use]
    pub fn is_big_cartridge(&self) -> bool {
        self.big
    }

    #[must_use]
    pub fn bank_switch(&self) -> &BankSwitch {
        &self.bank
    }

    /// Set register 14, the button port, bypassing the sound latch.
    pub fn set_buttons(&mut self, value: u8) {
        self.psg.write_register(REG_BUTTONS, value);
    }

    /// One CPU cycle of peripheral time.
    pub fn tick(&mut self) {
        self.via.tick_phase0();
        self.analog.step(&self.via);
        self.via.tick_phase1();
    }

    /// Read without side effects. VIA addresses read as 0.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        if address & 0xE000 == 0xE000 {
            self.rom[usize::from(address & 0x1FFF)]
        } else if address & 0xE000 == 0xC000 {
            if address & 0x0800 != 0 {
                self.ram[usize::from(address & 0x03FF)]
            } else {
                0
            }
        } else if address < 0x8000 {
            self.cartridge_byte(address)
        } else {
            0xFF
        }
    }

    fn cartridge_byte(&self, address: u16) -> u8 {
        let index = (u32::from(address) + self.bank.offset()) as usize % CARTRIDGE_SIZE;
        self.cartridge[index]
    }

    fn sound_driving_port_a(&self) -> bool {
        self.via.orb() & 0x18 == 0x08
    }

    fn read_io(&mut self, reg: u8) -> u8 {
        let value = self.via.read(reg);
        if matches!(reg, 0x1 | 0xF) && self.sound_driving_port_a() {
            self.psg.register(self.sound_select)
        } else {
            value
        }
    }

    fn write_io(&mut self, reg: u8, value: u8) {
        self.bank.on_via_write(reg, value, self.big);
        self.via.write(reg, value);
        match reg {
            0x0 => {
                self.update_sound();
                self.update_analog();
            }
            0x1 | 0xF => {
                self.update_sound();
                self.analog.set_dac(value);
                self.update_analog();
            }
            _ => {}
        }
    }

    /// Run the PSG bus cycle selected by ORB bits 3-4.
    fn update_sound(&mut self) {
        let ora = self.via.ora();
        match self.via.orb() & 0x18 {
            // Write
            0x10 => {
                if self.sound_select != REG_BUTTONS {
                    self.psg.write_register(self.sound_select, ora);
                }
            }
            // Latch address
            0x18 => {
                if ora & 0xF0 == 0 {
                    self.sound_select = ora & 0x0F;
                }
            }
            // Inactive, or the chip is driving port A
            _ => {}
        }
    }

    fn update_analog(&mut self) {
        self.analog.update_multiplexer(self.via.orb());
        self.via.set_pb5(self.analog.compare());
    }

    // --- Save state ---

    /// Append PSG, RAM, sound latch, VIA, analog and bank-switch blocks.
    pub fn save_state(&self, w: &mut StateWriter) {
        self.psg.save_state(w);
        w.put_bytes(&self.ram);
        w.put_u8(self.sound_select);
        self.via.save_state(w);
        self.analog.save_state(w);
        self.bank.save_state(w);
    }

    pub const STATE_SIZE: usize = Ay38910::STATE_SIZE
        + RAM_SIZE
        + 1
        + Via6522::STATE_SIZE
        + Analog::STATE_SIZE
        + BankSwitch::STATE_SIZE;

    /// Restore everything [`save_state`](Self::save_state) wrote. Nothing
    /// changes unless every block decodes.
    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        let mut psg = self.psg.clone();
        psg.load_state(r)?;
        let mut ram = [0; RAM_SIZE];
        ram.copy_from_slice(r.bytes(RAM_SIZE)?);
        let sound_select = r.u8()?;
        if sound_select > 0x0F {
            return Err(StateError::InvalidField {
                field: "sound_select",
                value: u32::from(sound_select),
            });
        }
        let mut via = self.via.clone();
        via.load_state(r)?;
        let analog = Analog::read_state(r)?;
        let bank = BankSwitch::read_state(r)?;

        self.psg = psg;
        self.ram = ram;
        self.sound_select = sound_select;
        self.via = via;
        self.analog.restore(analog);
        self.bank = bank;
        Ok(())
    }
}

impl Bus for VectrexBus {
    fn read(&mut self, address: u16) -> u8 {
        if address & 0xE000 == 0xE000 {
            self.rom[usize::from(address & 0x1FFF)]
        } else if address & 0xE000 == 0xC000 {
            if address & 0x0800 != 0 {
                self.ram[usize::from(address & 0x03FF)]
            } else if address & 0x1000 != 0 {
                self.read_io(address as u8 & 0x0F)
            } else {
                0
            }
        } else if address < 0x8000 {
            self.cartridge_byte(address)
        } else {
            0xFF
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        // ROM, cartridge and the unmapped hole ignore writes.
        if address & 0xE000 != 0xC000 {
            return;
        }
        if address & 0x0800 != 0 {
            self.ram[usize::from(address & 0x03FF)] = value;
        }
        if address & 0x1000 != 0 {
            self.write_io(address as u8 & 0x0F, value);
        }
    }
}
