//! 64 KB cartridge bank-switch detector.
//!
//! A 64 KB cartridge has two 32 KB halves but only 15 address lines to
//! reach them. Software selects the upper half by driving the otherwise
//! unused PB6 line, which it does with a fixed sequence of VIA writes:
//!
//! | Step | Register | Data                           |
//! |------|----------|--------------------------------|
//! | 1    | DDRB     | any (bit 6 clear = upper bank) |
//! | 2    | DDRA     | any                            |
//! | 3    | ORB      | $01                            |
//! | 4    | ORA      | $00                            |
//! | 5    | ACR      | $98                            |
//! | 6    | T1CL     | any (commits)                  |
//!
//! The detector watches every VIA write. A write to a register in the
//! sequence that does not continue it drops back to [`BankSwitchState::Idle`];
//! writes to registers outside the sequence leave it alone. A DDRB write
//! always restarts the sequence.

use emu_core::{StateError, StateReader, StateWriter};

/// Offset of the upper 32 KB half.
pub const UPPER_BANK: u32 = 0x8000;

/// Progress through the bank-switch write sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BankSwitchState {
    #[default]
    Idle,
    DdrbWritten,
    DdraWritten,
    OrbSet,
    OraCleared,
    /// ACR = $98 seen; the next T1CL write commits.
    Armed,
}

impl BankSwitchState {
    const fn to_byte(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::DdrbWritten => 1,
            Self::DdraWritten => 2,
            Self::OrbSet => 3,
            Self::OraCleared => 4,
            Self::Armed => 5,
        }
    }

    const fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::DdrbWritten),
            2 => Some(Self::DdraWritten),
            3 => Some(Self::OrbSet),
            4 => Some(Self::OraCleared),
            5 => Some(Self::Armed),
            _ => None,
        }
    }
}

/// Bank-switch detector and the cartridge offset it controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BankSwitch {
    state: BankSwitchState,
    /// Offset chosen by the DDRB write, applied on commit.
    pending: u32,
    /// Offset added to every cartridge read.
    offset: u32,
}

impl BankSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cartridge offset (0 or $8000).
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn state(&self) -> BankSwitchState {
        self.state
    }

    /// Feed one VIA register write. `big` is set for 64 KB cartridges; for
    /// anything smaller the pending offset is always 0.
    pub fn on_via_write(&mut self, reg: u8, data: u8, big: bool) {
        use BankSwitchState::{Armed, DdraWritten, DdrbWritten, Idle, OraCleared, OrbSet};

        self.state = match (reg & 0x0F, self.state) {
            (0x0, DdraWritten) if data == 0x01 => OrbSet,
            (0x0, _) => Idle,
            (0x1, OrbSet) if data == 0x00 => OraCleared,
            (0x1, _) => Idle,
            (0x2, _) => {
                self.pending = if !big || data & 0x40 != 0 {
                    0
                } else {
                    UPPER_BANK
                };
                DdrbWritten
            }
            (0x3, DdrbWritten) => DdraWritten,
            (0x3, _) => Idle,
            (0x4, Armed) => {
                self.offset = self.pending;
                Idle
            }
            (0xB, OraCleared) if data == 0x98 => Armed,
            (0xB, _) => Idle,
            (_, state) => state,
        };
    }

    pub fn save_state(&self, w: &mut StateWriter) {
        w.put_u32(self.offset);
        w.put_u32(self.pending);
        w.put_u8(self.state.to_byte());
    }

    pub const STATE_SIZE: usize = 4 + 4 + 1;

    /// Decode a saved detector without applying it.
    pub fn read_state(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        let offset = bank_offset(r.u32()?, "bank_switch.offset")?;
        let pending = bank_offset(r.u32()?, "bank_switch.pending")?;
        let byte = r.u8()?;
        let state = BankSwitchState::from_byte(byte).ok_or(StateError::InvalidField {
            field: "bank_switch.state",
            value: u32::from(byte),
        })?;
        Ok(Self {
            state,
            pending,
            offset,
        })
    }
}

fn bank_offset(value: u32, field: &'static str) -> Result<u32, StateError> {
    if value == 0 || value == UPPER_BANK {
        Ok(value)
    } else {
        Err(StateError::InvalidField { field, value })
    }
}
