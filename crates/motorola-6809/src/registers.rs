//! 6809 register set.

/// 6809 registers.
///
/// A and B combine into the 16-bit accumulator D with A as the high byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    /// Direct page: high byte of every direct-mode address.
    pub dp: u8,
    /// Condition codes (see [`crate::flags`]).
    pub cc: u8,
    pub x: u16,
    pub y: u16,
    /// User stack pointer.
    pub u: u16,
    /// Hardware stack pointer.
    pub s: u16,
    pub pc: u16,
}

impl Registers {
    /// The D accumulator (A:B).
    #[must_use]
    pub const fn d(&self) -> u16 {
        u16::from_be_bytes([self.a, self.b])
    }

    pub fn set_d(&mut self, value: u16) {
        let [a, b] = value.to_be_bytes();
        self.a = a;
        self.b = b;
    }

    /// Whether `flag` is set in CC.
    #[must_use]
    pub const fn flag(&self, flag: u8) -> bool {
        self.cc & flag != 0
    }

    /// Flag as 0 or 1, for arithmetic carry-in.
    #[must_use]
    pub const fn flag_bit(&self, flag: u8) -> u8 {
        (self.cc & flag != 0) as u8
    }

    pub fn set_flag(&mut self, flag: u8, set: bool) {
        self.cc = crate::flags::with(self.cc, flag, set);
    }
}

/// Interrupt wait state.
///
/// SYNC and CWAI both stop instruction fetch until an interrupt line is
/// asserted. They differ in what happens then: SYNC simply resumes
/// (taking the interrupt only if it is unmasked) while CWAI has already
/// stacked the full register frame, so the interrupt is vectored without
/// pushing again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IrqStatus {
    #[default]
    Normal,
    /// Waiting after SYNC.
    Sync,
    /// Waiting after CWAI with the entire state already on the S stack.
    Cwai,
}

impl IrqStatus {
    /// Encoding used in save states.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Sync => 1,
            Self::Cwai => 2,
        }
    }

    #[must_use]
    pub const fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Sync),
            2 => Some(Self::Cwai),
            _ => None,
        }
    }
}
