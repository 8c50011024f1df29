//! Cycle-stepped Vectrex emulator.
//!
//! The 6809 runs at 1.5 MHz and is the only clock source. After every
//! instruction the machine ticks the VIA and the analog beam integrator
//! once per cycle the instruction took. Every 50,000 cycles (30 Hz) the
//! vectors drawn since the previous boundary become one frame and the
//! draw and erase lists swap.
//!
//! Audio is pulled: the host asks the AY-3-8910 for a block of samples
//! whenever it needs them, using whatever register state is current.

pub mod analog;
pub mod audio;
pub mod bank_switch;
mod bus;
#[cfg(feature = "native")]
pub mod capture;
pub mod config;
mod error;
pub mod input;
mod vectrex;

pub use analog::Vector;
pub use bank_switch::{BankSwitch, BankSwitchState};
pub use bus::VectrexBus;
pub use config::VectrexConfig;
pub use error::VectrexError;
pub use input::{Button, Controllers, Direction, InputQueue, Player, ScriptedPress};
pub use vectrex::{RenderCallback, Vectrex};
