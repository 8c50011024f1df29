//! Core traits and types for cycle-counted emulation.
//!
//! The CPU is the clock source. Every instruction reports how many cycles it
//! took and the machine advances its peripherals by exactly that many ticks.

mod bus;
mod clock;
mod cpu;
mod observable;
mod state;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use state::{StateError, StateReader, StateWriter};
pub use ticks::Ticks;
