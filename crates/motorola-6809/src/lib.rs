//! Motorola 6809 CPU core.
//!
//! The core is instruction-stepped: each call to `step()` services pending
//! interrupts, executes one whole instruction and returns the number of
//! cycles it took, including any surcharge from indexed addressing. The
//! machine that owns the CPU advances its peripherals by that many cycles
//! before stepping again.
//!
//! Undefined opcodes are inert. They consume their opcode byte (and page
//! prefix) and cost nothing.

pub mod alu;
mod cpu;
pub mod flags;
mod registers;

pub use cpu::Mc6809;
pub use registers::{IrqStatus, Registers};
