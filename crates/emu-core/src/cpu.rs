//! CPU core trait.

use crate::Bus;

/// A CPU core.
///
/// CPUs execute instructions and access memory through a bus they borrow for
/// the duration of a step, so the bus can be owned by the machine and shared
/// with every other device on it.
///
/// A step runs one whole instruction (or one idle cycle while the CPU waits
/// for an interrupt) and reports how many cycles it consumed. The caller is
/// responsible for advancing the rest of the machine by that amount before
/// the next step.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Service pending interrupts, then execute one instruction.
    ///
    /// `irq` and `firq` are the current levels of the two interrupt request
    /// lines (`true` = asserted). Returns the number of cycles consumed.
    fn step<B: Bus>(&mut self, bus: &mut B, irq: bool, firq: bool) -> u32;

    /// Returns the current program counter.
    ///
    /// Returns `u32` so that wider address buses fit; 16-bit CPUs zero-extend.
    fn pc(&self) -> u32;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is suspended waiting for an interrupt.
    fn is_waiting(&self) -> bool;

    /// Reset the CPU, fetching the reset vector through the bus.
    fn reset<B: Bus>(&mut self, bus: &mut B);
}
