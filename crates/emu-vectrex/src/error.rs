//! Errors surfaced to the host.

use emu_core::StateError;
use thiserror::Error;

/// Failure loading an image or restoring a save state.
///
/// Every failure leaves the machine exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VectrexError {
    #[error("cartridge image is empty")]
    EmptyCartridge,

    #[error("cartridge image is {len} bytes (maximum 65536)")]
    CartridgeTooLarge { len: usize },

    #[error("system ROM is {len} bytes (expected 8192)")]
    BiosSize { len: usize },

    #[error(transparent)]
    State(#[from] StateError),
}
