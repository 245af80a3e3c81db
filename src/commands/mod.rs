//! CLI command implementations
//!
//! Every command builds a fresh simulated board (CFI NOR flash, serial
//! flash, in-memory filesystem), binds the update core to it, and drives
//! one flow end to end.

pub mod bootcheck;
pub mod erase;
pub mod info;
pub mod xfer;

use norup_core::nor::NorFlash;
use norup_core::xfer::{Router, XferError};
use norup_sim::{CfiSim, MemFs, SerialSim, SimGeometry};

/// Errors a command can surface on top of plain I/O failures
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The router rejected a request or a block operation
    #[error("transfer failed: {0}")]
    Transfer(#[from] XferError),

    /// A flash-level operation failed
    #[error("flash error: {0}")]
    Flash(#[from] norup_core::Error),

    /// The simulated flash did not answer the probe
    #[error("no flash device detected")]
    NoDevice,
}

/// The simulated board every command runs against
pub type SimRouter = Router<CfiSim, SerialSim, MemFs>;

/// Build the board: development-kit flash geometry, a 1 MiB serial flash,
/// and an empty filesystem. `nor_image` is planted in the NOR array before
/// probing, `serial_image` in the serial flash.
pub fn board(nor_image: Option<&[u8]>, serial_image: Option<&[u8]>) -> SimRouter {
    let mut sim = CfiSim::new(SimGeometry::boot_sector());
    if let Some(image) = nor_image {
        sim.load(0, image);
    }

    let mut serial = SerialSim::new(1024 * 1024);
    if let Some(image) = serial_image {
        serial.load(0, image);
    }

    Router::new(NorFlash::probe(sim), serial, MemFs::new())
}

/// Probe a bare simulated flash outside the router, for the commands that
/// talk to the device directly.
pub fn probe_flash(image: Option<&[u8]>) -> Result<NorFlash<CfiSim>, HarnessError> {
    let mut sim = CfiSim::new(SimGeometry::boot_sector());
    if let Some(image) = image {
        sim.load(0, image);
    }
    NorFlash::probe(sim).ok_or(HarnessError::NoDevice)
}
