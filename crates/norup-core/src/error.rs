//! Error types for norup-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Device did not answer the CFI query (not fitted, or bus misconfigured)
    NotPresent,
    /// Address falls outside the discovered device
    AddressOutOfBounds,
    /// Erase command failed or the device reported an erase error
    EraseFailed {
        /// Device-relative offset where the erase was attempted
        offset: u32,
    },
    /// Byte programming stopped early
    ProgramFailed {
        /// Device-relative offset of the first byte that was not written
        offset: u32,
        /// Number of bytes successfully programmed before the failure
        written: u32,
    },
    /// Write target is not an erase-block start address, or the image
    /// does not fit between the target and the end of the device
    InvalidTarget,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPresent => write!(f, "flash device not present"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::EraseFailed { offset } => {
                write!(f, "erase failed at offset 0x{:08X}", offset)
            }
            Self::ProgramFailed { offset, written } => {
                write!(
                    f,
                    "programming failed at offset 0x{:08X} after {} bytes",
                    offset, written
                )
            }
            Self::InvalidTarget => write!(f, "invalid write target"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
