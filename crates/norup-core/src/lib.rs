//! norup-core - Firmware-image management for CFI NOR flash
//!
//! This crate implements the flash side of a firmware-update mechanism for
//! devices whose application image lives in an external, memory-mapped,
//! command-set-driven NOR flash. It is `no_std` compatible for use on the
//! target; the `std` feature adds `std::error::Error` impls for host-side
//! tooling.
//!
//! The layers, bottom up:
//!
//! - [`bus`] - the injectable flash-bus capability production code binds to
//!   the real memory-mapped window and tests bind to a simulator
//! - [`cfi`] - geometry discovery from the device's CFI query block
//! - [`seq`] - erase/program command sequencing and completion polling
//! - [`nor`] - the per-device context: page-normalized erase, write
//!   validation, sticky error bookkeeping
//! - [`boot`] - the boot-or-wait-for-update decision taken at startup
//! - [`xfer`] - the network block-transfer router that writes received
//!   blocks into one of several backing stores
//!
//! # Example
//!
//! ```ignore
//! use norup_core::{bus::MmioBus, nor::NorFlash};
//!
//! let bus = unsafe { MmioBus::new(0x6000_0000 as *mut u8, 4 * 1024 * 1024) };
//! if let Some(mut flash) = NorFlash::probe(bus) {
//!     println!("found {} bytes of NOR flash", flash.size());
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod boot;
pub mod bus;
pub mod cfi;
pub mod cmd;
pub mod error;
pub mod image;
pub mod nor;
pub mod seq;
pub mod xfer;

#[cfg(test)]
pub(crate) mod testbus;

pub use error::{Error, Result};
