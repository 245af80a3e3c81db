//! Flash command sequencer
//!
//! Issues the unlock/command byte sequences for erasing and byte-programming
//! the device, and polls for completion. Completion polling has to cope with
//! the device's error-status bit going stale right as an operation finishes:
//! an apparent error is only trusted after the polled location has been read
//! one more time. That re-verify step recurs in both the erase and program
//! paths and must not be collapsed into a single read.

use bitflags::bitflags;

use crate::bus::FlashBus;
use crate::cmd;
use crate::error::{Error, Result};

/// Value every byte of an erased block reads back as
pub const ERASED: u8 = 0xFF;

bitflags! {
    /// Status bits presented on the data bus while an operation is running
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Inverted-data polling bit
        const DATA_POLL = 0x80;
        /// Operation exceeded its internal timing limits
        const ERROR = 0x20;
    }
}

/// Outcome of a single completion poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseStatus {
    /// The operation is still running
    Busy,
    /// The operation completed successfully
    Done,
    /// The device reported an error; it has been reset to read-array mode
    Failed,
}

/// Whether an erase call blocks until the device finishes
///
/// A block erase takes hundreds of milliseconds to several seconds, a chip
/// erase minutes. Callers with other periodic duties issue the command
/// deferred and poll [`erase_poll`] on their own schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// Poll inside the call until the device reports completion
    Blocking,
    /// Issue the command and return immediately
    Deferred,
}

fn unlock<B: FlashBus>(bus: &mut B) {
    bus.write8(cmd::UNLOCK1_OFFSET, cmd::UNLOCK1_DATA);
    bus.write8(cmd::UNLOCK2_OFFSET, cmd::UNLOCK2_DATA);
}

/// Clear a confirmed error condition and return to read-array mode.
fn recover<B: FlashBus>(bus: &mut B) {
    unlock(bus);
    bus.write8(0, cmd::RESET);
}

/// Poll the last-issued erase once.
///
/// `offset` must lie inside the erased block (or anywhere in the device
/// after a chip erase). Reading the erased value means completion. Anything
/// else with the error bit set is re-read once before being believed; a
/// confirmed error resets the device and reports [`EraseStatus::Failed`].
pub fn erase_poll<B: FlashBus>(bus: &mut B, offset: u32) -> EraseStatus {
    let value = bus.read8(offset);
    if value == ERASED {
        return EraseStatus::Done;
    }

    if Status::from_bits_truncate(value).contains(Status::ERROR) {
        // The error bit can race completion; re-read before trusting it.
        if bus.read8(offset) == ERASED {
            return EraseStatus::Done;
        }
        log::warn!("erase failed, status 0x{:02X} at offset 0x{:08X}", value, offset);
        recover(bus);
        return EraseStatus::Failed;
    }

    EraseStatus::Busy
}

fn finish_erase<B: FlashBus>(bus: &mut B, poll_offset: u32, mode: EraseMode) -> Result<()> {
    match mode {
        EraseMode::Deferred => Ok(()),
        EraseMode::Blocking => loop {
            match erase_poll(bus, poll_offset) {
                EraseStatus::Busy => continue,
                EraseStatus::Done => return Ok(()),
                EraseStatus::Failed => return Err(Error::EraseFailed { offset: poll_offset }),
            }
        },
    }
}

/// Erase the block containing `offset`.
pub fn block_erase<B: FlashBus>(bus: &mut B, offset: u32, mode: EraseMode) -> Result<()> {
    unlock(bus);
    bus.write8(cmd::UNLOCK1_OFFSET, cmd::ERASE_SETUP);
    unlock(bus);
    bus.write8(offset, cmd::BLOCK_ERASE);
    finish_erase(bus, offset, mode)
}

/// Erase the whole device, polled at offset zero.
pub fn chip_erase<B: FlashBus>(bus: &mut B, mode: EraseMode) -> Result<()> {
    unlock(bus);
    bus.write8(cmd::UNLOCK1_OFFSET, cmd::ERASE_SETUP);
    unlock(bus);
    bus.write8(cmd::UNLOCK1_OFFSET, cmd::CHIP_ERASE);
    finish_erase(bus, 0, mode)
}

/// Program `data` starting at `offset`, one byte at a time.
///
/// Each byte is verified by read-back; an apparent failure goes through the
/// same re-verify step as erase polling. On a confirmed failure the device
/// is reset and the number of bytes successfully programmed so far is
/// returned, so callers can resume or abort precisely. A full write returns
/// `data.len()`.
pub fn program<B: FlashBus>(bus: &mut B, offset: u32, data: &[u8]) -> usize {
    for (index, &byte) in data.iter().enumerate() {
        let addr = offset + index as u32;

        unlock(bus);
        bus.write8(cmd::UNLOCK1_OFFSET, cmd::PROGRAM);
        bus.write8(addr, byte);

        loop {
            if bus.read8(addr) == byte {
                break;
            }
            if Status::from_bits_truncate(bus.read8(addr)).contains(Status::ERROR) {
                if bus.read8(addr) == byte {
                    break;
                }
                log::warn!(
                    "programming failed at offset 0x{:08X} after {} bytes",
                    addr,
                    index
                );
                recover(bus);
                return index;
            }
        }
    }

    data.len()
}
