//! High-level flash region API
//!
//! [`NorFlash`] is the runtime context for one attached device: it owns the
//! bus, the size discovered at probe time, and the sticky error flag. The
//! flag is set by any failed erase or program call and cleared only on
//! explicit request, so a long multi-step update can fail at step N and have
//! that failure still observable after later steps have succeeded.

use crate::bus::FlashBus;
use crate::cfi::{self, BlockInfo, EraseRegion, MAX_REGIONS};
use crate::error::{Error, Result};
use crate::image::ImageHeader;
use crate::seq::{self, EraseMode, EraseStatus};

/// An attached, probed NOR flash device
pub struct NorFlash<B: FlashBus> {
    bus: B,
    size: u32,
    error: bool,
}

impl<B: FlashBus> NorFlash<B> {
    /// Probe the bus for a device and discover its size.
    ///
    /// Returns `None` when the CFI query goes unanswered (device not fitted
    /// or the bus is misconfigured).
    pub fn probe(mut bus: B) -> Option<Self> {
        if !cfi::probe(&mut bus) {
            log::warn!("no CFI flash device detected");
            return None;
        }
        let size = cfi::chip_size(&mut bus);
        log::info!("NOR flash present, {} bytes", size);
        Some(Self { bus, size, error: false })
    }

    /// Total device size in bytes
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The erase block containing `offset`
    pub fn block_info(&mut self, offset: u32) -> BlockInfo {
        cfi::block_info(&mut self.bus, offset)
    }

    /// The device's erase-region table
    pub fn regions(&mut self) -> heapless::Vec<EraseRegion, MAX_REGIONS> {
        cfi::regions(&mut self.bus)
    }

    /// Erase the single block containing `offset`, blocking until done.
    pub fn erase_block(&mut self, offset: u32) -> Result<()> {
        let result = seq::block_erase(&mut self.bus, offset, EraseMode::Blocking);
        if result.is_err() {
            self.error = true;
        }
        result
    }

    /// Erase the whole device.
    pub fn erase_chip(&mut self, mode: EraseMode) -> Result<()> {
        let result = seq::chip_erase(&mut self.bus, mode);
        if result.is_err() {
            self.error = true;
        }
        result
    }

    /// Poll a deferred erase once; a confirmed failure sets the sticky flag.
    pub fn erase_poll(&mut self, offset: u32) -> EraseStatus {
        let status = seq::erase_poll(&mut self.bus, offset);
        if status == EraseStatus::Failed {
            self.error = true;
        }
        status
    }

    /// Erase `page_size` bytes worth of physical blocks starting at the
    /// block containing `offset`.
    ///
    /// The device's physical blocks can be smaller than the logical page the
    /// update mechanism assumes, so this keeps discovering and erasing the
    /// next block until the page is covered. Iteration stops as soon as the
    /// sticky error flag is set; no further blocks are erased once an error
    /// has been observed.
    pub fn erase_page(&mut self, offset: u32, page_size: u32) -> Result<()> {
        let mut addr = offset;
        let mut remaining = i64::from(page_size);

        while !self.error && remaining > 0 {
            let info = self.block_info(addr);
            if info.is_valid() {
                log::debug!("erasing {} byte block at 0x{:08X}", info.size, addr);
                if seq::block_erase(&mut self.bus, info.start, EraseMode::Blocking).is_err() {
                    self.error = true;
                }
            } else {
                self.error = true;
            }
            remaining -= i64::from(info.size);
            addr = info.start + info.size;
        }

        if self.error {
            Err(Error::EraseFailed { offset })
        } else {
            Ok(())
        }
    }

    /// Program `data` at `offset`; the target must already be erased.
    ///
    /// A short write sets the sticky flag and reports where programming
    /// stopped.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let written = seq::program(&mut self.bus, offset, data);
        if written != data.len() {
            self.error = true;
            return Err(Error::ProgramFailed {
                offset: offset + written as u32,
                written: written as u32,
            });
        }
        Ok(())
    }

    /// Copy bytes out of the array into `buf`.
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) {
        for (index, slot) in buf.iter_mut().enumerate() {
            *slot = self.bus.read8(offset + index as u32);
        }
    }

    /// Read one 32-bit word from the array.
    pub fn read32(&mut self, offset: u32) -> u32 {
        self.bus.read32(offset)
    }

    /// Check that an image of `image_size` bytes may be written at `offset`.
    ///
    /// The offset must be exactly a block-start address and the image must
    /// fit between it and the end of the device; either condition failing
    /// rejects the target, preventing partial-block writes that would
    /// corrupt neighboring data.
    pub fn target_valid(&mut self, offset: u32, image_size: u32) -> bool {
        let info = self.block_info(offset);
        if !info.is_valid() || info.start != offset {
            return false;
        }
        image_size <= self.size - offset
    }

    /// Size of the stored image, from the header at offset zero.
    ///
    /// Returns zero when no image header is present.
    pub fn image_size(&mut self) -> u32 {
        let mut raw = [0u8; ImageHeader::LEN];
        self.read(0, &mut raw);
        ImageHeader::probe(&raw).map_or(0, |header| header.len)
    }

    /// Borrow the underlying bus, for inspection
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Whether any erase or program call has failed since the last clear
    pub fn error(&self) -> bool {
        self.error
    }

    /// Reset the sticky error flag. Never done implicitly.
    pub fn clear_error(&mut self) {
        self.error = false;
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
