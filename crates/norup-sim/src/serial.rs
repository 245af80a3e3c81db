//! Simulated serial (SSI/EEPROM-style) flash
//!
//! The real part sits behind its own command set on a serial bus; the
//! router only relies on the read/write/erase contract, which is all this
//! simulator provides.

use norup_core::xfer::SerialStore;

/// Default erase granularity, matching the part on the development board
pub const DEFAULT_SECTOR_SIZE: u32 = 4096;

/// In-memory serial flash
pub struct SerialSim {
    data: Vec<u8>,
    sector_size: u32,
    erase_log: Vec<u32>,
    fail_write_at: Option<u32>,
}

impl SerialSim {
    /// A device of `size` bytes with the default sector size, erased
    /// throughout.
    pub fn new(size: usize) -> Self {
        Self::with_sector_size(size, DEFAULT_SECTOR_SIZE)
    }

    /// A device with an explicit sector size.
    pub fn with_sector_size(size: usize, sector_size: u32) -> Self {
        Self {
            data: vec![0xFF; size],
            sector_size,
            erase_log: Vec::new(),
            fail_write_at: None,
        }
    }

    /// The backing array
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Plant bytes directly in the array.
    pub fn load(&mut self, offset: u32, bytes: &[u8]) {
        let offset = offset as usize;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Make writes touching `offset` stop short there.
    pub fn fail_write_at(&mut self, offset: u32) {
        self.fail_write_at = Some(offset);
    }

    /// Start offsets of every sector erase issued, in order
    pub fn erase_log(&self) -> &[u32] {
        &self.erase_log
    }
}

impl SerialStore for SerialSim {
    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> usize {
        let offset = offset as usize;
        if offset >= self.data.len() {
            return 0;
        }
        let end = (offset + buf.len()).min(self.data.len());
        let count = end - offset;
        buf[..count].copy_from_slice(&self.data[offset..end]);
        count
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> usize {
        for (index, &byte) in data.iter().enumerate() {
            let addr = offset + index as u32;
            if self.fail_write_at == Some(addr) || addr as usize >= self.data.len() {
                return index;
            }
            // Like any flash, writes can only clear bits.
            self.data[addr as usize] &= byte;
        }
        data.len()
    }

    fn erase_sector(&mut self, offset: u32) -> bool {
        let start = (offset - offset % self.sector_size) as usize;
        if start >= self.data.len() {
            return false;
        }
        let end = (start + self.sector_size as usize).min(self.data.len());
        self.data[start..end].fill(0xFF);
        self.erase_log.push(start as u32);
        true
    }
}
