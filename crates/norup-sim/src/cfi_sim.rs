//! Simulated CFI NOR flash
//!
//! An in-memory rendition of an AMD/JEDEC command-set parallel NOR device
//! behind the [`FlashBus`] trait: unlock cycle tracking, autoselect and CFI
//! query modes, erase and byte programming against a backing array, and
//! status polling with configurable busy-cycle counts so deferred erases
//! are genuinely observable as busy before they complete.
//!
//! Programming can only clear bits, erasing sets a whole block to 0xFF,
//! and query data is only visible while the device is in query mode: code
//! that forgets the second reset write reads autoselect garbage instead of
//! array data, just like on real hardware.

use norup_core::bus::FlashBus;
use norup_core::cmd;

/// Erase geometry of the simulated device
#[derive(Debug, Clone)]
pub struct SimGeometry {
    /// (block count, block size) pairs, lowest region first
    pub regions: Vec<(u32, u32)>,
}

impl SimGeometry {
    /// A device with one uniform erase region
    pub fn uniform(count: u32, size: u32) -> Self {
        Self { regions: vec![(count, size)] }
    }

    /// The development-board layout: 8 x 8 KiB boot sectors followed by
    /// 63 x 64 KiB main sectors, 4 MiB total
    pub fn boot_sector() -> Self {
        Self { regions: vec![(8, 8 * 1024), (63, 64 * 1024)] }
    }

    /// Total size in bytes
    pub fn total(&self) -> u32 {
        self.regions.iter().map(|&(count, size)| count * size).sum()
    }

    fn block_containing(&self, offset: u32) -> Option<(u32, u32)> {
        let mut start = 0u32;
        for &(count, size) in &self.regions {
            let end = start + count * size;
            if offset < end {
                return Some((start + ((offset - start) / size) * size, size));
            }
            start = end;
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Array,
    Unlock1,
    Unlock2,
    EraseSetup,
    EraseUnlock1,
    EraseUnlock2,
    Autoselect,
    Query,
    Program,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Erase { start: u32, size: u32, polls_left: u32, fail: bool },
    ChipErase { polls_left: u32 },
    Program { offset: u32, value: u8, polls_left: u32, fail: bool },
    /// Error latched on the status bus until a reset command
    Failed,
}

/// In-memory CFI flash simulator
pub struct CfiSim {
    geometry: SimGeometry,
    data: Vec<u8>,
    cfi: Vec<u8>,
    mode: Mode,
    op: Option<Operation>,
    /// Completion polls an erase stays busy for
    pub erase_busy_polls: u32,
    /// Completion polls a byte program stays busy for
    pub program_busy_polls: u32,
    fail_erase_at: Vec<u32>,
    fail_program_at: Vec<u32>,
    erase_log: Vec<u32>,
    chip_erases: u32,
}

impl CfiSim {
    /// Create a simulator with the given geometry, erased throughout.
    pub fn new(geometry: SimGeometry) -> Self {
        let total = geometry.total();
        assert!(total.is_power_of_two(), "device size must be a power of two");
        let cfi = build_cfi(&geometry, total);
        Self {
            data: vec![0xFF; total as usize],
            cfi,
            geometry,
            mode: Mode::Array,
            op: None,
            erase_busy_polls: 3,
            program_busy_polls: 1,
            fail_erase_at: Vec::new(),
            fail_program_at: Vec::new(),
            erase_log: Vec::new(),
            chip_erases: 0,
        }
    }

    /// The backing array
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Plant bytes directly in the array, bypassing the command set.
    pub fn load(&mut self, offset: u32, bytes: &[u8]) {
        let offset = offset as usize;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Make the erase of the block starting at `block_start` fail.
    pub fn fail_erase_at(&mut self, block_start: u32) {
        self.fail_erase_at.push(block_start);
    }

    /// Make programming of the byte at `offset` fail.
    pub fn fail_program_at(&mut self, offset: u32) {
        self.fail_program_at.push(offset);
    }

    /// Start offsets of every block erase issued, in order
    pub fn erase_log(&self) -> &[u32] {
        &self.erase_log
    }

    /// Number of whole-chip erases issued
    pub fn chip_erases(&self) -> u32 {
        self.chip_erases
    }

    fn start_erase(&mut self, offset: u32) {
        let Some((start, size)) = self.geometry.block_containing(offset) else {
            self.op = Some(Operation::Failed);
            return;
        };
        log::debug!("sim: erase issued for {} byte block at 0x{:08X}", size, start);
        self.erase_log.push(start);
        self.op = Some(Operation::Erase {
            start,
            size,
            polls_left: self.erase_busy_polls,
            fail: self.fail_erase_at.contains(&start),
        });
    }

    fn start_chip_erase(&mut self) {
        log::debug!("sim: chip erase issued");
        self.chip_erases += 1;
        self.op = Some(Operation::ChipErase { polls_left: self.erase_busy_polls });
    }

    fn start_program(&mut self, offset: u32, value: u8) {
        self.op = Some(Operation::Program {
            offset,
            value,
            polls_left: self.program_busy_polls,
            fail: self.fail_program_at.contains(&offset),
        });
    }

    /// Advance the in-flight operation by one poll and return the status
    /// byte to present, or `None` once reads should hit the array again.
    fn poll_status(&mut self) -> Option<u8> {
        let op = self.op?;
        match op {
            Operation::Failed => Some(0x20),
            Operation::Erase { start, size, polls_left, fail } => {
                if polls_left > 0 {
                    self.op = Some(Operation::Erase {
                        start,
                        size,
                        polls_left: polls_left - 1,
                        fail,
                    });
                    // Busy: not yet erased, error bit clear.
                    Some(0x00)
                } else if fail {
                    self.op = Some(Operation::Failed);
                    Some(0x20)
                } else {
                    self.data[start as usize..(start + size) as usize].fill(0xFF);
                    self.op = None;
                    None
                }
            }
            Operation::ChipErase { polls_left } => {
                if polls_left > 0 {
                    self.op = Some(Operation::ChipErase { polls_left: polls_left - 1 });
                    Some(0x00)
                } else {
                    self.data.fill(0xFF);
                    self.op = None;
                    None
                }
            }
            Operation::Program { offset, value, polls_left, fail } => {
                if polls_left > 0 {
                    self.op = Some(Operation::Program {
                        offset,
                        value,
                        polls_left: polls_left - 1,
                        fail,
                    });
                    // While busy the device presents inverted data on the
                    // polled location.
                    Some((!value) & !0x20)
                } else if fail {
                    self.op = Some(Operation::Failed);
                    Some((!value) | 0x20)
                } else {
                    let slot = &mut self.data[offset as usize];
                    *slot &= value;
                    self.op = None;
                    None
                }
            }
        }
    }
}

fn build_cfi(geometry: &SimGeometry, total: u32) -> Vec<u8> {
    let mut cfi = vec![0u8; 0x100];
    cfi[0x20] = b'Q';
    cfi[0x22] = b'R';
    cfi[0x24] = b'Y';
    cfi[0x4E] = total.trailing_zeros() as u8;
    cfi[0x58] = geometry.regions.len() as u8;
    for (index, &(count, size)) in geometry.regions.iter().enumerate() {
        let descriptor = 0x5A + index * 8;
        let stored_count = (count - 1) as u16;
        let stored_size = (size / 256) as u16;
        cfi[descriptor] = stored_count as u8;
        cfi[descriptor + 2] = (stored_count >> 8) as u8;
        cfi[descriptor + 4] = stored_size as u8;
        cfi[descriptor + 6] = (stored_size >> 8) as u8;
    }
    cfi
}

impl FlashBus for CfiSim {
    fn read8(&mut self, offset: u32) -> u8 {
        if let Some(status) = self.poll_status() {
            return status;
        }
        match self.mode {
            Mode::Query => self.cfi.get(offset as usize).copied().unwrap_or(0xFF),
            Mode::Autoselect => 0x00,
            _ => self.data.get(offset as usize).copied().unwrap_or(0xFF),
        }
    }

    fn write8(&mut self, offset: u32, value: u8) {
        if self.mode == Mode::Program {
            self.start_program(offset, value);
            self.mode = Mode::Array;
            return;
        }

        if value == cmd::RESET {
            self.mode = match self.mode {
                Mode::Query => Mode::Autoselect,
                _ => Mode::Array,
            };
            // Reset clears a latched error; a healthy in-flight erase keeps
            // running, it cannot be cancelled.
            if matches!(self.op, Some(Operation::Failed)) {
                self.op = None;
            }
            return;
        }

        self.mode = match (self.mode, offset, value) {
            (Mode::Array, cmd::UNLOCK1_OFFSET, cmd::UNLOCK1_DATA) => Mode::Unlock1,
            (Mode::Unlock1, cmd::UNLOCK2_OFFSET, cmd::UNLOCK2_DATA) => Mode::Unlock2,
            (Mode::Unlock2, cmd::UNLOCK1_OFFSET, cmd::AUTOSELECT) => Mode::Autoselect,
            (Mode::Unlock2, cmd::UNLOCK1_OFFSET, cmd::PROGRAM) => Mode::Program,
            (Mode::Unlock2, cmd::UNLOCK1_OFFSET, cmd::ERASE_SETUP) => Mode::EraseSetup,
            (Mode::EraseSetup, cmd::UNLOCK1_OFFSET, cmd::UNLOCK1_DATA) => Mode::EraseUnlock1,
            (Mode::EraseUnlock1, cmd::UNLOCK2_OFFSET, cmd::UNLOCK2_DATA) => Mode::EraseUnlock2,
            (Mode::EraseUnlock2, cmd::UNLOCK1_OFFSET, cmd::CHIP_ERASE) => {
                self.start_chip_erase();
                Mode::Array
            }
            (Mode::EraseUnlock2, _, cmd::BLOCK_ERASE) => {
                self.start_erase(offset);
                Mode::Array
            }
            (Mode::Autoselect, cmd::QUERY_OFFSET, cmd::QUERY) => Mode::Query,
            (Mode::Autoselect, _, _) => Mode::Autoselect,
            _ => Mode::Array,
        };
    }
}
