//! Scripted CFI flash used by the unit tests
//!
//! A minimal rendition of the AMD-style command-set state machine: commands
//! complete instantly, but unlock sequencing, query-mode gating, the
//! two-reset requirement, and error reporting are all modelled so the
//! sequencer and catalog are exercised against realistic bus behavior.
//! The full simulator with busy-cycle emulation lives in the `norup-sim`
//! crate; this one stays small enough to read in one sitting.

use std::vec;
use std::vec::Vec;

use crate::bus::FlashBus;
use crate::cmd;

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

pub struct TestBus {
    regions: Vec<(u32, u32)>,
    data: Vec<u8>,
    cfi: Vec<u8>,
    mode: Mode,
    present: bool,
    /// Log of every byte written, in order
    pub writes: Vec<(u32, u8)>,
    /// Start offsets of blocks erased, in order
    pub erased: Vec<u32>,
    /// Number of whole-chip erases issued
    pub chip_erases: u32,
    /// Block start whose erase reports a device error
    pub fail_erase_at: Option<u32>,
    /// Offset whose programming reports a device error
    pub fail_program_at: Option<u32>,
    /// Offset whose next completion poll reports a stale error bit once
    pub spurious_error_at: Option<u32>,
    erase_error: bool,
    program_error: Option<(u32, u8)>,
}

impl TestBus {
    /// A present device with the given (block count, block size) regions.
    /// Region spans must sum to a power of two.
    pub fn new(regions: &[(u32, u32)]) -> Self {
        let total: u32 = regions.iter().map(|&(count, size)| count * size).sum();
        assert!(total.is_power_of_two());
        Self {
            regions: regions.to_vec(),
            data: vec![0xFF; total as usize],
            cfi: build_cfi(regions, total),
            mode: Mode::Array,
            present: true,
            writes: Vec::new(),
            erased: Vec::new(),
            chip_erases: 0,
            fail_erase_at: None,
            fail_program_at: None,
            spurious_error_at: None,
            erase_error: false,
            program_error: None,
        }
    }

    /// A bus with nothing attached: query mode never answers.
    pub fn absent() -> Self {
        let mut bus = Self::new(&[(1, 1024)]);
        bus.present = false;
        bus
    }

    /// Plant bytes in the array.
    pub fn set_data(&mut self, offset: u32, bytes: &[u8]) {
        let offset = offset as usize;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Plant a little-endian word in the array.
    pub fn set_word(&mut self, offset: u32, value: u32) {
        self.set_data(offset, &value.to_le_bytes());
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn block_containing(&self, offset: u32) -> (u32, u32) {
        let mut start = 0u32;
        for &(count, size) in &self.regions {
            let end = start + count * size;
            if offset < end {
                return (start + ((offset - start) / size) * size, size);
            }
            start = end;
        }
        (0, 0)
    }

    fn erase_block(&mut self, offset: u32) {
        let (start, size) = self.block_containing(offset);
        if self.fail_erase_at == Some(start) {
            self.erase_error = true;
            return;
        }
        self.data[start as usize..(start + size) as usize].fill(0xFF);
        self.erased.push(start);
    }

    fn program_byte(&mut self, offset: u32, value: u8) {
        if self.fail_program_at == Some(offset) {
            self.program_error = Some((offset, value));
            return;
        }
        self.data[offset as usize] &= value;
    }
}

fn build_cfi(regions: &[(u32, u32)], total: u32) -> Vec<u8> {
    let mut cfi = vec![0u8; 0x100];
    cfi[0x20] = b'Q';
    cfi[0x22] = b'R';
    cfi[0x24] = b'Y';
    cfi[0x4E] = total.trailing_zeros() as u8;
    cfi[0x58] = regions.len() as u8;
    for (index, &(count, size)) in regions.iter().enumerate() {
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

impl FlashBus for TestBus {
    fn read8(&mut self, offset: u32) -> u8 {
        if self.erase_error {
            return 0x20;
        }
        if let Some((failed_offset, value)) = self.program_error {
            if failed_offset == offset {
                return (!value) | 0x20;
            }
        }
        if self.spurious_error_at == Some(offset) {
            // One stale error-bit read, then the real data.
            self.spurious_error_at = None;
            return 0x20;
        }
        match self.mode {
            Mode::Query if self.present => {
                self.cfi.get(offset as usize).copied().unwrap_or(0xFF)
            }
            Mode::Query | Mode::Autoselect => 0x00,
            _ => self.data.get(offset as usize).copied().unwrap_or(0xFF),
        }
    }

    fn write8(&mut self, offset: u32, value: u8) {
        self.writes.push((offset, value));

        if self.mode == Mode::Program {
            self.program_byte(offset, value);
            self.mode = Mode::Array;
            return;
        }

        if value == cmd::RESET {
            self.mode = match self.mode {
                Mode::Query => Mode::Autoselect,
                _ => Mode::Array,
            };
            self.erase_error = false;
            self.program_error = None;
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
                self.chip_erases += 1;
                self.data.fill(0xFF);
                Mode::Array
            }
            (Mode::EraseUnlock2, _, cmd::BLOCK_ERASE) => {
                self.erase_block(offset);
                Mode::Array
            }
            (Mode::Autoselect, cmd::QUERY_OFFSET, cmd::QUERY) => Mode::Query,
            (Mode::Autoselect, _, _) => Mode::Autoselect,
            _ => Mode::Array,
        };
    }
}
