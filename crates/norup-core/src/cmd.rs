//! Command bytes and bus offsets for the AMD/JEDEC parallel NOR command set
//!
//! The flash is driven by writing fixed command bytes at fixed bus offsets.
//! Every command starts with the same two-cycle unlock, followed by one or
//! more command cycles. The offsets below are byte addresses as seen on an
//! 8-bit data bus.

// ============================================================================
// Unlock cycle
// ============================================================================

/// Bus offset of the first unlock write
pub const UNLOCK1_OFFSET: u32 = 0xAAA;
/// Data byte of the first unlock write
pub const UNLOCK1_DATA: u8 = 0xAA;
/// Bus offset of the second unlock write
pub const UNLOCK2_OFFSET: u32 = 0x555;
/// Data byte of the second unlock write
pub const UNLOCK2_DATA: u8 = 0x55;

// ============================================================================
// Commands (written at UNLOCK1_OFFSET unless noted)
// ============================================================================

/// Enter autoselect mode
pub const AUTOSELECT: u8 = 0x90;
/// Enter CFI query mode (written at [`QUERY_OFFSET`], no unlock required
/// once in autoselect mode)
pub const QUERY: u8 = 0x98;
/// Bus offset the CFI query entry command is written at
pub const QUERY_OFFSET: u32 = 0xAA;
/// Return to read-array mode (may be written at any offset)
pub const RESET: u8 = 0xF0;
/// Erase setup, the first half of both erase commands
pub const ERASE_SETUP: u8 = 0x80;
/// Erase the block addressed by the final write of the sequence
pub const BLOCK_ERASE: u8 = 0x30;
/// Erase the whole chip
pub const CHIP_ERASE: u8 = 0x10;
/// Program one byte; the next write carries the address and data
pub const PROGRAM: u8 = 0xA0;
