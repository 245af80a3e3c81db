//! CFI geometry catalog
//!
//! Once placed into query mode via the command sequence, the device exposes
//! its identification and erase geometry in a fixed binary layout relative
//! to the flash base. This module probes for the device, reads its total
//! size, and resolves addresses to the erase block containing them.
//!
//! Every entry point leaves the device back in read-array mode before
//! returning, whatever the outcome.

use crate::bus::FlashBus;
use crate::cmd;

/// Query-block offsets of the 'Q', 'R', 'Y' identification bytes
const ID_Q: u32 = 0x20;
const ID_R: u32 = 0x22;
const ID_Y: u32 = 0x24;
/// Query-block offset of the device-size exponent (size = 1 << exponent)
const SIZE_EXPONENT: u32 = 0x4E;
/// Query-block offset of the erase-region count
const REGION_COUNT: u32 = 0x58;
/// Query-block offset of the first erase-region descriptor
const REGION_TABLE: u32 = 0x5A;
/// Stride between erase-region descriptors
const REGION_STRIDE: u32 = 8;

/// Most erase regions a device descriptor table is expected to carry
pub const MAX_REGIONS: usize = 8;

/// Start offset and size of the erase block containing a queried address
///
/// The all-zero value is the "invalid address" sentinel callers test with
/// [`BlockInfo::is_valid`]; it is a result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockInfo {
    /// Device-relative offset of the first byte of the block
    pub start: u32,
    /// Size of the block in bytes
    pub size: u32,
}

impl BlockInfo {
    /// The sentinel returned for addresses outside the device
    pub const INVALID: Self = Self { start: 0, size: 0 };

    /// Whether this describes a real block
    pub fn is_valid(&self) -> bool {
        self.size != 0
    }
}

/// One contiguous run of equally sized erase blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseRegion {
    /// Device-relative offset of the first block in the region
    pub start: u32,
    /// Number of blocks in the region
    pub count: u32,
    /// Size of each block in bytes
    pub size: u32,
}

impl EraseRegion {
    /// Total number of bytes the region spans
    pub fn span(&self) -> u32 {
        self.count * self.size
    }
}

fn enter_query<B: FlashBus>(bus: &mut B) {
    bus.write8(cmd::UNLOCK1_OFFSET, cmd::UNLOCK1_DATA);
    bus.write8(cmd::UNLOCK2_OFFSET, cmd::UNLOCK2_DATA);
    bus.write8(cmd::UNLOCK1_OFFSET, cmd::AUTOSELECT);
    bus.write8(cmd::QUERY_OFFSET, cmd::QUERY);
}

fn exit_query<B: FlashBus>(bus: &mut B) {
    // The first reset only drops the device back to autoselect mode; the
    // second returns it to array read.
    bus.write8(0, cmd::RESET);
    bus.write8(0, cmd::RESET);
}

/// CFI data is byte-wide but presented on even addresses, so a 16-bit field
/// has its low byte at `offset` and its high byte at `offset + 2`.
fn read16<B: FlashBus>(bus: &mut B, offset: u32) -> u16 {
    u16::from(bus.read8(offset)) | (u16::from(bus.read8(offset + 2)) << 8)
}

fn read_size<B: FlashBus>(bus: &mut B) -> u32 {
    let exponent = bus.read8(SIZE_EXPONENT);
    1u32.checked_shl(u32::from(exponent)).unwrap_or(0)
}

/// Check whether a CFI-capable device answers on the bus.
///
/// Issues the autoselect and query entry sequences and verifies the "QRY"
/// identification bytes.
pub fn probe<B: FlashBus>(bus: &mut B) -> bool {
    enter_query(bus);
    let present =
        bus.read8(ID_Q) == b'Q' && bus.read8(ID_R) == b'R' && bus.read8(ID_Y) == b'Y';
    exit_query(bus);
    log::debug!("CFI query: device {}", if present { "present" } else { "absent" });
    present
}

/// Read the total device size in bytes from the query block.
pub fn chip_size<B: FlashBus>(bus: &mut B) -> u32 {
    enter_query(bus);
    let size = read_size(bus);
    exit_query(bus);
    size
}

/// Resolve `offset` to the erase block containing it.
///
/// Walks the erase-region descriptor table, accumulating region boundaries
/// until the offset falls inside a region, then aligns the offset down to
/// that region's block size. Offsets outside the device yield
/// [`BlockInfo::INVALID`].
pub fn block_info<B: FlashBus>(bus: &mut B, offset: u32) -> BlockInfo {
    enter_query(bus);
    let device_size = read_size(bus);
    let mut info = BlockInfo::INVALID;

    if offset < device_size {
        let regions = bus.read8(REGION_COUNT);
        let mut region_start = 0u32;
        for index in 0..regions {
            let descriptor = REGION_TABLE + u32::from(index) * REGION_STRIDE;
            let blocks = u32::from(read16(bus, descriptor)) + 1;
            let block_size = u32::from(read16(bus, descriptor + 4)) * 256;
            let region_end = region_start + blocks * block_size;

            if offset < region_end {
                info = BlockInfo {
                    start: region_start
                        + ((offset - region_start) / block_size) * block_size,
                    size: block_size,
                };
                break;
            }
            region_start = region_end;
        }
    }

    exit_query(bus);
    info
}

/// Read the full erase-region table.
pub fn regions<B: FlashBus>(bus: &mut B) -> heapless::Vec<EraseRegion, MAX_REGIONS> {
    enter_query(bus);
    let mut table = heapless::Vec::new();
    let regions = bus.read8(REGION_COUNT);
    let mut start = 0u32;
    for index in 0..regions {
        let descriptor = REGION_TABLE + u32::from(index) * REGION_STRIDE;
        let count = u32::from(read16(bus, descriptor)) + 1;
        let size = u32::from(read16(bus, descriptor + 4)) * 256;
        if table.push(EraseRegion { start, count, size }).is_err() {
            break;
        }
        start += count * size;
    }
    exit_query(bus);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testbus::TestBus;

    // Two-region layout from the development board flash: 8 x 8 KiB boot
    // sectors followed by 63 x 64 KiB main sectors (4 MiB total).
    const BOOT_SECTOR: &[(u32, u32)] = &[(8, 8 * 1024), (63, 64 * 1024)];

    #[test]
    fn probe_detects_device() {
        let mut bus = TestBus::new(BOOT_SECTOR);
        assert!(probe(&mut bus));
    }

    #[test]
    fn probe_rejects_missing_device() {
        let mut bus = TestBus::absent();
        assert!(!probe(&mut bus));
    }

    #[test]
    fn probe_restores_array_mode() {
        let mut bus = TestBus::new(BOOT_SECTOR);
        bus.set_data(0x20, &[0x12]);
        assert!(probe(&mut bus));
        // A read after probe must hit the array, not the query block.
        assert_eq!(bus.read8(0x20), 0x12);
    }

    #[test]
    fn chip_size_from_exponent() {
        let mut bus = TestBus::new(BOOT_SECTOR);
        assert_eq!(chip_size(&mut bus), 4 * 1024 * 1024);
    }

    #[test]
    fn block_info_first_region() {
        let mut bus = TestBus::new(BOOT_SECTOR);

        // First byte of block 5 in the 8 KiB region.
        let info = block_info(&mut bus, 5 * 8192);
        assert_eq!(info, BlockInfo { start: 5 * 8192, size: 8192 });

        // One byte before the 8 KiB region ends still resolves inside it.
        let info = block_info(&mut bus, 8 * 8192 - 1);
        assert_eq!(info, BlockInfo { start: 7 * 8192, size: 8192 });
    }

    #[test]
    fn block_info_second_region() {
        let mut bus = TestBus::new(BOOT_SECTOR);
        let info = block_info(&mut bus, 65536);
        assert_eq!(info, BlockInfo { start: 65536, size: 65536 });

        let info = block_info(&mut bus, 65536 + 70000);
        assert_eq!(info, BlockInfo { start: 2 * 65536, size: 65536 });
    }

    #[test]
    fn block_info_out_of_range() {
        let mut bus = TestBus::new(BOOT_SECTOR);
        let info = block_info(&mut bus, 4 * 1024 * 1024);
        assert_eq!(info, BlockInfo::INVALID);
        assert!(!info.is_valid());
    }

    #[test]
    fn block_start_is_aligned() {
        let mut bus = TestBus::new(BOOT_SECTOR);
        for offset in [0, 1, 8191, 40000, 65535, 65536, 100000, 4 * 1024 * 1024 - 1] {
            let info = block_info(&mut bus, offset);
            assert!(info.is_valid());
            assert_eq!(info.start % info.size, 0, "offset {:#x}", offset);
            assert!(info.start <= offset && offset < info.start + info.size);
        }
    }

    #[test]
    fn region_table_walk() {
        let mut bus = TestBus::new(BOOT_SECTOR);
        let table = regions(&mut bus);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0], EraseRegion { start: 0, count: 8, size: 8192 });
        assert_eq!(table[1], EraseRegion { start: 65536, count: 63, size: 65536 });
        // Regions are contiguous and sum to no more than the device size.
        assert_eq!(table[0].span() + table[1].span(), chip_size(&mut bus));
    }
}
