//! norup-sim - In-memory device simulators for norup
//!
//! This crate provides simulated backing hardware for testing and
//! development without a board attached: a CFI NOR flash with a full
//! command-set state machine, a serial flash with the plain
//! read/write/erase contract, and an in-memory filesystem. The CLI binds
//! the update core to these; the test modules below drive the whole stack
//! end to end.

mod cfi_sim;
mod memfs;
mod serial;

pub use cfi_sim::{CfiSim, SimGeometry};
pub use memfs::{MemFile, MemFs};
pub use serial::{SerialSim, DEFAULT_SECTOR_SIZE};

#[cfg(test)]
mod tests {
    use super::*;
    use norup_core::boot::{self, BootConfig, BootDecision};
    use norup_core::image;
    use norup_core::nor::NorFlash;
    use norup_core::seq::{self, EraseMode, EraseStatus};
    use norup_core::xfer::{Direction, Router, XferCode, BLOCK_SIZE};

    fn probed(sim: CfiSim) -> NorFlash<CfiSim> {
        NorFlash::probe(sim).expect("simulated device answers the CFI query")
    }

    #[test]
    fn probe_and_size_discovery() {
        let flash = probed(CfiSim::new(SimGeometry::boot_sector()));
        assert_eq!(flash.size(), 4 * 1024 * 1024);
    }

    #[test]
    fn geometry_lookup_across_regions() {
        let mut flash = probed(CfiSim::new(SimGeometry::boot_sector()));

        let info = flash.block_info(5 * 8192);
        assert_eq!((info.start, info.size), (5 * 8192, 8192));

        let info = flash.block_info(8 * 8192 - 1);
        assert_eq!((info.start, info.size), (7 * 8192, 8192));

        let info = flash.block_info(65536);
        assert_eq!((info.start, info.size), (65536, 65536));
    }

    #[test]
    fn deferred_erase_is_busy_then_done() {
        let mut sim = CfiSim::new(SimGeometry::uniform(64, 4096));
        sim.erase_busy_polls = 3;
        sim.load(4096, &[0u8; 4096]);

        seq::block_erase(&mut sim, 4096, EraseMode::Deferred).unwrap();

        let mut busy_polls = 0;
        loop {
            match seq::erase_poll(&mut sim, 4096) {
                EraseStatus::Busy => busy_polls += 1,
                EraseStatus::Done => break,
                EraseStatus::Failed => panic!("erase failed"),
            }
        }
        assert_eq!(busy_polls, 3);
        assert!(sim.data()[4096..8192].iter().all(|&byte| byte == 0xFF));
    }

    #[test]
    fn blocking_erase_failure_sets_sticky_flag() {
        let mut sim = CfiSim::new(SimGeometry::boot_sector());
        sim.load(16384, &[0u8; 16]);
        sim.fail_erase_at(16384);
        let mut flash = probed(sim);

        assert!(flash.erase_page(0, 64 * 1024).is_err());
        assert!(flash.error());
        // The failing block stopped the page walk; later blocks untouched.
        assert_eq!(flash.bus().erase_log(), [0, 8192, 16384]);
    }

    #[test]
    fn program_reports_partial_progress() {
        let mut sim = CfiSim::new(SimGeometry::uniform(64, 4096));
        sim.fail_program_at(66);
        let mut flash = probed(sim);

        let err = flash.write(64, &[0x11, 0x22, 0x33, 0x44]).unwrap_err();
        assert_eq!(
            err,
            norup_core::Error::ProgramFailed { offset: 66, written: 2 }
        );
        assert!(flash.error());
        assert_eq!(&flash.bus().data()[64..66], &[0x11, 0x22]);
    }

    #[test]
    fn put_stream_erases_each_block_once() {
        // Transfer block size 512, physical erase block size 2048: blocks
        // 1..=8 must trigger erases exactly at offsets 0 and 2048.
        let sim = CfiSim::new(SimGeometry::uniform(32, 2048));
        let mut router = Router::new(
            NorFlash::probe(sim),
            SerialSim::new(64 * 1024),
            MemFs::new(),
        );

        let mut session = router.request(Direction::Put, "extflash").unwrap();
        let payload = [0xC3; BLOCK_SIZE as usize];
        for block in 1..=8 {
            router.put_block(&mut session, block, &payload).unwrap();
        }
        router.close(session);

        let sim = router.nor_mut().unwrap().bus();
        assert_eq!(sim.erase_log(), [0, 2048]);
        assert!(sim.data()[..4096].iter().all(|&byte| byte == 0xC3));
    }

    #[test]
    fn get_round_trip_with_image_header() {
        let mut sim = CfiSim::new(SimGeometry::boot_sector());
        let mut stored = Vec::new();
        stored.extend_from_slice(&image::MARKER);
        stored.extend_from_slice(&1024u32.to_le_bytes());
        stored.extend_from_slice(&[0x77; 1016]);
        sim.load(0, &stored);

        let mut router = Router::new(
            NorFlash::probe(sim),
            SerialSim::new(64 * 1024),
            MemFs::new(),
        );

        let mut session = router.request(Direction::Get, "extflash").unwrap();
        assert_eq!(session.bytes_remaining, 1024);

        let mut fetched = Vec::new();
        let mut block = 1;
        let mut remaining = session.bytes_remaining as usize;
        while remaining > 0 {
            let chunk = remaining.min(BLOCK_SIZE as usize);
            let mut buf = vec![0u8; chunk];
            router.get_block(&mut session, block, &mut buf).unwrap();
            fetched.extend_from_slice(&buf);
            remaining -= chunk;
            block += 1;
        }
        router.close(session);

        assert_eq!(fetched, stored);
    }

    #[test]
    fn serial_resource_round_trip() {
        let mut router = Router::new(
            NorFlash::probe(CfiSim::new(SimGeometry::boot_sector())),
            SerialSim::new(64 * 1024),
            MemFs::new(),
        );

        let mut session = router.request(Direction::Put, "eeprom").unwrap();
        let mut payload = Vec::new();
        payload.extend_from_slice(&image::MARKER);
        payload.extend_from_slice(&520u32.to_le_bytes());
        payload.resize(512, 0xAA);
        router.put_block(&mut session, 1, &payload).unwrap();
        router.put_block(&mut session, 2, &[0xBB; 8]).unwrap();
        router.close(session);

        // The header written above makes a follow-up GET see 520 bytes.
        let session = router.request(Direction::Get, "eeprom").unwrap();
        assert_eq!(session.bytes_remaining, 520);
        router.close(session);
    }

    #[test]
    fn filesystem_slot_is_exclusive_until_closed() {
        let mut fs = MemFs::new();
        fs.insert("boot.bin", &[1, 2, 3]);
        let mut router = Router::new(
            NorFlash::probe(CfiSim::new(SimGeometry::boot_sector())),
            SerialSim::new(4096),
            fs,
        );

        let first = router.request(Direction::Get, "sdcard/boot.bin").unwrap();
        let err = router.request(Direction::Get, "sdcard/boot.bin").unwrap_err();
        assert_eq!(err.code, XferCode::AccessViolation);

        router.close(first);
        assert!(router.request(Direction::Get, "sdcard/boot.bin").is_ok());
    }

    #[test]
    fn boot_check_against_simulated_image() {
        // Plausible stack pointer, erased entry vector: stay resident.
        let mut sim = CfiSim::new(SimGeometry::boot_sector());
        sim.load(0, &0x2000_1000u32.to_le_bytes());
        let mut flash = probed(sim);
        let decision = boot::evaluate(Some(&mut flash), &BootConfig::default(), || false);
        assert_eq!(decision, BootDecision::AwaitUpdate);

        // A fully plausible image boots.
        let mut sim = CfiSim::new(SimGeometry::boot_sector());
        sim.load(0, &0x2000_1000u32.to_le_bytes());
        sim.load(4, &0x6000_0205u32.to_le_bytes());
        let mut flash = probed(sim);
        let decision = boot::evaluate(Some(&mut flash), &BootConfig::default(), || false);
        assert_eq!(decision, BootDecision::BootImage);
    }
}
