//! Boot image validity checker
//!
//! Decides at startup whether to branch to the resident application image
//! or stay resident awaiting a firmware upload. The check is explicitly a
//! heuristic, not a checksum: the first two words of the image are tested
//! for plausibility as an initial stack pointer and a reset vector. A stale
//! image whose first two words happen to look right will pass.

use crate::bus::FlashBus;
use crate::nor::NorFlash;

/// The word an erased flash location reads back as
const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Outcome of the startup check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDecision {
    /// Branch to the resident application image
    BootImage,
    /// Stay resident and wait for a firmware upload
    AwaitUpdate,
}

/// Address-map parameters for the plausibility checks
///
/// Defaults mirror the development board: on-chip SRAM at 0x2000_0000,
/// daughter-board SRAM at 0x6800_0000, application flash mapped at
/// 0x6000_0000 with the image at the start of the device.
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// Device-relative offset of the application image
    pub app_offset: u32,
    /// Masked base of the on-chip RAM window
    pub sram_base: u32,
    /// Masked base of the external RAM window
    pub ext_sram_base: u32,
    /// Mask applied to the stack-pointer word before the window compares
    pub ram_mask: u32,
    /// Expected masked entry vector: the flash window base with the thumb
    /// bit set
    pub entry_base: u32,
    /// Mask applied to the entry word; keeps the thumb bit
    pub entry_mask: u32,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            app_offset: 0,
            sram_base: 0x2000_0000,
            ext_sram_base: 0x6800_0000,
            ram_mask: 0xFFF0_0000,
            entry_base: 0x6000_0001,
            entry_mask: 0xFF80_0001,
        }
    }
}

/// Decide whether to boot the resident image.
///
/// With no flash device detected the outcome is unconditionally
/// [`BootDecision::AwaitUpdate`]. Otherwise the image's first word must be a
/// plausible stack pointer (inside one of the RAM windows) and its second a
/// plausible thumb entry vector inside the flash window. Only when both
/// checks pass is the manual override sampled; an asserted override wins
/// over a valid-looking image, giving an operator an unconditional escape
/// hatch.
pub fn evaluate<B, P>(
    flash: Option<&mut NorFlash<B>>,
    cfg: &BootConfig,
    update_forced: P,
) -> BootDecision
where
    B: FlashBus,
    P: FnOnce() -> bool,
{
    let Some(flash) = flash else {
        log::warn!("no flash device detected, staying resident");
        return BootDecision::AwaitUpdate;
    };

    let stack = flash.read32(cfg.app_offset);
    let entry = flash.read32(cfg.app_offset + 4);

    let stack_plausible = stack != ERASED_WORD
        && ((stack & cfg.ram_mask) == cfg.sram_base
            || (stack & cfg.ram_mask) == cfg.ext_sram_base);
    let entry_plausible = entry != ERASED_WORD && (entry & cfg.entry_mask) == cfg.entry_base;

    if !stack_plausible || !entry_plausible {
        log::info!(
            "no valid application image (stack 0x{:08X}, entry 0x{:08X})",
            stack,
            entry
        );
        return BootDecision::AwaitUpdate;
    }

    if update_forced() {
        log::info!("update forced by operator input");
        return BootDecision::AwaitUpdate;
    }

    log::info!("booting resident application image");
    BootDecision::BootImage
}
