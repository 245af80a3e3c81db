//! Erase command implementation

use indicatif::{ProgressBar, ProgressStyle};
use norup_core::seq::{EraseMode, EraseStatus};
use std::time::Duration;

use super::HarnessError;

/// Run the erase command.
pub fn run(offset: Option<u32>, chip: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut flash = super::probe_flash(None)?;

    if chip {
        // Issue the erase deferred and poll, the way a caller with other
        // periodic duties would.
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!(
            "Erasing {} bytes (this may take a while)...",
            flash.size()
        ));
        pb.enable_steady_tick(Duration::from_millis(100));

        flash
            .erase_chip(EraseMode::Deferred)
            .map_err(HarnessError::Flash)?;
        loop {
            match flash.erase_poll(0) {
                EraseStatus::Busy => pb.tick(),
                EraseStatus::Done => break,
                EraseStatus::Failed => {
                    pb.finish_and_clear();
                    return Err("chip erase failed".into());
                }
            }
        }
        pb.finish_and_clear();
        println!("Chip erase complete");
        return Ok(());
    }

    let offset = offset.ok_or("either --offset or --chip is required")?;
    let info = flash.block_info(offset);
    if !info.is_valid() {
        return Err(format!("offset 0x{:08X} is outside the device", offset).into());
    }

    flash.erase_block(info.start).map_err(HarnessError::Flash)?;
    println!(
        "Erased {} byte block at 0x{:08X}",
        info.size, info.start
    );
    Ok(())
}
