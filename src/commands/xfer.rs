//! Put and get command implementations
//!
//! Drive the block-transfer router the way the network transport would:
//! one request, a run of 512-byte data blocks, then a close notification.

use indicatif::{ProgressBar, ProgressStyle};
use norup_core::xfer::{Direction, BLOCK_SIZE};
use std::path::Path;

use super::HarnessError;

fn progress_bar(total: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Upload `input` into the named resource.
pub fn run_put(input: &Path, resource: &str) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let mut router = super::board(None, None);
    let mut session = router
        .request(Direction::Put, resource)
        .map_err(HarnessError::Transfer)?;

    let pb = progress_bar(data.len() as u64)?;
    for (index, block) in data.chunks(BLOCK_SIZE as usize).enumerate() {
        router
            .put_block(&mut session, index as u32 + 1, block)
            .map_err(HarnessError::Transfer)?;
        pb.inc(block.len() as u64);
    }
    pb.finish_and_clear();
    router.close(session);

    if resource.eq_ignore_ascii_case("extflash") {
        if let Some(nor) = router.nor_mut() {
            println!(
                "Wrote {} bytes, {} block erases issued",
                data.len(),
                nor.bus().erase_log().len()
            );
            if nor.error() {
                println!("Sticky error flag is SET");
            }
            return Ok(());
        }
    }
    println!("Wrote {} bytes", data.len());
    Ok(())
}

/// Download the named resource into `output`. `preload` optionally plants
/// an image in the resource first, so the transfer has something to fetch.
pub fn run_get(
    resource: &str,
    output: &Path,
    preload: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = match preload {
        Some(path) => Some(std::fs::read(path)?),
        None => None,
    };

    let mut router = if resource.eq_ignore_ascii_case("eeprom") {
        super::board(None, image.as_deref())
    } else {
        super::board(image.as_deref(), None)
    };

    let mut session = router
        .request(Direction::Get, resource)
        .map_err(HarnessError::Transfer)?;

    if session.bytes_remaining == 0 {
        println!("No image stored in {:?}; nothing to fetch", resource);
        std::fs::write(output, b"")?;
        return Ok(());
    }

    let pb = progress_bar(u64::from(session.bytes_remaining))?;
    let mut fetched = Vec::with_capacity(session.bytes_remaining as usize);
    let mut remaining = session.bytes_remaining as usize;
    let mut block = 1u32;
    while remaining > 0 {
        let chunk = remaining.min(BLOCK_SIZE as usize);
        let mut buf = vec![0u8; chunk];
        router
            .get_block(&mut session, block, &mut buf)
            .map_err(HarnessError::Transfer)?;
        fetched.extend_from_slice(&buf);
        pb.inc(chunk as u64);
        remaining -= chunk;
        block += 1;
    }
    pb.finish_and_clear();
    router.close(session);

    std::fs::write(output, &fetched)?;
    println!("Wrote {} bytes to {:?}", fetched.len(), output);
    Ok(())
}
