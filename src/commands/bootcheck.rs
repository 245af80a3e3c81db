//! Bootcheck command implementation

use norup_core::boot::{self, BootConfig, BootDecision};
use norup_core::nor::NorFlash;
use norup_sim::{CfiSim, SimGeometry};
use std::path::Path;

/// Plant `image` in the simulated flash and report the boot decision.
pub fn run(image: Option<&Path>, force_update: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut sim = CfiSim::new(SimGeometry::boot_sector());
    if let Some(path) = image {
        let data = std::fs::read(path)?;
        println!("Loaded {} byte image from {:?}", data.len(), path);
        sim.load(0, &data);
    }

    let mut flash = NorFlash::probe(sim);
    let decision = boot::evaluate(flash.as_mut(), &BootConfig::default(), || force_update);

    match decision {
        BootDecision::BootImage => println!("Decision: boot the resident image"),
        BootDecision::AwaitUpdate => println!("Decision: remain resident, await update"),
    }
    Ok(())
}
