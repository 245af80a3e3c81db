//! Info command implementation

/// Probe the simulated device and print its geometry.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut flash = super::probe_flash(None)?;

    println!("NOR Flash Information");
    println!("=====================");
    println!();
    println!(
        "Size:            {} bytes ({} KiB / {} MiB)",
        flash.size(),
        flash.size() / 1024,
        flash.size() / (1024 * 1024)
    );

    let image_size = flash.image_size();
    if image_size != 0 {
        println!("Stored image:    {} bytes", image_size);
    } else {
        println!("Stored image:    none");
    }

    println!();
    println!("Erase regions:");
    for region in flash.regions() {
        let size_str = if region.size >= 1024 {
            format!("{} KiB", region.size / 1024)
        } else {
            format!("{} bytes", region.size)
        };
        println!(
            "  0x{:08X}: {} blocks of {}",
            region.start, region.count, size_str
        );
    }

    if flash.error() {
        println!();
        println!("Sticky error flag is SET");
    }

    Ok(())
}
