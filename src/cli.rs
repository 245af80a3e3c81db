//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "norup")]
#[command(author, version, about = "CFI NOR firmware-image management harness", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the simulated flash and show its geometry
    Info,

    /// Erase one block, or the whole chip
    Erase {
        /// Erase the block containing this offset (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, conflicts_with = "chip")]
        offset: Option<u32>,

        /// Erase the entire device
        #[arg(long)]
        chip: bool,
    },

    /// Upload a local file into a backing-store resource
    Put {
        /// File to upload
        input: PathBuf,

        /// Resource name: "eeprom", "extflash", or "sdcard/<path>"
        resource: String,
    },

    /// Download a resource into a local file
    Get {
        /// Resource name: "eeprom", "extflash", or "sdcard/<path>"
        resource: String,

        /// File to write the received data to
        output: PathBuf,

        /// Image file to plant in the resource before the transfer
        #[arg(long)]
        preload: Option<PathBuf>,
    },

    /// Evaluate the boot-or-await-update decision for an image
    Bootcheck {
        /// Image file to plant in the flash; omitted means erased flash
        image: Option<PathBuf>,

        /// Assert the manual update-override input
        #[arg(long)]
        force_update: bool,
    },
}
