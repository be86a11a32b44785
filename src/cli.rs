//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mstflash")]
#[command(author, version, about = "Realtek RTD2142 MST hub firmware updater", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// How to reach the hub
#[derive(Args)]
pub struct DeviceArgs {
    /// DP-AUX device name of the hub's port (the RealtekMstDpAuxName
    /// quirk value)
    #[arg(short, long)]
    pub aux_name: Option<String>,

    /// Explicit I2C bus device (e.g. /dev/i2c-5), bypassing DP-AUX
    /// discovery
    #[arg(short, long)]
    pub bus: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show dual-bank state, active bank and firmware version
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Write a firmware image to the inactive user bank and activate it
    Update {
        #[command(flatten)]
        device: DeviceArgs,

        /// Firmware image file (exactly one user bank, 0x70000 bytes)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Read the active user bank's image to a file
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Dump the entire 1 MiB flash to a file
    Dump {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}
