//! Device inquiry command

use mstflash_core::device::{self, DeviceFlags};
use std::error::Error;

use crate::cli::DeviceArgs;

pub fn run(args: &DeviceArgs) -> Result<(), Box<dyn Error>> {
    let mut device = super::open_device(args)?;
    device.setup()?;
    let status = device.dual_bank_status()?;

    println!("{} {} ({})", device::VENDOR, device::SUPPORTED_CHIP, device::SUMMARY);
    println!("Protocol:          {}", device::PROTOCOL_ID);
    println!();
    println!("Dual-bank enabled: {}", status.enabled);
    if let Some(mode) = status.mode {
        println!("Dual-bank mode:    {mode:?}");
    }
    match device.active_bank() {
        Some(bank) => println!("Active bank:       {bank}"),
        None => println!("Active bank:       unknown"),
    }
    if status.enabled {
        let (major, minor) = status.user1_version;
        println!("User1 version:     {major}.{minor}");
        let (major, minor) = status.user2_version;
        println!("User2 version:     {major}.{minor}");
    }
    println!("Version:           {}", device.version().unwrap_or("unknown"));
    println!(
        "Updatable:         {}",
        device.flags().contains(DeviceFlags::UPDATABLE)
    );
    Ok(())
}
