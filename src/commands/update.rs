//! Firmware update command

use mstflash_core::DeviceFlags;
use std::error::Error;
use std::path::Path;

use super::IndicatifProgress;
use crate::cli::DeviceArgs;

pub fn run(args: &DeviceArgs, input: &Path) -> Result<(), Box<dyn Error>> {
    let image = super::read_file(input)?;

    let mut device = super::open_device(args)?;
    device.setup()?;
    if !device.flags().contains(DeviceFlags::UPDATABLE) {
        return Err("device does not report dual-bank diff mode; refusing to update".into());
    }
    if let Some(version) = device.version() {
        println!("Current version: {version}");
    }

    let mut progress = IndicatifProgress::new();
    device.detach(&mut progress)?;
    let write_result = device.write_firmware(&image, &mut progress);
    // leave ISP mode even when the write failed, the active bank is
    // still bootable
    let attach_result = device.attach(&mut progress);
    write_result?;
    attach_result?;

    device.reload()?;
    println!("Update complete; the new image activates on the next device boot");
    Ok(())
}
