//! Flash readback commands

use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::IndicatifProgress;
use crate::cli::DeviceArgs;

/// Read either the active user bank or the whole flash to `output`
pub fn run(args: &DeviceArgs, output: &Path, full: bool) -> Result<(), Box<dyn Error>> {
    let mut device = super::open_device(args)?;
    device.setup()?;

    let mut progress = IndicatifProgress::new();
    device.detach(&mut progress)?;
    let read_result = if full {
        device.dump_firmware(&mut progress)
    } else {
        device.read_firmware(&mut progress)
    };
    let attach_result = device.attach(&mut progress);
    let image = read_result?;
    attach_result?;

    let mut file = File::create(output)?;
    file.write_all(&image)?;
    println!("Wrote {} bytes to {:?}", image.len(), output);
    Ok(())
}
