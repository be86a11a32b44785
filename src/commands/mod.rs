//! Command implementations

pub mod info;
pub mod read;
pub mod update;

use indicatif::{ProgressBar, ProgressStyle};
use mstflash_core::device::{self, DeviceConfig, MstDevice};
use mstflash_core::progress::{Status, UpdateProgress};
use mstflash_linux_i2c::{resolver, LinuxI2c};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::cli::DeviceArgs;

/// Resolve the bus, open it and create a device session
///
/// With `--bus` the device node is used as given; otherwise the DP-AUX
/// name is pushed through the quirk configuration and the sysfs
/// resolver, the same path a firmware-update daemon would take.
pub(crate) fn open_device(args: &DeviceArgs) -> Result<MstDevice<LinuxI2c>, Box<dyn Error>> {
    let (path, aux_name) = match (&args.bus, &args.aux_name) {
        (Some(path), _) => (path.clone(), args.aux_name.clone().unwrap_or_default()),
        (None, Some(aux_name)) => {
            let mut config = DeviceConfig::new(device::SUPPORTED_CHIP);
            config.set_quirk(device::QUIRK_DP_AUX_NAME, aux_name)?;
            let aux_name = device::probe(&config)?.to_string();

            let path = resolver::find_i2c_bus(&aux_name)?;
            println!("Found I2C bus at {}", path.display());
            (path, aux_name)
        }
        (None, None) => return Err("either --aux-name or --bus must be given".into()),
    };

    let path = path.to_str().ok_or("bus path is not valid UTF-8")?;
    let bus = LinuxI2c::open_device(path)?;
    Ok(MstDevice::open(bus, aux_name))
}

/// Read file contents into a Vec
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress reporter rendering phases as indicatif bars and spinners
pub(crate) struct IndicatifProgress {
    bar: Option<ProgressBar>,
    status: Status,
}

impl IndicatifProgress {
    pub(crate) fn new() -> Self {
        Self {
            bar: None,
            status: Status::Idle,
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} done", self.status));
        }
    }
}

impl UpdateProgress for IndicatifProgress {
    fn set_status(&mut self, status: Status) {
        if status == self.status {
            return;
        }
        self.finish();
        self.status = status;

        if status == Status::Restart {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.set_message("waiting for device restart...");
            bar.enable_steady_tick(Duration::from_millis(100));
            self.bar = Some(bar);
        }
    }

    fn set_progress(&mut self, done: usize, total: usize) {
        let needs_new = match &self.bar {
            Some(bar) => bar.length() != Some(total as u64),
            None => true,
        };
        if needs_new {
            self.finish();
            let bar = ProgressBar::new(total as u64);
            bar.set_style(bar_style());
            bar.set_message(self.status.to_string());
            self.bar = Some(bar);
        }
        if let Some(bar) = &self.bar {
            bar.set_position(done as u64);
        }
    }
}
