//! Linux i2c-dev bus implementation
//!
//! This module provides the `LinuxI2c` struct that implements the
//! `RegisterBus` trait using Linux's i2c-dev interface. The peripheral
//! address is pinned once at open time with the `I2C_SLAVE` ioctl;
//! after that, every `pwrite` is one START-ADDR-DATA-STOP transaction
//! and every `pread` is one read transaction (the kernel ignores the
//! file offset for i2c-dev nodes).

use crate::error::{LinuxI2cError, Result};

use mstflash_core::bus::{RegisterBus, CHIP_ADDRESS};
use mstflash_core::error::{Error as CoreError, Result as CoreResult};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Linux i2c-dev ioctl constants
mod ioctl {
    use nix::ioctl_write_int_bad;

    /// I2C_SLAVE from <linux/i2c-dev.h>: set the peripheral address
    /// used by subsequent read/write calls on this descriptor
    const I2C_SLAVE: i32 = 0x0703;

    ioctl_write_int_bad!(i2c_slave, I2C_SLAVE);
}

/// Configuration for opening a Linux I2C bus
#[derive(Debug, Clone)]
pub struct LinuxI2cConfig {
    /// Device path (e.g., "/dev/i2c-5")
    pub device: String,
    /// 7-bit peripheral address (default: the RTD2142 register interface)
    pub address: u16,
}

impl Default for LinuxI2cConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            address: CHIP_ADDRESS,
        }
    }
}

impl LinuxI2cConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the peripheral address
    pub fn with_address(mut self, address: u16) -> Self {
        self.address = address;
        self
    }
}

/// An open i2c-dev bus with the peripheral address pinned
///
/// The descriptor is owned exclusively and released on drop. The
/// peripheral address is per-descriptor kernel state, so nothing else
/// may interleave transactions on the same bus during a programming
/// session; serializing other DDC users is the caller's job.
pub struct LinuxI2c {
    file: File,
    path: String,
}

impl LinuxI2c {
    /// Open a Linux I2C bus with the given configuration
    pub fn open(config: &LinuxI2cConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxI2cError::NoDevice);
        }

        log::debug!("linux_i2c: opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxI2cError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();
        unsafe {
            ioctl::i2c_slave(fd, config.address as i32).map_err(|e| {
                LinuxI2cError::SetAddressFailed {
                    address: config.address,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        log::info!(
            "linux_i2c: opened {} (peripheral address {:#04x})",
            config.device,
            config.address
        );

        Ok(Self {
            file,
            path: config.device.clone(),
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxI2cConfig::new(device))
    }

    /// Path of the device node this bus was opened from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl RegisterBus for LinuxI2c {
    fn write(&mut self, data: &[u8]) -> CoreResult<()> {
        let ret = unsafe {
            libc::pwrite(
                self.file.as_raw_fd(),
                data.as_ptr() as *const libc::c_void,
                data.len(),
                0,
            )
        };
        if ret < 0 {
            return Err(CoreError::Io(std::io::Error::last_os_error()));
        }
        if ret as usize != data.len() {
            return Err(CoreError::Io(std::io::Error::other(format!(
                "short write: {ret} of {} bytes",
                data.len()
            ))));
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> CoreResult<()> {
        let ret = unsafe {
            libc::pread(
                self.file.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if ret < 0 {
            return Err(CoreError::Io(std::io::Error::last_os_error()));
        }
        if ret as usize != buf.len() {
            return Err(CoreError::Io(std::io::Error::other(format!(
                "short read: {ret} of {} bytes",
                buf.len()
            ))));
        }
        Ok(())
    }
}
