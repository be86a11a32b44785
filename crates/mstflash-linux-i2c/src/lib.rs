//! mstflash-linux-i2c - Linux transport for the RTD2142 protocol core
//!
//! Two pieces: the [`LinuxI2c`] bus implementation over an i2c-dev
//! character device, and the sysfs [`resolver`] that finds which i2c-dev
//! node carries the DDC channel of a named DP-AUX device.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod device;
mod error;
pub mod resolver;

pub use device::{LinuxI2c, LinuxI2cConfig};
pub use error::{LinuxI2cError, Result};
