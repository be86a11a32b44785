//! mstflash-core - Protocol core for the Realtek RTD2142 MST hub
//!
//! This crate implements the firmware-update protocol of the RTD2142
//! DisplayPort MST hub. The chip's MCU runs from an external 1 MiB SPI
//! flash laid out as a boot bank plus two user banks with per-bank
//! activation flags ("dual-bank diff" mode). Updates always target the
//! *inactive* user bank and flip its activation flag, so the running
//! image stays intact as a fallback.
//!
//! All chip access goes through the [`bus::RegisterBus`] trait, an
//! abstraction over the I2C side-channel that DisplayPort AUX tunnels to
//! the hub. The `mstflash-linux-i2c` crate provides the Linux i2c-dev
//! implementation; tests use a register-level mock of the chip.
//!
//! # Example
//!
//! ```ignore
//! use mstflash_core::{progress::NoProgress, MstDevice};
//!
//! fn update<B: mstflash_core::bus::RegisterBus>(bus: B, image: &[u8]) -> mstflash_core::Result<()> {
//!     let mut device = MstDevice::open(bus, "DPMST");
//!     device.setup()?;
//!     device.detach(&mut NoProgress)?;
//!     device.write_firmware(image, &mut NoProgress)?;
//!     device.attach(&mut NoProgress)?;
//!     device.reload()
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bus;
pub mod device;
pub mod dualbank;
pub mod error;
pub mod flash;
pub mod progress;
pub mod regs;
pub mod wp;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{DeviceConfig, DeviceFlags, MstDevice};
pub use error::{Error, Result};
