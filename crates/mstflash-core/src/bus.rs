//! Bus trait definitions
//!
//! The RTD2142 is driven through plain byte-level I2C transactions at a
//! fixed peripheral address. This module defines the blocking transport
//! trait everything else is generic over, so the same protocol code runs
//! against a Linux i2c-dev node or a mock chip in tests.

use std::time::Duration;

use crate::error::Result;

/// 7-bit I2C peripheral address of the RTD2142 register interface
pub const CHIP_ADDRESS: u16 = 0x35;

/// Blocking byte-level bus to the chip
///
/// Each `write` is a single START-ADDR-DATA-STOP transaction; each `read`
/// is a single START-ADDR-DATA-STOP read transaction. Register accesses
/// are built from these: a 2-byte write sets a register, a 1-byte write
/// sets the address pointer for a following read.
pub trait RegisterBus {
    /// Write one transaction to the chip
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read one transaction from the chip, filling `buf` completely
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Write `tx`, then read back into `rx`
    fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.write(tx)?;
        self.read(rx)
    }

    /// Block the calling thread for `duration`
    ///
    /// The protocol needs a handful of fixed settle delays; routing them
    /// through the bus lets tests skip them.
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
