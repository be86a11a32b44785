//! Register-level access to the RTD2142
//!
//! The chip exposes two register spaces over I2C: a direct 8-bit space
//! addressed by a single byte, and an indirect 16-bit space reached
//! through a two-register window. Flash programming, ISP mode control
//! and the write-protect GPIO all live in these spaces.

use std::time::{Duration, Instant};

use crate::bus::RegisterBus;
use crate::error::{Error, Result};

// Direct registers

/// Operation attribute; bit 0 doubles as the erase-busy flag
pub const REG_CMD_ATTR: u8 = 0x60;
/// Erase type plus write-enable, written to [`REG_CMD_ATTR`] to arm an erase
pub const CMD_ATTR_ERASE: u8 = 0xB8;
/// Erase-in-progress bit in [`REG_CMD_ATTR`]
pub const CMD_ERASE_BUSY: u8 = 0x01;

/// SPI opcode used for the next erase operation
pub const REG_ERASE_OPCODE: u8 = 0x61;
/// 4 KiB sector erase
pub const ERASE_OPCODE_SECTOR: u8 = 0x20;
/// 64 KiB block erase
pub const ERASE_OPCODE_BLOCK: u8 = 0xD8;

/// High byte of the 24-bit operation address
pub const REG_CMD_ADDR_HI: u8 = 0x64;
/// Middle byte of the 24-bit operation address
pub const REG_CMD_ADDR_MID: u8 = 0x65;
/// Low byte of the 24-bit operation address
pub const REG_CMD_ADDR_LO: u8 = 0x66;

/// SPI opcode used for flash reads
pub const REG_READ_OPCODE: u8 = 0x6A;
/// Standard SPI READ opcode
pub const FLASH_OPCODE_READ: u8 = 0x03;

/// SPI opcode used for flash writes
pub const REG_WRITE_OPCODE: u8 = 0x6D;
/// Standard SPI page-program opcode
pub const FLASH_OPCODE_PAGE_PROGRAM: u8 = 0x02;

/// MCU mode and write-status register
pub const REG_MCU_MODE: u8 = 0x6F;
/// MCU is in ISP mode (flash reachable through this register interface)
pub const MCU_MODE_ISP: u8 = 1 << 7;
/// A page program is in flight
pub const MCU_MODE_WRITE_BUSY: u8 = 1 << 5;
/// The page buffer has not yet drained
pub const MCU_MODE_WRITE_BUF: u8 = 1 << 4;

/// Page data sink; bursts into this register fill the write buffer
pub const REG_WRITE_FIFO: u8 = 0x70;
/// Number of bytes in the next page program, minus one (0xFF = 256)
pub const REG_WRITE_LEN: u8 = 0x71;

/// Reset control; setting bit 1 asks the MCU to reset itself
pub const REG_RESET_CTRL: u8 = 0xEE;
/// Reset request bit in [`REG_RESET_CTRL`]
pub const RESET_CTRL_RESET: u8 = 1 << 1;

/// Low byte of the indirect address window
pub const REG_INDIRECT_LO: u8 = 0xF4;
/// High byte of the indirect address window; also the data port
pub const REG_INDIRECT_HI: u8 = 0xF5;
/// Magic prefix that opens the indirect window for a new address
const INDIRECT_ENTER: u8 = 0x9F;

// Indirect registers

/// GPIO pin 88 configuration
pub const GPIO88_CONFIG_ADDR: u16 = 0x104F;
/// GPIO pin 88 output value (bit 0)
pub const GPIO88_VALUE_ADDR: u16 = 0xFE3F;
/// MCU clock control
pub const MCU_CLOCK_CTRL_ADDR: u16 = 0x06A0;
/// Value accelerating the MCU clock for ISP operation
pub const MCU_CLOCK_ACCEL: u8 = 0x74;

/// Sleep between reads while polling a register
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Write a single direct register
pub fn write_reg<B: RegisterBus + ?Sized>(bus: &mut B, reg: u8, value: u8) -> Result<()> {
    log::trace!("reg[{reg:#04x}] <- {value:#04x}");
    bus.write(&[reg, value])
}

/// Write a burst of data into a direct register in one transaction
///
/// Used to load the page write FIFO without per-byte transaction
/// overhead.
pub fn write_reg_burst<B: RegisterBus + ?Sized>(bus: &mut B, reg: u8, data: &[u8]) -> Result<()> {
    let mut tx = Vec::with_capacity(data.len() + 1);
    tx.push(reg);
    tx.extend_from_slice(data);
    bus.write(&tx)
}

/// Read a single direct register
pub fn read_reg<B: RegisterBus + ?Sized>(bus: &mut B, reg: u8) -> Result<u8> {
    let mut value = [0u8];
    bus.write_then_read(&[reg], &mut value)?;
    Ok(value[0])
}

/// Point the indirect window at a 16-bit register address
pub fn set_indirect<B: RegisterBus + ?Sized>(bus: &mut B, address: u16) -> Result<()> {
    write_reg(bus, REG_INDIRECT_LO, INDIRECT_ENTER)?;
    write_reg(bus, REG_INDIRECT_HI, (address >> 8) as u8)?;
    write_reg(bus, REG_INDIRECT_LO, (address & 0xFF) as u8)
}

/// Read a register in the indirect 16-bit address space
pub fn read_reg_indirect<B: RegisterBus + ?Sized>(bus: &mut B, address: u16) -> Result<u8> {
    set_indirect(bus, address)?;
    read_reg(bus, REG_INDIRECT_HI)
}

/// Write a register in the indirect 16-bit address space
pub fn write_reg_indirect<B: RegisterBus + ?Sized>(
    bus: &mut B,
    address: u16,
    value: u8,
) -> Result<()> {
    set_indirect(bus, address)?;
    write_reg(bus, REG_INDIRECT_HI, value)
}

/// Poll a direct register until `(value & mask) == expected`
///
/// The deadline is absolute on the monotonic clock, computed once on
/// entry; reads are spaced 1 ms apart. On expiry the error carries the
/// register, mask, expected value, last observed value and the timeout,
/// plus `what` describing the operation being awaited.
pub fn poll_reg<B: RegisterBus + ?Sized>(
    bus: &mut B,
    what: &str,
    reg: u8,
    mask: u8,
    expected: u8,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let value = read_reg(bus, reg)?;
        if value & mask == expected {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                what: what.to_string(),
                reg,
                mask,
                expected,
                last: value,
                timeout,
            });
        }
        bus.sleep(POLL_INTERVAL);
    }
}
