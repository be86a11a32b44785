//! Flash programming primitives
//!
//! With the MCU in ISP mode, the external SPI flash is driven through a
//! small register machine: a 24-bit address, an opcode register per
//! operation class, and a busy flag to poll. Each primitive here lowers
//! to that register script plus the poll.
//!
//! All operations assume the session is already in ISP mode and that the
//! external write-protect has been overridden (see [`crate::wp`]); the
//! lifecycle code in [`crate::device`] enforces both.

use std::time::Duration;

use crate::bus::RegisterBus;
use crate::error::Result;
use crate::progress::UpdateProgress;
use crate::regs::{
    poll_reg, write_reg, write_reg_burst, CMD_ATTR_ERASE, CMD_ERASE_BUSY, ERASE_OPCODE_BLOCK,
    ERASE_OPCODE_SECTOR, FLASH_OPCODE_PAGE_PROGRAM, FLASH_OPCODE_READ, MCU_MODE_ISP,
    MCU_MODE_WRITE_BUF, MCU_MODE_WRITE_BUSY, REG_CMD_ADDR_HI, REG_CMD_ADDR_LO, REG_CMD_ADDR_MID,
    REG_CMD_ATTR, REG_ERASE_OPCODE, REG_MCU_MODE, REG_READ_OPCODE, REG_WRITE_FIFO, REG_WRITE_LEN,
    REG_WRITE_OPCODE,
};

/// Total flash size (1 MiB)
pub const FLASH_SIZE: u32 = 0x10_0000;
/// Base address of the first user bank image
pub const FLASH_USER1_ADDR: u32 = 0x1_0000;
/// Base address of the second user bank image
pub const FLASH_USER2_ADDR: u32 = 0x8_0000;
/// Size of one user bank image
pub const FLASH_USER_SIZE: u32 = 0x7_0000;
/// Activation flag record for the first user bank
pub const FLASH_FLAG1_ADDR: u32 = 0xF_E304;
/// Activation flag record for the second user bank
pub const FLASH_FLAG2_ADDR: u32 = 0xF_F304;

/// Erase granularity of a sector erase
pub const SECTOR_SIZE: u32 = 0x1000;
/// Erase granularity of a block erase
pub const BLOCK_SIZE: u32 = 0x1_0000;
/// Largest single page program
pub const PAGE_SIZE: usize = 256;

/// Bytes per read transaction
const READ_CHUNK: usize = 256;

/// Deadline for erase completion
const ERASE_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for write-buffer drain and page-program completion
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Load the 24-bit operation address
fn set_command_address<B: RegisterBus + ?Sized>(bus: &mut B, address: u32) -> Result<()> {
    write_reg(bus, REG_CMD_ADDR_HI, (address >> 16) as u8)?;
    write_reg(bus, REG_CMD_ADDR_MID, (address >> 8) as u8)?;
    write_reg(bus, REG_CMD_ADDR_LO, address as u8)
}

/// Read flash contents into `buf`, starting at `address`
///
/// The first byte clocked out of a read transaction is unpredictable, so
/// the script starts one byte early (wrapping modulo 2^24) and discards
/// one byte before streaming real data.
pub fn read<B: RegisterBus + ?Sized, P: UpdateProgress>(
    bus: &mut B,
    address: u32,
    buf: &mut [u8],
    progress: &mut P,
) -> Result<()> {
    assert!(address < FLASH_SIZE, "read address out of range");
    assert!(buf.len() <= FLASH_SIZE as usize, "read larger than flash");

    set_command_address(bus, address.wrapping_sub(1) & 0xFF_FFFF)?;
    write_reg(bus, REG_READ_OPCODE, FLASH_OPCODE_READ)?;

    // point at the data port and throw away the leading byte
    bus.write(&[REG_WRITE_FIFO])?;
    let mut discard = [0u8];
    bus.read(&mut discard)?;

    let total = buf.len();
    let mut done = 0;
    for chunk in buf.chunks_mut(READ_CHUNK) {
        bus.read(chunk)?;
        done += chunk.len();
        progress.set_progress(done, total);
    }
    Ok(())
}

/// Erase the 4 KiB sector at `address`
pub fn erase_sector<B: RegisterBus + ?Sized>(bus: &mut B, address: u32) -> Result<()> {
    assert_eq!(
        address & (SECTOR_SIZE - 1),
        0,
        "sector erase address must be 4 KiB aligned"
    );
    log::debug!("erasing sector at {address:#08x}");

    set_command_address(bus, address)?;
    write_reg(bus, REG_CMD_ATTR, CMD_ATTR_ERASE)?;
    write_reg(bus, REG_ERASE_OPCODE, ERASE_OPCODE_SECTOR)?;
    write_reg(bus, REG_CMD_ATTR, CMD_ATTR_ERASE | CMD_ERASE_BUSY)?;
    poll_reg(
        bus,
        "sector erase",
        REG_CMD_ATTR,
        CMD_ERASE_BUSY,
        0,
        ERASE_TIMEOUT,
    )
}

/// Erase the 64 KiB block at `address`
///
/// The chip selects the block from the high address byte alone; the mid
/// and low bytes are written as zero.
pub fn erase_block<B: RegisterBus + ?Sized>(bus: &mut B, address: u32) -> Result<()> {
    assert_eq!(
        address & (BLOCK_SIZE - 1),
        0,
        "block erase address must be 64 KiB aligned"
    );
    log::debug!("erasing block at {address:#08x}");

    write_reg(bus, REG_CMD_ADDR_HI, (address >> 16) as u8)?;
    write_reg(bus, REG_CMD_ADDR_MID, 0)?;
    write_reg(bus, REG_CMD_ADDR_LO, 0)?;
    write_reg(bus, REG_CMD_ATTR, CMD_ATTR_ERASE)?;
    write_reg(bus, REG_ERASE_OPCODE, ERASE_OPCODE_BLOCK)?;
    write_reg(bus, REG_CMD_ATTR, CMD_ATTR_ERASE | CMD_ERASE_BUSY)?;
    poll_reg(
        bus,
        "block erase",
        REG_CMD_ATTR,
        CMD_ERASE_BUSY,
        0,
        ERASE_TIMEOUT,
    )
}

/// Program `data` at `address` in pages of up to 256 bytes
///
/// The target region must already be erased. Each page waits for the
/// previous buffer to drain, loads the FIFO in one burst, starts the
/// program and polls for completion.
pub fn write<B: RegisterBus + ?Sized, P: UpdateProgress>(
    bus: &mut B,
    address: u32,
    data: &[u8],
    progress: &mut P,
) -> Result<()> {
    assert!(
        address as usize + data.len() <= FLASH_SIZE as usize,
        "write out of range"
    );

    let total = data.len();
    let mut addr = address;
    let mut done = 0;
    for chunk in data.chunks(PAGE_SIZE) {
        write_reg(bus, REG_WRITE_OPCODE, FLASH_OPCODE_PAGE_PROGRAM)?;
        write_reg(bus, REG_WRITE_LEN, (chunk.len() - 1) as u8)?;
        set_command_address(bus, addr)?;

        poll_reg(
            bus,
            "write buffer drain",
            REG_MCU_MODE,
            MCU_MODE_WRITE_BUF,
            0,
            WRITE_TIMEOUT,
        )?;
        write_reg_burst(bus, REG_WRITE_FIFO, chunk)?;
        write_reg(bus, REG_MCU_MODE, MCU_MODE_ISP | MCU_MODE_WRITE_BUSY)?;
        poll_reg(
            bus,
            &format!("page program at {addr:#08x}"),
            REG_MCU_MODE,
            MCU_MODE_WRITE_BUSY,
            0,
            WRITE_TIMEOUT,
        )?;

        addr += chunk.len() as u32;
        done += chunk.len();
        progress.set_progress(done, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChip;
    use crate::progress::NoProgress;

    #[test]
    fn read_issues_one_discard_and_chunked_data_reads() {
        let mut chip = MockChip::new();
        chip.flash[0x1000..0x1000 + 600]
            .iter_mut()
            .enumerate()
            .for_each(|(i, b)| *b = i as u8);

        let mut buf = vec![0u8; 600];
        read(&mut chip, 0x1000, &mut buf, &mut NoProgress).unwrap();

        // one discarded byte, then ceil(600 / 256) data transactions
        assert_eq!(chip.data_reads, vec![1, 256, 256, 88]);
        assert_eq!(buf[0], 0);
        assert_eq!(buf[599], (599 % 256) as u8);
        assert_eq!(buf, chip.flash[0x1000..0x1258].to_vec());
    }

    #[test]
    fn read_at_address_zero_wraps_the_discard_address() {
        let mut chip = MockChip::new();
        chip.flash[0] = 0x42;
        chip.flash[1] = 0x43;

        let mut buf = [0u8; 2];
        read(&mut chip, 0, &mut buf, &mut NoProgress).unwrap();

        assert_eq!(
            &chip.transactions[..4],
            &[
                vec![REG_CMD_ADDR_HI, 0xFF],
                vec![REG_CMD_ADDR_MID, 0xFF],
                vec![REG_CMD_ADDR_LO, 0xFF],
                vec![REG_READ_OPCODE, 0x03],
            ]
        );
        assert_eq!(buf, [0x42, 0x43]);
    }

    #[test]
    fn sector_erase_scripts_address_before_opcode_and_start() {
        let mut chip = MockChip::new();
        chip.flash[0x3000..0x4000].fill(0x55);

        erase_sector(&mut chip, 0x3000).unwrap();

        assert_eq!(
            &chip.transactions[..6],
            &[
                vec![REG_CMD_ADDR_HI, 0x00],
                vec![REG_CMD_ADDR_MID, 0x30],
                vec![REG_CMD_ADDR_LO, 0x00],
                vec![REG_CMD_ATTR, 0xB8],
                vec![REG_ERASE_OPCODE, 0x20],
                vec![REG_CMD_ATTR, 0xB9],
            ]
        );
        assert_eq!(chip.erases, vec![(0x3000, SECTOR_SIZE)]);
        assert!(chip.flash[0x3000..0x4000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn block_erase_zeroes_mid_and_low_address_bytes() {
        let mut chip = MockChip::new();
        chip.flash[0x80000..0x90000].fill(0x55);

        erase_block(&mut chip, 0x80000).unwrap();

        assert_eq!(
            &chip.transactions[..6],
            &[
                vec![REG_CMD_ADDR_HI, 0x08],
                vec![REG_CMD_ADDR_MID, 0x00],
                vec![REG_CMD_ADDR_LO, 0x00],
                vec![REG_CMD_ATTR, 0xB8],
                vec![REG_ERASE_OPCODE, 0xD8],
                vec![REG_CMD_ATTR, 0xB9],
            ]
        );
        assert_eq!(chip.erases, vec![(0x80000, BLOCK_SIZE)]);
        assert!(chip.flash[0x80000..0x90000].iter().all(|&b| b == 0xFF));
    }

    #[test]
    #[should_panic(expected = "sector erase address must be 4 KiB aligned")]
    fn sector_erase_rejects_unaligned_address() {
        let mut chip = MockChip::new();
        let _ = erase_sector(&mut chip, 0x3001);
    }

    #[test]
    #[should_panic(expected = "block erase address must be 64 KiB aligned")]
    fn block_erase_rejects_unaligned_address() {
        let mut chip = MockChip::new();
        let _ = erase_block(&mut chip, 0x8_1000);
    }

    #[test]
    fn full_page_write_programs_write_len_0xff_once() {
        let mut chip = MockChip::new();
        let data = vec![0xA5u8; 256];

        write(&mut chip, 0x10000, &data, &mut NoProgress).unwrap();

        // opcode, length and address are all loaded before the start bit
        assert_eq!(
            &chip.transactions[..5],
            &[
                vec![REG_WRITE_OPCODE, 0x02],
                vec![REG_WRITE_LEN, 0xFF],
                vec![REG_CMD_ADDR_HI, 0x01],
                vec![REG_CMD_ADDR_MID, 0x00],
                vec![REG_CMD_ADDR_LO, 0x00],
            ]
        );

        let len_writes: Vec<_> = chip
            .transactions
            .iter()
            .filter(|t| t.len() == 2 && t[0] == REG_WRITE_LEN)
            .collect();
        assert_eq!(len_writes, vec![&vec![REG_WRITE_LEN, 0xFF]]);
        assert_eq!(chip.page_writes, vec![(0x10000, 256)]);
        assert_eq!(chip.flash[0x10000..0x10100].to_vec(), data);
    }

    #[test]
    fn single_byte_write_programs_write_len_zero() {
        let mut chip = MockChip::new();

        write(&mut chip, 0x10000, &[0x5A], &mut NoProgress).unwrap();

        assert!(chip
            .transactions
            .contains(&vec![REG_WRITE_LEN, 0x00]));
        // FIFO burst carries the register address plus one data byte
        assert!(chip.transactions.contains(&vec![REG_WRITE_FIFO, 0x5A]));
        assert_eq!(chip.page_writes, vec![(0x10000, 1)]);
        assert_eq!(chip.flash[0x10000], 0x5A);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut chip = MockChip::new();
        let data: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();

        write(&mut chip, 0x20000, &data, &mut NoProgress).unwrap();
        let mut readback = vec![0u8; data.len()];
        read(&mut chip, 0x20000, &mut readback, &mut NoProgress).unwrap();

        assert_eq!(readback, data);
    }
}
