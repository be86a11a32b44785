//! Register-level mock of the RTD2142 for tests
//!
//! Simulates the chip far enough to run every operation in this crate
//! end to end: the direct register file, the indirect window, the flash
//! command machine (erase, page program, streamed read) over a 1 MiB
//! simulated flash, and the DDC/CI dual-bank inquiry. Busy flags stay
//! set for a couple of polls so the poll loops are actually exercised.
//!
//! Every transaction is recorded so tests can assert the exact register
//! scripts, and a few knobs inject the failure modes the update flow has
//! to survive.

use std::collections::HashMap;
use std::time::Duration;

use crate::bus::RegisterBus;
use crate::error::{Error, Result};
use crate::flash::{BLOCK_SIZE, FLASH_SIZE, SECTOR_SIZE};
use crate::regs::{
    CMD_ERASE_BUSY, ERASE_OPCODE_BLOCK, ERASE_OPCODE_SECTOR, FLASH_OPCODE_PAGE_PROGRAM,
    FLASH_OPCODE_READ, MCU_MODE_ISP, MCU_MODE_WRITE_BUSY, REG_CMD_ADDR_HI, REG_CMD_ADDR_LO,
    REG_CMD_ADDR_MID, REG_CMD_ATTR, REG_ERASE_OPCODE, REG_INDIRECT_HI, REG_INDIRECT_LO,
    REG_MCU_MODE, REG_READ_OPCODE, REG_RESET_CTRL, REG_WRITE_FIFO, REG_WRITE_LEN,
    REG_WRITE_OPCODE, RESET_CTRL_RESET,
};

/// Where the next read transaction takes its data from
#[derive(Debug, Clone, Copy)]
enum ReadSource {
    /// No pointer set yet
    None,
    /// A direct register, set by a one-byte pointer write
    Register(u8),
    /// The flash read stream
    Flash,
    /// The queued dual-bank response
    Ddcci,
}

/// Indirect window addressing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndirectState {
    Idle,
    ExpectHi,
    ExpectLo,
    Addressed,
}

/// Simulated RTD2142 behind the register bus
pub struct MockChip {
    /// Simulated 1 MiB SPI flash
    pub flash: Vec<u8>,
    /// Direct register file
    regs: [u8; 256],
    /// Indirect 16-bit register space
    indirect: HashMap<u16, u8>,
    indirect_state: IndirectState,
    indirect_hi: u8,
    indirect_addr: u16,

    read_source: ReadSource,
    cmd_addr: u32,
    stream_addr: u32,
    erase_opcode: u8,
    read_opcode: u8,
    write_opcode: u8,
    write_len: u8,
    fifo: Vec<u8>,
    ddcci: bool,

    /// MCU is in ISP mode
    pub isp: bool,
    /// Reads of the erase-busy flag left before it clears
    pub erase_busy_polls: u8,
    /// Reads of the write-busy flag left before it clears
    pub write_busy_polls: u8,

    /// Response served for the dual-bank inquiry
    pub dual_bank_response: Vec<u8>,
    /// Serve corrupted data from the flash read stream
    pub corrupt_reads: bool,
    /// Keep the ISP bit set even after a reset request
    pub stuck_in_isp: bool,
    /// NACK writes to the reset control register
    pub nack_reset: bool,

    /// Every write transaction, verbatim
    pub transactions: Vec<Vec<u8>>,
    /// Completed erases as (address, size)
    pub erases: Vec<(u32, u32)>,
    /// Completed page programs as (address, length)
    pub page_writes: Vec<(u32, usize)>,
    /// Lengths of flash-stream read transactions, discard byte included
    pub data_reads: Vec<usize>,
    /// Requested settle delays
    pub sleeps: Vec<Duration>,
}

impl MockChip {
    pub fn new() -> Self {
        MockChip {
            flash: vec![0xFF; FLASH_SIZE as usize],
            regs: [0; 256],
            indirect: HashMap::new(),
            indirect_state: IndirectState::Idle,
            indirect_hi: 0,
            indirect_addr: 0,
            read_source: ReadSource::None,
            cmd_addr: 0,
            stream_addr: 0,
            erase_opcode: 0,
            read_opcode: 0,
            write_opcode: 0,
            write_len: 0,
            fifo: Vec::new(),
            ddcci: false,
            isp: false,
            erase_busy_polls: 0,
            write_busy_polls: 0,
            dual_bank_response: vec![0; 11],
            corrupt_reads: false,
            stuck_in_isp: false,
            nack_reset: false,
            transactions: Vec::new(),
            erases: Vec::new(),
            page_writes: Vec::new(),
            data_reads: Vec::new(),
            sleeps: Vec::new(),
        }
    }

    /// Seed a cell of the indirect register space
    pub fn set_indirect_mem(&mut self, address: u16, value: u8) {
        self.indirect.insert(address, value);
    }

    /// Current value of a cell of the indirect register space
    pub fn indirect_mem(&self, address: u16) -> u8 {
        self.indirect.get(&address).copied().unwrap_or(0)
    }

    fn set_pointer(&mut self, reg: u8) {
        if reg == REG_WRITE_FIFO && self.read_opcode == FLASH_OPCODE_READ {
            // data port armed for a flash read: latch the stream address
            self.stream_addr = self.cmd_addr;
            self.read_source = ReadSource::Flash;
        } else if self.ddcci && reg == 0x01 {
            self.read_source = ReadSource::Ddcci;
        } else {
            self.read_source = ReadSource::Register(reg);
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        match reg {
            REG_INDIRECT_LO => {
                if value == 0x9F {
                    self.indirect_state = IndirectState::ExpectHi;
                } else if self.indirect_state == IndirectState::ExpectLo {
                    self.indirect_addr = ((self.indirect_hi as u16) << 8) | value as u16;
                    self.indirect_state = IndirectState::Addressed;
                }
            }
            REG_INDIRECT_HI => match self.indirect_state {
                IndirectState::ExpectHi => {
                    self.indirect_hi = value;
                    self.indirect_state = IndirectState::ExpectLo;
                }
                IndirectState::Addressed => {
                    self.indirect.insert(self.indirect_addr, value);
                }
                _ => {}
            },
            REG_CMD_ADDR_HI => {
                self.cmd_addr = (self.cmd_addr & 0x00_FFFF) | ((value as u32) << 16)
            }
            REG_CMD_ADDR_MID => {
                self.cmd_addr = (self.cmd_addr & 0xFF_00FF) | ((value as u32) << 8)
            }
            REG_CMD_ADDR_LO => self.cmd_addr = (self.cmd_addr & 0xFF_FF00) | value as u32,
            REG_ERASE_OPCODE => self.erase_opcode = value,
            REG_READ_OPCODE => self.read_opcode = value,
            REG_WRITE_OPCODE => self.write_opcode = value,
            REG_WRITE_LEN => self.write_len = value,
            REG_CMD_ATTR => {
                self.regs[reg as usize] = value;
                if value & CMD_ERASE_BUSY != 0 {
                    self.run_erase();
                }
            }
            REG_MCU_MODE => {
                if value & MCU_MODE_ISP != 0 {
                    self.isp = true;
                }
                if value & MCU_MODE_WRITE_BUSY != 0 {
                    self.run_page_program();
                }
            }
            REG_RESET_CTRL => {
                self.regs[reg as usize] = value;
                if value & RESET_CTRL_RESET != 0 && !self.stuck_in_isp {
                    self.isp = false;
                }
                if self.nack_reset {
                    // the MCU drops off the bus while resetting
                    return Err(Error::Io(std::io::Error::other("peripheral NACKed")));
                }
            }
            // DDC/CI mode switch
            0xCA => {
                self.regs[reg as usize] = value;
                if value == 0x09 {
                    self.ddcci = true;
                }
            }
            _ => self.regs[reg as usize] = value,
        }
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> u8 {
        match reg {
            REG_CMD_ATTR => {
                let base = self.regs[reg as usize] & !CMD_ERASE_BUSY;
                if self.erase_busy_polls > 0 {
                    self.erase_busy_polls -= 1;
                    base | CMD_ERASE_BUSY
                } else {
                    base
                }
            }
            REG_MCU_MODE => {
                let mut value = 0;
                if self.isp {
                    value |= MCU_MODE_ISP;
                }
                if self.write_busy_polls > 0 {
                    self.write_busy_polls -= 1;
                    value |= MCU_MODE_WRITE_BUSY;
                }
                value
            }
            REG_INDIRECT_HI if self.indirect_state == IndirectState::Addressed => {
                self.indirect_mem(self.indirect_addr)
            }
            _ => self.regs[reg as usize],
        }
    }

    fn run_erase(&mut self) {
        let (base, size) = match self.erase_opcode {
            ERASE_OPCODE_SECTOR => {
                assert_eq!(
                    self.cmd_addr & (SECTOR_SIZE - 1),
                    0,
                    "unaligned sector erase at {:#08x}",
                    self.cmd_addr
                );
                (self.cmd_addr, SECTOR_SIZE)
            }
            ERASE_OPCODE_BLOCK => {
                assert_eq!(
                    self.cmd_addr & 0xFFFF,
                    0,
                    "block erase with nonzero mid/low address bytes"
                );
                (self.cmd_addr & 0xFF_0000, BLOCK_SIZE)
            }
            other => panic!("erase started with unknown opcode {other:#04x}"),
        };
        let start = base as usize;
        self.flash[start..start + size as usize].fill(0xFF);
        self.erases.push((base, size));
        self.erase_busy_polls = 2;
    }

    fn run_page_program(&mut self) {
        assert_eq!(
            self.write_opcode, FLASH_OPCODE_PAGE_PROGRAM,
            "page program started with unexpected write opcode"
        );
        let len = self.write_len as usize + 1;
        let fifo = std::mem::take(&mut self.fifo);
        assert_eq!(fifo.len(), len, "FIFO fill does not match WRITE_LEN");

        let start = self.cmd_addr as usize;
        for (i, byte) in fifo.into_iter().enumerate() {
            // programming can only clear bits
            self.flash[start + i] &= byte;
        }
        self.page_writes.push((self.cmd_addr, len));
        self.write_busy_polls = 1;
    }
}

impl Default for MockChip {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for MockChip {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.transactions.push(data.to_vec());
        match data {
            [] => Err(Error::Internal("empty write transaction".to_string())),
            [reg] => {
                self.set_pointer(*reg);
                Ok(())
            }
            [reg, rest @ ..] if *reg == REG_WRITE_FIFO => {
                self.fifo.extend_from_slice(rest);
                Ok(())
            }
            [reg, value] => self.write_register(*reg, *value),
            [reg, ..] => panic!("burst write to unexpected register {reg:#04x}"),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.read_source {
            ReadSource::None => panic!("read with no pointer set"),
            ReadSource::Register(reg) => {
                for byte in buf.iter_mut() {
                    *byte = self.read_register(reg);
                }
            }
            ReadSource::Flash => {
                for byte in buf.iter_mut() {
                    *byte = self.flash[self.stream_addr as usize % self.flash.len()];
                    if self.corrupt_reads {
                        *byte = !*byte;
                    }
                    self.stream_addr = (self.stream_addr + 1) & 0xFF_FFFF;
                }
                self.data_reads.push(buf.len());
            }
            ReadSource::Ddcci => {
                assert!(
                    buf.len() <= self.dual_bank_response.len(),
                    "dual-bank read longer than the queued response"
                );
                buf.copy_from_slice(&self.dual_bank_response[..buf.len()]);
                self.read_source = ReadSource::None;
            }
        }
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        // never actually block the test suite
        self.sleeps.push(duration);
    }
}
