//! Dual-bank state inquiry over DDC/CI
//!
//! The running firmware answers an in-band vendor query describing its
//! dual-bank configuration: whether the feature is on, which bank is
//! active, and the version pair of each user bank. The query rides the
//! same I2C transport as the register interface but uses the DDC/CI
//! command opcodes.

use std::fmt;
use std::time::Duration;

use crate::bus::RegisterBus;
use crate::error::Result;
use crate::regs::write_reg;

/// DDC/CI control register; writing [`DDCCI_ENTER`] switches modes
const REG_DDCCI_CONTROL: u8 = 0xCA;
/// Value entering DDC/CI mode
const DDCCI_ENTER: u8 = 0x09;
/// Opcode requesting the dual-bank state
const DDCCI_OPCODE_DUAL_BANK: u8 = 0x01;
/// Settle time after switching to DDC/CI mode
const DDCCI_SETTLE: Duration = Duration::from_millis(200);
/// Fixed length of the dual-bank response
const DUAL_BANK_RESPONSE_LEN: usize = 11;

/// Firmware layout mode reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualBankMode {
    /// Single user image, no banking
    UserOnly,
    /// Two user banks, boot loader picks the flagged one
    Diff,
    /// Second bank is a copy of the first
    Copy,
    /// Single user image selected by flag
    UserOnlyFlag,
}

impl DualBankMode {
    fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(DualBankMode::UserOnly),
            1 => Some(DualBankMode::Diff),
            2 => Some(DualBankMode::Copy),
            3 => Some(DualBankMode::UserOnlyFlag),
            _ => None,
        }
    }
}

/// Which flash bank the MCU is currently executing from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashBank {
    /// The boot bank
    Boot,
    /// First user bank
    User1,
    /// Second user bank
    User2,
}

impl FlashBank {
    fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(FlashBank::Boot),
            1 => Some(FlashBank::User1),
            2 => Some(FlashBank::User2),
            _ => None,
        }
    }
}

impl fmt::Display for FlashBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashBank::Boot => write!(f, "boot"),
            FlashBank::User1 => write!(f, "user1"),
            FlashBank::User2 => write!(f, "user2"),
        }
    }
}

/// Decoded dual-bank state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualBankStatus {
    /// Dual-bank support is present and coherent
    pub enabled: bool,
    /// Layout mode; `None` when disabled
    pub mode: Option<DualBankMode>,
    /// Currently active bank; `None` when disabled
    pub active_bank: Option<FlashBank>,
    /// (major, minor) of the first user bank
    pub user1_version: (u8, u8),
    /// (major, minor) of the second user bank
    pub user2_version: (u8, u8),
}

impl DualBankStatus {
    const DISABLED: DualBankStatus = DualBankStatus {
        enabled: false,
        mode: None,
        active_bank: None,
        user1_version: (0, 0),
        user2_version: (0, 0),
    };

    /// Decode the fixed-layout response
    ///
    /// A response that does not echo the DDC/CI header is taken to be
    /// old firmware without dual-bank support; out-of-range mode or bank
    /// values likewise degrade to "disabled" rather than failing, so the
    /// device ends up reported as non-updatable instead of broken.
    pub fn decode(response: &[u8; DUAL_BANK_RESPONSE_LEN]) -> DualBankStatus {
        if response[0] != REG_DDCCI_CONTROL || response[1] != DDCCI_ENTER {
            log::debug!(
                "unexpected dual-bank response header {:02x} {:02x}; assuming older firmware",
                response[0],
                response[1]
            );
            return Self::DISABLED;
        }
        if response[2] != 1 {
            return Self::DISABLED;
        }
        let mode = match DualBankMode::from_raw(response[3]) {
            Some(mode) => mode,
            None => {
                log::warn!("unexpected dual-bank mode {:#04x}", response[3]);
                return Self::DISABLED;
            }
        };
        let active_bank = match FlashBank::from_raw(response[4]) {
            Some(bank) => bank,
            None => {
                log::warn!("unexpected active flash bank {:#04x}", response[4]);
                return Self::DISABLED;
            }
        };
        DualBankStatus {
            enabled: true,
            mode: Some(mode),
            active_bank: Some(active_bank),
            user1_version: (response[5], response[6]),
            user2_version: (response[7], response[8]),
        }
    }
}

/// Query the dual-bank state of the running firmware
///
/// Switches the device into DDC/CI mode, waits for it to settle, then
/// issues the vendor dual-bank inquiry and decodes the 11-byte answer.
/// Only transport failures are errors; a nonsensical answer decodes as
/// disabled.
pub fn query<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<DualBankStatus> {
    write_reg(bus, REG_DDCCI_CONTROL, DDCCI_ENTER)?;
    bus.sleep(DDCCI_SETTLE);

    bus.write(&[DDCCI_OPCODE_DUAL_BANK])?;
    let mut response = [0u8; DUAL_BANK_RESPONSE_LEN];
    bus.read(&mut response)?;

    Ok(DualBankStatus::decode(&response))
}
