//! Device session and update lifecycle
//!
//! A [`MstDevice`] owns the bus to one RTD2142 and tracks the session
//! state the enclosing updater cares about: which bank is running, the
//! published version string, and the device flags. The lifecycle mirrors
//! what a firmware-update daemon drives: `open` then `setup`, `detach`
//! into ISP mode, `write_firmware`, `attach` back out, `reload`.

use std::time::Duration;

use bitflags::bitflags;

use crate::bus::RegisterBus;
use crate::dualbank::{self, DualBankMode, DualBankStatus, FlashBank};
use crate::error::{Error, Result};
use crate::flash::{
    self, BLOCK_SIZE, FLASH_FLAG1_ADDR, FLASH_FLAG2_ADDR, FLASH_SIZE, FLASH_USER1_ADDR,
    FLASH_USER2_ADDR, FLASH_USER_SIZE, SECTOR_SIZE,
};
use crate::progress::{Status, UpdateProgress};
use crate::regs::{
    poll_reg, read_reg, write_reg, write_reg_indirect, MCU_CLOCK_ACCEL, MCU_CLOCK_CTRL_ADDR,
    MCU_MODE_ISP, REG_MCU_MODE, REG_RESET_CTRL, RESET_CTRL_RESET,
};
use crate::wp;

/// The only chip this crate drives
pub const SUPPORTED_CHIP: &str = "RTD2142";
/// Update protocol identifier
pub const PROTOCOL_ID: &str = "com.realtek.rtd2142";
/// Device vendor
pub const VENDOR: &str = "Realtek";
/// One-line device description
pub const SUMMARY: &str = "DisplayPort MST hub";

/// Quirk key naming the DP-AUX device the hub sits behind
pub const QUIRK_DP_AUX_NAME: &str = "RealtekMstDpAuxName";

/// Activation record planted in the target bank's flag slot
///
/// The boot loader rewrites the record on the next boot; all the updater
/// has to do is make the slot non-virgin. This literal is the observed
/// working value.
const FLAG_RECORD: [u8; 5] = [0xAA, 0xAA, 0xAA, 0xFF, 0xFF];

/// Deadline for the MCU to acknowledge ISP mode
const ISP_ENTRY_TIMEOUT: Duration = Duration::from_secs(60);
/// Settle time after requesting an MCU reset
const RESET_SETTLE: Duration = Duration::from_secs(1);

bitflags! {
    /// Device state flags exposed to the enclosing updater
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceFlags: u32 {
        /// The device can currently accept an update
        const UPDATABLE        = 1 << 0;
        /// The device is an internal component, not removable
        const INTERNAL         = 1 << 1;
        /// Two firmware images coexist (A/B update scheme)
        const DUAL_IMAGE       = 1 << 2;
        /// Written images are verified by reading back
        const CAN_VERIFY_IMAGE = 1 << 3;
        /// The MCU is detached into ISP mode
        const IS_BOOTLOADER    = 1 << 4;
        /// The device needs a power cycle to recover
        const NEEDS_SHUTDOWN   = 1 << 5;
    }
}

/// Configuration handed down from the updater's quirk database
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    name: Option<String>,
    dp_aux_name: Option<String>,
}

impl DeviceConfig {
    /// Create a configuration for the named device
    pub fn new(name: impl Into<String>) -> Self {
        DeviceConfig {
            name: Some(name.into()),
            dp_aux_name: None,
        }
    }

    /// Apply one quirk key-value pair
    ///
    /// Only [`QUIRK_DP_AUX_NAME`] is recognized; anything else is a
    /// configuration error.
    pub fn set_quirk(&mut self, key: &str, value: &str) -> Result<()> {
        if key == QUIRK_DP_AUX_NAME {
            self.dp_aux_name = Some(value.to_string());
            Ok(())
        } else {
            Err(Error::NotSupported(format!("unsupported quirk key: {key}")))
        }
    }

    /// The configured DP-AUX device name, if any
    pub fn dp_aux_name(&self) -> Option<&str> {
        self.dp_aux_name.as_deref()
    }
}

/// Validate a configuration before opening the bus
///
/// Returns the DP-AUX name to resolve into an I2C bus. Fails unless the
/// configuration names an RTD2142 and carries the AUX name quirk.
pub fn probe(config: &DeviceConfig) -> Result<&str> {
    match config.name.as_deref() {
        Some(SUPPORTED_CHIP) => {}
        Some(other) => {
            return Err(Error::NotSupported(format!(
                "only {SUPPORTED_CHIP} is supported, not {other}"
            )))
        }
        None => {
            return Err(Error::NotSupported(format!(
                "only {SUPPORTED_CHIP} is supported"
            )))
        }
    }
    config
        .dp_aux_name
        .as_deref()
        .ok_or_else(|| Error::NotSupported(format!("{QUIRK_DP_AUX_NAME} must be specified")))
}

/// An open session to one RTD2142
///
/// Owns the bus exclusively for the lifetime of the session; dropping
/// the session releases it. Sessions on different buses are independent,
/// but nothing here serializes unrelated users of the *same* bus — that
/// is the caller's responsibility.
pub struct MstDevice<B> {
    bus: B,
    dp_aux_name: String,
    active_bank: Option<FlashBank>,
    version: Option<String>,
    flags: DeviceFlags,
}

impl<B: RegisterBus> MstDevice<B> {
    /// Open a session on an already-configured bus
    pub fn open(bus: B, dp_aux_name: impl Into<String>) -> Self {
        MstDevice {
            bus,
            dp_aux_name: dp_aux_name.into(),
            active_bank: None,
            version: None,
            flags: DeviceFlags::INTERNAL | DeviceFlags::DUAL_IMAGE | DeviceFlags::CAN_VERIFY_IMAGE,
        }
    }

    /// The DP-AUX device name this session was opened for
    pub fn dp_aux_name(&self) -> &str {
        &self.dp_aux_name
    }

    /// Current device flags
    pub fn flags(&self) -> DeviceFlags {
        self.flags
    }

    /// Bank the MCU reported as active, once [`setup`](Self::setup) ran
    pub fn active_bank(&self) -> Option<FlashBank> {
        self.active_bank
    }

    /// Published firmware version ("major.minor"), if known
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Query the dual-bank state of the running firmware
    pub fn dual_bank_status(&mut self) -> Result<DualBankStatus> {
        dualbank::query(&mut self.bus)
    }

    /// Probe the device and publish bank, version and updatability
    ///
    /// The device is updatable only when dual-bank support is enabled in
    /// diff mode. Running from the boot bank is still updatable, just
    /// with an unknown user version.
    pub fn setup(&mut self) -> Result<()> {
        self.flags.remove(DeviceFlags::UPDATABLE);
        self.active_bank = None;
        self.version = None;

        let status = self.dual_bank_status()?;
        log::debug!("dual-bank status: {status:?}");
        if !status.enabled || status.mode != Some(DualBankMode::Diff) {
            log::info!("dual-bank diff mode not active, device is not updatable");
            return Ok(());
        }

        self.flags.insert(DeviceFlags::UPDATABLE);
        self.active_bank = status.active_bank;
        self.version = match status.active_bank {
            Some(FlashBank::User1) => {
                let (major, minor) = status.user1_version;
                Some(format!("{major}.{minor}"))
            }
            Some(FlashBank::User2) => {
                let (major, minor) = status.user2_version;
                Some(format!("{major}.{minor}"))
            }
            // running from the boot bank, no user version to report
            _ => None,
        };
        Ok(())
    }

    /// Re-probe after an update or reset
    pub fn reload(&mut self) -> Result<()> {
        self.setup()
    }

    /// Put the MCU into ISP mode and lift the flash write protection
    pub fn detach<P: UpdateProgress>(&mut self, progress: &mut P) -> Result<()> {
        progress.set_status(Status::Restart);
        write_reg(&mut self.bus, REG_MCU_MODE, MCU_MODE_ISP)?;
        poll_reg(
            &mut self.bus,
            "ISP mode entry",
            REG_MCU_MODE,
            MCU_MODE_ISP,
            MCU_MODE_ISP,
            ISP_ENTRY_TIMEOUT,
        )?;

        // a faster MCU clock also cuts down on spurious NACKs during the
        // register traffic that follows
        write_reg_indirect(&mut self.bus, MCU_CLOCK_CTRL_ADDR, MCU_CLOCK_ACCEL)?;

        self.flags.insert(DeviceFlags::IS_BOOTLOADER);
        progress.set_status(Status::Idle);

        wp::disable_write_protect(&mut self.bus)
    }

    /// Restore write protection and bring the MCU back out of ISP mode
    ///
    /// The reset request to the control register is issued best-effort:
    /// the MCU regularly NACKs it while going down. What matters is the
    /// re-read after the settle delay.
    pub fn attach<P: UpdateProgress>(&mut self, progress: &mut P) -> Result<()> {
        wp::enable_write_protect(&mut self.bus)?;

        let mode = read_reg(&mut self.bus, REG_MCU_MODE)?;
        if mode & MCU_MODE_ISP != 0 {
            progress.set_status(Status::Restart);
            let value = read_reg(&mut self.bus, REG_RESET_CTRL)?;
            if let Err(err) = write_reg(&mut self.bus, REG_RESET_CTRL, value | RESET_CTRL_RESET) {
                log::debug!("ignoring reset request failure: {err}");
            }
            self.bus.sleep(RESET_SETTLE);

            let mode = read_reg(&mut self.bus, REG_MCU_MODE)?;
            if mode & MCU_MODE_ISP != 0 {
                self.flags.insert(DeviceFlags::NEEDS_SHUTDOWN);
                return Err(Error::NeedsUserAction(
                    "device failed to reset when requested".to_string(),
                ));
            }
        }

        self.flags.remove(DeviceFlags::IS_BOOTLOADER);
        progress.set_status(Status::Idle);
        Ok(())
    }

    /// Image base and flag record address for the bank an update targets
    ///
    /// The running bank is never written: user1 updates user2 and
    /// everything else, including running from boot, updates user1.
    fn update_target(&self) -> (u32, u32) {
        match self.active_bank {
            Some(FlashBank::User1) => (FLASH_USER2_ADDR, FLASH_FLAG2_ADDR),
            _ => (FLASH_USER1_ADDR, FLASH_FLAG1_ADDR),
        }
    }

    /// Write `image` to the inactive user bank and activate it
    ///
    /// Erases the whole target region block by block, programs the
    /// image, verifies it by reading back, then rewrites the target
    /// bank's flag record so the boot loader picks the new image up on
    /// the next boot. Requires a prior [`detach`](Self::detach).
    pub fn write_firmware<P: UpdateProgress>(
        &mut self,
        image: &[u8],
        progress: &mut P,
    ) -> Result<()> {
        if image.len() != FLASH_USER_SIZE as usize {
            return Err(Error::InvalidImage {
                expected: FLASH_USER_SIZE as usize,
                actual: image.len(),
            });
        }

        let (base, flag_addr) = self.update_target();
        log::info!("updating inactive bank at {base:#08x}");

        progress.set_status(Status::Erase);
        let blocks = FLASH_USER_SIZE / BLOCK_SIZE;
        for i in 0..blocks {
            flash::erase_block(&mut self.bus, base + i * BLOCK_SIZE)?;
            progress.set_progress((i + 1) as usize, blocks as usize);
        }

        progress.set_status(Status::Write);
        flash::write(&mut self.bus, base, image, progress)?;

        progress.set_status(Status::Verify);
        let mut readback = vec![0u8; image.len()];
        flash::read(&mut self.bus, base, &mut readback, progress)?;
        if readback != image {
            return Err(Error::Write(
                "flash contents after write do not match firmware image".to_string(),
            ));
        }

        // only now is it safe to touch the flag sector: the new image is
        // known good, and the old bank's flag is left alone either way
        progress.set_status(Status::Erase);
        flash::erase_sector(&mut self.bus, flag_addr & !(SECTOR_SIZE - 1))?;
        progress.set_status(Status::Write);
        flash::write(&mut self.bus, flag_addr, &FLAG_RECORD, progress)?;

        log::info!("new image activated at {base:#08x}");
        Ok(())
    }

    /// Read back the active user bank's image
    ///
    /// Requires a prior [`setup`](Self::setup) that found a user bank
    /// active, and a prior [`detach`](Self::detach).
    pub fn read_firmware<P: UpdateProgress>(&mut self, progress: &mut P) -> Result<Vec<u8>> {
        let base = match self.active_bank {
            Some(FlashBank::User1) => FLASH_USER1_ADDR,
            Some(FlashBank::User2) => FLASH_USER2_ADDR,
            _ => {
                return Err(Error::NotSupported(
                    "active firmware bank is unknown".to_string(),
                ))
            }
        };

        progress.set_status(Status::Read);
        let mut image = vec![0u8; FLASH_USER_SIZE as usize];
        flash::read(&mut self.bus, base, &mut image, progress)?;
        Ok(image)
    }

    /// Read the entire flash, boot bank and flag sectors included
    pub fn dump_firmware<P: UpdateProgress>(&mut self, progress: &mut P) -> Result<Vec<u8>> {
        progress.set_status(Status::Read);
        let mut image = vec![0u8; FLASH_SIZE as usize];
        flash::read(&mut self.bus, 0, &mut image, progress)?;
        Ok(image)
    }

    /// End the session, handing the bus back to the caller
    pub fn close(self) -> B {
        self.bus
    }
}
