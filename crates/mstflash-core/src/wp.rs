//! External flash write-protect override
//!
//! The flash chip's ~WP pin hangs off GPIO 88 of the RTD2142. Driving
//! the pin high lifts the hardware write protection for the duration of
//! an update; driving it low restores it. Both the pin configuration and
//! its output level live in the indirect register space.

use crate::bus::RegisterBus;
use crate::error::Result;
use crate::regs::{read_reg_indirect, write_reg_indirect, GPIO88_CONFIG_ADDR, GPIO88_VALUE_ADDR};

/// Drive GPIO 88 to `level`
///
/// Configures the pin as a push-pull GPIO output first, preserving the
/// unrelated configuration bits in the high nibble, then sets bit 0 of
/// the value register.
fn set_gpio88<B: RegisterBus + ?Sized>(bus: &mut B, level: bool) -> Result<()> {
    let config = read_reg_indirect(bus, GPIO88_CONFIG_ADDR)?;
    write_reg_indirect(bus, GPIO88_CONFIG_ADDR, (config & 0xF0) | 0x01)?;

    let value = read_reg_indirect(bus, GPIO88_VALUE_ADDR)?;
    write_reg_indirect(bus, GPIO88_VALUE_ADDR, (value & 0xFE) | u8::from(level))
}

/// Lift the hardware write protection (drive ~WP high)
pub fn disable_write_protect<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<()> {
    log::debug!("disabling flash write protection");
    set_gpio88(bus, true)
}

/// Restore the hardware write protection (drive ~WP low)
pub fn enable_write_protect<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<()> {
    log::debug!("enabling flash write protection");
    set_gpio88(bus, false)
}
