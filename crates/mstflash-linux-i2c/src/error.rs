//! Error types for Linux I2C operations

use thiserror::Error;

/// Linux I2C specific errors
#[derive(Debug, Error)]
pub enum LinuxI2cError {
    /// Failed to open the device node
    #[error("failed to open {path}: {source}")]
    OpenFailed {
        /// Device node path
        path: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Failed to pin the peripheral address
    #[error("failed to set peripheral address {address:#04x}: {source}")]
    SetAddressFailed {
        /// The 7-bit peripheral address
        address: u16,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// No device path given
    #[error("no I2C device specified")]
    NoDevice,

    /// The DP-AUX name did not resolve to an I2C bus
    #[error("did not find an i2c-dev associated with DP aux \"{0}\"")]
    BusNotFound(String),

    /// A sysfs read failed while walking the device tree
    #[error("sysfs walk failed: {0}")]
    Sysfs(#[source] std::io::Error),
}

/// Result type for Linux I2C operations
pub type Result<T> = std::result::Result<T, LinuxI2cError>;

/// Map transport-layer failures onto the core error kinds
///
/// Discovery failures mean the device is not there to update; open and
/// sysfs failures are plain I/O.
impl From<LinuxI2cError> for mstflash_core::Error {
    fn from(err: LinuxI2cError) -> Self {
        match err {
            LinuxI2cError::NoDevice | LinuxI2cError::BusNotFound(_) => {
                mstflash_core::Error::NotSupported(err.to_string())
            }
            LinuxI2cError::OpenFailed { .. }
            | LinuxI2cError::SetAddressFailed { .. }
            | LinuxI2cError::Sysfs(_) => {
                mstflash_core::Error::Io(std::io::Error::other(err.to_string()))
            }
        }
    }
}
