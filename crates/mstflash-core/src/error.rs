//! Error types for mstflash-core

use std::time::Duration;
use thiserror::Error;

/// Core error type covering every failure mode of the update protocol
#[derive(Debug, Error)]
pub enum Error {
    /// The device, configuration or request is not supported
    #[error("not supported: {0}")]
    NotSupported(String),

    /// An I2C transaction failed at the OS level
    #[error("I2C transfer failed: {0}")]
    Io(#[from] std::io::Error),

    /// A register poll missed its deadline
    #[error(
        "timed out waiting for {what}: register 0x{reg:02x} reads 0x{last:02x} \
         (mask 0x{mask:02x}, expected 0x{expected:02x}) after {timeout:?}"
    )]
    Timeout {
        /// What the poll was waiting for
        what: String,
        /// Polled register address
        reg: u8,
        /// Bits that were compared
        mask: u8,
        /// Value the masked register had to reach
        expected: u8,
        /// Last value read before giving up
        last: u8,
        /// The deadline that elapsed
        timeout: Duration,
    },

    /// Flash contents did not match after programming
    #[error("{0}")]
    Write(String),

    /// The device needs manual intervention to recover
    #[error("{0}")]
    NeedsUserAction(String),

    /// The firmware blob does not fit a user bank
    #[error("firmware image is {actual:#x} bytes, expected {expected:#x}")]
    InvalidImage {
        /// Required image size (one user bank)
        expected: usize,
        /// Size of the blob that was supplied
        actual: usize,
    },

    /// A state the protocol core considers impossible
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using the core [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
