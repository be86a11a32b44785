//! Status and progress reporting
//!
//! Update operations are slow (a full bank write takes minutes over the
//! AUX side-channel), so every long-running operation reports what it is
//! doing through a caller-supplied reporter instead of printing anything
//! itself.

use std::fmt;

/// What the device is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Nothing in flight
    Idle,
    /// Erasing flash
    Erase,
    /// Programming flash
    Write,
    /// Reading back and comparing
    Verify,
    /// Waiting for the device to change mode or reset
    Restart,
    /// Reading flash
    Read,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "idle"),
            Status::Erase => write!(f, "erase"),
            Status::Write => write!(f, "write"),
            Status::Verify => write!(f, "verify"),
            Status::Restart => write!(f, "restart"),
            Status::Read => write!(f, "read"),
        }
    }
}

/// Callback interface for status and progress updates
pub trait UpdateProgress {
    /// A new phase has started
    fn set_status(&mut self, status: Status);

    /// `done` of `total` units of the current phase are complete
    ///
    /// Units are bytes for read/write/verify phases and erase units for
    /// erase phases.
    fn set_progress(&mut self, done: usize, total: usize);
}

/// A no-op progress reporter
pub struct NoProgress;

impl UpdateProgress for NoProgress {
    fn set_status(&mut self, _status: Status) {}
    fn set_progress(&mut self, _done: usize, _total: usize) {}
}
