//! SerialLink trait for a unified line-source interface
//!
//! This module provides a common trait for everything the acquisition worker
//! can read frames from: the real serial device (via `serialport`) and the
//! scripted [`MockLink`](super::MockLink) used by tests and the demo mode.

use crate::backend::cancel::CancelToken;
use crate::config::SerialConfig;
use crate::error::Result;

/// Counters for link operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Complete lines returned
    pub lines_read: u64,
    /// Bytes received, terminators included
    pub bytes_read: u64,
    /// Reads that ended on the timeout
    pub timeouts: u64,
}

impl LinkStats {
    /// Record a returned line
    pub fn record_line(&mut self, len: usize) {
        self.lines_read += 1;
        self.bytes_read += len as u64;
    }

    /// Record a read that timed out
    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Unified interface for line-oriented byte streams
///
/// Implementations must be `Send`: the link is moved into the acquisition
/// thread for the duration of a session and handed back when it ends.
///
/// # Example
///
/// ```ignore
/// fn next_line(link: &mut dyn SerialLink, cancel: &CancelToken) -> Result<Option<Vec<u8>>> {
///     let line = link.read_line(cancel)?;
///     Ok((!line.is_empty()).then_some(line))
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait SerialLink: Send {
    /// Open the device described by `config`
    ///
    /// Fails with [`RecorderError::Connection`](crate::error::RecorderError::Connection)
    /// when the device is missing, busy, or not accessible.
    fn connect(&mut self, config: &SerialConfig) -> Result<()>;

    /// Close the device. Calling this on a closed link does nothing.
    fn disconnect(&mut self);

    /// Check if the device is open
    fn is_connected(&self) -> bool;

    /// Read one line, terminator included
    ///
    /// Blocks for at most the configured read timeout and returns an empty
    /// vector if no complete line arrived in time, or if `cancel` was set
    /// while waiting. Bytes of an incomplete line are kept for the next call.
    /// Never retries a failed device read.
    fn read_line(&mut self, cancel: &CancelToken) -> Result<Vec<u8>>;

    /// Get link statistics
    fn stats(&self) -> LinkStats;

    /// Reset link statistics
    fn reset_stats(&mut self);
}
