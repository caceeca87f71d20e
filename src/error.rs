//! Error handling for the chart recorder
//!
//! This module defines custom error types and a Result alias for use
//! throughout the application.

use thiserror::Error;

/// Main error type for chart recorder operations
#[derive(Error, Debug)]
pub enum RecorderError {
    /// The serial device could not be opened (missing, busy, permission denied)
    #[error("Connection error on {port}: {message}")]
    Connection { port: String, message: String },

    /// An operation needed an open link but none is connected
    #[error("Not connected to a serial device")]
    NotConnected,

    /// Errors reported by the serial port driver
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// Errors related to importing a recording
    #[error("Format error: {0}")]
    Format(String),

    /// A row would leave the series of a recording with unequal lengths
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// The acquisition thread terminated abnormally
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RecorderError>,
    },
}

impl RecorderError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RecorderError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a connection error for `port` from any displayable cause
    pub fn connection(port: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        RecorderError::Connection {
            port: port.into(),
            message: cause.to_string(),
        }
    }

    /// The innermost error, with any context layers peeled off
    pub fn root(&self) -> &RecorderError {
        match self {
            RecorderError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for chart recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecorderError::Format("row 3: field 2 is not a number".to_string());
        assert_eq!(err.to_string(), "Format error: row 3: field 2 is not a number");
    }

    #[test]
    fn test_error_with_context() {
        let err = RecorderError::Consistency("missing channel 8".to_string());
        let with_ctx = err.with_context("Failed to append row");
        assert!(with_ctx.to_string().contains("Failed to append row"));
        assert!(matches!(with_ctx.root(), RecorderError::Consistency(_)));
    }

    #[test]
    fn test_connection_error() {
        let err = RecorderError::connection("/dev/ttyUSB0", "Permission denied");
        assert!(err.to_string().contains("/dev/ttyUSB0"));
        assert!(err.to_string().contains("Permission denied"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(RecorderError::NotConnected);
        let err = result.context("inject").unwrap_err();
        assert_eq!(err.to_string(), "inject: Not connected to a serial device");
    }
}
