//! Serial device link built on `serialport`
//!
//! [`SerialPortLink`] turns the raw byte stream of the ADC board into lines.
//! The port is opened with a short per-call timeout and read in slices until
//! either a full line is buffered, the configured read timeout elapses, or the
//! cancel token is set. This keeps `stop` latency well under one read timeout
//! without ever losing bytes of a partially received line.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use serialport::{SerialPort, SerialPortType};

use crate::backend::cancel::CancelToken;
use crate::backend::link_trait::{LinkStats, SerialLink};
use crate::config::SerialConfig;
use crate::error::{RecorderError, Result, ResultExt};

/// Upper bound on a single blocking `read` call
pub const POLL_SLICE: Duration = Duration::from_millis(100);

/// Size of the scratch buffer for one `read` call
const CHUNK_SIZE: usize = 256;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path or name
    pub name: String,
    /// Human readable description (USB manufacturer/product, bus type)
    pub description: String,
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.description)
        }
    }
}

/// List the serial ports present on this machine
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(info) => {
                    let parts: Vec<String> = [info.manufacturer, info.product]
                        .into_iter()
                        .flatten()
                        .collect();
                    if parts.is_empty() {
                        format!("USB {:04x}:{:04x}", info.vid, info.pid)
                    } else {
                        parts.join(" ")
                    }
                }
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::Unknown => String::new(),
            };
            PortInfo {
                name: p.port_name,
                description,
            }
        })
        .collect())
}

/// Accumulates received bytes and splits them into `\n`-terminated lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Remove and return the first complete line, terminator included
    pub fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|b| *b == b'\n')? + 1;
        let rest = self.pending.split_off(end);
        Some(std::mem::replace(&mut self.pending, rest))
    }

    /// Number of buffered bytes not yet returned as a line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Link to a physical serial device
pub struct SerialPortLink {
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
    read_timeout: Duration,
    buffer: LineBuffer,
    stats: LinkStats,
}

impl Default for SerialPortLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPortLink {
    pub fn new() -> Self {
        Self {
            port: None,
            port_name: None,
            read_timeout: Duration::from_millis(crate::config::DEFAULT_READ_TIMEOUT_MS),
            buffer: LineBuffer::new(),
            stats: LinkStats::default(),
        }
    }

    /// Name of the open device
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }
}

impl SerialLink for SerialPortLink {
    fn connect(&mut self, config: &SerialConfig) -> Result<()> {
        self.disconnect();

        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(POLL_SLICE.min(config.read_timeout()))
            .open()
            .map_err(|e| RecorderError::connection(&config.port, e))?;

        self.port = Some(port);
        self.port_name = Some(config.port.clone());
        self.read_timeout = config.read_timeout();
        self.buffer.clear();

        tracing::info!(
            "Opened {} at {} baud (timeout {:?})",
            config.port,
            config.baud_rate,
            self.read_timeout
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            if let Some(name) = self.port_name.take() {
                tracing::info!("Closed {}", name);
            }
        }
        self.buffer.clear();
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn read_line(&mut self, cancel: &CancelToken) -> Result<Vec<u8>> {
        let Some(port) = self.port.as_mut() else {
            return Err(RecorderError::NotConnected);
        };

        let deadline = Instant::now() + self.read_timeout;
        let mut chunk = [0u8; CHUNK_SIZE];

        loop {
            if let Some(line) = self.buffer.take_line() {
                self.stats.record_line(line.len());
                return Ok(line);
            }
            if cancel.is_cancelled() || Instant::now() >= deadline {
                self.stats.record_timeout();
                return Ok(Vec::new());
            }

            match port.read(&mut chunk) {
                Ok(0) => {
                    self.stats.record_timeout();
                    return Ok(Vec::new());
                }
                Ok(n) => self.buffer.extend(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                Err(e) => {
                    return Err(RecorderError::Io(e)).with_context(|| {
                        format!(
                            "Read from {} failed",
                            self.port_name.as_deref().unwrap_or("serial port")
                        )
                    });
                }
            }
        }
    }

    fn stats(&self) -> LinkStats {
        self.stats.clone()
    }

    fn reset_stats(&mut self) {
        self.stats.reset();
    }
}
