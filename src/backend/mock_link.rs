//! Mock serial link for testing without hardware
//!
//! [`MockLink`] replays scripted lines. Lines can be queued up front with
//! [`MockLink::with_lines`] or pushed while a session is running through a
//! [`MockFeeder`]. When the queue is empty a read waits for the configured
//! idle timeout and returns an empty line, exactly like a serial read that
//! timed out.
//!
//! In looping mode the script is replayed forever, which gives the CLI a
//! demo source that behaves like a live ADC board.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::cancel::CancelToken;
use crate::backend::link_trait::{LinkStats, SerialLink};
use crate::config::SerialConfig;
use crate::error::{RecorderError, Result};
use crate::types::ChannelId;

/// Default wait before an empty queue reports a timeout
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(5);

type LineQueue = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// Handle for pushing lines into a [`MockLink`] from another thread
#[derive(Debug, Clone)]
pub struct MockFeeder {
    queue: LineQueue,
}

impl MockFeeder {
    /// Queue a single raw line (a CRLF terminator is added if missing)
    pub fn push_line(&self, line: impl AsRef<[u8]>) {
        let line = terminate(line.as_ref());
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(line);
    }

    /// Queue the lines of one frame followed by the blank sentinel line
    pub fn push_frame(&self, lines: &[&str]) {
        for line in lines {
            self.push_line(line);
        }
        self.push_line("");
    }

    /// Number of lines not yet read
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Scripted line source
#[derive(Debug)]
pub struct MockLink {
    queue: LineQueue,
    script: Vec<Vec<u8>>,
    looping: bool,
    idle_timeout: Duration,
    line_delay: Duration,
    fail_connect: Option<String>,
    busy_ports: Vec<String>,
    connected: bool,
    stats: LinkStats,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    /// Create a link with an empty queue
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            script: Vec::new(),
            looping: false,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            line_delay: Duration::ZERO,
            fail_connect: None,
            busy_ports: Vec::new(),
            connected: false,
            stats: LinkStats::default(),
        }
    }

    /// Queue `lines` (terminators added where missing)
    pub fn with_lines<I, L>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let feeder = self.feeder();
        for line in lines {
            feeder.push_line(line);
        }
        self
    }

    /// Replay `lines` endlessly instead of timing out when the queue runs dry
    pub fn looping<I, L>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        self.script = lines.into_iter().map(|l| terminate(l.as_ref())).collect();
        self.looping = !self.script.is_empty();
        self
    }

    /// Wait this long before reporting a timeout on an empty queue
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Wait this long before returning each line
    pub fn with_line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }

    /// Make every `connect` fail with the given message
    pub fn failing_connect(mut self, message: impl Into<String>) -> Self {
        self.fail_connect = Some(message.into());
        self
    }

    /// Make `connect` fail for one device name only
    pub fn busy_port(mut self, port: impl Into<String>) -> Self {
        self.busy_ports.push(port.into());
        self
    }

    /// Handle for queueing more lines later
    pub fn feeder(&self) -> MockFeeder {
        MockFeeder {
            queue: self.queue.clone(),
        }
    }

    /// A looping demo source emitting one frame with a slow ramp per channel
    pub fn demo(channels: &[ChannelId], frame_interval: Duration) -> Self {
        let mut script = Vec::new();
        for step in 0..50u32 {
            for (idx, ch) in channels.iter().enumerate() {
                let phase = (step as f64 / 50.0) * std::f64::consts::TAU + idx as f64;
                let volts = 1.65 + 1.5 * phase.sin();
                script.push(format!("CH{} {:.3}V", ch, volts));
            }
            script.push(String::new());
        }
        let per_line = frame_interval / (channels.len() as u32 + 1);
        Self::new().looping(script).with_line_delay(per_line)
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.is_empty() && self.looping {
            queue.extend(self.script.iter().cloned());
        }
        queue.pop_front()
    }
}

impl SerialLink for MockLink {
    fn connect(&mut self, config: &SerialConfig) -> Result<()> {
        if let Some(message) = &self.fail_connect {
            return Err(RecorderError::connection(&config.port, message));
        }
        if self.busy_ports.contains(&config.port) {
            self.connected = false;
            return Err(RecorderError::connection(&config.port, "Device or resource busy"));
        }
        self.connected = true;
        tracing::debug!("Mock link connected as {}", config.port);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_line(&mut self, cancel: &CancelToken) -> Result<Vec<u8>> {
        if !self.connected {
            return Err(RecorderError::NotConnected);
        }
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        match self.next_line() {
            Some(line) => {
                if !self.line_delay.is_zero() {
                    std::thread::sleep(self.line_delay);
                }
                self.stats.record_line(line.len());
                Ok(line)
            }
            None => {
                std::thread::sleep(self.idle_timeout);
                self.stats.record_timeout();
                Ok(Vec::new())
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

fn terminate(line: &[u8]) -> Vec<u8> {
    let mut line = line.to_vec();
    if !line.ends_with(b"\n") {
        line.extend_from_slice(b"\r\n");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(link: MockLink) -> MockLink {
        let mut link = link;
        link.connect(&SerialConfig::default()).unwrap();
        link
    }

    #[test]
    fn test_replays_lines_then_times_out() {
        let mut link = connected(MockLink::new().with_lines(["CH1 0.500V", ""]));
        let cancel = CancelToken::new();

        assert_eq!(link.read_line(&cancel).unwrap(), b"CH1 0.500V\r\n");
        assert_eq!(link.read_line(&cancel).unwrap(), b"\r\n");
        assert!(link.read_line(&cancel).unwrap().is_empty());

        let stats = link.stats();
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.timeouts, 1);
    }

    #[test]
    fn test_feeder_pushes_frames() {
        let mut link = connected(MockLink::new());
        let feeder = link.feeder();
        feeder.push_frame(&["CH2 1.0V"]);
        assert_eq!(feeder.pending(), 2);

        let cancel = CancelToken::new();
        assert_eq!(link.read_line(&cancel).unwrap(), b"CH2 1.0V\r\n");
        assert_eq!(link.read_line(&cancel).unwrap(), b"\r\n");
        assert_eq!(feeder.pending(), 0);
    }

    #[test]
    fn test_looping_never_runs_dry() {
        let mut link = connected(MockLink::new().looping(["CH0 0.1V", ""]));
        let cancel = CancelToken::new();
        for _ in 0..5 {
            assert!(!link.read_line(&cancel).unwrap().is_empty());
        }
    }

    #[test]
    fn test_failing_connect() {
        let mut link = MockLink::new().failing_connect("Permission denied");
        let err = link.connect(&SerialConfig::default()).unwrap_err();
        assert!(matches!(err, RecorderError::Connection { .. }));
        assert!(!link.is_connected());
    }

    #[test]
    fn test_read_requires_connection() {
        let mut link = MockLink::new().with_lines(["CH1 0.5V"]);
        assert!(link.read_line(&CancelToken::new()).is_err());
    }
}
