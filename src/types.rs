//! Core data types for the chart recorder
//!
//! This module contains the fundamental data structures shared by the
//! acquisition backend, the time-series store and the CSV exporter.
//!
//! # Main Types
//!
//! - [`ChannelId`] - ADC channel number as announced by the device (`CH<n>`)
//! - [`SeriesKey`] - Key of one time series: a channel or the reserved `Time` column
//! - [`Row`] - One synchronized instant: elapsed time plus channel voltages
//! - [`ControlState`] - Lifecycle state of the recorder backend
//! - [`CollectionStats`] - Counters describing the current acquisition session
//!
//! # Key Ordering
//!
//! `SeriesKey` orders `Time` before every channel and channels ascending,
//! which is the column order of exported recordings (`Time,1,8`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RecorderError;

/// ADC channel number
pub type ChannelId = u16;

/// Header name of the reserved time column
pub const TIME_KEY: &str = "Time";

/// Key of a single time series inside a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesKey {
    /// Elapsed seconds since the start of the recording
    Time,
    /// Voltage of an ADC channel
    Channel(ChannelId),
}

impl SeriesKey {
    /// The channel number, if this is not the time column
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            SeriesKey::Time => None,
            SeriesKey::Channel(ch) => Some(*ch),
        }
    }
}

impl From<ChannelId> for SeriesKey {
    fn from(ch: ChannelId) -> Self {
        SeriesKey::Channel(ch)
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Time => write!(f, "{}", TIME_KEY),
            SeriesKey::Channel(ch) => write!(f, "{}", ch),
        }
    }
}

impl FromStr for SeriesKey {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == TIME_KEY {
            return Ok(SeriesKey::Time);
        }
        s.parse::<ChannelId>()
            .map(SeriesKey::Channel)
            .map_err(|_| RecorderError::Format(format!("invalid series key '{}'", s)))
    }
}

/// A fully assembled sample set for one synchronized instant
///
/// A row always carries [`SeriesKey::Time`]; channel values are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: BTreeMap<SeriesKey, f64>,
}

impl Row {
    /// Create a row stamped with `time` elapsed seconds and no channel values
    pub fn new(time: f64) -> Self {
        let mut values = BTreeMap::new();
        values.insert(SeriesKey::Time, time);
        Self { values }
    }

    /// Set a channel's voltage. A later value for the same channel replaces
    /// the earlier one.
    pub fn insert(&mut self, channel: ChannelId, voltage: f64) {
        self.values.insert(SeriesKey::Channel(channel), voltage);
    }

    /// Builder-style variant of [`Row::insert`]
    pub fn with(mut self, channel: ChannelId, voltage: f64) -> Self {
        self.insert(channel, voltage);
        self
    }

    /// Elapsed time of this row in seconds
    pub fn time(&self) -> f64 {
        self.values.get(&SeriesKey::Time).copied().unwrap_or_default()
    }

    /// Value stored under `key`
    pub fn get(&self, key: SeriesKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    /// Voltage of `channel`
    pub fn channel(&self, channel: ChannelId) -> Option<f64> {
        self.get(SeriesKey::Channel(channel))
    }

    /// Whether the row carries a value for `key`
    pub fn contains(&self, key: SeriesKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Number of channel values (the time stamp is not counted)
    pub fn channel_count(&self) -> usize {
        self.values.len() - 1
    }

    /// Iterate over all keys and values, `Time` first
    pub fn iter(&self) -> impl Iterator<Item = (SeriesKey, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// Lifecycle state of the recorder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    /// No serial link is open
    #[default]
    Disconnected,
    /// Link open, acquisition not running
    Idle,
    /// Link open and the acquisition worker is appending rows
    Streaming,
}

impl ControlState {
    /// Whether a serial link is open
    pub fn is_connected(&self) -> bool {
        !matches!(self, ControlState::Disconnected)
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlState::Disconnected => write!(f, "Disconnected"),
            ControlState::Idle => write!(f, "Connected"),
            ControlState::Streaming => write!(f, "Streaming"),
        }
    }
}

/// Statistics about one acquisition session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Lines returned by the serial link (timeouts excluded)
    pub lines_read: u64,
    /// Reads that returned nothing within the timeout
    pub read_timeouts: u64,
    /// Frames terminated by a sentinel line
    pub frames_completed: u64,
    /// Frames discarded because a line did not match the grammar
    pub frames_dropped: u64,
    /// Frames with no data lines
    pub empty_frames: u64,
    /// Rows accepted by the store
    pub rows_appended: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_key_ordering() {
        let mut keys = vec![
            SeriesKey::Channel(8),
            SeriesKey::Time,
            SeriesKey::Channel(1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![SeriesKey::Time, SeriesKey::Channel(1), SeriesKey::Channel(8)]
        );
    }

    #[test]
    fn test_series_key_parse_and_display() {
        assert_eq!("Time".parse::<SeriesKey>().unwrap(), SeriesKey::Time);
        assert_eq!(" 7 ".parse::<SeriesKey>().unwrap(), SeriesKey::Channel(7));
        assert!("time".parse::<SeriesKey>().is_err());
        assert!("-1".parse::<SeriesKey>().is_err());
        assert_eq!(SeriesKey::Channel(12).to_string(), "12");
        assert_eq!(SeriesKey::Time.to_string(), "Time");
    }

    #[test]
    fn test_row_always_has_time() {
        let row = Row::new(1.25);
        assert_eq!(row.time(), 1.25);
        assert!(row.contains(SeriesKey::Time));
        assert_eq!(row.channel_count(), 0);
    }

    #[test]
    fn test_row_insert_overwrites() {
        let row = Row::new(0.0).with(3, 1.0).with(3, 2.0);
        assert_eq!(row.channel(3), Some(2.0));
        assert_eq!(row.channel_count(), 1);
    }

    #[test]
    fn test_control_state_display() {
        assert_eq!(ControlState::Disconnected.to_string(), "Disconnected");
        assert!(ControlState::Streaming.is_connected());
        assert!(!ControlState::Disconnected.is_connected());
    }
}
