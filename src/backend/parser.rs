//! Frame parser for the ADC line protocol
//!
//! The board transmits one frame per conversion cycle: one line per channel,
//! followed by a blank line (`\r\n`). A data line carries two tokens anywhere
//! in its text:
//!
//! ```text
//! channel-token := "CH" digit+            e.g. CH8
//! voltage-token := digit+ "." digit+ "V"  e.g. 1.200V
//! ```
//!
//! For each token the leftmost occurrence in the line is used.
//!
//! # Drop Policy
//!
//! Parsing stops at the first line that lacks either token, or whose channel
//! is outside `0..total_channels`. The whole frame is discarded and no row is
//! produced; nothing earlier in the frame is kept. Line noise therefore costs
//! one frame, never the session.
//!
//! # Duplicate Channels
//!
//! If a channel appears twice within one frame the later value wins.

use std::time::Instant;

use crate::types::{ChannelId, Row};

/// Whether `line` is the blank sentinel that ends a frame
///
/// A zero-length read (timeout) is not a sentinel.
pub fn is_sentinel(line: &[u8]) -> bool {
    !line.is_empty() && line.iter().all(|b| *b == b'\r' || *b == b'\n')
}

/// Extract the channel number from the first `CH<digits>` in `line`
///
/// A first token that does not fit a `u32` makes the line malformed; later
/// tokens are not considered.
pub fn channel_token(line: &[u8]) -> Option<u32> {
    let rest = (0..line.len())
        .filter_map(|start| line[start..].strip_prefix(b"CH"))
        .find(|rest| leading_digits(rest) > 0)?;
    ascii_str(&rest[..leading_digits(rest)])?.parse().ok()
}

/// Extract the voltage from the first `<digits>.<digits>V` in `line`
pub fn voltage_token(line: &[u8]) -> Option<f64> {
    (0..line.len()).find_map(|start| {
        let rest = &line[start..];
        let int_len = leading_digits(rest);
        if int_len == 0 || rest.get(int_len) != Some(&b'.') {
            return None;
        }
        let frac_len = leading_digits(&rest[int_len + 1..]);
        let end = int_len + 1 + frac_len;
        if frac_len == 0 || rest.get(end) != Some(&b'V') {
            return None;
        }
        ascii_str(&rest[..end])?.parse().ok()
    })
}

fn leading_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn ascii_str(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

/// Turns completed frames into rows stamped relative to a session start
#[derive(Debug, Clone)]
pub struct FrameParser {
    total_channels: ChannelId,
    session_start: Instant,
}

impl FrameParser {
    /// Create a parser accepting channels `0..total_channels`, stamping rows
    /// with the seconds elapsed since now
    pub fn new(total_channels: ChannelId) -> Self {
        Self::with_start(total_channels, Instant::now())
    }

    /// Create a parser with an explicit session start
    pub fn with_start(total_channels: ChannelId, session_start: Instant) -> Self {
        Self {
            total_channels,
            session_start,
        }
    }

    pub fn total_channels(&self) -> ChannelId {
        self.total_channels
    }

    /// Parse one data line into `(channel, voltage)`
    pub fn parse_line(&self, line: &[u8]) -> Option<(ChannelId, f64)> {
        let channel = channel_token(line)?;
        let channel = ChannelId::try_from(channel)
            .ok()
            .filter(|ch| *ch < self.total_channels)?;
        let voltage = voltage_token(line)?;
        Some((channel, voltage))
    }

    /// Parse a frame, stamping the row with the time elapsed since the
    /// session start once every line has been consumed
    pub fn parse<L: AsRef<[u8]>>(&self, lines: &[L]) -> Option<Row> {
        let channels = self.parse_channels(lines)?;
        Some(self.stamp(channels, self.session_start.elapsed().as_secs_f64()))
    }

    /// Parse a frame with a caller-supplied time stamp
    pub fn parse_at<L: AsRef<[u8]>>(&self, lines: &[L], time: f64) -> Option<Row> {
        let channels = self.parse_channels(lines)?;
        Some(self.stamp(channels, time))
    }

    fn parse_channels<L: AsRef<[u8]>>(&self, lines: &[L]) -> Option<Vec<(ChannelId, f64)>> {
        lines
            .iter()
            .map(|line| {
                let parsed = self.parse_line(line.as_ref());
                if parsed.is_none() {
                    tracing::trace!(
                        "Malformed line {:?}",
                        String::from_utf8_lossy(line.as_ref()).trim_end()
                    );
                }
                parsed
            })
            .collect()
    }

    fn stamp(&self, channels: Vec<(ChannelId, f64)>, time: f64) -> Row {
        channels
            .into_iter()
            .fold(Row::new(time), |row, (ch, volts)| row.with(ch, volts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SeriesKey;
    use proptest::prelude::*;

    fn parser() -> FrameParser {
        FrameParser::new(10)
    }

    #[test]
    fn test_channel_token() {
        assert_eq!(channel_token(b"CH1 0.500V"), Some(1));
        assert_eq!(channel_token(b"ADC CH12: 3.1V"), Some(12));
        assert_eq!(channel_token(b"CHX CH4"), Some(4));
        assert_eq!(channel_token(b"ch1 0.5V"), None);
        assert_eq!(channel_token(b"CH 1"), None);
    }

    #[test]
    fn test_overflowing_first_channel_token_is_not_skipped() {
        assert_eq!(channel_token(b"CH99999999999 CH1 0.500V"), None);
        assert!(parser()
            .parse_at(&["CH99999999999 CH1 0.500V"], 0.0)
            .is_none());
    }

    #[test]
    fn test_voltage_token() {
        assert_eq!(voltage_token(b"CH1 0.500V"), Some(0.5));
        assert_eq!(voltage_token(b"CH8 1.200V\r\n"), Some(1.2));
        assert_eq!(voltage_token(b"12.5.3V"), Some(5.3));
        assert_eq!(voltage_token(b"CH1 1V"), None);
        assert_eq!(voltage_token(b"CH1 .5V"), None);
        assert_eq!(voltage_token(b"CH1 0.5 V"), None);
    }

    #[test]
    fn test_sentinel() {
        assert!(is_sentinel(b"\r\n"));
        assert!(is_sentinel(b"\n"));
        assert!(!is_sentinel(b""));
        assert!(!is_sentinel(b" \r\n"));
    }

    #[test]
    fn test_parse_two_channels() {
        let row = parser()
            .parse(&["CH1 0.500V\r\n", "CH8 1.200V\r\n"])
            .unwrap();
        assert_eq!(row.channel(1), Some(0.5));
        assert_eq!(row.channel(8), Some(1.2));
        assert!(row.time() >= 0.0);
        assert_eq!(row.channel_count(), 2);
    }

    #[test]
    fn test_missing_channel_token_drops_frame() {
        assert!(parser().parse(&["CH1 0.500V", "noise 0.7V"]).is_none());
    }

    #[test]
    fn test_missing_voltage_token_drops_frame() {
        assert!(parser().parse(&["CH1 0.500V", "CH2 ???"]).is_none());
    }

    #[test]
    fn test_malformed_first_line_drops_later_lines() {
        assert!(parser().parse(&["garbage", "CH1 0.500V"]).is_none());
    }

    #[test]
    fn test_channel_out_of_range_drops_frame() {
        assert!(parser().parse(&["CH10 0.500V"]).is_none());
        assert!(parser().parse(&["CH99999999999 0.500V"]).is_none());
        assert!(parser().parse(&["CH9 0.500V"]).is_some());
    }

    #[test]
    fn test_duplicate_channel_last_write_wins() {
        let row = parser().parse_at(&["CH3 1.0V", "CH3 2.0V"], 0.0).unwrap();
        assert_eq!(row.channel(3), Some(2.0));
        assert_eq!(row.channel_count(), 1);
    }

    #[test]
    fn test_empty_frame_yields_time_only_row() {
        let row = parser().parse_at::<&str>(&[], 4.5).unwrap();
        assert_eq!(row.time(), 4.5);
        assert_eq!(row.channel_count(), 0);
    }

    #[test]
    fn test_non_utf8_bytes_are_ignored_around_tokens() {
        let line: &[u8] = b"\xffCH2 \xfe1.250V";
        assert_eq!(parser().parse_line(line), Some((2, 1.25)));
    }

    proptest! {
        #[test]
        fn test_well_formed_frames_parse_exactly(
            samples in prop::collection::btree_map(0u16..10, (0u32..100, 0u32..1000), 0..10)
        ) {
            let lines: Vec<String> = samples
                .iter()
                .map(|(ch, (int, frac))| format!("CH{} {}.{:03}V\r\n", ch, int, frac))
                .collect();

            let row = parser().parse_at(lines.as_slice(), 1.0).unwrap();

            prop_assert_eq!(row.channel_count(), samples.len());
            prop_assert!(row.contains(SeriesKey::Time));
            for (ch, (int, frac)) in &samples {
                let expected = *int as f64 + *frac as f64 / 1000.0;
                let got = row.channel(*ch).unwrap();
                prop_assert!((got - expected).abs() < 1e-9);
            }
        }

        #[test]
        fn test_any_line_without_tokens_drops_frame(
            good in prop::collection::vec(0u16..10, 0..5),
            noise in "[a-z ]{0,12}",
            position in 0usize..6,
        ) {
            let mut lines: Vec<String> = good.iter().map(|ch| format!("CH{} 1.0V", ch)).collect();
            let at = position.min(lines.len());
            lines.insert(at, noise);
            prop_assert!(parser().parse_at(lines.as_slice(), 0.0).is_none());
        }
    }
}
