//! Test data builders for frames and recordings

use chart_recorder::{ChannelId, Recording, Row};

/// Builder for the lines of one device frame
#[derive(Default)]
pub struct FrameBuilder {
    lines: Vec<String>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a well-formed channel line
    pub fn channel(mut self, channel: ChannelId, volts: f64) -> Self {
        self.lines.push(format!("CH{} {:.3}V", channel, volts));
        self
    }

    /// Add an arbitrary line
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn lines(&self) -> Vec<&str> {
        self.lines.iter().map(String::as_str).collect()
    }

    /// Data lines followed by the blank sentinel
    pub fn build(mut self) -> Vec<String> {
        self.lines.push(String::new());
        self.lines
    }
}

/// Builder for recordings with evenly spaced rows
pub struct RecordingBuilder {
    channels: Vec<ChannelId>,
    rows: usize,
    period: f64,
}

impl RecordingBuilder {
    pub fn new(channels: &[ChannelId]) -> Self {
        Self {
            channels: channels.to_vec(),
            rows: 0,
            period: 0.1,
        }
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn period(mut self, period: f64) -> Self {
        self.period = period;
        self
    }

    /// Channel `ch` at row `i` holds `ch + i / 100`
    pub fn build(self) -> Recording {
        let mut recording = Recording::with_channels(&self.channels);
        for i in 0..self.rows {
            let row = self.channels.iter().fold(
                Row::new(i as f64 * self.period),
                |row, ch| row.with(*ch, *ch as f64 + i as f64 / 100.0),
            );
            recording
                .push_row(&row)
                .expect("builder rows cover every channel");
        }
        recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_recorder::SeriesKey;

    #[test]
    fn test_frame_builder() {
        let frame = FrameBuilder::new().channel(1, 0.5).raw("noise").build();
        assert_eq!(frame, vec!["CH1 0.500V", "noise", ""]);
    }

    #[test]
    fn test_recording_builder() {
        let rec = RecordingBuilder::new(&[1, 8]).rows(3).build();
        assert_eq!(rec.len(), 3);
        assert!((rec.series(SeriesKey::Channel(8)).unwrap()[2] - 8.02).abs() < 1e-12);
    }
}
