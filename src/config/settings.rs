//! View settings handed to snapshot consumers
//!
//! The core never draws anything. A renderer receives these settings on each
//! tick together with a snapshot and decides how to present it.
//!
//! # Viewlock
//!
//! While `viewlock` is set the consumer follows the data: the visible window
//! is fitted to the whole recording with one second of horizontal margin and
//! 0.1 V of vertical margin. When it is cleared the consumer keeps whatever
//! view the user navigated to.

use serde::{Deserialize, Serialize};

use crate::session::Recording;
use crate::types::{ChannelId, SeriesKey};

/// Horizontal margin around the data in seconds
pub const X_MARGIN: f64 = 1.0;

/// Vertical margin around the data in volts
pub const Y_MARGIN: f64 = 0.1;

/// Display options forwarded to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    /// Auto-fit the view to the data on every tick
    #[serde(default = "default_viewlock")]
    pub viewlock: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            viewlock: default_viewlock(),
        }
    }
}

fn default_viewlock() -> bool {
    true
}

/// Axis window for one channel plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ViewSettings {
    /// Flip the viewlock flag, returning the new value
    pub fn toggle_viewlock(&mut self) -> bool {
        self.viewlock = !self.viewlock;
        self.viewlock
    }

    /// Window a locked view should show for `channel`
    ///
    /// Returns `None` when the view is unlocked or the recording holds no
    /// samples for the channel.
    pub fn bounds_for(&self, recording: &Recording, channel: ChannelId) -> Option<ViewBounds> {
        if !self.viewlock {
            return None;
        }

        let (x_min, x_max) = min_max(recording.series(SeriesKey::Time)?)?;
        let (y_min, y_max) = min_max(recording.series(SeriesKey::Channel(channel))?)?;

        Some(ViewBounds {
            x_min: x_min - X_MARGIN,
            x_max: x_max + X_MARGIN,
            y_min: y_min - Y_MARGIN,
            y_max: y_max + Y_MARGIN,
        })
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;

    fn sample_recording() -> Recording {
        let mut rec = Recording::with_channels(&[1]);
        rec.push_row(&Row::new(0.5).with(1, 2.0)).unwrap();
        rec.push_row(&Row::new(3.0).with(1, 1.5)).unwrap();
        rec
    }

    #[test]
    fn test_locked_bounds() {
        let view = ViewSettings::default();
        let bounds = view.bounds_for(&sample_recording(), 1).unwrap();
        assert_eq!(bounds.x_min, -0.5);
        assert_eq!(bounds.x_max, 4.0);
        assert!((bounds.y_min - 1.4).abs() < 1e-12);
        assert!((bounds.y_max - 2.1).abs() < 1e-12);
    }

    #[test]
    fn test_unlocked_has_no_bounds() {
        let mut view = ViewSettings::default();
        assert!(!view.toggle_viewlock());
        assert!(view.bounds_for(&sample_recording(), 1).is_none());
    }

    #[test]
    fn test_empty_or_unknown_channel() {
        let view = ViewSettings::default();
        assert!(view.bounds_for(&Recording::with_channels(&[1]), 1).is_none());
        assert!(view.bounds_for(&sample_recording(), 4).is_none());
    }
}
