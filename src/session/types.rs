//! Types for recordings

use std::collections::BTreeMap;

use crate::error::{RecorderError, Result};
use crate::types::{ChannelId, Row, SeriesKey};

/// The full content of one acquisition session or one imported file
///
/// A recording is a set of columns keyed by [`SeriesKey`]. Every column has
/// the same length; [`Recording::push_row`] refuses rows that would break
/// this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    series: BTreeMap<SeriesKey, Vec<f64>>,
}

impl Recording {
    /// Create a recording with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty recording with a `Time` column plus one column per
    /// channel
    pub fn with_channels(channels: &[ChannelId]) -> Self {
        let series = std::iter::once(SeriesKey::Time)
            .chain(channels.iter().copied().map(SeriesKey::Channel))
            .map(|key| (key, Vec::new()))
            .collect();
        Self { series }
    }

    /// Build a recording from complete columns
    ///
    /// Fails with [`RecorderError::Format`] if the columns differ in length.
    pub fn from_series(series: BTreeMap<SeriesKey, Vec<f64>>) -> Result<Self> {
        let mut lengths = series.iter().map(|(key, values)| (key, values.len()));
        if let Some((first_key, expected)) = lengths.next() {
            if let Some((key, len)) = lengths.find(|(_, len)| *len != expected) {
                return Err(RecorderError::Format(format!(
                    "column {} has {} values but column {} has {}",
                    key, len, first_key, expected
                )));
            }
        }
        Ok(Self { series })
    }

    /// Column keys in export order (`Time` first, then channels ascending)
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.series.keys().copied().collect()
    }

    /// Values of one column
    pub fn series(&self, key: SeriesKey) -> Option<&[f64]> {
        self.series.get(&key).map(Vec::as_slice)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.series.values().next().map_or(0, Vec::len)
    }

    /// Whether the recording holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.series.len()
    }

    /// Latest time stamp, if the recording has a non-empty time column
    pub fn last_time(&self) -> Option<f64> {
        self.series
            .get(&SeriesKey::Time)
            .and_then(|t| t.last())
            .copied()
    }

    /// Whether every column has the same length
    pub fn is_consistent(&self) -> bool {
        let len = self.len();
        self.series.values().all(|v| v.len() == len)
    }

    /// Append one row to every column
    ///
    /// The row must provide a value for every column of the recording, and
    /// its time stamp must not precede the last stored one. On failure
    /// nothing is modified. Values for keys that are not columns of this
    /// recording are skipped; the number skipped is returned.
    pub fn push_row(&mut self, row: &Row) -> Result<usize> {
        if self.series.is_empty() {
            return Err(RecorderError::Consistency(
                "recording has no columns".to_string(),
            ));
        }

        let missing: Vec<String> = self
            .series
            .keys()
            .filter(|key| !row.contains(**key))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(RecorderError::Consistency(format!(
                "row at t={} is missing columns [{}]",
                row.time(),
                missing.join(", ")
            )));
        }

        if self.series.contains_key(&SeriesKey::Time) {
            if let Some(last) = self.last_time() {
                if row.time() < last {
                    return Err(RecorderError::Consistency(format!(
                        "row time {} precedes last time {}",
                        row.time(),
                        last
                    )));
                }
            }
        }

        let mut ignored = 0;
        for (key, value) in row.iter() {
            match self.series.get_mut(&key) {
                Some(values) => values.push(value),
                None => ignored += 1,
            }
        }
        Ok(ignored)
    }

    /// Iterate over rows as value vectors in [`Recording::keys`] order
    pub fn rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.len()).map(move |i| self.series.values().map(|col| col[i]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_channels_seeds_time() {
        let rec = Recording::with_channels(&[8, 1]);
        assert_eq!(
            rec.keys(),
            vec![SeriesKey::Time, SeriesKey::Channel(1), SeriesKey::Channel(8)]
        );
        assert!(rec.is_empty());
    }

    #[test]
    fn test_push_row_rejects_missing_channel() {
        let mut rec = Recording::with_channels(&[1, 8]);
        let err = rec.push_row(&Row::new(0.1).with(1, 0.5)).unwrap_err();
        assert!(matches!(err, RecorderError::Consistency(_)));
        assert!(err.to_string().contains('8'));
        assert!(rec.is_empty());
        assert!(rec.is_consistent());
    }

    #[test]
    fn test_push_row_rejects_time_going_backwards() {
        let mut rec = Recording::with_channels(&[1]);
        rec.push_row(&Row::new(2.0).with(1, 0.5)).unwrap();
        assert!(rec.push_row(&Row::new(1.0).with(1, 0.5)).is_err());
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_push_row_skips_unknown_channels() {
        let mut rec = Recording::with_channels(&[1]);
        let ignored = rec.push_row(&Row::new(0.0).with(1, 0.5).with(3, 9.9)).unwrap();
        assert_eq!(ignored, 1);
        assert_eq!(rec.series(SeriesKey::Channel(3)), None);
        assert_eq!(rec.series(SeriesKey::Channel(1)), Some(&[0.5][..]));
    }

    #[test]
    fn test_push_row_without_columns() {
        let mut rec = Recording::new();
        assert!(rec.push_row(&Row::new(0.0)).is_err());
    }

    #[test]
    fn test_from_series_length_mismatch() {
        let mut series = BTreeMap::new();
        series.insert(SeriesKey::Time, vec![0.0, 1.0]);
        series.insert(SeriesKey::Channel(1), vec![0.5]);
        assert!(matches!(
            Recording::from_series(series),
            Err(RecorderError::Format(_))
        ));
    }

    #[test]
    fn test_rows_are_zipped_in_key_order() {
        let mut rec = Recording::with_channels(&[8, 1]);
        rec.push_row(&Row::new(0.25).with(1, 0.5).with(8, 1.2)).unwrap();
        rec.push_row(&Row::new(0.75).with(1, 0.6).with(8, 1.3)).unwrap();

        let rows: Vec<Vec<f64>> = rec.rows().collect();
        assert_eq!(rows, vec![vec![0.25, 0.5, 1.2], vec![0.75, 0.6, 1.3]]);
        assert_eq!(rec.last_time(), Some(0.75));
    }
}
