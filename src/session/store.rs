//! Concurrency-safe time-series buffer
//!
//! [`TimeSeriesStore`] owns the active [`Recording`]. The acquisition worker
//! appends into it while a periodic consumer reads copies of it. Every
//! mutation runs under the write lock for the whole row, so a snapshot either
//! contains a row in every column or in none.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{RecorderError, Result};
use crate::types::{ChannelId, Row, SeriesKey};

use super::types::Recording;

/// Shared columnar buffer for one recording
#[derive(Debug, Default)]
pub struct TimeSeriesStore {
    recording: RwLock<Recording>,
}

impl TimeSeriesStore {
    /// Create a store holding an empty recording with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already reset to `channels`
    pub fn with_channels(channels: &[ChannelId]) -> Self {
        Self {
            recording: RwLock::new(Recording::with_channels(channels)),
        }
    }

    /// Discard the recording and start a new one with a `Time` column plus
    /// one column per channel
    pub fn reset(&self, channels: &[ChannelId]) {
        *self.write() = Recording::with_channels(channels);
        tracing::debug!("Store reset with channels {:?}", channels);
    }

    /// Append a row atomically
    ///
    /// Rejects rows that lack a column of the recording or go back in time
    /// with [`RecorderError::Consistency`]; the recording is left untouched
    /// in that case. Channels that are not columns of the recording are
    /// skipped.
    pub fn append(&self, row: &Row) -> Result<()> {
        let ignored = self.write().push_row(row)?;
        if ignored > 0 {
            tracing::trace!("Skipped {} value(s) outside the recorded channels", ignored);
        }
        Ok(())
    }

    /// Copy of the current recording
    ///
    /// The copy is detached from the store; later appends do not affect it.
    pub fn snapshot(&self) -> Recording {
        self.read().clone()
    }

    /// Replace the whole recording, e.g. with an imported one
    pub fn load(&self, recording: Recording) -> Result<()> {
        if !recording.is_consistent() {
            return Err(RecorderError::Consistency(
                "loaded recording has columns of unequal length".to_string(),
            ));
        }
        let rows = recording.len();
        *self.write() = recording;
        tracing::debug!("Store loaded with {} rows", rows);
        Ok(())
    }

    /// Header (ordered keys) and row-major values of the current recording
    pub fn serialize(&self) -> (Vec<SeriesKey>, Vec<Vec<f64>>) {
        let recording = self.read();
        (recording.keys(), recording.rows().collect())
    }

    /// Number of rows in the current recording
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the current recording holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column keys of the current recording
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.read().keys()
    }

    // A panic while holding the lock cannot leave a half-applied row behind,
    // since `push_row` validates before mutating.
    fn read(&self) -> RwLockReadGuard<'_, Recording> {
        self.recording.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Recording> {
        self.recording.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_new_store_is_empty() {
        let store = TimeSeriesStore::new();
        assert!(store.is_empty());
        assert!(store.keys().is_empty());
        assert!(store.append(&Row::new(0.0)).is_err());
    }

    #[test]
    fn test_reset_clears_rows() {
        let store = TimeSeriesStore::with_channels(&[1, 8]);
        store.append(&Row::new(0.1).with(1, 0.5).with(8, 1.2)).unwrap();
        assert_eq!(store.len(), 1);

        store.reset(&[2]);
        assert!(store.is_empty());
        assert_eq!(store.keys(), vec![SeriesKey::Time, SeriesKey::Channel(2)]);
    }

    #[test]
    fn test_rejected_append_leaves_store_untouched() {
        let store = TimeSeriesStore::with_channels(&[1, 8]);
        store.append(&Row::new(0.1).with(1, 0.5).with(8, 1.2)).unwrap();

        let err = store.append(&Row::new(0.2).with(1, 0.6)).unwrap_err();
        assert!(matches!(err, RecorderError::Consistency(_)));

        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap.is_consistent());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = TimeSeriesStore::with_channels(&[1]);
        store.append(&Row::new(0.0).with(1, 1.0)).unwrap();
        let snap = store.snapshot();
        store.append(&Row::new(1.0).with(1, 2.0)).unwrap();

        assert_eq!(snap.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_replaces_recording() {
        let store = TimeSeriesStore::with_channels(&[1]);
        store.append(&Row::new(0.0).with(1, 1.0)).unwrap();

        let mut imported = Recording::with_channels(&[4, 5]);
        imported.push_row(&Row::new(0.0).with(4, 0.1).with(5, 0.2)).unwrap();
        imported.push_row(&Row::new(0.5).with(4, 0.3).with(5, 0.4)).unwrap();
        store.load(imported.clone()).unwrap();

        assert_eq!(store.snapshot(), imported);
    }

    #[test]
    fn test_serialize_one_row() {
        let store = TimeSeriesStore::with_channels(&[1, 8]);
        store.append(&Row::new(0.25).with(1, 0.5).with(8, 1.2)).unwrap();

        let (header, rows) = store.serialize();
        assert_eq!(
            header,
            vec![SeriesKey::Time, SeriesKey::Channel(1), SeriesKey::Channel(8)]
        );
        assert_eq!(rows, vec![vec![0.25, 0.5, 1.2]]);
    }

    #[test]
    fn test_concurrent_snapshots_are_consistent() {
        let channels = [0, 1, 2, 3];
        let store = Arc::new(TimeSeriesStore::with_channels(&channels));

        let producer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    let mut row = Row::new(i as f64 * 0.001);
                    for ch in channels {
                        row.insert(ch, i as f64);
                    }
                    store.append(&row).unwrap();
                }
            })
        };

        let mut observed = 0;
        while observed < 1000 {
            let snap = store.snapshot();
            assert!(snap.is_consistent(), "snapshot with unequal columns");
            observed = snap.len();
        }
        producer.join().unwrap();
    }

    proptest! {
        #[test]
        fn test_every_column_has_one_value_per_accepted_row(
            rows in prop::collection::vec(
                (prop::option::of(0.0f64..5.0), prop::option::of(0.0f64..5.0)),
                0..60
            )
        ) {
            let store = TimeSeriesStore::with_channels(&[1, 8]);
            let mut accepted = 0;
            for (i, (a, b)) in rows.iter().enumerate() {
                let mut row = Row::new(i as f64);
                if let Some(a) = a { row.insert(1, *a); }
                if let Some(b) = b { row.insert(8, *b); }
                if store.append(&row).is_ok() {
                    accepted += 1;
                }
            }

            let snap = store.snapshot();
            prop_assert!(snap.is_consistent());
            prop_assert_eq!(snap.len(), accepted);
            let complete = rows.iter().filter(|(a, b)| a.is_some() && b.is_some()).count();
            prop_assert_eq!(accepted, complete);
        }
    }
}
