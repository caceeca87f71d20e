//! Acquisition worker thread
//!
//! This module contains the producer loop that runs in its own thread for
//! the duration of a streaming session. It owns the serial link while it
//! runs and hands it back when it exits.
//!
//! # Loop
//!
//! Each iteration reads one line. Data lines are collected into the current
//! frame; the blank sentinel line closes the frame, which is then parsed and,
//! if it yields a row, appended to the [`TimeSeriesStore`]. After every
//! iteration the cancel token is checked and the loop exits without touching
//! the partial frame. The read itself is bounded by the link timeout, so
//! `stop` is observed within one timeout plus one frame.
//!
//! # Failure Handling
//!
//! - Malformed frames are dropped and counted; they never end the session.
//! - A store consistency error or a failing device read ends the session.
//!   The error is returned in [`WorkerExit::outcome`].

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::Sender;

use crate::backend::cancel::CancelToken;
use crate::backend::link_trait::SerialLink;
use crate::backend::parser::{is_sentinel, FrameParser};
use crate::error::Result;
use crate::session::TimeSeriesStore;
use crate::types::CollectionStats;

/// Statistics shared between the worker and the backend
pub type SharedStats = Arc<Mutex<CollectionStats>>;

/// What a finished worker hands back
pub struct WorkerExit {
    /// The serial link, still open
    pub link: Box<dyn SerialLink>,
    /// `Ok` after a requested stop, the fatal error otherwise
    pub outcome: Result<()>,
    /// Final statistics of the session
    pub stats: CollectionStats,
}

/// The producer that turns a line stream into rows
pub struct AcquisitionWorker {
    link: Box<dyn SerialLink>,
    parser: FrameParser,
    store: Arc<TimeSeriesStore>,
    cancel: CancelToken,
    stats: SharedStats,
    /// Whether a frame boundary has been seen (or is not required)
    synced: bool,
    /// Data lines of the frame in progress
    frame: Vec<Vec<u8>>,
    /// Notified once when the loop exits, for whatever reason
    exit_signal: Option<Sender<()>>,
}

impl AcquisitionWorker {
    /// Create a worker reading from `link` into `store`
    pub fn new(
        link: Box<dyn SerialLink>,
        parser: FrameParser,
        store: Arc<TimeSeriesStore>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            link,
            parser,
            store,
            cancel,
            stats: Arc::new(Mutex::new(CollectionStats::default())),
            synced: true,
            frame: Vec::new(),
            exit_signal: None,
        }
    }

    /// Discard everything up to the first sentinel line
    pub fn sync_to_frame_boundary(mut self, enabled: bool) -> Self {
        self.synced = !enabled;
        self
    }

    /// Send `()` on `signal` when the loop exits
    pub fn notify_on_exit(mut self, signal: Sender<()>) -> Self {
        self.exit_signal = Some(signal);
        self
    }

    /// Handle for reading statistics while the worker runs
    pub fn stats_handle(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Run until cancelled or until a fatal error
    pub fn run(mut self) -> WorkerExit {
        tracing::info!("Acquisition worker started");

        let outcome = loop {
            if let Err(e) = self.step() {
                break Err(e);
            }
            if self.cancel.is_cancelled() {
                break Ok(());
            }
        };

        if let Some(signal) = self.exit_signal.take() {
            let _ = signal.try_send(());
        }

        let stats = self.snapshot_stats();
        match &outcome {
            Ok(()) => tracing::info!(
                "Acquisition worker stopped: {} rows, {} frames dropped",
                stats.rows_appended,
                stats.frames_dropped
            ),
            Err(e) => tracing::error!("Acquisition aborted: {}", e),
        }
        if !self.frame.is_empty() {
            tracing::debug!("Discarding partial frame of {} lines", self.frame.len());
        }

        WorkerExit {
            link: self.link,
            outcome,
            stats,
        }
    }

    /// One loop iteration: read a line and act on it
    fn step(&mut self) -> Result<()> {
        let line = self.link.read_line(&self.cancel)?;

        if line.is_empty() {
            self.update_stats(|s| s.read_timeouts += 1);
            return Ok(());
        }
        self.update_stats(|s| s.lines_read += 1);

        if is_sentinel(&line) {
            if self.synced {
                self.finish_frame()?;
            } else {
                tracing::debug!("Synchronized on frame boundary");
                self.synced = true;
                self.frame.clear();
            }
        } else if self.synced {
            self.frame.push(line);
        }
        Ok(())
    }

    /// Parse and store the completed frame
    fn finish_frame(&mut self) -> Result<()> {
        let frame = std::mem::take(&mut self.frame);
        self.update_stats(|s| s.frames_completed += 1);

        if frame.is_empty() {
            self.update_stats(|s| s.empty_frames += 1);
            return Ok(());
        }

        let Some(row) = self.parser.parse(frame.as_slice()) else {
            tracing::debug!("Dropped malformed frame of {} lines", frame.len());
            self.update_stats(|s| s.frames_dropped += 1);
            return Ok(());
        };

        self.store.append(&row)?;
        self.update_stats(|s| s.rows_appended += 1);
        Ok(())
    }

    fn update_stats(&self, f: impl FnOnce(&mut CollectionStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *stats);
    }

    fn snapshot_stats(&self) -> CollectionStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
