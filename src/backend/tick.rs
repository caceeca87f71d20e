//! Periodic snapshot tick for renderers and exporters
//!
//! A [`PeriodicTick`] owns one thread that wakes on a fixed interval, takes a
//! snapshot of the [`TimeSeriesStore`] and hands it to every registered
//! [`SnapshotConsumer`]. It knows nothing about the acquisition worker; the
//! store is the only thing the two share.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Sender};

use crate::config::ViewSettings;
use crate::session::{Recording, TimeSeriesStore};
use crate::types::ChannelId;

/// Information passed to consumers alongside each snapshot
#[derive(Debug, Clone, Default)]
pub struct TickContext {
    /// Number of this tick within the current session, starting at 1.
    /// Zero for out-of-band refreshes.
    pub tick: u64,
    /// Display options, including the viewlock flag
    pub view: ViewSettings,
    /// Channels that should be shown
    pub active_channels: Vec<ChannelId>,
}

/// Receiver of periodic snapshots (a plot, a status line, an autosaver)
pub trait SnapshotConsumer: Send {
    fn on_tick(&mut self, snapshot: &Recording, ctx: &TickContext);
}

impl<F> SnapshotConsumer for F
where
    F: FnMut(&Recording, &TickContext) + Send,
{
    fn on_tick(&mut self, snapshot: &Recording, ctx: &TickContext) {
        self(snapshot, ctx)
    }
}

/// Consumers shared between the backend and its tick thread
pub type SharedConsumers = Arc<Mutex<Vec<Box<dyn SnapshotConsumer>>>>;

/// View settings shared between the backend and its tick thread
pub type SharedView = Arc<Mutex<ViewSettings>>;

/// Everything a tick needs to build its context
#[derive(Clone)]
pub struct TickSource {
    pub store: Arc<TimeSeriesStore>,
    pub consumers: SharedConsumers,
    pub view: SharedView,
    pub active_channels: Vec<ChannelId>,
}

impl TickSource {
    /// Snapshot the store once and deliver it to every consumer
    pub fn deliver(&self, tick: u64) {
        let snapshot = self.store.snapshot();
        let ctx = TickContext {
            tick,
            view: self.view.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            active_channels: self.active_channels.clone(),
        };
        let mut consumers = self.consumers.lock().unwrap_or_else(PoisonError::into_inner);
        for consumer in consumers.iter_mut() {
            consumer.on_tick(&snapshot, &ctx);
        }
    }
}

/// Handle to a running tick thread
pub struct PeriodicTick {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl PeriodicTick {
    /// Spawn a tick thread firing every `interval`
    pub fn start(interval: Duration, source: TickSource) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = std::thread::spawn(move || {
            let ticker = crossbeam_channel::tick(interval);
            let mut count = 0u64;
            loop {
                select! {
                    // A message or dropped senders both mean stop
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        count += 1;
                        source.deliver(count);
                    }
                }
            }
            count
        });

        tracing::debug!("Tick started every {:?}", interval);
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Sender that stops the tick from another thread without joining it
    pub fn stop_sender(&self) -> Option<Sender<()>> {
        self.stop_tx.clone()
    }

    /// Stop the thread and wait for it. Returns the number of ticks fired.
    pub fn stop(&mut self) -> u64 {
        if let Some(tx) = self.stop_tx.take() {
            // Full means a stop is already pending
            let _ = tx.try_send(());
        }
        let ticks = match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                tracing::error!("Tick thread panicked");
                0
            }),
            None => return 0,
        };
        tracing::debug!("Tick stopped after {} ticks", ticks);
        ticks
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PeriodicTick {
    fn drop(&mut self) {
        self.stop();
    }
}
