//! Backend module for serial acquisition
//!
//! This module owns everything that talks to the ADC board. The acquisition
//! itself runs in a separate thread so the caller stays responsive; the only
//! state shared with that thread is the [`TimeSeriesStore`].
//!
//! # Architecture
//!
//! - [`RecorderBackend`] - Control state machine (connect, inject, stop, disconnect)
//! - [`AcquisitionWorker`] - Producer loop turning lines into rows
//! - [`FrameParser`] - Two-token grammar for one frame of channel lines
//! - [`PeriodicTick`] - Consumer tick handing snapshots to [`SnapshotConsumer`]s
//!
//! # Components
//!
//! - [`SerialLink`] - Line source abstraction
//! - [`SerialPortLink`] - Real device via `serialport`
//! - [`MockLink`] - Scripted line source for tests and the demo mode
//! - [`CancelToken`] - Cooperative stop flag passed into blocking reads
//!
//! # Example
//!
//! ```ignore
//! use chart_recorder::backend::RecorderBackend;
//! use chart_recorder::config::AppConfig;
//!
//! let mut backend = RecorderBackend::new(AppConfig::default())?;
//! backend.add_consumer(Box::new(|snap: &Recording, _ctx: &TickContext| {
//!     println!("{} rows", snap.len());
//! }));
//!
//! backend.connect("/dev/ttyUSB0")?;
//! backend.inject()?;
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! backend.stop();
//! backend.disconnect();
//! ```

pub mod cancel;
pub mod link_trait;
pub mod mock_link;
pub mod parser;
pub mod serial;
pub mod tick;
pub mod worker;

pub use cancel::CancelToken;
pub use link_trait::{LinkStats, SerialLink};
pub use mock_link::{MockFeeder, MockLink};
pub use parser::FrameParser;
pub use serial::{list_ports, PortInfo, SerialPortLink};
pub use tick::{PeriodicTick, SnapshotConsumer, TickContext, TickSource};
pub use worker::{AcquisitionWorker, SharedStats, WorkerExit};

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::config::{AppConfig, ViewSettings};
use crate::error::{RecorderError, Result, ResultExt};
use crate::session::{exporter, AutosaveConsumer, Recording, TimeSeriesStore};
use crate::types::{ChannelId, CollectionStats, ControlState};
use tick::{SharedConsumers, SharedView};

/// A running acquisition session
struct Session {
    cancel: CancelToken,
    handle: JoinHandle<WorkerExit>,
    tick: PeriodicTick,
    stats: SharedStats,
}

/// Control state machine for one serial link
///
/// The link lives in the backend while idle and is moved into the worker
/// thread for the duration of a session.
pub struct RecorderBackend {
    config: AppConfig,
    link: Option<Box<dyn SerialLink>>,
    /// Device the link is open on
    port: Option<String>,
    store: Arc<TimeSeriesStore>,
    consumers: SharedConsumers,
    view: SharedView,
    session: Option<Session>,
    last_stats: CollectionStats,
    last_error: Option<RecorderError>,
}

impl RecorderBackend {
    /// Create a backend driving a real serial device
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_link(config, Box::new(SerialPortLink::new()))
    }

    /// Create a backend around any line source
    ///
    /// Fails with [`RecorderError::Config`] when `config` does not validate.
    pub fn with_link(config: AppConfig, link: Box<dyn SerialLink>) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(TimeSeriesStore::with_channels(&config.channels.active));
        let view = Arc::new(Mutex::new(config.view.clone()));

        let mut consumers: Vec<Box<dyn SnapshotConsumer>> = Vec::new();
        if let Some(path) = &config.export.autosave_path {
            tracing::info!("Autosaving to {:?} on every tick", path);
            consumers.push(Box::new(AutosaveConsumer::new(path.clone())));
        }

        Ok(Self {
            config,
            link: Some(link),
            port: None,
            store,
            consumers: Arc::new(Mutex::new(consumers)),
            view,
            session: None,
            last_stats: CollectionStats::default(),
            last_error: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current state, reaping a worker that ended on its own
    pub fn state(&mut self) -> ControlState {
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.handle.is_finished())
        {
            self.finish_session();
        }

        if self.session.is_some() {
            ControlState::Streaming
        } else if self.link.as_ref().is_some_and(|l| l.is_connected()) {
            ControlState::Idle
        } else {
            ControlState::Disconnected
        }
    }

    /// Device the link is open on, if any
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn is_connected(&mut self) -> bool {
        self.state().is_connected()
    }

    pub fn is_streaming(&mut self) -> bool {
        self.state() == ControlState::Streaming
    }

    // ==================== Transitions ====================

    /// Open `port` using the configured baud rate and timeout
    ///
    /// Connecting while connected stops any session and closes the current
    /// link first. If `port` then fails to open, the previous device is
    /// reopened so the backend stays connected (and idle) where it was;
    /// only if that also fails is it left disconnected.
    pub fn connect(&mut self, port: &str) -> Result<()> {
        let previous = if self.is_connected() {
            self.port.clone()
        } else {
            None
        };
        self.disconnect();

        let link = self
            .link
            .get_or_insert_with(|| -> Box<dyn SerialLink> { Box::new(SerialPortLink::new()) });

        if let Err(e) = link.connect(&self.config.serial.with_port(port)) {
            if let Some(previous) = previous {
                match link.connect(&self.config.serial.with_port(&previous)) {
                    Ok(()) => {
                        tracing::warn!("Opening {} failed, staying on {}", port, previous);
                        self.port = Some(previous);
                    }
                    Err(restore) => {
                        tracing::error!("Could not reopen {}: {}", previous, restore);
                    }
                }
            }
            return Err(e);
        }
        link.reset_stats();
        self.port = Some(port.to_string());
        self.last_error = None;

        tracing::info!("Connected to {}", port);
        Ok(())
    }

    /// Stop any session and close the link. Does nothing when disconnected.
    pub fn disconnect(&mut self) {
        self.stop();
        if let Some(link) = self.link.as_mut() {
            if link.is_connected() {
                link.disconnect();
                tracing::info!("Disconnected");
            }
        }
        self.port = None;
    }

    /// Disconnect when connected, connect to `port` otherwise
    ///
    /// Returns the resulting state.
    pub fn toggle_connection(&mut self, port: &str) -> Result<ControlState> {
        if self.is_connected() {
            self.disconnect();
        } else {
            self.connect(port)?;
        }
        Ok(self.state())
    }

    /// Start a new recording
    ///
    /// Resets the store to the configured channels, then spawns the
    /// acquisition worker and the consumer tick. A running session is
    /// stopped first.
    pub fn inject(&mut self) -> Result<()> {
        match self.state() {
            ControlState::Disconnected => return Err(RecorderError::NotConnected),
            ControlState::Streaming => self.stop(),
            ControlState::Idle => {}
        }

        let link = self.link.take().ok_or(RecorderError::NotConnected)?;
        let channels = self.config.channels.active.clone();
        self.store.reset(&channels);
        self.last_error = None;

        // The tick ends with the worker, even when nobody calls `stop`
        let mut tick = PeriodicTick::start(
            self.config.acquisition.tick_interval(),
            self.tick_source(channels),
        );

        let cancel = CancelToken::new();
        let mut worker = AcquisitionWorker::new(
            link,
            FrameParser::new(self.config.channels.total),
            self.store.clone(),
            cancel.clone(),
        )
        .sync_to_frame_boundary(self.config.acquisition.sync_to_frame_boundary);
        if let Some(stop_tick) = tick.stop_sender() {
            worker = worker.notify_on_exit(stop_tick);
        }
        let stats = worker.stats_handle();

        let spawned = std::thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || worker.run());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                tick.stop();
                return Err(RecorderError::Io(e)).context("Failed to spawn acquisition thread");
            }
        };

        self.session = Some(Session {
            cancel,
            handle,
            tick,
            stats,
        });
        tracing::info!("Recording started");
        Ok(())
    }

    /// Stop the running session and wait for the worker to exit
    ///
    /// Does nothing when no session is running.
    pub fn stop(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        session.cancel.cancel();
        self.finish_session();
    }

    /// Join the worker of the current session and take back its link
    fn finish_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.cancel.cancel();
        session.tick.stop();

        match session.handle.join() {
            Ok(exit) => {
                self.link = Some(exit.link);
                self.last_stats = exit.stats;
                if let Err(e) = exit.outcome {
                    tracing::warn!("Recording ended with error: {}", e);
                    self.last_error = Some(e);
                }
            }
            Err(_) => {
                tracing::error!("Acquisition thread panicked, serial link lost");
                self.last_stats = session
                    .stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                self.last_error = Some(RecorderError::Worker(
                    "acquisition thread panicked".to_string(),
                ));
            }
        }

        // Final frame for consumers so they see every row of the session
        self.refresh();
        tracing::info!("Recording stopped with {} rows", self.store.len());
    }

    // ==================== Data Access ====================

    /// Shared handle to the store
    pub fn store(&self) -> Arc<TimeSeriesStore> {
        self.store.clone()
    }

    /// Copy of the current recording
    pub fn snapshot(&self) -> Recording {
        self.store.snapshot()
    }

    /// Statistics of the running session, or of the last one
    pub fn stats(&self) -> CollectionStats {
        match &self.session {
            Some(session) => session
                .stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            None => self.last_stats.clone(),
        }
    }

    /// Statistics of the serial link itself, unavailable while streaming
    pub fn link_stats(&self) -> Option<LinkStats> {
        self.link.as_ref().map(|l| l.stats())
    }

    /// Error that ended the last session, if any
    pub fn last_error(&self) -> Option<&RecorderError> {
        self.last_error.as_ref()
    }

    // ==================== Consumers ====================

    /// Register a consumer for periodic snapshots
    ///
    /// Takes effect immediately, including for a running session.
    pub fn add_consumer(&mut self, consumer: Box<dyn SnapshotConsumer>) {
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(consumer);
    }

    pub fn view(&self) -> ViewSettings {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Flip the viewlock flag and return the new value
    pub fn toggle_viewlock(&mut self) -> bool {
        self.view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .toggle_viewlock()
    }

    /// Deliver one snapshot to every consumer outside the tick cadence
    pub fn refresh(&self) {
        self.tick_source(self.config.channels.active.clone()).deliver(0);
    }

    fn tick_source(&self, active_channels: Vec<ChannelId>) -> TickSource {
        TickSource {
            store: self.store.clone(),
            consumers: self.consumers.clone(),
            view: self.view.clone(),
            active_channels,
        }
    }

    // ==================== Persistence ====================

    /// Write the current recording to a CSV file
    pub fn save_recording(&self, path: impl AsRef<Path>) -> Result<()> {
        exporter::export_to_path(&self.store.snapshot(), path)
    }

    /// Replace the current recording with a CSV file
    ///
    /// A running session is stopped first. On a format error the current
    /// recording is kept.
    pub fn load_recording(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.stop();
        let recording = exporter::import_from_path(path)?;
        self.store.load(recording)?;
        self.refresh();
        Ok(())
    }
}

impl Drop for RecorderBackend {
    fn drop(&mut self) {
        self.disconnect();
    }
}
