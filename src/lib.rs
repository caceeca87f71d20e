//! # Chart Recorder: serial ADC acquisition core
//!
//! A chart recorder for multi-channel ADC boards that print one frame of
//! `CH<n> <volts>V` lines per conversion cycle over a serial port. The crate
//! parses those frames into timestamped rows, buffers them in a
//! concurrency-safe store, hands snapshots to periodic consumers and
//! persists recordings as CSV.
//!
//! ## Architecture
//!
//! - **Backend**: serial link, frame parser, acquisition worker thread and the
//!   control state machine (`connect`, `inject`, `stop`, `disconnect`)
//! - **Session**: the time-series store and CSV export/import
//! - **Config**: TOML configuration of the link, channels and tick cadence
//! - **Communication**: the store is the only state shared between the worker
//!   and the consumer tick
//!
//! ## Configuration
//!
//! Configuration is stored in the platform-appropriate data directory under
//! `chart-recorder`:
//!
//! - **Linux**: `~/.local/share/chart-recorder/`
//! - **macOS**: `~/Library/Application Support/chart-recorder/`
//! - **Windows**: `%APPDATA%\chart-recorder\`
//!
//! ## Example
//!
//! ```ignore
//! use chart_recorder::{AppConfig, RecorderBackend};
//!
//! fn main() -> chart_recorder::Result<()> {
//!     let config = AppConfig::load_or_default();
//!     let port = config.serial.port.clone();
//!     let mut backend = RecorderBackend::new(config)?;
//!
//!     backend.connect(&port)?;
//!     backend.inject()?;
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     backend.stop();
//!
//!     backend.save_recording("recording.csv")
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use backend::{FrameParser, RecorderBackend, SerialLink, SnapshotConsumer, TickContext};
pub use config::{AppConfig, ViewSettings};
pub use error::{RecorderError, Result};
pub use session::{Recording, TimeSeriesStore};
pub use types::{ChannelId, CollectionStats, ControlState, Row, SeriesKey};
