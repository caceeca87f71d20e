//! Recording storage and persistence module
//!
//! This module holds the data side of a recording session: the columnar
//! [`Recording`], the lock-guarded [`TimeSeriesStore`] the acquisition worker
//! writes into, and CSV export/import.
//!
//! # Features
//!
//! - Atomic row appends that never leave columns with unequal lengths
//! - Detached snapshots for consumers running on another thread
//! - CSV export with `Time` first and channels in ascending order
//! - CSV import that leaves the active recording untouched on failure
//! - Autosave consumer for the periodic tick

pub mod exporter;
pub mod store;
pub mod types;

pub use exporter::{export_to_path, import_from_path, AutosaveConsumer};
pub use store::TimeSeriesStore;
pub use types::Recording;
