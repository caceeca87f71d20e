//! Mock construction helpers

use std::time::Duration;

use chart_recorder::backend::{MockFeeder, MockLink};
use chart_recorder::{AppConfig, ChannelId, RecorderBackend};

/// Config with short timeouts so sessions stop quickly
pub fn fast_config(active: &[ChannelId]) -> AppConfig {
    let mut config = AppConfig::default();
    config.channels.active = active.to_vec();
    config.serial.read_timeout_ms = 20;
    config.acquisition.tick_interval_ms = 10;
    config
}

/// Backend around an empty mock link plus the feeder for that link
pub fn create_mock_backend(active: &[ChannelId]) -> (RecorderBackend, MockFeeder) {
    create_backend_with(fast_config(active), MockLink::new())
}

pub fn create_backend_with(config: AppConfig, link: MockLink) -> (RecorderBackend, MockFeeder) {
    let link = link.with_idle_timeout(Duration::from_millis(2));
    let feeder = link.feeder();
    let backend = RecorderBackend::with_link(config, Box::new(link)).expect("valid test config");
    (backend, feeder)
}
