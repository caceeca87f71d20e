//! Chart Recorder - Main Entry Point
//!
//! Headless front end for the acquisition core: record from a serial ADC
//! board into a CSV file, inspect a saved recording, or list serial ports.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chart_recorder::{
    backend::{list_ports, MockLink},
    config::AppConfig,
    session::import_from_path,
    ControlState, RecorderBackend, RecorderError, Recording, SeriesKey, TickContext,
};
use clap::{Parser, Subcommand};
use crossbeam_channel::{after, never, select};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "chart-recorder", version, about = "Serial ADC chart recorder")]
struct Cli {
    /// Config file (defaults to the platform data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record from the serial port until Enter is pressed or the duration ends
    Record {
        /// Serial device, overriding the config
        #[arg(short, long)]
        port: Option<String>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// Output CSV file (defaults to a timestamped name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record from a built-in signal generator instead of a device
        #[arg(long)]
        demo: bool,
    },
    /// Print a summary of a saved recording
    Inspect {
        /// CSV file written by `record`
        file: PathBuf,
    },
    /// List available serial ports
    Ports,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let _guard = init_logging(&config);

    match cli.command {
        Command::Record {
            port,
            duration,
            output,
            demo,
        } => record(config, port, duration, output, demo),
        Command::Inspect { file } => inspect(&file),
        Command::Ports => ports(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load_or_default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Install the console subscriber, plus a file layer when configured
fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = match &config.logging.file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "chart-recorder.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chart_recorder=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn record(
    config: AppConfig,
    port: Option<String>,
    duration: Option<f64>,
    output: Option<PathBuf>,
    demo: bool,
) -> anyhow::Result<()> {
    let duration = duration.map(parse_duration).transpose()?;
    let port = port.unwrap_or_else(|| config.serial.port.clone());
    let output = output.unwrap_or_else(default_output_path);

    let mut backend = if demo {
        let link = MockLink::demo(&config.channels.active, Duration::from_millis(100));
        RecorderBackend::with_link(config, Box::new(link))
    } else {
        RecorderBackend::new(config)
    }
    .context("Invalid configuration")?;
    backend.add_consumer(Box::new(status_line));

    if let Err(e) = backend.connect(&port) {
        if matches!(e, RecorderError::Connection { .. }) {
            eprintln!(
                "Could not open {}. Check that the device is plugged in and that \
                 your user may access it (e.g. membership in the dialout group).",
                port
            );
        }
        return Err(e).context("Failed to connect");
    }

    backend.inject().context("Failed to start recording")?;
    match duration {
        Some(limit) => tracing::info!("Recording for {:?}, press Enter to stop early", limit),
        None => tracing::info!("Recording, press Enter to stop"),
    }
    wait_for_stop(&mut backend, duration);

    backend.stop();
    if let Some(err) = backend.last_error() {
        tracing::error!("Recording ended early: {}", err);
    }

    let stats = backend.stats();
    tracing::info!(
        "{} rows, {} frames dropped, {} empty frames, {} read timeouts",
        stats.rows_appended,
        stats.frames_dropped,
        stats.empty_frames,
        stats.read_timeouts
    );

    backend
        .save_recording(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Saved {} rows to {}", backend.snapshot().len(), output.display());

    backend.disconnect();
    Ok(())
}

/// Block until Enter, the duration elapsing, or the session ending on its own
fn wait_for_stop(backend: &mut RecorderBackend, duration: Option<Duration>) {
    let (enter_tx, enter_rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            let _ = enter_tx.send(());
        }
    });

    let deadline = match duration {
        Some(limit) => after(limit),
        None => never(),
    };
    let poll = crossbeam_channel::tick(Duration::from_millis(200));

    loop {
        select! {
            recv(enter_rx) -> _ => break,
            recv(deadline) -> _ => break,
            recv(poll) -> _ => {
                if backend.state() != ControlState::Streaming {
                    break;
                }
            }
        }
    }
}

/// Consumer printing the newest values on every tick
fn status_line(snapshot: &Recording, ctx: &TickContext) {
    let Some(time) = snapshot.last_time() else {
        return;
    };
    let values: Vec<String> = ctx
        .active_channels
        .iter()
        .filter_map(|ch| {
            let last = snapshot.series(SeriesKey::Channel(*ch))?.last()?;
            Some(format!("CH{} {:.3}V", ch, last))
        })
        .collect();
    tracing::info!("t={:.2}s rows={} {}", time, snapshot.len(), values.join("  "));

    if let Some(first) = ctx.active_channels.first() {
        if let Some(bounds) = ctx.view.bounds_for(snapshot, *first) {
            tracing::trace!("View CH{}: {:?}", first, bounds);
        }
    }
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    let recording = import_from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    println!("{}: {} rows", file.display(), recording.len());
    for key in recording.keys() {
        let Some(series) = recording.series(key) else {
            continue;
        };
        let min = series.iter().copied().fold(f64::INFINITY, f64::min);
        let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        match series.last() {
            Some(last) => println!(
                "  {:>6}  min {:>10.4}  max {:>10.4}  last {:>10.4}",
                key, min, max, last
            ),
            None => println!("  {:>6}  (empty)", key),
        }
    }
    Ok(())
}

fn ports() -> anyhow::Result<()> {
    let ports = list_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

/// Turn `--duration` seconds into a `Duration`
fn parse_duration(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid duration {}s: must be finite and non-negative", secs))
}

fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "recording_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(2.5).unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_duration(0.0).unwrap(), Duration::ZERO);
        assert!(parse_duration(f64::INFINITY).is_err());
        assert!(parse_duration(f64::NAN).is_err());
        assert!(parse_duration(-1.0).is_err());
    }

    #[test]
    fn test_cli_parses_record() {
        let cli = Cli::try_parse_from(["chart-recorder", "record", "--demo", "-d", "1.5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Record { demo: true, duration: Some(d), .. } if d == 1.5
        ));
    }
}
