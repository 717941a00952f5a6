//! Keyboard Macro Recorder - Main Entry Point
//!
//! `keymacro record <PATH>` captures keystrokes until the stop key is pressed
//! and saves them; `keymacro play <PATH>` replays a saved recording.

use anyhow::Context;
use clap::{Parser, Subcommand};
use keymacro_rs::{
    config::{self, AppConfig},
    input,
    session::{serializer, Player, Recorder},
    RepeatCount,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "keymacro", about = "Record and replay keyboard macros", version)]
struct Cli {
    /// Configuration file (defaults to the application data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record keystrokes until the stop key is pressed
    Record {
        /// Where to save the recording
        path: PathBuf,

        /// Key that ends the recording
        #[arg(long)]
        stop_key: Option<String>,
    },
    /// Replay a saved recording
    Play {
        /// Recording to replay
        path: PathBuf,

        /// Number of repetitions, or `inf` to loop until the stop key
        #[arg(long)]
        repeat: Option<RepeatCount>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::load_or_default(None),
    };

    let _log_guard = init_logging(&config);
    tracing::debug!("Configuration: {:?}", config_source(&cli));

    match cli.command {
        Command::Record { path, stop_key } => record(&config, &path, stop_key),
        Command::Play { path, repeat } => play(&config, &path, repeat),
    }
}

/// Install the tracing subscriber; the guard flushes the log file on drop
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_filter = config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| "info,keymacro_rs=debug".to_string());

    let (file_layer, guard) = match &config.logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "keymacro.log");
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
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn config_source(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(config::config_path)
}

fn record(config: &AppConfig, path: &Path, stop_key: Option<String>) -> anyhow::Result<()> {
    let mut settings = config.recording.clone();
    if let Some(key) = stop_key {
        settings.stop_key = key;
    }

    serializer::prepare_destination(path)?;
    let hook = input::native_hook()?;
    let mut recorder = Recorder::new(hook, settings.clone());
    recorder.start()?;
    println!("Recording... press '{}' to stop", settings.stop_key);

    let log = recorder.wait()?.unwrap_or_default();
    serializer::save_with(&log, path, &config.storage)?;

    println!(
        "Saved {} events ({:.3}s) to {}",
        log.len(),
        log.duration().as_secs_f64(),
        path.display()
    );
    Ok(())
}

fn play(config: &AppConfig, path: &Path, repeat: Option<RepeatCount>) -> anyhow::Result<()> {
    let repeat = repeat.unwrap_or_else(|| config.playback.default_repeat());
    let log = serializer::load(path)?;
    let dispatcher = input::native_dispatcher()?;

    let player = Player::new(dispatcher, config.playback.clone());
    let handle = player.start(Arc::new(log), repeat)?;

    // The stop key cancels playback when a hook is available
    let stop_key = config.recording.stop_key.clone();
    match input::native_hook() {
        Ok(hook) => {
            let cancel = handle.cancel_token();
            println!("Playing {} (repeat {}), press '{}' to stop", path.display(), repeat, stop_key);
            std::thread::Builder::new()
                .name("keymacro-stop-watch".to_string())
                .spawn(move || match hook.wait_for_key(&stop_key, None) {
                    Ok(_) => cancel.cancel(),
                    Err(e) => tracing::warn!("Stop key watcher ended: {}", e),
                })
                .context("Failed to spawn stop key watcher")?;
        }
        Err(e) => {
            tracing::warn!("Stop key unavailable during playback: {}", e);
            println!("Playing {} (repeat {})", path.display(), repeat);
        }
    }

    let report = handle.wait()?;
    println!(
        "Playback {}: {} iterations, {} events, {} dispatch failures",
        if report.was_cancelled() { "stopped" } else { "finished" },
        report.iterations_completed,
        report.events_dispatched,
        report.failure_count
    );
    Ok(())
}
