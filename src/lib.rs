use std::env;
use std::time::Duration;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::cli::Args;
use crate::config::io::ConfigIO;
use crate::console::{read_commands, snapshot_task};
use crate::device::connection::start_client;
use crate::error::AppRunError;

pub mod cli;
pub mod config;
pub mod console;
pub mod device;
pub mod error;

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .level_for("segway_debug", log_level_from_env())
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

// LOG_LEVEL=debug (or trace) shows every adapter request and telemetry frame
fn log_level_from_env() -> log::LevelFilter {
    env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(log::LevelFilter::Info)
}

pub async fn run(args: Args) -> Result<(), AppRunError> {
    let config_io = ConfigIO::new_sync(args.config.clone())?;
    // only one instance may drive the vehicle per config file
    let mut locker = config_io.locker()?;
    let _lock = locker.lock()?;

    let config = match config_io.read().await {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load config {}: {}; using defaults", config_io.path().to_string_lossy(), err);
            Default::default()
        },
    };
    let config = args.apply(config);
    info!("Starting with {:?}", config.tuning);

    let cancel = CancellationToken::new();
    let (client, client_handle) = start_client(cancel.clone(), config.tuning, config.telemetry_default);
    let snapshot_handle = snapshot_task(
        cancel.clone(),
        client.clone(),
        Duration::from_millis(config.snapshot_interval_ms.max(1)),
        args.json,
    );

    if config.auto_connect {
        client.connect();
    }

    let result = read_commands(cancel.clone(), client, args.json).await;
    cancel.cancel();

    snapshot_handle.await.expect("Failed to join snapshot task");
    client_handle.await.expect("Failed to join client task");

    result?;
    Ok(())
}
