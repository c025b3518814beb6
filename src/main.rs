//! band-recorder CLI
//!
//! Finds a sensor band, records one session to the log directory and
//! optionally forwards samples to a remote stream.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use sensorband_ble::{
    BandRecorder, BandScanner, ChannelStatusReporter, Config, ConnectionState, EnvCredentials,
    Error, FsStorage, HttpIngestClient, RemoteStreamSink, Result, StatusUpdate,
};

#[derive(Parser, Debug)]
#[command(name = "band-recorder")]
#[command(version)]
#[command(about = "Record accelerometer samples from a BLE sensor band", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Band identifier, e.g. 07 for BP07
    #[arg(long)]
    device_id: Option<String>,

    /// Discovery window in seconds
    #[arg(long)]
    scan_timeout: Option<u64>,

    /// Directory for session logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Do not forward samples to the remote stream
    #[arg(long)]
    no_remote: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Config::load(path)?
        }
        None => Config::load_default()?,
    };

    if let Some(device_id) = &cli.device_id {
        config.device_id = device_id.clone();
    }
    if let Some(secs) = cli.scan_timeout {
        config.scan_timeout_secs = secs;
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = log_dir.clone();
    }
    if cli.no_remote {
        config.remote = None;
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: Config, status: Arc<ChannelStatusReporter>) -> Result<()> {
    let scanner = BandScanner::new().await?;
    let storage = Arc::new(FsStorage::new(&config.log_dir));

    let mut recorder = BandRecorder::new(scanner, config.session_settings(), storage, status)
        .with_scan_window(config.scan_window())
        .with_connect_retry(config.connect_attempts, config.retry_delay());

    if let Some(remote) = &config.remote {
        let client = HttpIngestClient::new(
            &remote.endpoint,
            &remote.region,
            Arc::new(EnvCredentials::new()),
            remote.request_timeout(),
        )?;
        info!(
            "Forwarding samples to stream {} via {}",
            remote.stream_name, remote.endpoint
        );
        recorder = recorder.with_remote(Arc::new(RemoteStreamSink::new(
            &remote.stream_name,
            &remote.region,
            Arc::new(client),
        )));
    }

    let Some(band) = recorder.find_band().await? else {
        return Err(Error::BandNotFound {
            name: config.band_name(),
        });
    };

    let mut session = recorder.start_session(band);

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            true
        }
        _ = session.wait_for_state(ConnectionState::Disconnected) => false,
    };

    if interrupted {
        info!("Interrupted, disconnecting");
        session.disconnect();
    }

    let stats = session.wait().await?;
    info!(
        "Recorded {} samples ({} frames, {} malformed, {} duplicates)",
        stats.accepted, stats.frames_received, stats.malformed, stats.duplicates
    );

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sensorband_ble=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Status updates are printed on this task, in order.
    let (reporter, mut updates) = ChannelStatusReporter::new();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update {
                StatusUpdate::Status(text) => println!("{}", text),
                StatusUpdate::Button(state) => println!("[{}]", state),
            }
        }
    });

    let result = run(config, Arc::new(reporter)).await;
    if printer.await.is_err() {
        warn!("Status printer stopped unexpectedly");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::BluetoothUnavailable) => {
            error!("No Bluetooth adapter available");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
