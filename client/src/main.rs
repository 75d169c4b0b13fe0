mod classifier;
mod client_loop;
mod frame;
mod latency;
mod session;
mod snapshot;
mod source;
mod transport;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use classifier::{BrightnessMotionClassifier, FrameClassifier};
use client_loop::ClientLoop;
use latency::LatencyTracker;
use latency_probe_common::clock::SystemClock;
use latency_probe_common::config::Config;
use snapshot::JpegSnapshotWriter;
use source::{DeviceError, DirectoryFrameSource, FrameSource, HttpFrameSource};
use tracing::{error, info};
use transport::{HttpEchoClient, TransportError};
use ui::TerminalUi;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("frame source error: {0}")]
    Device(#[from] DeviceError),
    #[error("failed to build HTTP client: {0}")]
    Transport(#[from] TransportError),
    #[error("snapshot setup failed: {0}")]
    Snapshot(#[from] snapshot::SnapshotError),
    #[error("unknown source mode '{0}', expected 'directory' or 'http'")]
    UnknownMode(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        endpoint = config.client.endpoint_url,
        source = config.source.mode,
        ingest_timeout_ms = config.client.ingest_timeout_ms,
        rtt_window = config.client.rtt_window,
        "starting latency-probe client"
    );

    if let Err(e) = run(&config).await {
        error!(error = %e, "client stopped");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> Result<(), ClientError> {
    // Fallible collaborators are built before the device is opened, so the
    // only owner of an open source is the loop that releases it.
    let transport = HttpEchoClient::new(&config.client)?;
    let snapshots = JpegSnapshotWriter::new(Path::new(&config.client.snapshot_dir))?;

    let interval = config.source.frame_interval();
    match config.source.mode.as_str() {
        "directory" => {
            let source = DirectoryFrameSource::open(
                Path::new(&config.source.path),
                interval,
                config.source.loop_frames,
            )?;
            run_with_source(source, transport, snapshots, config).await
        }
        "http" => {
            let source = HttpFrameSource::new(&config.source.url, interval)?;
            run_with_source(source, transport, snapshots, config).await
        }
        other => Err(ClientError::UnknownMode(other.to_string())),
    }
}

async fn run_with_source<S: FrameSource>(
    source: S,
    transport: HttpEchoClient,
    snapshots: JpegSnapshotWriter,
    config: &Config,
) -> Result<(), ClientError> {
    let classifier = BrightnessMotionClassifier::new(config.classifier.clone());
    let ui = TerminalUi::spawn();
    ui.print_usage();

    info!(classifier = classifier.name(), "collaborators ready");

    let client_loop = ClientLoop::new(
        source,
        classifier,
        transport,
        ui,
        snapshots,
        Arc::new(SystemClock),
        LatencyTracker::new(config.client.rtt_window),
    );

    let summary = client_loop.run().await?;
    info!(
        frames = summary.frames,
        samples_ok = summary.samples_ok,
        samples_failed = summary.samples_failed,
        snapshots = summary.snapshots,
        "client loop finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collaborator_setup_fails_before_source_is_opened() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut config = Config::default();
        config.client.snapshot_dir = blocker.join("snapshots").display().to_string();
        config.source.path = tmp.path().join("missing-frames").display().to_string();

        let err = run(&config).await.unwrap_err();
        assert!(matches!(err, ClientError::Snapshot(_)), "got {err}");
    }
}
