use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::frame::CapturedFrame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("frame source exhausted")]
    Exhausted,
    #[error("failed to list frame directory {0}: {1}")]
    ListDir(String, std::io::Error),
    #[error("failed to read frame {0}: {1}")]
    Read(String, std::io::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
    #[error("camera request failed: {0}")]
    Http(reqwest::Error),
    #[error("camera returned HTTP status {0}")]
    HttpStatus(u16),
}

/// Blocking-per-iteration supplier of frames. Every error is fatal to the loop.
pub trait FrameSource {
    async fn next_frame(&mut self) -> Result<CapturedFrame, DeviceError>;

    /// Release the underlying device. Called exactly once when the loop ends.
    fn release(&mut self) {}

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Paces frame delivery to a target rate; `None` delivers as fast as possible.
struct Pacer {
    interval: Option<Duration>,
    ticker: Option<Interval>,
}

impl Pacer {
    fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            ticker: None,
        }
    }

    async fn wait(&mut self) {
        let Some(period) = self.interval else {
            return;
        };
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
    }
}

// ---------------------------------------------------------------------------
// Directory replay
// ---------------------------------------------------------------------------

/// Replays still images from a directory in lexical file-name order.
pub struct DirectoryFrameSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    loop_frames: bool,
    seq: u64,
    pacer: Pacer,
    released: bool,
}

impl DirectoryFrameSource {
    pub fn open(
        dir: &Path,
        interval: Option<Duration>,
        loop_frames: bool,
    ) -> Result<Self, DeviceError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| DeviceError::ListDir(dir.display().to_string(), e))?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        info!(dir = %dir.display(), frames = files.len(), loop_frames, "frame directory opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            loop_frames,
            seq: 0,
            pacer: Pacer::new(interval),
            released: false,
        })
    }
}

impl FrameSource for DirectoryFrameSource {
    async fn next_frame(&mut self) -> Result<CapturedFrame, DeviceError> {
        if self.released || self.files.is_empty() {
            return Err(DeviceError::Exhausted);
        }
        if self.cursor >= self.files.len() {
            if !self.loop_frames {
                return Err(DeviceError::Exhausted);
            }
            debug!(dir = %self.dir.display(), "rewinding frame directory");
            self.cursor = 0;
        }

        self.pacer.wait().await;

        let path = &self.files[self.cursor];
        self.cursor += 1;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DeviceError::Read(path.display().to_string(), e))?;

        let seq = self.seq;
        self.seq += 1;
        let frame = CapturedFrame::decode(&bytes, Utc::now().timestamp_millis(), seq)?;
        debug!(seq, path = %path.display(), "frame read from directory");
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
        self.files.clear();
    }

    fn name(&self) -> &str {
        "directory"
    }
}

// ---------------------------------------------------------------------------
// HTTP snapshot polling
// ---------------------------------------------------------------------------

/// Polls a camera endpoint that returns one encoded still per GET.
pub struct HttpFrameSource {
    client: Option<reqwest::Client>,
    url: String,
    seq: u64,
    pacer: Pacer,
}

impl HttpFrameSource {
    pub fn new(url: &str, interval: Option<Duration>) -> Result<Self, DeviceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(DeviceError::Http)?;
        Ok(Self {
            client: Some(client),
            url: url.to_string(),
            seq: 0,
            pacer: Pacer::new(interval),
        })
    }
}

impl FrameSource for HttpFrameSource {
    async fn next_frame(&mut self) -> Result<CapturedFrame, DeviceError> {
        let Some(client) = &self.client else {
            return Err(DeviceError::Exhausted);
        };
        self.pacer.wait().await;

        let resp = client.get(&self.url).send().await.map_err(DeviceError::Http)?;
        if !resp.status().is_success() {
            return Err(DeviceError::HttpStatus(resp.status().as_u16()));
        }
        let bytes = resp.bytes().await.map_err(DeviceError::Http)?;

        let seq = self.seq;
        self.seq += 1;
        let frame = CapturedFrame::decode(&bytes, Utc::now().timestamp_millis(), seq)?;
        debug!(seq, bytes = bytes.len(), "frame fetched from camera");
        Ok(frame)
    }

    fn release(&mut self) {
        self.client = None;
    }

    fn name(&self) -> &str {
        "http"
    }
}
