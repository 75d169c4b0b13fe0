use image::ImageFormat;
use std::path::{Path, PathBuf};

use crate::frame::CapturedFrame;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to create snapshot directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to write snapshot {0}: {1}")]
    Write(String, image::ImageError),
}

/// Persists a frame on operator request. Failures are reported, never fatal.
pub trait SnapshotWriter {
    fn save(&mut self, frame: &CapturedFrame) -> Result<PathBuf, SnapshotError>;
}

/// Writes JPEG snapshots named `snapshot_{unix_secs}_{seq}.jpg`.
pub struct JpegSnapshotWriter {
    dir: PathBuf,
}

impl JpegSnapshotWriter {
    pub fn new(dir: &Path) -> Result<Self, SnapshotError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| SnapshotError::CreateDir(dir.display().to_string(), e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, frame: &CapturedFrame) -> PathBuf {
        let secs = frame.captured_at_ms.div_euclid(1000);
        self.dir
            .join(format!("snapshot_{secs}_{seq:06}.jpg", seq = frame.seq))
    }
}

impl SnapshotWriter for JpegSnapshotWriter {
    fn save(&mut self, frame: &CapturedFrame) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(frame);
        frame
            .image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|e| SnapshotError::Write(path.display().to_string(), e))?;
        Ok(path)
    }
}
