use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Shared configuration for the endpoint and client binaries.
///
/// Every section is optional; missing keys fall back to the defaults below,
/// so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Simulated work between the two server timestamps.
    #[serde(default)]
    pub processing_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    #[serde(default = "default_timeout_ms")]
    pub ingest_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub status_timeout_ms: u64,
    #[serde(default = "default_rtt_window")]
    pub rtt_window: usize,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// `directory` replays image files, `http` polls a camera snapshot URL.
    #[serde(default = "default_source_mode")]
    pub mode: String,
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_source_path")]
    pub path: String,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub loop_frames: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_bright_threshold")]
    pub bright_threshold: f64,
    #[serde(default = "default_dark_threshold")]
    pub dark_threshold: f64,
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f64,
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            processing_delay_ms: 0,
        }
    }
}

impl EndpointConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            ingest_timeout_ms: default_timeout_ms(),
            status_timeout_ms: default_timeout_ms(),
            rtt_window: default_rtt_window(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl ClientConfig {
    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_millis(self.ingest_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: default_source_mode(),
            url: default_source_url(),
            path: default_source_path(),
            fps: default_fps(),
            loop_frames: false,
        }
    }
}

impl SourceConfig {
    /// Pacing between frames; `None` means "as fast as the source delivers".
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.fps.is_finite() && self.fps > 0.0).then(|| Duration::from_secs_f64(1.0 / self.fps))
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            bright_threshold: default_bright_threshold(),
            dark_threshold: default_dark_threshold(),
            motion_threshold: default_motion_threshold(),
            blur_sigma: default_blur_sigma(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_endpoint_url() -> String {
    "http://127.0.0.1:8000".into()
}
fn default_timeout_ms() -> u64 {
    500
}
fn default_rtt_window() -> usize {
    100
}
fn default_snapshot_dir() -> String {
    "snapshots".into()
}
fn default_source_mode() -> String {
    "directory".into()
}
fn default_source_url() -> String {
    "http://127.0.0.1:8080/frame".into()
}
fn default_source_path() -> String {
    "frames".into()
}
fn default_fps() -> f64 {
    10.0
}
fn default_bright_threshold() -> f64 {
    140.0
}
fn default_dark_threshold() -> f64 {
    80.0
}
fn default_motion_threshold() -> f64 {
    8.0
}
fn default_blur_sigma() -> f32 {
    1.7
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.endpoint.port, 8000);
        assert_eq!(config.client.ingest_timeout(), Duration::from_millis(500));
        assert_eq!(config.client.rtt_window, 100);
        assert_eq!(config.source.mode, "directory");
        assert_eq!(config.classifier.bright_threshold, 140.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [client]
            endpoint_url = "http://10.0.0.5:9000"
            ingest_timeout_ms = 250

            [endpoint]
            processing_delay_ms = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.client.endpoint_url, "http://10.0.0.5:9000");
        assert_eq!(config.client.ingest_timeout(), Duration::from_millis(250));
        assert_eq!(config.client.status_timeout(), Duration::from_millis(500));
        assert_eq!(config.endpoint.processing_delay(), Duration::from_millis(20));
        assert_eq!(config.endpoint.addr(), "0.0.0.0:8000");
    }

    #[test]
    fn zero_fps_disables_pacing() {
        let mut source = SourceConfig::default();
        assert_eq!(source.frame_interval(), Some(Duration::from_millis(100)));
        source.fps = 0.0;
        assert_eq!(source.frame_interval(), None);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::parse("[client\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load(Path::new("/nonexistent/latency-probe.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
