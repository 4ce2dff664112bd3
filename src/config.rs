use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::frame::{Flip, CHANNELS_GRAY, CHANNELS_RGB};

const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_QUEUE_SIZE: usize = 10;
const DEFAULT_MAX_GRAB_FAILURES: u32 = 5;
const DEFAULT_BACKOFF_MS: u64 = 100;
const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
const DEFAULT_HAS_NEXT_TRIES: u32 = 10;
const DEFAULT_TOPIC: &str = "/video_reader/video_feed";
const DEFAULT_MQTT_BROKER: &str = "127.0.0.1:1883";
const DEFAULT_MQTT_CLIENT_ID: &str = "capture_relay";

/// Settings for one capture handle. Fixed once the handle is constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// Target frame rate. Also the basis of the receiver's synthetic timestamps.
    pub fps: u32,
    /// 1 (grayscale) or 3 (RGB). Used for blank frames and synthetic sources.
    pub channels: u8,
    /// Resample every frame to `width` x `height`.
    pub force_resize: bool,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Run a background acquisition thread feeding a bounded buffer.
    pub multithreading: bool,
    pub queue_size: usize,
    /// Consecutive `NoFrame` grabs tolerated before the source counts as ended.
    pub max_grab_failures: u32,
    /// Stand in the last good (or a blank) frame for a missed grab. When off, a
    /// miss reaches the consumer as "no frame" and the position does not move.
    pub substitute_missing: bool,
    /// Sleep between producer retries against a full buffer.
    pub backoff: Duration,
    /// Sleep between `has_next` polls.
    pub poll_interval: Duration,
    pub has_next_tries: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            channels: CHANNELS_RGB,
            force_resize: false,
            flip_horizontal: false,
            flip_vertical: false,
            multithreading: true,
            queue_size: DEFAULT_QUEUE_SIZE,
            max_grab_failures: DEFAULT_MAX_GRAB_FAILURES,
            substitute_missing: true,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            has_next_tries: DEFAULT_HAS_NEXT_TRIES,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "frame geometry must be non-zero, got {}x{}",
                self.width,
                self.height
            ));
        }
        if self.channels != CHANNELS_GRAY && self.channels != CHANNELS_RGB {
            return Err(anyhow!("channels must be 1 or 3, got {}", self.channels));
        }
        if self.fps == 0 {
            return Err(anyhow!("fps must be greater than zero"));
        }
        if self.queue_size == 0 {
            return Err(anyhow!("queue_size must be at least 1"));
        }
        Ok(())
    }

    /// Combined flip transform, if any flag is set.
    pub fn flip(&self) -> Option<Flip> {
        Flip::from_flags(self.flip_horizontal, self.flip_vertical)
    }

    /// Time between frames at the target rate.
    pub fn period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.fps.max(1)))
    }
}

// ----------------------------------------------------------------------------
// Relay configuration (file + environment)
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct RelayConfigFile {
    source: Option<String>,
    topic: Option<String>,
    carrier: Option<String>,
    headless: Option<bool>,
    should_wait: Option<bool>,
    jpg: Option<bool>,
    capture: Option<CaptureConfigFile>,
    mqtt: Option<MqttConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    channels: Option<u8>,
    force_resize: Option<bool>,
    flip_horizontal: Option<bool>,
    flip_vertical: Option<bool>,
    multithreading: Option<bool>,
    queue_size: Option<usize>,
    max_grab_failures: Option<u32>,
    substitute_missing: Option<bool>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    broker_addr: Option<String>,
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Everything the relay binary needs: where frames come from, where they go.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Capture device. `None` selects receiver mode.
    pub source: Option<String>,
    /// Output topic in publisher mode, input topic in receiver mode.
    pub topic: String,
    /// Transport hint passed through to the publisher.
    pub carrier: String,
    pub headless: bool,
    pub should_wait: bool,
    /// Publish frames JPEG-encoded instead of raw.
    pub jpg: bool,
    pub capture: CaptureConfig,
    pub mqtt: MqttSettings,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker_addr: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RelayConfig {
    /// Defaults, then the file named by `CAPTURE_RELAY_CONFIG`, then
    /// `CAPTURE_RELAY_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAPTURE_RELAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelayConfigFile) -> Self {
        let defaults = CaptureConfig::default();
        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureConfig {
            width: capture_file.width.unwrap_or(defaults.width),
            height: capture_file.height.unwrap_or(defaults.height),
            fps: capture_file.fps.unwrap_or(defaults.fps),
            channels: capture_file.channels.unwrap_or(defaults.channels),
            force_resize: capture_file.force_resize.unwrap_or(defaults.force_resize),
            flip_horizontal: capture_file
                .flip_horizontal
                .unwrap_or(defaults.flip_horizontal),
            flip_vertical: capture_file.flip_vertical.unwrap_or(defaults.flip_vertical),
            multithreading: capture_file
                .multithreading
                .unwrap_or(defaults.multithreading),
            queue_size: capture_file.queue_size.unwrap_or(defaults.queue_size),
            max_grab_failures: capture_file
                .max_grab_failures
                .unwrap_or(defaults.max_grab_failures),
            substitute_missing: capture_file
                .substitute_missing
                .unwrap_or(defaults.substitute_missing),
            backoff: capture_file
                .backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff),
            ..defaults
        };

        let mqtt_file = file.mqtt.unwrap_or_default();
        let mqtt = MqttSettings {
            broker_addr: mqtt_file
                .broker_addr
                .unwrap_or_else(|| DEFAULT_MQTT_BROKER.to_string()),
            client_id: mqtt_file
                .client_id
                .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
            username: mqtt_file.username,
            password: mqtt_file.password,
        };

        Self {
            source: file.source.filter(|s| !s.trim().is_empty()),
            topic: file.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            carrier: file.carrier.unwrap_or_default(),
            headless: file.headless.unwrap_or(false),
            should_wait: file.should_wait.unwrap_or(false),
            jpg: file.jpg.unwrap_or(false),
            capture,
            mqtt,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("CAPTURE_RELAY_SOURCE") {
            if !source.trim().is_empty() {
                self.source = Some(source);
            }
        }
        if let Ok(topic) = std::env::var("CAPTURE_RELAY_TOPIC") {
            if !topic.trim().is_empty() {
                self.topic = topic;
            }
        }
        if let Ok(carrier) = std::env::var("CAPTURE_RELAY_CARRIER") {
            self.carrier = carrier.trim().to_string();
        }
        if let Ok(addr) = std::env::var("CAPTURE_RELAY_MQTT_BROKER") {
            if !addr.trim().is_empty() {
                self.mqtt.broker_addr = addr;
            }
        }
        if let Ok(size) = std::env::var("CAPTURE_RELAY_QUEUE_SIZE") {
            self.capture.queue_size = size
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAPTURE_RELAY_QUEUE_SIZE must be a positive integer"))?;
        }
        if let Ok(fps) = std::env::var("CAPTURE_RELAY_FPS") {
            self.capture.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAPTURE_RELAY_FPS must be a positive integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        if self.topic.trim().is_empty() {
            return Err(anyhow!("topic must not be empty"));
        }
        if self.mqtt.broker_addr.trim().is_empty() {
            return Err(anyhow!("mqtt broker address must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capture_config_is_valid() {
        assert!(CaptureConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_channels_and_capacity() {
        let cfg = CaptureConfig {
            channels: 4,
            ..CaptureConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = CaptureConfig {
            queue_size: 0,
            ..CaptureConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn period_follows_fps() {
        let cfg = CaptureConfig {
            fps: 20,
            ..CaptureConfig::default()
        };
        assert_eq!(cfg.period(), Duration::from_millis(50));
    }

    #[test]
    fn flip_combines_flags() {
        let cfg = CaptureConfig {
            flip_horizontal: true,
            flip_vertical: true,
            ..CaptureConfig::default()
        };
        assert_eq!(cfg.flip(), Some(Flip::Both));
        assert_eq!(CaptureConfig::default().flip(), None);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = RelayConfig::from_file(RelayConfigFile::default());
        assert_eq!(cfg.topic, DEFAULT_TOPIC);
        assert_eq!(cfg.mqtt.broker_addr, DEFAULT_MQTT_BROKER);
        assert!(cfg.source.is_none());
        assert_eq!(cfg.capture, CaptureConfig::default());
    }

    #[test]
    fn blank_source_means_receiver_mode() {
        let file = RelayConfigFile {
            source: Some("  ".to_string()),
            ..RelayConfigFile::default()
        };
        assert!(RelayConfig::from_file(file).source.is_none());
    }
}
