//! capture_relay - Acquire frames from a device and republish them over MQTT.
//!
//! Publisher mode (`--cap-source` given):
//! 1. Opens the capture device (index, path or URI)
//! 2. Starts the acquisition thread unless multithreading is off
//! 3. Publishes every frame on the feed topic
//!
//! Receiver mode (no source): subscribes to the feed topic and consumes frames
//! through the same capture handle, tracking position and a synthetic timestamp.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use capture_relay::transport::Encoding;
use capture_relay::ui::Ui;
use capture_relay::{
    parse_device_identifier, CaptureHandle, MqttPublisher, MqttSubscriber, Property,
    PublishTarget, Relay, RelayConfig, SubscriptionSource,
};

const MIN_RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Continuous frame acquisition, republished over MQTT"
)]
struct Args {
    /// Capture device: camera index, /dev/videoN, file path or URI (stub://, rtsp://).
    /// Omit to run as a receiver.
    #[arg(long)]
    cap_source: Option<String>,

    /// Topic frames are published on (or received from).
    #[arg(long)]
    cap_feed_port: Option<String>,

    /// Transport carrier: tcp or tls.
    #[arg(long)]
    cap_feed_carrier: Option<String>,

    /// MQTT broker address (host:port, mqtt://, mqtts://).
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// Disable terminal status output.
    #[arg(long)]
    headless: bool,

    /// Publish with delivery acknowledgement, blocking when the transport is busy.
    #[arg(long)]
    should_wait: bool,

    /// Run acquisition on a background thread (publisher mode only).
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    multithreading: Option<bool>,

    /// Capacity of the frame buffer.
    #[arg(long)]
    queue_size: Option<usize>,

    /// Resize every frame to --img-width x --img-height.
    #[arg(long)]
    force_resize: bool,

    /// Publish JPEG payloads instead of raw samples.
    #[arg(long)]
    jpg: bool,

    #[arg(long)]
    flip_vertical: bool,

    #[arg(long)]
    flip_horizontal: bool,

    #[arg(long)]
    img_width: Option<u32>,

    #[arg(long)]
    img_height: Option<u32>,

    #[arg(long)]
    fps: Option<u32>,

    /// Status output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

impl Args {
    fn apply(&self, cfg: &mut RelayConfig) {
        if let Some(source) = &self.cap_source {
            cfg.source = Some(source.clone());
        }
        if let Some(topic) = &self.cap_feed_port {
            cfg.topic = topic.clone();
        }
        if let Some(carrier) = &self.cap_feed_carrier {
            cfg.carrier = carrier.clone();
        }
        if let Some(broker) = &self.mqtt_broker {
            cfg.mqtt.broker_addr = broker.clone();
        }
        cfg.headless |= self.headless;
        cfg.should_wait |= self.should_wait;
        cfg.jpg |= self.jpg;

        let capture = &mut cfg.capture;
        if let Some(multithreading) = self.multithreading {
            capture.multithreading = multithreading;
        }
        if let Some(queue_size) = self.queue_size {
            capture.queue_size = queue_size;
        }
        capture.force_resize |= self.force_resize;
        capture.flip_vertical |= self.flip_vertical;
        capture.flip_horizontal |= self.flip_horizontal;
        if let Some(width) = self.img_width {
            capture.width = width;
        }
        if let Some(height) = self.img_height {
            capture.height = height;
        }
        if let Some(fps) = self.fps {
            capture.fps = fps;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = RelayConfig::load()?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let ui = Ui::from_args(
        Some(args.ui.as_str()),
        cfg.headless,
        std::io::stderr().is_terminal(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")?;
    }

    let handle = match cfg.source.clone() {
        Some(source) => open_publisher(&cfg, &source, &ui)?,
        None => open_receiver(&mut cfg, &ui)?,
    };

    let mut relay = Relay::new(handle, ui);
    let summary = relay.run(&stop);
    if cfg.source.is_none() {
        log::info!(
            "capture_relay: received {} frame(s), position {} ms",
            summary.frames,
            relay.handle().get(Property::PositionMsec)
        );
    }
    Ok(())
}

fn open_publisher(cfg: &RelayConfig, source: &str, ui: &Ui) -> Result<CaptureHandle> {
    let device = parse_device_identifier(source);
    let handle = {
        let _stage = ui.stage(&format!("Open {}", device));
        CaptureHandle::open_device(&device, cfg.capture.clone())
            .with_context(|| format!("failed to open capture device {}", device))?
    };

    let publisher = {
        let _stage = ui.stage("Connect to MQTT broker");
        MqttPublisher::connect(&cfg.mqtt, &cfg.carrier, Encoding::from_jpg_flag(cfg.jpg))?
    };
    let target = PublishTarget::new(cfg.topic.clone())
        .with_carrier(cfg.carrier.clone())
        .with_should_wait(cfg.should_wait);
    log::info!(
        "capture_relay: publishing {} on {} ({})",
        handle.device(),
        cfg.topic,
        if cfg.jpg { "jpeg" } else { "raw" }
    );
    Ok(handle.with_publisher(Box::new(publisher), target))
}

fn open_receiver(cfg: &mut RelayConfig, ui: &Ui) -> Result<CaptureHandle> {
    // The subscription already decouples rates. Silence on the topic is never
    // terminal and never advances the position.
    cfg.capture.multithreading = false;
    cfg.capture.max_grab_failures = u32::MAX;
    cfg.capture.substitute_missing = false;

    let subscriber = {
        let _stage = ui.stage("Subscribe to feed");
        MqttSubscriber::connect(&cfg.mqtt, &cfg.carrier, &cfg.topic)?
    };
    let timeout = (cfg.capture.period() * 4).max(MIN_RECEIVE_TIMEOUT);
    let source = SubscriptionSource::new(
        Box::new(subscriber),
        cfg.topic.clone(),
        timeout,
        &cfg.capture,
    );
    log::info!("capture_relay: receiving from {}", cfg.topic);
    Ok(CaptureHandle::from_source(Box::new(source), cfg.capture.clone())?)
}
