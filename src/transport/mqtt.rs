//! MQTT transport over rumqttc (v5).
//!
//! The connection event loop runs on its own thread. The publisher only needs
//! it to keep the session alive; the subscriber decodes incoming publishes and
//! hands frames over a channel.

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, Incoming, MqttOptions};
use rumqttc::Transport;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::codec::{decode_frame, encode_frame, Encoding};
use super::{PublishError, Publishable, Subscriber};
use crate::config::MqttSettings;
use crate::frame::Frame;

const REQUEST_CAPACITY: usize = 10;
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Broker address after scheme and carrier resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Parse `host:port`, `[v6]:port` or `scheme://host:port`.
///
/// `mqtts://` and `ssl://` force TLS; `tls_override` turns it on for bare addresses.
pub fn parse_mqtt_endpoint(addr: &str, tls_override: bool) -> Result<MqttEndpoint> {
    let mut use_tls = tls_override;
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid MQTT port in {}", addr))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    if host.is_empty() {
        return Err(anyhow!("missing MQTT host in {}", addr));
    }
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid MQTT port in {}", addr))?;
    Ok((host.to_string(), port))
}

/// Map the relay's carrier hint onto a transport choice.
pub fn carrier_uses_tls(carrier: &str) -> Result<bool> {
    match carrier.trim().to_ascii_lowercase().as_str() {
        "" | "tcp" | "mqtt" => Ok(false),
        "tls" | "ssl" | "mqtts" => Ok(true),
        other => Err(anyhow!(
            "unknown carrier '{}': expected 'tcp' or 'tls'",
            other
        )),
    }
}

fn connect(
    settings: &MqttSettings,
    carrier: &str,
    suffix: &str,
) -> Result<(Client, Connection, MqttEndpoint)> {
    let endpoint = parse_mqtt_endpoint(&settings.broker_addr, carrier_uses_tls(carrier)?)?;
    let client_id = format!("{}{}", settings.client_id, suffix);

    let mut options = MqttOptions::new(client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_clean_start(true);
    if let Some(user) = settings.username.as_deref() {
        options.set_credentials(user, settings.password.clone().unwrap_or_default());
    }
    options.set_transport(if endpoint.use_tls {
        Transport::tls_with_default_config()
    } else {
        Transport::tcp()
    });

    let (client, connection) = Client::new(options, REQUEST_CAPACITY);
    log::info!(
        "MQTT: connecting to {}:{} (TLS: {}, auth: {})",
        endpoint.host,
        endpoint.port,
        endpoint.use_tls,
        settings.username.is_some()
    );
    Ok((client, connection, endpoint))
}

// ----------------------------------------------------------------------------
// Publisher
// ----------------------------------------------------------------------------

pub struct MqttPublisher {
    client: Client,
    encoding: Encoding,
    alive: Arc<AtomicBool>,
    connection_handle: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    /// Connect to the broker. The transport (TCP or TLS) is chosen from
    /// `carrier` here, once, for the lifetime of the connection.
    pub fn connect(settings: &MqttSettings, carrier: &str, encoding: Encoding) -> Result<Self> {
        let (client, mut connection, _) = connect(settings, carrier, "-pub")?;
        let alive = Arc::new(AtomicBool::new(true));
        let handle = {
            let alive = Arc::clone(&alive);
            std::thread::Builder::new()
                .name("mqtt-publisher".to_string())
                .spawn(move || {
                    for event in connection.iter() {
                        match event {
                            Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                            Err(e) => {
                                log::warn!("MQTT: publisher connection error: {}", e);
                                break;
                            }
                        }
                    }
                    alive.store(false, Ordering::SeqCst);
                })
                .context("spawn MQTT connection thread")?
        };

        Ok(Self {
            client,
            encoding,
            alive,
            connection_handle: Some(handle),
        })
    }
}

impl Publishable for MqttPublisher {
    /// `should_wait` publishes at QoS 1 and blocks while the request queue is
    /// full; otherwise QoS 0 and a full queue drops the frame.
    fn publish(
        &mut self,
        topic: &str,
        frame: &Frame,
        _carrier: &str,
        should_wait: bool,
    ) -> Result<(), PublishError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }
        let payload = encode_frame(frame, self.encoding)?;
        let sent = if should_wait {
            self.client.publish(topic, QoS::AtLeastOnce, false, payload)
        } else {
            self.client.try_publish(topic, QoS::AtMostOnce, false, payload)
        };
        sent.map_err(|e| PublishError::Transport(e.to_string()))
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        if let Err(e) = self.client.disconnect() {
            log::debug!("MQTT: publisher disconnect: {}", e);
        }
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
    }
}

// ----------------------------------------------------------------------------
// Subscriber
// ----------------------------------------------------------------------------

pub struct MqttSubscriber {
    client: Client,
    frames: Receiver<Frame>,
    subscribed: HashSet<String>,
    connection_handle: Option<JoinHandle<()>>,
}

impl MqttSubscriber {
    /// Connect and subscribe to `topic`. Frames that fail to decode are
    /// logged and dropped.
    pub fn connect(settings: &MqttSettings, carrier: &str, topic: &str) -> Result<Self> {
        let (client, connection, _) = connect(settings, carrier, "-sub")?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .with_context(|| format!("subscribe to {}", topic))?;
        log::info!("MQTT: subscribed to {}", topic);

        let (tx, frames) = mpsc::sync_channel(REQUEST_CAPACITY);
        let handle = std::thread::Builder::new()
            .name("mqtt-subscriber".to_string())
            .spawn(move || forward_frames(connection, tx))
            .context("spawn MQTT connection thread")?;

        Ok(Self {
            client,
            frames,
            subscribed: HashSet::from([topic.to_string()]),
            connection_handle: Some(handle),
        })
    }
}

fn forward_frames(mut connection: Connection, tx: SyncSender<Frame>) {
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                match decode_frame(&publish.payload) {
                    Ok(frame) => {
                        if tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("MQTT: dropping undecodable payload: {}", e),
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("MQTT: subscriber connection error: {}", e);
                break;
            }
        }
    }
}

impl Subscriber for MqttSubscriber {
    fn receive(&mut self, topic: &str, timeout: Duration) -> Result<Option<Frame>, PublishError> {
        if !self.subscribed.contains(topic) {
            self.client
                .subscribe(topic, QoS::AtMostOnce)
                .map_err(|e| PublishError::Transport(e.to_string()))?;
            self.subscribed.insert(topic.to_string());
        }
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PublishError::Closed),
        }
    }
}

impl Drop for MqttSubscriber {
    fn drop(&mut self) {
        if let Err(e) = self.client.disconnect() {
            log::debug!("MQTT: subscriber disconnect: {}", e);
        }
        // The forwarding thread may be parked on a full channel.
        let (_, placeholder) = mpsc::sync_channel(0);
        drop(std::mem::replace(&mut self.frames, placeholder));
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
    }
}
