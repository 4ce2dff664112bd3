//! Publish/subscribe boundary.
//!
//! The capture pipeline forwards each delivered frame through `Publishable` and,
//! in receiver mode, pulls frames through `Subscriber`. Transports implement
//! these traits; the pipeline never sees wire details.
//!
//! - `codec`: frame payload header plus raw or JPEG body
//! - `mqtt`: rumqttc-backed publisher and subscriber

pub mod codec;
pub mod mqtt;

use std::time::Duration;
use thiserror::Error;

use crate::frame::Frame;

pub use codec::{decode_frame, encode_frame, CodecError, Encoding};
pub use mqtt::{parse_mqtt_endpoint, MqttEndpoint, MqttPublisher, MqttSubscriber};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport closed")]
    Closed,

    #[error("payload codec: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Where and how `read()` forwards frames. Carrier and should-wait are opaque
/// to the pipeline and passed through to the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishTarget {
    pub topic: String,
    pub carrier: String,
    pub should_wait: bool,
}

impl PublishTarget {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = carrier.into();
        self
    }

    pub fn with_should_wait(mut self, should_wait: bool) -> Self {
        self.should_wait = should_wait;
        self
    }
}

/// Outbound side of the middleware.
pub trait Publishable: Send {
    fn publish(
        &mut self,
        topic: &str,
        frame: &Frame,
        carrier: &str,
        should_wait: bool,
    ) -> Result<(), PublishError>;
}

/// Inbound side of the middleware.
pub trait Subscriber: Send {
    /// Wait up to `timeout` for the next frame on `topic`.
    ///
    /// `Ok(None)` means nothing arrived in time. `Err(PublishError::Closed)`
    /// means no frame will ever arrive again.
    fn receive(&mut self, topic: &str, timeout: Duration) -> Result<Option<Frame>, PublishError>;
}

/// Discards frames. Used when no output topic is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPublisher;

impl Publishable for NullPublisher {
    fn publish(
        &mut self,
        _topic: &str,
        _frame: &Frame,
        _carrier: &str,
        _should_wait: bool,
    ) -> Result<(), PublishError> {
        Ok(())
    }
}

impl<P: Publishable + ?Sized> Publishable for Box<P> {
    fn publish(
        &mut self,
        topic: &str,
        frame: &Frame,
        carrier: &str,
        should_wait: bool,
    ) -> Result<(), PublishError> {
        (**self).publish(topic, frame, carrier, should_wait)
    }
}
