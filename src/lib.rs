//! Capture Relay
//!
//! Continuous frame acquisition from a capture device, decoupled from the
//! consumer by a bounded buffer, and republished over a publish/subscribe
//! transport.
//!
//! # Architecture
//!
//! ```text
//! FrameSource --grab--> AcquisitionLoop --put--> BoundedFrameBuffer --take--> CaptureHandle --publish--> Publishable
//! ```
//!
//! The pipeline keeps four guarantees:
//!
//! 1. **FIFO delivery**: frames reach the consumer in production order.
//! 2. **Bounded occupancy**: the buffer never holds more than its capacity; a
//!    full buffer slows the producer down instead of dropping frames.
//! 3. **No null frames**: a transient grab failure repeats the last good frame,
//!    or a blank frame of the configured geometry before the first one.
//! 4. **Exclusive device access**: while the acquisition thread runs it is the
//!    only owner of the source, and it closes the source itself before a
//!    release returns.
//!
//! # Module Structure
//!
//! - `frame`: immutable `Frame` plus resize/flip operations
//! - `buffer`: `BoundedFrameBuffer`
//! - `ingest`: `FrameSource` trait, device identifiers, backends
//! - `capture`: `CaptureHandle` state machine
//! - `transport`: publish/subscribe boundary, MQTT and payload codec
//! - `relay`: read-and-forward loop used by the binary
//! - `config`: `CaptureConfig` and layered `RelayConfig` loading

mod acquisition;
pub mod buffer;
pub mod capture;
mod conditioner;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod relay;
pub mod transport;
pub mod ui;

pub use buffer::BoundedFrameBuffer;
pub use capture::{CaptureError, CaptureHandle, CaptureStats, LifecycleState, Property};
pub use config::{CaptureConfig, MqttSettings, RelayConfig};
pub use frame::{Flip, Frame, FrameError, CHANNELS_GRAY, CHANNELS_RGB};
pub use ingest::{
    open_source, parse_device_identifier, DeviceId, FrameSource, GrabError, OpenError,
    SourceGeometry, SubscriptionSource, SyntheticSource,
};
pub use relay::{Relay, RelaySummary};
pub use transport::{
    MqttPublisher, MqttSubscriber, NullPublisher, PublishError, PublishTarget, Publishable,
    Subscriber,
};
