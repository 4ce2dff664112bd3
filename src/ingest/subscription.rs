//! Receiver-mode source: frames arrive from a middleware subscription instead of
//! a device.

use std::time::Duration;

use super::{FrameSource, GrabError, SourceGeometry};
use crate::config::CaptureConfig;
use crate::frame::Frame;
use crate::transport::{PublishError, Subscriber};

pub struct SubscriptionSource {
    subscriber: Box<dyn Subscriber>,
    topic: String,
    timeout: Duration,
    geometry: SourceGeometry,
    received: u64,
    open: bool,
}

impl SubscriptionSource {
    /// `timeout` bounds each grab; an empty wait is reported as a transient miss.
    pub fn new(
        subscriber: Box<dyn Subscriber>,
        topic: impl Into<String>,
        timeout: Duration,
        config: &CaptureConfig,
    ) -> Self {
        let topic = topic.into();
        log::info!("SubscriptionSource: listening on {}", topic);
        Self {
            subscriber,
            topic,
            timeout,
            geometry: SourceGeometry {
                width: config.width,
                height: config.height,
                fps: config.fps,
            },
            received: 0,
            open: true,
        }
    }

    pub fn frames_received(&self) -> u64 {
        self.received
    }
}

impl FrameSource for SubscriptionSource {
    fn describe(&self) -> String {
        format!("subscription:{}", self.topic)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn grab(&mut self) -> Result<Frame, GrabError> {
        if !self.open {
            return Err(GrabError::Ended(format!("{} is closed", self.describe())));
        }
        match self.subscriber.receive(&self.topic, self.timeout) {
            Ok(Some(frame)) => {
                self.received += 1;
                self.geometry.width = frame.width();
                self.geometry.height = frame.height();
                Ok(frame)
            }
            Ok(None) => Err(GrabError::NoFrame(format!(
                "nothing on {} within {:?}",
                self.topic, self.timeout
            ))),
            Err(PublishError::Closed) => {
                self.open = false;
                Err(GrabError::Ended(format!("{} closed", self.describe())))
            }
            Err(err) => Err(GrabError::NoFrame(err.to_string())),
        }
    }

    fn geometry(&self) -> SourceGeometry {
        self.geometry
    }

    fn close(&mut self) {
        if self.open {
            log::info!(
                "SubscriptionSource: {} closed after {} frames",
                self.topic,
                self.received
            );
        }
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CHANNELS_GRAY;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Result<Option<Frame>, PublishError>>);

    impl Subscriber for Scripted {
        fn receive(&mut self, _topic: &str, _timeout: Duration) -> Result<Option<Frame>, PublishError> {
            self.0.pop_front().unwrap_or(Err(PublishError::Closed))
        }
    }

    fn source(script: Vec<Result<Option<Frame>, PublishError>>) -> SubscriptionSource {
        SubscriptionSource::new(
            Box::new(Scripted(script.into())),
            "/video",
            Duration::from_millis(1),
            &CaptureConfig::default(),
        )
    }

    #[test]
    fn received_frame_updates_geometry() -> Result<(), GrabError> {
        let frame = Frame::zeroed(8, 4, CHANNELS_GRAY);
        let mut source = source(vec![Ok(Some(frame.clone()))]);
        assert_eq!(source.grab()?, frame);
        assert_eq!(source.geometry().width, 8);
        assert_eq!(source.geometry().height, 4);
        assert_eq!(source.frames_received(), 1);
        Ok(())
    }

    #[test]
    fn timeout_and_transport_errors_are_transient() {
        let mut source = source(vec![
            Ok(None),
            Err(PublishError::Transport("broker hiccup".into())),
        ]);
        assert!(matches!(source.grab(), Err(GrabError::NoFrame(_))));
        assert!(matches!(source.grab(), Err(GrabError::NoFrame(_))));
        assert!(source.is_open());
    }

    #[test]
    fn closed_subscription_ends_source() {
        let mut source = source(vec![]);
        assert!(matches!(source.grab(), Err(GrabError::Ended(_))));
        assert!(!source.is_open());
    }
}
