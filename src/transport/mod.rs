//! Message transports feeding the pipeline.

mod channel;
mod zmq;

pub use channel::ChannelReceiver;
pub use zmq::{DEFAULT_ENDPOINT, ZmqReceiver};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// One topic/payload pair as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: Bytes,
    pub payload: Bytes,
}

impl RawMessage {
    pub fn new(topic: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn topic_str(&self) -> String {
        String::from_utf8_lossy(&self.topic).into_owned()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("ZMQ error: {0}")]
    Zmq(#[from] ::zeromq::ZmqError),

    #[error("transport closed")]
    Closed,
}

/// Source of raw feed messages.
#[async_trait]
pub trait Receiver: Send {
    /// Waits at most `timeout` for the next message. `Ok(None)` means nothing
    /// arrived in time.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<RawMessage>, TransportError>;
}
