use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;
use zeromq::{Socket, SocketRecv, SubSocket};

use super::{RawMessage, Receiver, TransportError};

/// NDOV Loket best-effort realtime publisher.
pub const DEFAULT_ENDPOINT: &str = "tcp://pubsub.besteffort.ndovloket.nl:7658";

/// ZeroMQ SUB socket subscribed to a set of topic prefixes.
pub struct ZmqReceiver {
    socket: SubSocket,
}

impl ZmqReceiver {
    #[tracing::instrument(skip(topics), fields(topic_count = topics.len()))]
    pub async fn connect(endpoint: &str, topics: Vec<String>) -> Result<Self, TransportError> {
        let mut socket = SubSocket::new();
        socket.connect(endpoint).await?;

        for topic in &topics {
            socket.subscribe(topic).await?;
            info!(topic = %topic, "Subscribed");
        }

        info!(endpoint, "Connected to feed");
        Ok(Self { socket })
    }
}

#[async_trait]
impl Receiver for ZmqReceiver {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<RawMessage>, TransportError> {
        let message = match tokio::time::timeout(timeout, self.socket.recv()).await {
            Ok(received) => received?,
            Err(_) => return Ok(None),
        };

        // Part 0 is the topic, part 1 the body; a bare topic frame has no body.
        let mut parts = message.into_vec().into_iter();
        let topic = parts.next().unwrap_or_default();
        let payload = parts.next().unwrap_or_else(Bytes::new);

        Ok(Some(RawMessage { topic, payload }))
    }
}
