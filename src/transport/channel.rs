use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{RawMessage, Receiver, TransportError};

/// In-process receiver backed by a tokio channel.
pub struct ChannelReceiver {
    rx: mpsc::Receiver<RawMessage>,
}

impl ChannelReceiver {
    pub fn new(rx: mpsc::Receiver<RawMessage>) -> Self {
        Self { rx }
    }

    pub fn pair(buffer: usize) -> (mpsc::Sender<RawMessage>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl Receiver for ChannelReceiver {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<RawMessage>, TransportError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Ok(None),
        }
    }
}
