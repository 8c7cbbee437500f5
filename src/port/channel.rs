//! In-process port pairs.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::port::{Inbound, Port, PortError, PortMessage, PortUrl, DEFAULT_PORT_CAPACITY};

/// One end of an in-process channel. Messages posted on one end arrive on
/// the other; closing either end closes both.
pub struct ChannelPort {
    inbound: Inbound,
    peer: broadcast::Sender<PortMessage>,
    closed: CancellationToken,
}

impl ChannelPort {
    /// Create two connected ends.
    pub fn pair() -> (Arc<ChannelPort>, Arc<ChannelPort>) {
        Self::pair_with_capacity(DEFAULT_PORT_CAPACITY)
    }

    pub fn pair_with_capacity(capacity: usize) -> (Arc<ChannelPort>, Arc<ChannelPort>) {
        let closed = CancellationToken::new();
        let left_inbound = Inbound::new(capacity);
        let right_inbound = Inbound::new(capacity);

        let left = ChannelPort {
            peer: right_inbound.sender(),
            inbound: left_inbound,
            closed: closed.clone(),
        };
        let right = ChannelPort {
            peer: left.inbound.sender(),
            inbound: right_inbound,
            closed,
        };
        (Arc::new(left), Arc::new(right))
    }
}

impl Port for ChannelPort {
    fn url(&self) -> Option<&PortUrl> {
        None
    }

    fn post_message(&self, message: PortMessage) -> Result<(), PortError> {
        if self.closed.is_cancelled() {
            return Err(PortError::Closed);
        }
        metrics::record_port_message("out", message.kind());
        // A peer that is not listening yet still has its parked receiver.
        let _ = self.peer.send(message);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PortMessage> {
        self.inbound.subscribe()
    }

    fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_cross_the_pair() {
        let (left, right) = ChannelPort::pair();
        left.post_message(PortMessage::Done).unwrap();

        let mut rx = right.subscribe();
        assert_eq!(rx.recv().await.unwrap(), PortMessage::Done);

        let mut back = left.subscribe();
        right.post_message(PortMessage::Done).unwrap();
        assert_eq!(back.recv().await.unwrap(), PortMessage::Done);
    }

    #[tokio::test]
    async fn test_close_is_shared() {
        let (left, right) = ChannelPort::pair();
        right.close();
        assert!(left.is_closed());
        assert_eq!(left.post_message(PortMessage::Done), Err(PortError::Closed));
    }
}
