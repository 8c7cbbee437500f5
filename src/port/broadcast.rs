//! Broadcast-backed ports: every port opened on a name hears what the
//! others post on it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::observability::metrics;
use crate::port::{
    Inbound, Port, PortError, PortMessage, PortScheme, PortUrl, DEFAULT_PORT_CAPACITY,
};

#[derive(Clone)]
struct Envelope {
    from: Uuid,
    message: PortMessage,
}

/// Registry of named broadcast channels.
#[derive(Clone)]
pub struct BroadcastHub {
    channels: Arc<DashMap<String, broadcast::Sender<Envelope>>>,
    capacity: usize,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PORT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Open a port on `name`. Must be called inside a Tokio runtime.
    pub fn open(&self, name: &str) -> Arc<BroadcastPort> {
        let channel = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();

        let port = Arc::new(BroadcastPort {
            id: Uuid::new_v4(),
            url: PortUrl::new(PortScheme::Broadcast, name),
            channel: channel.clone(),
            inbound: Inbound::new(self.capacity),
            closed: CancellationToken::new(),
        });

        tokio::spawn(pump(
            port.id,
            channel.subscribe(),
            port.inbound.sender(),
            port.closed.clone(),
        ));

        tracing::debug!(channel = %name, port_id = %port.id, "Broadcast port opened");
        port
    }

    /// Number of named channels currently registered.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Drop channels nobody listens on anymore.
    pub fn prune(&self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant on a named broadcast channel.
pub struct BroadcastPort {
    id: Uuid,
    url: PortUrl,
    channel: broadcast::Sender<Envelope>,
    inbound: Inbound,
    closed: CancellationToken,
}

impl BroadcastPort {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Port for BroadcastPort {
    fn url(&self) -> Option<&PortUrl> {
        Some(&self.url)
    }

    fn post_message(&self, message: PortMessage) -> Result<(), PortError> {
        if self.closed.is_cancelled() {
            return Err(PortError::Closed);
        }
        metrics::record_port_message("out", message.kind());
        let _ = self.channel.send(Envelope {
            from: self.id,
            message,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PortMessage> {
        self.inbound.subscribe()
    }

    fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

/// Forward channel traffic posted by other participants into a port's
/// inbound queue until the port closes.
async fn pump(
    own_id: Uuid,
    mut channel: broadcast::Receiver<Envelope>,
    inbound: broadcast::Sender<PortMessage>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            received = channel.recv() => match received {
                Ok(envelope) if envelope.from == own_id => {}
                Ok(envelope) => {
                    metrics::record_port_message("in", envelope.message.kind());
                    let _ = inbound.send(envelope.message);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(port_id = %own_id, skipped, "Broadcast port lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!(port_id = %own_id, "Broadcast port pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_skips_sender() {
        let hub = BroadcastHub::new();
        let a = hub.open("feed");
        let b = hub.open("feed");
        let c = hub.open("feed");
        let mut from_b = b.subscribe();
        let mut from_c = c.subscribe();
        let mut from_a = a.subscribe();

        a.post_message(PortMessage::Done).unwrap();

        assert_eq!(from_b.recv().await.unwrap(), PortMessage::Done);
        assert_eq!(from_c.recv().await.unwrap(), PortMessage::Done);
        tokio::task::yield_now().await;
        assert!(from_a.try_recv().is_err());
        assert_eq!(hub.channel_count(), 1);
    }

    #[tokio::test]
    async fn test_url_is_advertised() {
        let hub = BroadcastHub::new();
        let port = hub.open("updates");
        assert_eq!(port.url().unwrap().to_string(), "broadcast://updates");
    }

    #[tokio::test]
    async fn test_closed_port_rejects_posts() {
        let hub = BroadcastHub::new();
        let port = hub.open("x");
        port.close();
        assert_eq!(port.post_message(PortMessage::Done), Err(PortError::Closed));
    }
}
