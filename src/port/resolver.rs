//! Resolution of advertised port URLs to live ports.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::config::LiveConfig;
use crate::port::{BroadcastHub, Port, PortError, PortScheme, PortUrl, SocketConnector};

/// Turns a `<scheme>://<id>` advertisement into a bound port.
pub trait PortResolver: Send + Sync {
    fn resolve(&self, url: &PortUrl) -> BoxFuture<'static, Result<Arc<dyn Port>, PortError>>;
}

/// Resolver dispatching on scheme to the configured transports.
#[derive(Clone, Default)]
pub struct Transports {
    broadcast: Option<BroadcastHub>,
    socket: Option<SocketConnector>,
}

impl Transports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both transports, configured from `config`.
    pub fn from_config(config: &LiveConfig) -> Self {
        Self::new()
            .with_broadcast(BroadcastHub::with_capacity(config.engine.port_capacity))
            .with_socket(SocketConnector::new(
                &config.transport,
                config.engine.port_capacity,
            ))
    }

    pub fn with_broadcast(mut self, hub: BroadcastHub) -> Self {
        self.broadcast = Some(hub);
        self
    }

    pub fn with_socket(mut self, connector: SocketConnector) -> Self {
        self.socket = Some(connector);
        self
    }

    pub fn broadcast(&self) -> Option<&BroadcastHub> {
        self.broadcast.as_ref()
    }
}

impl PortResolver for Transports {
    fn resolve(&self, url: &PortUrl) -> BoxFuture<'static, Result<Arc<dyn Port>, PortError>> {
        let url = url.clone();
        match url.scheme() {
            PortScheme::Broadcast => {
                let result = match &self.broadcast {
                    Some(hub) => Ok(hub.open(url.id()) as Arc<dyn Port>),
                    None => Err(PortError::Unresolvable(url.to_string())),
                };
                futures_util::future::ready(result).boxed()
            }
            PortScheme::Socket => match self.socket.clone() {
                Some(connector) => async move {
                    let port = connector.connect(&url).await?;
                    Ok(port as Arc<dyn Port>)
                }
                .boxed(),
                None => futures_util::future::ready(Err(PortError::Unresolvable(url.to_string())))
                    .boxed(),
            },
        }
    }
}
