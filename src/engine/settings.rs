//! Per-instance engine settings.

use std::fmt;
use std::sync::Arc;

use crate::config::LiveConfig;
use crate::observe::DEFAULT_MUTATION_CAPACITY;
use crate::port::{PortResolver, Transports, DEFAULT_PORT_HEADER};

/// Collaborators and limits a live response is built with.
#[derive(Clone)]
pub struct EngineSettings {
    /// Resolves port URLs advertised by response-like inputs. Without one,
    /// only explicitly attached ports can be bound.
    pub resolver: Option<Arc<dyn PortResolver>>,
    /// Header carrying the advertised port URL.
    pub port_header: String,
    /// Mutation channel capacity for mirror values.
    pub mutation_capacity: usize,
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings with every transport configured from `config`.
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            resolver: Some(Arc::new(Transports::from_config(config))),
            port_header: config.transport.port_header.clone(),
            mutation_capacity: config.engine.mutation_capacity,
        }
    }

    pub fn with_resolver(mut self, resolver: impl PortResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_port_header(mut self, header: impl Into<String>) -> Self {
        self.port_header = header.into();
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            resolver: None,
            port_header: DEFAULT_PORT_HEADER.to_string(),
            mutation_capacity: DEFAULT_MUTATION_CAPACITY,
        }
    }
}

impl fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSettings")
            .field("resolver", &self.resolver.is_some())
            .field("port_header", &self.port_header)
            .field("mutation_capacity", &self.mutation_capacity)
            .finish()
    }
}
