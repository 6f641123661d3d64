//! The WebSocket endpoint table.

use std::sync::Arc;

use tracing::info;

use hermes_core::RegistrationResult;
use hermes_router::{PatternRouter, RoutableDestination, RouteTemplate};

use crate::endpoint::{Endpoint, EndpointDefinition};

/// Validated endpoints keyed by URI template.
///
/// Cloning is cheap: endpoints are shared, so a registry can be copied,
/// changed and swapped in while sessions keep the endpoint they opened on.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    router: PatternRouter<Arc<Endpoint>>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `definition` and registers it.
    ///
    /// Nothing is registered if validation fails or the template is taken.
    pub fn register(&mut self, definition: EndpointDefinition) -> RegistrationResult<Arc<Endpoint>> {
        self.register_endpoint(definition.validate()?)
    }

    /// Registers an already validated endpoint.
    pub fn register_endpoint(&mut self, endpoint: Endpoint) -> RegistrationResult<Arc<Endpoint>> {
        let endpoint = Arc::new(endpoint);
        self.router
            .register_template(endpoint.template().clone(), Arc::clone(&endpoint))?;
        info!(
            endpoint = endpoint.name(),
            template = endpoint.template().as_str(),
            "WebSocket endpoint added"
        );
        Ok(endpoint)
    }

    /// Removes the endpoint registered under a template of the same shape
    /// as `uri`.
    pub fn remove(&mut self, uri: &str) -> RegistrationResult<Option<Arc<Endpoint>>> {
        let template = RouteTemplate::parse(uri)?;
        let removed = self.router.remove(&template);
        if let Some(endpoint) = &removed {
            info!(
                endpoint = endpoint.name(),
                template = endpoint.template().as_str(),
                "WebSocket endpoint removed"
            );
        }
        Ok(removed)
    }

    /// Resolves a handshake path.
    pub fn lookup(&self, path: &str) -> Option<RoutableDestination<'_, Arc<Endpoint>>> {
        self.router.match_path(path)
    }

    /// Iterates over endpoints in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.router.iter().map(|(_, endpoint)| endpoint)
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.router.len()
    }

    /// Returns true if no endpoint is registered.
    pub fn is_empty(&self) -> bool {
        self.router.is_empty()
    }
}
