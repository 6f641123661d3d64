//! The per-channel registry.
//!
//! A [`MicroserviceRegistry`] owns everything one channel dispatches
//! against: HTTP resources, interceptors, exception mappers and WebSocket
//! endpoints. Both tables are published through `ArcSwap`. A mutation
//! clones the current table, changes the copy and stores it, all under a
//! short write lock, so a concurrent dispatch sees either the old table or
//! the new one and never a half-registered endpoint.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use hermes_config::{ConfigError, HermesConfig};
use hermes_core::{MediaType, RegistrationResult, Response};
use hermes_http::{HttpDispatcher, HttpRoutes, Interceptor, ResourceGroup, ResourceMethod};
use hermes_ws::{Endpoint, EndpointDefinition, EndpointRegistry, WebSocketDispatcher};

use crate::channel::ChannelId;

/// Dispatch settings shared by every registry of a runtime.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Response type when neither `Accept` nor `produces` narrows it.
    pub default_media_type: MediaType,
    /// Depth of each WebSocket session's frame queue.
    pub session_queue_capacity: usize,
    /// Forget open sessions when the channel is removed.
    pub disconnect_on_remove: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            default_media_type: MediaType::any(),
            session_queue_capacity: hermes_ws::DEFAULT_QUEUE_CAPACITY,
            disconnect_on_remove: false,
        }
    }
}

impl RegistrySettings {
    /// Reads the settings from a loaded configuration.
    pub fn from_config(config: &HermesConfig) -> Result<Self, ConfigError> {
        let default_media_type = MediaType::parse(&config.dispatcher.default_media_type)
            .map_err(|e| ConfigError::invalid_value("dispatcher.default_media_type", e.to_string()))?;
        Ok(Self {
            default_media_type,
            session_queue_capacity: config.dispatcher.session_queue_capacity,
            disconnect_on_remove: config.websocket.disconnect_on_remove,
        })
    }
}

/// Everything one channel dispatches against.
///
/// # Example
///
/// ```
/// use hermes::{ChannelId, MicroserviceRegistry, RegistrySettings};
/// use hermes_core::{Response, ResponseExt};
/// use hermes_http::{Args, ResourceMethod};
/// use http::{Method, StatusCode};
///
/// let registry = MicroserviceRegistry::new(ChannelId::new("default"), &RegistrySettings::default());
/// registry
///     .register_resource(
///         "/health",
///         ResourceMethod::builder("health", Method::GET)
///             .handler(|_: Args| async { Ok(Response::text(StatusCode::OK, "up")) })
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
/// assert!(registry.has_resource("/health"));
/// ```
pub struct MicroserviceRegistry {
    channel: ChannelId,
    routes: Arc<ArcSwap<HttpRoutes>>,
    endpoints: Arc<ArcSwap<EndpointRegistry>>,
    write_lock: Mutex<()>,
    http: HttpDispatcher,
    ws: WebSocketDispatcher,
}

impl MicroserviceRegistry {
    /// Creates an empty registry for `channel`.
    pub fn new(channel: ChannelId, settings: &RegistrySettings) -> Self {
        Self::build(channel, settings, None)
    }

    /// Creates an empty registry whose WebSocket callbacks share `limiter`
    /// with the rest of the runtime.
    pub fn with_limiter(
        channel: ChannelId,
        settings: &RegistrySettings,
        limiter: Arc<Semaphore>,
    ) -> Self {
        Self::build(channel, settings, Some(limiter))
    }

    fn build(
        channel: ChannelId,
        settings: &RegistrySettings,
        limiter: Option<Arc<Semaphore>>,
    ) -> Self {
        let routes = Arc::new(ArcSwap::from_pointee(HttpRoutes::new()));
        let endpoints = Arc::new(ArcSwap::from_pointee(EndpointRegistry::new()));

        let http = HttpDispatcher::new(Arc::clone(&routes), settings.default_media_type.clone());
        let mut ws = WebSocketDispatcher::new(Arc::clone(&endpoints))
            .with_queue_capacity(settings.session_queue_capacity);
        if let Some(limiter) = limiter {
            ws = ws.with_limiter(limiter);
        }

        Self {
            channel,
            routes,
            endpoints,
            write_lock: Mutex::new(()),
            http,
            ws,
        }
    }

    /// The channel this registry serves.
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Registers a resource method under `template`.
    pub fn register_resource(&self, template: &str, method: ResourceMethod) -> RegistrationResult<()> {
        self.update_routes(|routes| routes.register_resource(template, method))
    }

    /// Removes every method registered under `template`.
    pub fn remove_resource(&self, template: &str) -> RegistrationResult<Option<ResourceGroup>> {
        self.update_routes(|routes| routes.remove_resource(template))
    }

    /// Validates and registers a WebSocket endpoint. Fails closed.
    pub fn register_websocket_endpoint(
        &self,
        definition: EndpointDefinition,
    ) -> RegistrationResult<Arc<Endpoint>> {
        self.update_endpoints(|endpoints| endpoints.register(definition))
    }

    /// Removes the WebSocket endpoint registered under `uri`.
    ///
    /// Sessions already open on it keep running.
    pub fn remove_endpoint(&self, uri: &str) -> RegistrationResult<Option<Arc<Endpoint>>> {
        self.update_endpoints(|endpoints| endpoints.remove(uri))
    }

    /// Registers a mapper for handler errors of type `E`.
    pub fn register_exception_mapper<E, F>(&self, map: F)
    where
        E: std::error::Error + 'static,
        F: Fn(&E) -> Response + Send + Sync + 'static,
    {
        self.update_routes_with(|routes| routes.register_exception_mapper(map));
    }

    /// Appends an interceptor to the chain.
    pub fn register_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.update_routes_with(|routes| routes.register_interceptor(interceptor));
    }

    /// Returns true if some resource template matches `path`.
    pub fn has_resource(&self, path: &str) -> bool {
        self.routes.load().resources().lookup(path).is_some()
    }

    /// The WebSocket endpoint a handshake on `path` would open.
    pub fn lookup_endpoint(&self, path: &str) -> Option<Arc<Endpoint>> {
        self.endpoints
            .load()
            .lookup(path)
            .map(|found| Arc::clone(found.destination))
    }

    /// The HTTP dispatcher over this registry's routes.
    pub fn http(&self) -> &HttpDispatcher {
        &self.http
    }

    /// The WebSocket dispatcher over this registry's endpoints.
    pub fn ws(&self) -> &WebSocketDispatcher {
        &self.ws
    }

    fn update_routes<R>(
        &self,
        change: impl FnOnce(&mut HttpRoutes) -> RegistrationResult<R>,
    ) -> RegistrationResult<R> {
        let _guard = self.write_lock.lock();
        let mut next = HttpRoutes::clone(&self.routes.load());
        let out = change(&mut next)?;
        self.routes.store(Arc::new(next));
        Ok(out)
    }

    fn update_routes_with(&self, change: impl FnOnce(&mut HttpRoutes)) {
        let _guard = self.write_lock.lock();
        let mut next = HttpRoutes::clone(&self.routes.load());
        change(&mut next);
        self.routes.store(Arc::new(next));
    }

    fn update_endpoints<R>(
        &self,
        change: impl FnOnce(&mut EndpointRegistry) -> RegistrationResult<R>,
    ) -> RegistrationResult<R> {
        let _guard = self.write_lock.lock();
        let mut next = EndpointRegistry::clone(&self.endpoints.load());
        let out = change(&mut next)?;
        self.endpoints.store(Arc::new(next));
        Ok(out)
    }
}

impl fmt::Debug for MicroserviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicroserviceRegistry")
            .field("channel", &self.channel)
            .field("resources", &self.routes.load().resources().len())
            .field("endpoints", &self.endpoints.load().len())
            .field("sessions", &self.ws.session_count())
            .finish()
    }
}
