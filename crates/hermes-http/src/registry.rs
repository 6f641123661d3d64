//! HTTP resource registration.
//!
//! Resource methods are grouped by template: one [`ResourceGroup`] per path
//! shape, holding every method registered under it. [`HttpRoutes`] bundles
//! the resources with the interceptors and exception mappers of one channel;
//! it is cloned, mutated and swapped in whole on every registration.

use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::info;

use hermes_core::{
    negotiate, validate_consumes, DispatchError, DispatchResult, ExceptionMapper,
    ExceptionMappers, MediaType, RegistrationError, RegistrationResult, Response,
};
use hermes_router::{PatternRouter, RoutableDestination, RouteTemplate, RouterError};

use crate::interceptor::{Interceptor, InterceptorChain};
use crate::resource::ResourceMethod;

/// The request's `Content-Type` as seen by method selection.
#[derive(Debug, Clone, Copy)]
pub enum ContentType<'a> {
    /// No header.
    Absent,
    /// A valid media type.
    Parsed(&'a MediaType),
    /// A header that is not a media type. Only methods without `consumes`
    /// accept it.
    Malformed(&'a str),
}

impl ContentType<'_> {
    /// Returns true if a method declaring `consumes` accepts this type.
    pub fn accepted_by(&self, consumes: &[MediaType]) -> bool {
        match self {
            Self::Absent => validate_consumes(None, consumes).is_ok(),
            Self::Parsed(media) => validate_consumes(Some(media), consumes).is_ok(),
            Self::Malformed(_) => consumes.is_empty(),
        }
    }
}

impl fmt::Display for ContentType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Parsed(media) => write!(f, "{media}"),
            Self::Malformed(raw) => f.write_str(raw),
        }
    }
}

/// All resource methods registered under one template.
#[derive(Debug, Clone, Default)]
pub struct ResourceGroup {
    methods: Vec<ResourceMethod>,
}

impl ResourceGroup {
    /// The methods, in registration order.
    pub fn methods(&self) -> &[ResourceMethod] {
        &self.methods
    }

    /// Distinct HTTP methods served, in registration order.
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut allowed: Vec<Method> = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            if !allowed.contains(method.method()) {
                allowed.push(method.method().clone());
            }
        }
        allowed
    }

    /// Picks the resource method for a request and negotiates its response
    /// type.
    ///
    /// Among methods serving `method`, the first whose `consumes` accepts
    /// `content_type` and whose `produces` satisfies `accept` wins. Fails
    /// with 405, 415 or 406 when the candidates run out at that step, so a
    /// malformed content type never hides a wrong method.
    pub fn select(
        &self,
        method: &Method,
        content_type: ContentType<'_>,
        accept: &[MediaType],
        default: &MediaType,
    ) -> DispatchResult<(&ResourceMethod, MediaType)> {
        let candidates: Vec<&ResourceMethod> =
            self.methods.iter().filter(|m| m.method() == method).collect();
        if candidates.is_empty() {
            return Err(DispatchError::method_not_allowed(
                method.clone(),
                self.allowed_methods(),
            ));
        }

        let consuming: Vec<&ResourceMethod> = candidates
            .into_iter()
            .filter(|m| content_type.accepted_by(m.consumes()))
            .collect();
        if consuming.is_empty() {
            return Err(DispatchError::unsupported_media_type(content_type.to_string()));
        }

        consuming
            .into_iter()
            .find_map(|m| negotiate(accept, m.produces(), default).ok().map(|media| (m, media)))
            .ok_or_else(|| {
                DispatchError::not_acceptable(
                    accept
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            })
    }
}

/// Resource groups keyed by template.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    router: PatternRouter<ResourceGroup>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `method` under `template`.
    ///
    /// A template with the same shape as an existing one must be spelled
    /// identically, and may not repeat a method with the same HTTP method
    /// and media types. Every bound path variable must be a variable of the
    /// template.
    pub fn register(&mut self, template: &str, method: ResourceMethod) -> RegistrationResult<()> {
        let template = RouteTemplate::parse(template)?;

        if let Some(missing) = method.path_variables().find(|name| !template.has_variable(name)) {
            return Err(RegistrationError::invalid_resource(
                method.name(),
                format!("path variable {missing} is not in {template}"),
            ));
        }

        let existing = self
            .router
            .iter()
            .find(|(t, _)| t.same_shape(&template))
            .map(|(t, _)| t.as_str().to_owned());

        match existing {
            None => {
                self.router.register_template(
                    template,
                    ResourceGroup {
                        methods: vec![method],
                    },
                )?;
            }
            Some(existing) if existing != template.as_str() => {
                return Err(RouterError::duplicate(template.as_str(), existing).into());
            }
            Some(existing) => {
                if let Some(group) = self.router.get_mut(&template) {
                    if let Some(clash) = group.methods.iter().find(|m| m.conflicts_with(&method)) {
                        return Err(RegistrationError::invalid_resource(
                            method.name(),
                            format!("{} {existing} is already served by {}", method.method(), clash.name()),
                        ));
                    }
                    group.methods.push(method);
                }
            }
        }
        Ok(())
    }

    /// Removes every method registered under a template of the same shape.
    pub fn remove(&mut self, template: &str) -> RegistrationResult<Option<ResourceGroup>> {
        let template = RouteTemplate::parse(template)?;
        Ok(self.router.remove(&template))
    }

    /// Resolves a request path.
    pub fn lookup(&self, path: &str) -> Option<RoutableDestination<'_, ResourceGroup>> {
        self.router.match_path(path)
    }

    /// Iterates over templates and their groups.
    pub fn iter(&self) -> impl Iterator<Item = (&RouteTemplate, &ResourceGroup)> {
        self.router.iter()
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.router.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.router.is_empty()
    }
}

/// Everything the HTTP dispatcher consults for one channel.
#[derive(Debug, Clone, Default)]
pub struct HttpRoutes {
    resources: ResourceRegistry,
    interceptors: InterceptorChain,
    mappers: ExceptionMappers,
}

impl HttpRoutes {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource method under a template.
    pub fn register_resource(
        &mut self,
        template: &str,
        method: ResourceMethod,
    ) -> RegistrationResult<()> {
        let name = method.name().to_owned();
        self.resources.register(template, method)?;
        info!(resource = %name, template = %template, "Resource registered");
        Ok(())
    }

    /// Removes the resource group under a template.
    pub fn remove_resource(&mut self, template: &str) -> RegistrationResult<Option<ResourceGroup>> {
        let removed = self.resources.remove(template)?;
        if removed.is_some() {
            info!(template = %template, "Resource removed");
        }
        Ok(removed)
    }

    /// Appends an interceptor.
    pub fn register_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        info!(interceptor = interceptor.name(), "Interceptor registered");
        self.interceptors.push(interceptor);
    }

    /// Registers a mapping function for handler errors of type `E`.
    pub fn register_exception_mapper<E, F>(&mut self, map: F)
    where
        E: std::error::Error + 'static,
        F: Fn(&E) -> Response + Send + Sync + 'static,
    {
        self.mappers.register(map);
    }

    /// Registers a prebuilt exception mapper.
    pub fn register_mapper(&mut self, mapper: Arc<dyn ExceptionMapper>) {
        self.mappers.register_mapper(mapper);
    }

    /// The registered resources.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// The interceptor chain.
    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// The exception mappers.
    pub fn mappers(&self) -> &ExceptionMappers {
        &self.mappers
    }
}
