//! The pattern router.
//!
//! This module provides [`PatternRouter`], which holds a set of structurally
//! distinct templates, each carrying one payload, and selects the most
//! specific template for an incoming path.

use crate::error::{RouterError, RouterResult};
use crate::params::Params;
use crate::template::{PathSegments, RouteTemplate};

/// The result of a successful match.
///
/// Borrows the payload from the router it came from, so it cannot outlive
/// the lookup that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutableDestination<'a, T> {
    /// The template that matched.
    pub template: &'a RouteTemplate,
    /// The payload registered with that template.
    pub destination: &'a T,
    /// Variables captured from the path.
    pub params: Params,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    template: RouteTemplate,
    payload: T,
    seq: u64,
}

/// Maps URI templates to payloads and resolves paths to the best match.
///
/// Matching scans every registered template. Among the templates that match,
/// the winner has the most literal segments, then the fewest variable and
/// wildcard segments, then no wildcard, then the earliest registration.
///
/// # Example
///
/// ```rust
/// use hermes_router::PatternRouter;
///
/// let mut router = PatternRouter::new();
/// router.register("/a/{x}", "variable").unwrap();
/// router.register("/a/b", "literal").unwrap();
///
/// let found = router.match_path("/a/b").unwrap();
/// assert_eq!(*found.destination, "literal");
///
/// let found = router.match_path("/a/c").unwrap();
/// assert_eq!(*found.destination, "variable");
/// assert_eq!(found.params.get("x"), Some("c"));
/// ```
#[derive(Debug, Clone)]
pub struct PatternRouter<T> {
    entries: Vec<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for PatternRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PatternRouter<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Parses `template` and registers `payload` under it.
    ///
    /// Fails with [`RouterError::DuplicateRoute`] if a template of the same
    /// shape is already present.
    pub fn register(&mut self, template: &str, payload: T) -> RouterResult<()> {
        let template = RouteTemplate::parse(template)?;
        self.register_template(template, payload)
    }

    /// Registers an already parsed template.
    pub fn register_template(&mut self, template: RouteTemplate, payload: T) -> RouterResult<()> {
        if let Some(existing) = self.find(&template) {
            return Err(RouterError::duplicate(
                template.as_str(),
                existing.template.as_str(),
            ));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry {
            template,
            payload,
            seq,
        });
        Ok(())
    }

    /// Removes the template with the same shape as `template`.
    pub fn remove(&mut self, template: &RouteTemplate) -> Option<T> {
        let index = self
            .entries
            .iter()
            .position(|e| e.template.same_shape(template))?;
        Some(self.entries.remove(index).payload)
    }

    /// Returns the payload registered under a template of the same shape.
    #[must_use]
    pub fn get(&self, template: &RouteTemplate) -> Option<&T> {
        self.find(template).map(|e| &e.payload)
    }

    /// Returns the payload registered under a template of the same shape,
    /// mutably.
    pub fn get_mut(&mut self, template: &RouteTemplate) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|e| e.template.same_shape(template))
            .map(|e| &mut e.payload)
    }

    /// Returns true if a template of the same shape is registered.
    #[must_use]
    pub fn contains(&self, template: &RouteTemplate) -> bool {
        self.find(template).is_some()
    }

    /// Resolves `path` to the most specific matching template.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<RoutableDestination<'_, T>> {
        let segments = PathSegments::split(path);

        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .template
                    .match_segments(&segments)
                    .map(|params| (entry, params))
            })
            .min_by_key(|(entry, _)| (entry.template.specificity(), entry.seq))
            .map(|(entry, params)| RoutableDestination {
                template: &entry.template,
                destination: &entry.payload,
                params,
            })
    }

    /// Iterates over registered templates and payloads in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&RouteTemplate, &T)> {
        self.entries.iter().map(|e| (&e.template, &e.payload))
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, template: &RouteTemplate) -> Option<&Entry<T>> {
        self.entries.iter().find(|e| e.template.same_shape(template))
    }
}
