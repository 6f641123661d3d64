//! Route templates.
//!
//! A template is an ordered list of segments, each a literal, a named
//! variable (`{name}`) or a trailing wildcard (`*` or `*name`). Templates are
//! immutable once parsed.

use std::cmp::Reverse;
use std::fmt;

use smallvec::SmallVec;

use crate::error::{RouterError, RouterResult};
use crate::params::Params;

/// One segment of a [`RouteTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must equal the path segment exactly (case-sensitive).
    Literal(String),
    /// Matches any non-empty segment and captures it.
    Variable(String),
    /// Matches the remainder of the path, separators included.
    Wildcard(Option<String>),
}

impl Segment {
    /// Returns true for literal segments.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Variable(_), Self::Variable(_)) | (Self::Wildcard(_), Self::Wildcard(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.write_str(s),
            Self::Variable(name) => write!(f, "{{{name}}}"),
            Self::Wildcard(Some(name)) => write!(f, "*{name}"),
            Self::Wildcard(None) => f.write_str("*"),
        }
    }
}

/// A parsed URI template such as `/chat/{name}` or `/files/*path`.
///
/// # Example
///
/// ```rust
/// use hermes_router::RouteTemplate;
///
/// let template = RouteTemplate::parse("/orgs/{org}/users/{id}").unwrap();
/// assert_eq!(template.literal_count(), 2);
/// assert_eq!(template.variables().collect::<Vec<_>>(), vec!["org", "id"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTemplate {
    canonical: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    /// Parses template text.
    ///
    /// A leading `/` is optional and a single trailing `/` is ignored. Empty
    /// interior segments, variables that do not span a whole segment,
    /// repeated variable names and wildcards before the last segment are
    /// rejected.
    pub fn parse(template: &str) -> RouterResult<Self> {
        let normalized = normalize(template);
        let mut segments = Vec::new();

        if !normalized.is_empty() {
            let parts: Vec<&str> = normalized.split('/').collect();
            let last = parts.len() - 1;

            for (i, part) in parts.into_iter().enumerate() {
                let segment = parse_segment(template, part, i == last)?;
                if let Segment::Variable(name) | Segment::Wildcard(Some(name)) = &segment {
                    let repeated = segments.iter().any(|s| {
                        matches!(s, Segment::Variable(n) | Segment::Wildcard(Some(n)) if n == name)
                    });
                    if repeated {
                        return Err(RouterError::invalid_template(
                            template,
                            format!("variable {name} appears more than once"),
                        ));
                    }
                }
                segments.push(segment);
            }
        }

        let canonical = render(&segments);
        Ok(Self {
            canonical,
            segments,
        })
    }

    /// Returns the canonical text form (leading `/`, no trailing `/`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Returns the segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of literal segments.
    #[must_use]
    pub fn literal_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_literal()).count()
    }

    /// Number of variable and wildcard segments.
    #[must_use]
    pub fn non_literal_count(&self) -> usize {
        self.segments.len() - self.literal_count()
    }

    /// Returns true if the template ends in a wildcard.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard(_)))
    }

    /// Names of the variables (and of a named wildcard), in template order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) | Segment::Wildcard(Some(name)) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Returns true if `name` is a variable of this template.
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables().any(|v| v == name)
    }

    /// Returns true if both templates have the same literal/variable shape.
    ///
    /// Variable names do not take part in the comparison, so `/a/{x}` and
    /// `/a/{y}` share a shape.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.same_shape(b))
    }

    /// Ordering key for specificity; smaller is more specific.
    pub(crate) fn specificity(&self) -> (Reverse<usize>, usize, bool) {
        (
            Reverse(self.literal_count()),
            self.non_literal_count(),
            self.has_wildcard(),
        )
    }

    /// Substitutes `params` into the variable positions.
    ///
    /// An unnamed wildcard, or a named one without a value, expands to an
    /// empty remainder.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hermes_router::{Params, RouteTemplate};
    ///
    /// let template = RouteTemplate::parse("/chat/{name}").unwrap();
    /// let params: Params = [("name", "alice")].into_iter().collect();
    /// assert_eq!(template.expand(&params).unwrap(), "/chat/alice");
    /// ```
    pub fn expand(&self, params: &Params) -> RouterResult<String> {
        let mut parts: Vec<&str> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => parts.push(lit),
                Segment::Variable(name) => parts.push(
                    params
                        .get(name)
                        .ok_or_else(|| RouterError::missing_variable(name))?,
                ),
                Segment::Wildcard(name) => {
                    let rest = name.as_deref().and_then(|n| params.get(n)).unwrap_or("");
                    if !rest.is_empty() {
                        parts.push(rest);
                    }
                }
            }
        }
        Ok(format!("/{}", parts.join("/")))
    }

    /// Matches pre-split path segments, returning the captured variables.
    pub(crate) fn match_segments(&self, path: &PathSegments<'_>) -> Option<Params> {
        let mut params = Params::with_capacity(self.non_literal_count());

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard(name) => {
                    if let Some(name) = name {
                        params.insert(name.as_str(), path.remainder(i));
                    }
                    return Some(params);
                }
                Segment::Literal(lit) => {
                    if path.get(i)? != lit.as_str() {
                        return None;
                    }
                }
                Segment::Variable(name) => {
                    let value = path.get(i)?;
                    if value.is_empty() {
                        return None;
                    }
                    params.insert(name.as_str(), value);
                }
            }
        }

        (path.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl std::str::FromStr for RouteTemplate {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An incoming path split into segments, keeping byte offsets so a wildcard
/// can capture the raw remainder.
#[derive(Debug)]
pub(crate) struct PathSegments<'p> {
    path: &'p str,
    segments: SmallVec<[(usize, &'p str); 8]>,
}

impl<'p> PathSegments<'p> {
    pub(crate) fn split(path: &'p str) -> Self {
        let path = normalize(path);
        let mut segments = SmallVec::new();
        if !path.is_empty() {
            let mut start = 0;
            for part in path.split('/') {
                segments.push((start, part));
                start += part.len() + 1;
            }
        }
        Self { path, segments }
    }

    fn get(&self, index: usize) -> Option<&'p str> {
        self.segments.get(index).map(|(_, s)| *s)
    }

    fn len(&self) -> usize {
        self.segments.len()
    }

    fn remainder(&self, index: usize) -> &'p str {
        self.segments
            .get(index)
            .map_or("", |(start, _)| &self.path[*start..])
    }
}

/// Strips one leading `/` and, unless that leaves a lone `/`, one trailing `/`.
fn normalize(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

fn parse_segment(template: &str, part: &str, is_last: bool) -> RouterResult<Segment> {
    if part.is_empty() {
        return Err(RouterError::invalid_template(template, "empty path segment"));
    }

    if let Some(name) = part.strip_prefix('*') {
        if !is_last {
            return Err(RouterError::invalid_template(
                template,
                "a wildcard must be the last segment",
            ));
        }
        check_name(template, name, true)?;
        return Ok(Segment::Wildcard((!name.is_empty()).then(|| name.to_string())));
    }

    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        check_name(template, inner, false)?;
        return Ok(Segment::Variable(inner.to_string()));
    }

    if part.contains(['{', '}']) {
        return Err(RouterError::invalid_template(
            template,
            format!("variable segment {part} must span the whole segment"),
        ));
    }

    Ok(Segment::Literal(part.to_string()))
}

fn check_name(template: &str, name: &str, allow_empty: bool) -> RouterResult<()> {
    if name.is_empty() && !allow_empty {
        return Err(RouterError::invalid_template(template, "empty variable name"));
    }
    if name.contains(['{', '}', '*']) {
        return Err(RouterError::invalid_template(
            template,
            format!("invalid variable name {name}"),
        ));
    }
    Ok(())
}

fn render(segments: &[Segment]) -> String {
    let mut out = String::from("/");
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&segment.to_string());
    }
    out
}
