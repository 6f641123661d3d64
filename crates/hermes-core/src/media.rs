//! Content negotiation.
//!
//! [`negotiate`] picks the response media type from a resource's ordered
//! `produces` list against the client's ordered accept list, and
//! [`validate_consumes`] checks a request content type against a resource's
//! `consumes` set.

use std::fmt;
use std::str::FromStr;

use mime::Mime;

use crate::error::{DispatchError, DispatchResult};

/// A media type or media range such as `application/json` or `text/*`.
///
/// Parameters are kept for display but ignored when comparing.
#[derive(Debug, Clone)]
pub struct MediaType {
    mime: Mime,
}

impl MediaType {
    /// Parses a media type.
    pub fn parse(value: &str) -> Result<Self, mime::FromStrError> {
        Ok(Self {
            mime: value.trim().parse()?,
        })
    }

    /// The `*/*` range.
    pub fn any() -> Self {
        Self {
            mime: mime::STAR_STAR,
        }
    }

    /// The underlying [`Mime`].
    pub fn as_mime(&self) -> &Mime {
        &self.mime
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> &str {
        self.mime.essence_str()
    }

    /// Returns true for `*/*`.
    pub fn is_wildcard(&self) -> bool {
        self.mime.type_() == mime::STAR
    }

    /// Returns true if neither the type nor the subtype is a wildcard.
    pub fn is_concrete(&self) -> bool {
        self.mime.type_() != mime::STAR && self.mime.subtype() != mime::STAR
    }

    /// Returns true if the essences are identical (case-insensitive).
    pub fn same_essence(&self, other: &Self) -> bool {
        self.essence().eq_ignore_ascii_case(other.essence())
    }

    /// Returns true if either side's wildcards cover the other.
    pub fn matches(&self, other: &Self) -> bool {
        if self.is_wildcard() || other.is_wildcard() {
            return true;
        }
        if !self.mime.type_().as_str().eq_ignore_ascii_case(other.mime.type_().as_str()) {
            return false;
        }
        self.mime.subtype() == mime::STAR
            || other.mime.subtype() == mime::STAR
            || self
                .mime
                .subtype()
                .as_str()
                .eq_ignore_ascii_case(other.mime.subtype().as_str())
    }

    fn quality(&self) -> f32 {
        self.mime
            .get_param("q")
            .and_then(|q| q.as_str().parse::<f32>().ok())
            .map_or(1.0, |q| q.clamp(0.0, 1.0))
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.same_essence(other)
    }
}

impl Eq for MediaType {}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.essence())
    }
}

impl FromStr for MediaType {
    type Err = mime::FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Mime> for MediaType {
    fn from(mime: Mime) -> Self {
        Self { mime }
    }
}

/// Parses an `Accept` header into media ranges ordered by preference.
///
/// Entries are sorted by `q` (stable, highest first) and `q=0` entries are
/// dropped. Unparseable entries are skipped. An absent or empty header, or
/// one with no parseable entry at all, yields `*/*`.
pub fn parse_accept(header: Option<&str>) -> Vec<MediaType> {
    let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
        return vec![MediaType::any()];
    };

    let parsed: Vec<MediaType> = header
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match MediaType::parse(entry) {
            Ok(media) => Some(media),
            Err(e) => {
                tracing::debug!(entry = %entry.trim(), error = %e, "Skipping malformed accept entry");
                None
            }
        })
        .collect();
    if parsed.is_empty() {
        return vec![MediaType::any()];
    }

    let mut ranked: Vec<(f32, MediaType)> = parsed
        .into_iter()
        .map(|media| (media.quality(), media))
        .filter(|(q, _)| *q > 0.0)
        .collect();

    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.into_iter().map(|(_, media)| media).collect()
}

/// Selects the response media type.
///
/// With an empty `produces` list the first accept entry is returned, or
/// `default` when that entry is a wildcard or the accept list is empty.
/// Otherwise the first `produces` entry equal to some accept entry wins; if
/// there is none, the first `produces` entry covered by an accept range
/// wins. A wildcard `produces` entry resolves to the concrete accept entry it
/// matched.
///
/// # Example
///
/// ```
/// use hermes_core::media::{negotiate, MediaType};
///
/// let produces = ["application/json", "text/plain"].map(|m| m.parse::<MediaType>().unwrap());
/// let accept = ["text/plain", "*/*"].map(|m| m.parse::<MediaType>().unwrap());
///
/// let chosen = negotiate(&accept, &produces, &MediaType::any()).unwrap();
/// assert_eq!(chosen.essence(), "text/plain");
/// ```
pub fn negotiate(
    accept: &[MediaType],
    produces: &[MediaType],
    default: &MediaType,
) -> DispatchResult<MediaType> {
    if produces.is_empty() {
        return Ok(match accept.first() {
            Some(first) if !first.is_wildcard() => first.clone(),
            _ => default.clone(),
        });
    }

    let exact = produces
        .iter()
        .find_map(|p| accept.iter().find(|a| p.same_essence(a)).map(|a| (p, a)));
    let chosen = exact.or_else(|| {
        produces
            .iter()
            .find_map(|p| accept.iter().find(|a| p.matches(a)).map(|a| (p, a)))
    });

    match chosen {
        Some((p, a)) if !p.is_concrete() && a.is_concrete() => Ok(a.clone()),
        Some((p, _)) => Ok(p.clone()),
        None => Err(DispatchError::not_acceptable(join(accept))),
    }
}

/// Checks the request content type against a resource's `consumes` set.
///
/// An empty set accepts anything, and so does a request without a content
/// type.
pub fn validate_consumes(
    content_type: Option<&MediaType>,
    consumes: &[MediaType],
) -> DispatchResult<()> {
    match content_type {
        Some(ct) if !consumes.is_empty() && !consumes.iter().any(|c| c.matches(ct)) => {
            Err(DispatchError::unsupported_media_type(ct.to_string()))
        }
        _ => Ok(()),
    }
}

fn join(types: &[MediaType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
