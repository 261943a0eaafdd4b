//! Static path-prefix routing table.
//!
//! The table is built once from configuration and never mutated afterwards,
//! so it is shared between request tasks behind an `Arc` without locking.
use thiserror::Error;

use crate::config::ServicesConfig;

/// Errors raised while assembling a [`RouteTable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteTableError {
    #[error("route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    #[error("route prefixes '{first}' and '{second}' overlap")]
    OverlappingPrefixes { first: String, second: String },

    #[error("route entry for {prefixes:?} has an empty backend base URL")]
    EmptyBaseUrl { prefixes: Vec<String> },
}

/// One backend service and the path prefixes it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    prefixes: Vec<String>,
    base_url: String,
}

impl RouteEntry {
    /// Create an entry. A trailing slash on `base_url` is stripped so that the
    /// original request path can be appended verbatim.
    pub fn new<I, S>(prefixes: I, base_url: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_url = base_url.into();
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            base_url: strip_trailing_slash(&base_url).to_string(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Immutable mapping from path prefixes to backend base URLs.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build a table, rejecting malformed or overlapping prefixes.
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, RouteTableError> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &entries {
            if entry.base_url.is_empty() {
                return Err(RouteTableError::EmptyBaseUrl {
                    prefixes: entry.prefixes.clone(),
                });
            }
            for prefix in &entry.prefixes {
                if !prefix.starts_with('/') {
                    return Err(RouteTableError::InvalidPrefix(prefix.clone()));
                }
                if let Some(other) = seen
                    .iter()
                    .find(|other| prefix_matches(other, prefix) || prefix_matches(prefix, other))
                {
                    return Err(RouteTableError::OverlappingPrefixes {
                        first: other.to_string(),
                        second: prefix.clone(),
                    });
                }
                seen.push(prefix);
            }
        }
        Ok(Self { entries })
    }

    /// Build the platform table: auth, user, event, quiz and geo families.
    pub fn from_services(services: &ServicesConfig) -> Result<Self, RouteTableError> {
        Self::new(vec![
            RouteEntry::new(["/auth"], &services.auth.base_url),
            RouteEntry::new(["/users", "/internal/users"], &services.user.base_url),
            RouteEntry::new(["/events"], &services.event.base_url),
            RouteEntry::new(["/quizzes"], &services.quiz.base_url),
            RouteEntry::new(["/api/geo", "/geo"], &services.geo.base_url),
        ])
    }

    /// Resolve the backend base URL owning `path`, if any.
    ///
    /// The longest matching prefix wins; with disjoint prefixes at most one
    /// can match anyway.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry
                    .prefixes
                    .iter()
                    .map(move |prefix| (prefix.as_str(), entry.base_url.as_str()))
            })
            .filter(|(prefix, _)| prefix_matches(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, base_url)| base_url)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Number of configured prefixes across all entries.
    pub fn prefix_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.prefixes.len()).sum()
    }
}

/// Segment-aware prefix test: `/auth` owns `/auth` and `/auth/...` but not
/// `/authors`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    let prefix = strip_trailing_slash(prefix);
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
        None => false,
    }
}

fn strip_trailing_slash(value: &str) -> &str {
    value.strip_suffix('/').unwrap_or(value)
}
