//! URI-shaped query locators.
//!
//! A [`Reference`] is a relative path plus an optional form-encoded query,
//! interpreted by the store of the class it targets. The engine treats
//! references as opaque values: equality is byte-equality of both fields,
//! which makes a reference usable as a deduplication key.

use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::error::EngineError;

/// A transport-independent locator for a query against a store.
///
/// The empty reference is a sentinel meaning "rule declined"; it is never
/// dereferenced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Reference {
    pub path: String,
    pub raw_query: String,
}

impl Reference {
    /// The empty reference, used by rules to decline.
    pub const EMPTY: Reference = Reference {
        path: String::new(),
        raw_query: String::new(),
    };

    pub fn new(path: impl Into<String>, raw_query: impl Into<String>) -> Self {
        Reference {
            path: path.into(),
            raw_query: raw_query.into(),
        }
    }

    /// Parse a `path?query` string. Fragments are not part of the reference
    /// grammar and are rejected.
    pub fn parse(s: &str) -> Result<Reference, EngineError> {
        if s.contains('#') {
            return Err(EngineError::InvalidReference(format!(
                "fragment not allowed: {s}"
            )));
        }
        match s.split_once('?') {
            Some((path, query)) => Ok(Reference::new(path, query)),
            None => Ok(Reference::new(s, "")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.raw_query.is_empty()
    }

    /// Resolve the path against `base` per RFC 3986 and attach the query.
    /// An absolute path overrides the base path.
    pub fn resolve(&self, base: &Url) -> Result<Url, url::ParseError> {
        let mut u = base.join(&self.path)?;
        if self.raw_query.is_empty() {
            u.set_query(None);
        } else {
            u.set_query(Some(&self.raw_query));
        }
        Ok(u)
    }

    /// Parse the raw query as a form-encoded multimap.
    pub fn query(&self) -> HashMap<String, Vec<String>> {
        let mut m: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in url::form_urlencoded::parse(self.raw_query.as_bytes()) {
            m.entry(k.into_owned()).or_default().push(v.into_owned());
        }
        m
    }

    /// First value for a query key, if any.
    pub fn query_get(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.raw_query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw_query.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}?{}", self.path, self.raw_query)
        }
    }
}
