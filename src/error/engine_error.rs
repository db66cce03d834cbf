//! Top-level engine errors.

use super::{RuleError, StoreError};
use thiserror::Error;

/// Engine-level errors.
///
/// Configuration-time failures (`DomainNotFound`, `InvalidClassName`, ...)
/// surface immediately. During traversal, `Rule` and `Store` variants are
/// collected into [`Errors`](crate::error::Errors) and tagged with the rule
/// name or reference so callers can attribute failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("domain not found: {0}")]
    DomainNotFound(String),
    #[error("unknown class in domain {domain}: {class}")]
    ClassNotFound { domain: String, class: String },
    #[error("no store for domain: {0}")]
    NoStore(String),
    #[error("no reference converter for domain: {0}")]
    NoRefConverter(String),
    #[error("can't deduce reference class for domain: {0}")]
    NoRefClasser(String),
    #[error("invalid class name: {0}")]
    InvalidClassName(String),
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("error following rule {rule}: {source}")]
    Rule {
        rule: String,
        #[source]
        source: RuleError,
    },
    #[error("error getting {reference}: {source}")]
    Store {
        reference: String,
        #[source]
        source: StoreError,
    },
    #[error("context cancelled")]
    Cancelled,
    #[error("rules are sealed once the graph has been built")]
    RulesSealed,
    #[error("internal error: {0}")]
    Internal(String),
}
