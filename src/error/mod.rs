//! Error types for the correlation engine.
//!
//! - [`RuleError`] — Errors raised while applying a single rule to an object.
//! - [`StoreError`] — Transport and reference errors from a domain store.
//! - [`EngineError`] — Top-level errors for configuration and traversal.
//! - [`Errors`] — Ordered multi-error collected during a traversal.

pub mod engine_error;
pub mod rule_error;
pub mod store_error;

pub use engine_error::EngineError;
pub use rule_error::RuleError;
pub use store_error::StoreError;

use std::fmt;

/// Convenience alias for engine-level results.
pub type EngineResult<T> = Result<T, EngineError>;

/// Ordered collection of errors gathered during a traversal.
///
/// Traversal methods collect per-rule and per-store failures instead of
/// short-circuiting, so partial results always reach the caller's containers.
/// An empty collection converts to `Ok(())` via [`Errors::into_result`].
#[derive(Debug, Default)]
pub struct Errors(Vec<EngineError>);

impl Errors {
    pub fn new() -> Self {
        Errors(Vec::new())
    }

    /// Append one error to the collection.
    pub fn push(&mut self, err: EngineError) {
        self.0.push(err);
    }

    /// Append every error from `other`, preserving order.
    pub fn merge(&mut self, other: Errors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineError> {
        self.0.iter()
    }

    /// `Ok(())` when no errors were collected, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Errors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn into_vec(self) -> Vec<EngineError> {
        self.0
    }
}

impl From<EngineError> for Errors {
    fn from(err: EngineError) -> Self {
        Errors(vec![err])
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_empty_is_ok() {
        assert!(Errors::new().into_result().is_ok());
    }

    #[test]
    fn test_errors_collects_in_order() {
        let mut errs = Errors::new();
        errs.push(EngineError::DomainNotFound("a".into()));
        errs.push(EngineError::Cancelled);
        assert_eq!(errs.len(), 2);
        let err = errs.into_result().unwrap_err();
        assert_eq!(err.to_string(), "domain not found: a; context cancelled");
    }

    #[test]
    fn test_errors_merge() {
        let mut a = Errors::from(EngineError::Cancelled);
        let b = Errors::from(EngineError::NoStore("k8s".into()));
        a.merge(b);
        assert_eq!(a.len(), 2);
    }
}
