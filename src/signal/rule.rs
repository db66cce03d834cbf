use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::reference::Reference;

use super::{Class, Object};

/// Shared handle to a rule; rules are append-only in the engine and shared
/// with the graph's edge pool.
pub type RuleRef = Arc<dyn Rule>;

/// Optional per-traversal context threaded to every rule application.
/// Semantically opaque to the engine; rules typically use it as a time
/// window on the queries they build.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// A typed edge from one class to another.
///
/// `apply` maps a live object of the start class to a reference in the goal
/// class. Returning the empty reference means "no edge from this object";
/// it is not an error. Rules are expected to be pure and CPU-bound.
pub trait Rule: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn start(&self) -> Class;

    fn goal(&self) -> Class;

    /// The caller guarantees `start` is an instance of the start class;
    /// violations are the caller's bug.
    fn apply(&self, start: &Object, constraint: Option<&Constraint>)
        -> Result<Reference, RuleError>;
}
