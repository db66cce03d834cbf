//! xcorrel is a cross-domain correlation engine for observability signals.
//!
//! Given a starting signal (an alert, a log entry, a Kubernetes resource, a
//! metric sample), xcorrel answers: what other signals, in other
//! observability domains, are related to this one, and what queries would
//! fetch them?
//!
//! User-supplied [`Rule`]s form a directed multigraph over [`Class`]es
//! (signal types). The [`Engine`] follows a [`MultiPath`] through that
//! graph: it applies each hop's rules to the live objects, deduplicates the
//! produced [`Reference`]s, dereferences them against the goal class's
//! [`Store`], and accumulates references and objects per class in a
//! [`Results`] container. Failures of individual rules or stores are
//! collected, never fatal.

pub mod domains;
pub mod engine;
pub mod error;
pub mod graph;
pub mod reference;
pub mod result;
pub mod rules;
pub mod signal;
pub mod template;
pub mod unique;

pub use crate::engine::Engine;
pub use crate::error::{EngineError, EngineResult, Errors, RuleError, StoreError};
pub use crate::graph::{Data, Graph, Line, Links, MultiPath, Node, QueryCounts};
pub use crate::reference::Reference;
pub use crate::result::{ClassResult, ListResult, ResultEntry, Results, SetResult};
pub use crate::rules::{FnRule, TemplateRule};
pub use crate::signal::{
    Appender, Class, ClassSpec, Constraint, Domain, Object, RefClasser, RefConverter, Rule,
    RuleRef, Store,
};
pub use crate::template::{TemplateFunc, TemplateFuncs};
