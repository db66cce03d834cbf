//! Core contracts of the correlation engine.
//!
//! A [`Domain`] is a family of signal sources (alerts, logs, Kubernetes
//! resources, metrics). Each domain exposes [`Class`]es (signal types) and
//! usually has a [`Store`] that executes [`Reference`](crate::reference::Reference)s
//! and emits [`Object`]s. [`Rule`]s are typed edges from one class to
//! another: they map live objects to references in the goal class.

pub mod class;
pub mod domain;
pub mod rule;
pub mod store;

pub use class::{Class, ClassSpec};
pub use domain::{Domain, RefClasser, RefConverter};
pub use rule::{Constraint, Rule, RuleRef};
pub use store::{Appender, Store};

/// A concrete signal instance. Opaque to the engine; owned by whichever
/// [`Appender`] last received it.
pub type Object = serde_json::Value;
