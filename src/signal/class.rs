use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;

use super::Object;

/// Per-domain behaviour of a signal type.
///
/// Implementations are cheap value descriptors; identity is the
/// `(domain_name, name)` pair, not the implementing type.
pub trait ClassSpec: fmt::Debug + Send + Sync {
    /// Name of the domain this class belongs to.
    fn domain_name(&self) -> &str;

    /// Class-local name, unique within the domain.
    fn name(&self) -> String;

    /// A fresh, empty object skeleton of this class.
    fn new_object(&self) -> Object;

    /// Identity key of `obj`, used for deduplication. `None` means the
    /// object has no identity (it is never deduplicated).
    fn id(&self, obj: &Object) -> Option<Value>;

    /// Whether `obj` plausibly belongs to this class. Only consulted by
    /// debug-time validation; the default accepts everything.
    fn contains(&self, _obj: &Object) -> bool {
        true
    }
}

/// A signal type within a domain.
///
/// `Class` is a shared handle over a [`ClassSpec`]; it is compared and
/// hashed by `(domain name, local name)` so classes from unrelated domain
/// implementations can coexist in the same maps and graph.
#[derive(Clone)]
pub struct Class(Arc<dyn ClassSpec>);

impl Class {
    pub fn new(spec: Arc<dyn ClassSpec>) -> Self {
        Class(spec)
    }

    pub fn domain_name(&self) -> &str {
        self.0.domain_name()
    }

    /// Class-local name.
    pub fn name(&self) -> String {
        self.0.name()
    }

    /// Full `domain/local` name, as used by
    /// [`Engine::parse_class`](crate::engine::Engine::parse_class).
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.domain_name(), self.name())
    }

    pub fn new_object(&self) -> Object {
        self.0.new_object()
    }

    pub fn id(&self, obj: &Object) -> Option<Value> {
        self.0.id(obj)
    }

    pub fn contains(&self, obj: &Object) -> bool {
        self.0.contains(obj)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.domain_name() == other.domain_name() && self.name() == other.name()
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domain_name().hash(state);
        self.name().hash(state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.full_name())
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
