use std::fmt;

use crate::error::EngineError;
use crate::reference::Reference;
use crate::template::TemplateFuncs;

use super::Class;

/// A family of signal sources, identified by a unique name.
///
/// Two domains are equal iff their names are equal; the engine keys its
/// registries on `name()`.
pub trait Domain: fmt::Debug + Send + Sync {
    /// Unique domain name, e.g. `"k8s"` or `"alert"`.
    fn name(&self) -> &str;

    /// Look up a class by its class-local name.
    fn class(&self, name: &str) -> Option<Class>;

    /// Every class this domain knows.
    fn classes(&self) -> Vec<Class>;

    /// Parse serialized query bytes into a reference. Optional; domains
    /// that have no serialized query form keep the default.
    fn unmarshal_query(&self, _data: &[u8]) -> Result<Reference, EngineError> {
        Err(EngineError::InvalidReference(format!(
            "domain {} does not unmarshal queries",
            self.name()
        )))
    }

    /// Capability probe: console URL conversion.
    fn as_ref_converter(&self) -> Option<&dyn RefConverter> {
        None
    }

    /// Capability probe: class deduction from a reference.
    fn as_ref_classer(&self) -> Option<&dyn RefClasser> {
        None
    }

    /// Template helper functions this domain contributes to rules.
    fn template_funcs(&self) -> TemplateFuncs {
        TemplateFuncs::new()
    }
}

/// Converts between store-native references and console URL references.
///
/// Round-trip requirement: a reference produced by `ref_console_to_store`
/// converts back to the original console reference up to canonical form
/// (sorted query params, collapsed `./` segments).
pub trait RefConverter: Send + Sync + fmt::Debug {
    fn ref_store_to_console(
        &self,
        class: &Class,
        reference: &Reference,
    ) -> Result<Reference, EngineError>;

    fn ref_console_to_store(
        &self,
        reference: &Reference,
    ) -> Result<(Class, Reference), EngineError>;
}

/// Deduces the class a reference targets from its shape (e.g. the
/// Kubernetes group/version/resource path).
pub trait RefClasser: Send + Sync {
    fn ref_class(&self, reference: &Reference) -> Option<Class>;
}
