use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::reference::Reference;
use crate::template::TemplateFuncs;

use super::domain::{RefClasser, RefConverter};
use super::Object;

/// Receives objects emitted by a store or a traversal step.
pub trait Appender: Send {
    fn append(&mut self, obj: Object);
}

/// Executes references for one domain.
///
/// `get` emits zero or more objects by calling [`Appender::append`]. Partial
/// results must be appended before an error is returned, and long-running
/// calls must honour the cancellation token.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Name of the domain this store serves.
    fn domain_name(&self) -> &str;

    /// Execute `reference`, appending each resulting object to `result`.
    async fn get(
        &self,
        ctx: &CancellationToken,
        reference: &Reference,
        result: &mut (dyn Appender + Send),
    ) -> Result<(), StoreError>;

    /// Capability probe: console URL conversion.
    fn as_ref_converter(&self) -> Option<&dyn RefConverter> {
        None
    }

    /// Capability probe: class deduction from a reference.
    fn as_ref_classer(&self) -> Option<&dyn RefClasser> {
        None
    }

    /// Template helper functions this store contributes to rules.
    fn template_funcs(&self) -> TemplateFuncs {
        TemplateFuncs::new()
    }
}
