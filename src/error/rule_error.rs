use thiserror::Error;

/// Errors raised by [`Rule::apply`](crate::signal::Rule::apply).
///
/// Declining to produce a reference is not an error; rules decline by
/// returning the empty [`Reference`](crate::reference::Reference).
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("template error: {0}")]
    Template(String),
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("{0}")]
    Other(String),
}
