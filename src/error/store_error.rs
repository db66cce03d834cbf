use thiserror::Error;

/// Errors raised by [`Store::get`](crate::signal::Store::get).
///
/// Stores must not panic on malformed references; they return
/// `InvalidReference` with a description instead. Transport failures are
/// wrapped so the HTTP detail stays inspectable through `source()`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("context cancelled")]
    Cancelled,
    #[error("{0}")]
    Unsupported(String),
}
