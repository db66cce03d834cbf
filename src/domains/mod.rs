//! Concrete signal domains.
//!
//! Each optional domain sits behind a cargo feature, default-on. The mock
//! domain is always compiled; unit and integration tests build their
//! correlation graphs from it.

#[cfg(feature = "domain-alert")]
pub mod alert;
#[cfg(feature = "domain-k8s")]
pub mod k8s;
#[cfg(feature = "domain-loki")]
pub mod loki;
#[cfg(feature = "domain-metric")]
pub mod metric;
pub mod mock;
