//! Loki log domain.
//!
//! One class, `log`. References are Loki range-query paths with a LogQL
//! `query` param; each stream entry becomes one log object. Log lines have
//! no identity and are never deduplicated.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::StoreError;
use crate::reference::Reference;
use crate::signal::{Appender, Class, ClassSpec, Domain, Object, Store};

pub const DOMAIN_NAME: &str = "loki";
pub const CLASS_NAME: &str = "log";

#[derive(Debug)]
struct LogClass;

impl ClassSpec for LogClass {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    fn name(&self) -> String {
        CLASS_NAME.to_string()
    }

    fn new_object(&self) -> Object {
        json!({"labels": {}, "timestamp": "", "line": ""})
    }

    fn id(&self, _obj: &Object) -> Option<Value> {
        None
    }
}

/// The single log class.
pub fn log_class() -> Class {
    Class::new(Arc::new(LogClass))
}

#[derive(Debug)]
pub struct LokiDomain;

impl LokiDomain {
    pub fn new() -> Arc<Self> {
        Arc::new(LokiDomain)
    }
}

impl Domain for LokiDomain {
    fn name(&self) -> &str {
        DOMAIN_NAME
    }

    fn class(&self, name: &str) -> Option<Class> {
        (name == CLASS_NAME).then(log_class)
    }

    fn classes(&self) -> Vec<Class> {
        vec![log_class()]
    }
}

/// Loki HTTP store. References must target the range-query endpoint; all
/// query params (`query`, `start`, `end`, `limit`, ...) pass through.
#[derive(Debug)]
pub struct LokiStore {
    base: Url,
    client: Client,
}

impl LokiStore {
    pub fn new(base: Url, client: Client) -> Self {
        LokiStore { base, client }
    }
}

#[async_trait]
impl Store for LokiStore {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    async fn get(
        &self,
        ctx: &CancellationToken,
        reference: &Reference,
        result: &mut (dyn Appender + Send),
    ) -> Result<(), StoreError> {
        if !reference.path.ends_with("query_range") {
            return Err(StoreError::InvalidReference(format!(
                "not a loki range query: {reference}"
            )));
        }
        if reference.query_get("query").is_none() {
            return Err(StoreError::InvalidReference(format!(
                "missing LogQL query: {reference}"
            )));
        }
        let url = reference.resolve(&self.base)?;
        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(StoreError::Cancelled),
            r = self.client.get(url).send() => r?,
        };
        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: Value = response.json().await?;
        let streams = body
            .pointer("/data/result")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                StoreError::InvalidReference(format!("unexpected loki response: {reference}"))
            })?;
        for stream in streams {
            let labels = stream.get("stream").cloned().unwrap_or_else(|| json!({}));
            let Some(values) = stream.get("values").and_then(Value::as_array) else {
                continue;
            };
            for entry in values {
                let timestamp = entry.get(0).cloned().unwrap_or(Value::Null);
                let line = entry.get(1).cloned().unwrap_or(Value::Null);
                result.append(json!({
                    "labels": labels,
                    "timestamp": timestamp,
                    "line": line,
                }));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_classes() {
        let d = LokiDomain::new();
        assert_eq!(d.name(), "loki");
        assert_eq!(d.class("log").unwrap(), log_class());
        assert!(d.class("metric").is_none());
        assert_eq!(d.classes(), vec![log_class()]);
    }

    #[test]
    fn test_log_objects_have_no_identity() {
        let class = log_class();
        assert_eq!(class.id(&json!({"line": "x"})), None);
    }
}
