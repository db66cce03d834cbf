//! Metric domain over the Prometheus instant-query API.
//!
//! One class, `metric`. A sample's identity is its label set.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::StoreError;
use crate::reference::Reference;
use crate::signal::{Appender, Class, ClassSpec, Domain, Object, Store};

pub const DOMAIN_NAME: &str = "metric";
pub const CLASS_NAME: &str = "metric";

#[derive(Debug)]
struct MetricClass;

impl ClassSpec for MetricClass {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    fn name(&self) -> String {
        CLASS_NAME.to_string()
    }

    fn new_object(&self) -> Object {
        json!({"metric": {}, "value": []})
    }

    fn id(&self, obj: &Object) -> Option<Value> {
        obj.get("metric").cloned()
    }
}

/// The single metric class.
pub fn metric_class() -> Class {
    Class::new(Arc::new(MetricClass))
}

#[derive(Debug)]
pub struct MetricDomain;

impl MetricDomain {
    pub fn new() -> Arc<Self> {
        Arc::new(MetricDomain)
    }
}

impl Domain for MetricDomain {
    fn name(&self) -> &str {
        DOMAIN_NAME
    }

    fn class(&self, name: &str) -> Option<Class> {
        (name == CLASS_NAME).then(metric_class)
    }

    fn classes(&self) -> Vec<Class> {
        vec![metric_class()]
    }
}

/// Prometheus query store. References carry a PromQL `query` param against
/// the instant-query endpoint.
#[derive(Debug)]
pub struct MetricStore {
    base: Url,
    client: Client,
}

impl MetricStore {
    pub fn new(base: Url, client: Client) -> Self {
        MetricStore { base, client }
    }
}

#[async_trait]
impl Store for MetricStore {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    async fn get(
        &self,
        ctx: &CancellationToken,
        reference: &Reference,
        result: &mut (dyn Appender + Send),
    ) -> Result<(), StoreError> {
        if reference.query_get("query").is_none() {
            return Err(StoreError::InvalidReference(format!(
                "missing PromQL query: {reference}"
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
        let samples = body
            .pointer("/data/result")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                StoreError::InvalidReference(format!("unexpected prometheus response: {reference}"))
            })?;
        for sample in samples {
            result.append(sample.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_classes() {
        let d = MetricDomain::new();
        assert_eq!(d.name(), "metric");
        assert_eq!(d.class("metric").unwrap(), metric_class());
        assert!(d.class("log").is_none());
    }

    #[test]
    fn test_sample_identity_is_label_set() {
        let class = metric_class();
        let sample = json!({"metric": {"__name__": "up", "job": "node"}, "value": [1, "1"]});
        assert_eq!(class.id(&sample).unwrap(), json!({"__name__": "up", "job": "node"}));
    }
}
