//! Alert domain: one class, merging the Prometheus Alerts API with
//! Alertmanager v2 alerts.
//!
//! An alert's identity is the fingerprint of its labels. Records from both
//! backends with the same fingerprint are coalesced: Alertmanager-only
//! fields overlay the Prometheus record without discarding either side.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{EngineError, StoreError};
use crate::reference::Reference;
use crate::signal::{
    Appender, Class, ClassSpec, Domain, Object, RefConverter, Store,
};

pub const DOMAIN_NAME: &str = "alert";
pub const CLASS_NAME: &str = "alert";

/// A merged alert record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub fingerprint: String,
    /// inactive|pending|firing|suppressed
    pub status: String,

    // Prometheus fields.
    #[serde(default)]
    pub value: String,
    pub active_at: Option<DateTime<Utc>>,

    // Alertmanager fields.
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub receivers: Vec<Receiver>,
    #[serde(default)]
    pub inhibited_by: Vec<String>,
    #[serde(default)]
    pub silenced_by: Vec<String>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
}

/// The Prometheus label fingerprint: FNV-1a over sorted label pairs with
/// `0xff` separators, rendered as 16 hex digits.
pub fn fingerprint(labels: &BTreeMap<String, String>) -> String {
    const OFFSET: u64 = 14695981039346656037;
    const PRIME: u64 = 1099511628211;
    fn add(mut h: u64, s: &str) -> u64 {
        for b in s.bytes() {
            h ^= u64::from(b);
            h = h.wrapping_mul(PRIME);
        }
        h
    }
    fn add_byte(mut h: u64, b: u8) -> u64 {
        h ^= u64::from(b);
        h.wrapping_mul(PRIME)
    }
    let mut h = OFFSET;
    for (name, value) in labels {
        h = add(h, name);
        h = add_byte(h, 0xff);
        h = add(h, value);
        h = add_byte(h, 0xff);
    }
    format!("{h:016x}")
}

#[derive(Debug)]
struct AlertClass;

impl ClassSpec for AlertClass {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    fn name(&self) -> String {
        CLASS_NAME.to_string()
    }

    fn new_object(&self) -> Object {
        json!({"labels": {}, "annotations": {}, "status": ""})
    }

    // The identity of an alert is defined by its labels.
    fn id(&self, obj: &Object) -> Option<Value> {
        let fp = obj.get("fingerprint")?.as_str()?;
        if fp.is_empty() {
            None
        } else {
            Some(Value::String(fp.to_string()))
        }
    }

    fn contains(&self, obj: &Object) -> bool {
        obj.get("labels").is_some()
    }
}

/// The single alert class.
pub fn alert_class() -> Class {
    Class::new(Arc::new(AlertClass))
}

/// A store reference selecting alerts whose labels contain `labels`.
pub fn labels_reference(labels: &BTreeMap<String, String>) -> Reference {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in labels {
        serializer.append_pair(k, v);
    }
    Reference::new("alerts", serializer.finish())
}

fn labels_of(reference: &Reference) -> BTreeMap<String, String> {
    reference
        .query()
        .into_iter()
        .filter_map(|(k, mut vs)| (!vs.is_empty()).then(|| (k, vs.remove(0))))
        .collect()
}

/// The alert domain. Also converts between store and console references.
#[derive(Debug)]
pub struct AlertDomain;

impl AlertDomain {
    pub fn new() -> Arc<Self> {
        Arc::new(AlertDomain)
    }
}

impl Domain for AlertDomain {
    fn name(&self) -> &str {
        DOMAIN_NAME
    }

    // Only one class; every name resolves to it.
    fn class(&self, _name: &str) -> Option<Class> {
        Some(alert_class())
    }

    fn classes(&self) -> Vec<Class> {
        vec![alert_class()]
    }

    /// Accepts `{"labels": {...}}`.
    fn unmarshal_query(&self, data: &[u8]) -> Result<Reference, EngineError> {
        #[derive(Deserialize)]
        struct LabelsQuery {
            labels: BTreeMap<String, String>,
        }
        let q: LabelsQuery = serde_json::from_slice(data)
            .map_err(|e| EngineError::InvalidReference(format!("invalid alert query: {e}")))?;
        Ok(labels_reference(&q.labels))
    }

    fn as_ref_converter(&self) -> Option<&dyn RefConverter> {
        Some(self)
    }
}

impl RefConverter for AlertDomain {
    fn ref_store_to_console(
        &self,
        _class: &Class,
        reference: &Reference,
    ) -> Result<Reference, EngineError> {
        let labels = labels_of(reference);
        let filter: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("alerts", &filter.join(","));
        serializer.append_pair("rowFilter-alert-state", "");
        Ok(Reference::new("monitoring/alerts", serializer.finish()))
    }

    fn ref_console_to_store(
        &self,
        reference: &Reference,
    ) -> Result<(Class, Reference), EngineError> {
        if reference.path.trim_start_matches('/') != "monitoring/alerts" {
            return Err(EngineError::InvalidReference(format!(
                "invalid alert console reference: {reference}"
            )));
        }
        let mut labels = BTreeMap::new();
        if let Some(filter) = reference.query_get("alerts") {
            for pair in filter.split(',').filter(|p| !p.is_empty()) {
                let Some((k, v)) = pair.split_once('=') else {
                    return Err(EngineError::InvalidReference(format!(
                        "invalid alert filter: {pair}"
                    )));
                };
                labels.insert(k.to_string(), v.to_string());
            }
        }
        Ok((alert_class(), labels_reference(&labels)))
    }
}

// Wire shapes of the two backends.

#[derive(Debug, Deserialize)]
struct PromAlertsResponse {
    data: PromAlertsData,
}

#[derive(Debug, Deserialize)]
struct PromAlertsData {
    alerts: Vec<PromAlert>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromAlert {
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    state: String,
    #[serde(default)]
    value: String,
    active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmAlert {
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    fingerprint: Option<String>,
    status: AmStatus,
    #[serde(default)]
    receivers: Vec<Receiver>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    generator_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    silenced_by: Vec<String>,
    #[serde(default)]
    inhibited_by: Vec<String>,
}

fn matches(query: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    query
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|lv| lv == v))
}

/// Merge Prometheus and Alertmanager records by label fingerprint.
fn merge_alerts(
    prom: Vec<PromAlert>,
    am: Vec<AmAlert>,
    query: &BTreeMap<String, String>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let mut by_fingerprint: BTreeMap<String, usize> = BTreeMap::new();

    for a in prom {
        if !matches(query, &a.labels) {
            continue;
        }
        let fp = fingerprint(&a.labels);
        by_fingerprint.insert(fp.clone(), alerts.len());
        alerts.push(Alert {
            labels: a.labels,
            annotations: a.annotations,
            fingerprint: fp,
            status: a.state,
            value: a.value,
            active_at: a.active_at,
            ..Alert::default()
        });
    }

    for a in am {
        let fp = a
            .fingerprint
            .clone()
            .unwrap_or_else(|| fingerprint(&a.labels));
        let i = match by_fingerprint.get(&fp) {
            Some(&i) => i,
            None => {
                by_fingerprint.insert(fp.clone(), alerts.len());
                alerts.push(Alert {
                    labels: a.labels.clone(),
                    annotations: a.annotations.clone(),
                    fingerprint: fp,
                    ..Alert::default()
                });
                alerts.len() - 1
            }
        };
        let o = &mut alerts[i];
        o.starts_at = a.starts_at;
        o.ends_at = a.ends_at;
        o.updated_at = a.updated_at;
        o.generator_url = a.generator_url;
        o.receivers.extend(a.receivers);
        o.silenced_by = a.status.silenced_by;
        o.inhibited_by = a.status.inhibited_by;

        if o.status.is_empty() {
            // Alertmanager-only alert: anything not suppressed is firing.
            o.status = if a.status.state == "suppressed" {
                a.status.state
            } else {
                "firing".to_string()
            };
        } else if a.status.state == "suppressed" {
            o.status = a.status.state;
        }
    }

    alerts
}

/// Alert store over a Prometheus and an Alertmanager endpoint.
///
/// The reference path is ignored; the label filter is carried in the query.
/// An empty query matches every alert.
#[derive(Debug)]
pub struct AlertStore {
    prometheus: Url,
    alertmanager: Url,
    client: Client,
}

impl AlertStore {
    pub fn new(prometheus: Url, alertmanager: Url, client: Client) -> Self {
        AlertStore {
            prometheus,
            alertmanager,
            client,
        }
    }

    async fn fetch(
        &self,
        ctx: &CancellationToken,
        url: Url,
    ) -> Result<reqwest::Response, StoreError> {
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
        Ok(response)
    }
}

#[async_trait]
impl Store for AlertStore {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    async fn get(
        &self,
        ctx: &CancellationToken,
        reference: &Reference,
        result: &mut (dyn Appender + Send),
    ) -> Result<(), StoreError> {
        let query = labels_of(reference);

        let prom_url = self.prometheus.join("api/v1/alerts")?;
        let prom: PromAlertsResponse = self.fetch(ctx, prom_url).await?.json().await?;

        let mut am_url = self.alertmanager.join("api/v2/alerts")?;
        for (k, v) in &query {
            am_url
                .query_pairs_mut()
                .append_pair("filter", &format!("{k}={v}"));
        }
        let am: Vec<AmAlert> = self.fetch(ctx, am_url).await?.json().await?;

        for alert in merge_alerts(prom.data.alerts, am, &query) {
            result.append(serde_json::to_value(alert)?);
        }
        Ok(())
    }
}
