//! Kubernetes domain: classes are group/version/kind types, references are
//! API REST paths, the store is an API-server client.
//!
//! The set of known types is an explicit [`Scheme`] value injected into the
//! domain and store constructors; nothing here is process-global.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{EngineError, StoreError};
use crate::reference::Reference;
use crate::signal::{
    Appender, Class, ClassSpec, Domain, Object, RefClasser, RefConverter, Store,
};
use crate::template::TemplateFuncs;

pub const DOMAIN_NAME: &str = "k8s";

/// One registered API type: group/version/kind plus its REST resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub resource: String,
}

impl KnownType {
    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Registry of the API types the domain knows, with kind<->resource
/// mapping.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    types: Vec<KnownType>,
}

impl Scheme {
    pub fn new() -> Self {
        Scheme::default()
    }

    pub fn register(
        &mut self,
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        resource: impl Into<String>,
    ) {
        self.types.push(KnownType {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            resource: resource.into(),
        });
    }

    /// A scheme seeded with the common built-in types.
    pub fn builtin() -> Self {
        let mut s = Scheme::new();
        for (kind, resource) in [
            ("Pod", "pods"),
            ("Service", "services"),
            ("Node", "nodes"),
            ("Namespace", "namespaces"),
            ("Event", "events"),
            ("ConfigMap", "configmaps"),
            ("Secret", "secrets"),
            ("ServiceAccount", "serviceaccounts"),
            ("PersistentVolume", "persistentvolumes"),
            ("PersistentVolumeClaim", "persistentvolumeclaims"),
        ] {
            s.register("", "v1", kind, resource);
        }
        for (kind, resource) in [
            ("Deployment", "deployments"),
            ("ReplicaSet", "replicasets"),
            ("StatefulSet", "statefulsets"),
            ("DaemonSet", "daemonsets"),
        ] {
            s.register("apps", "v1", kind, resource);
        }
        s.register("batch", "v1", "Job", "jobs");
        s.register("batch", "v1", "CronJob", "cronjobs");
        s.register("networking.k8s.io", "v1", "Ingress", "ingresses");
        s
    }

    pub fn types(&self) -> &[KnownType] {
        &self.types
    }

    pub fn find(&self, group: &str, version: &str, kind: &str) -> Option<&KnownType> {
        self.types
            .iter()
            .find(|t| t.group == group && t.version == version && t.kind == kind)
    }

    pub fn by_resource(&self, resource: &str) -> Option<&KnownType> {
        self.types.iter().find(|t| t.resource == resource)
    }

    fn by_group_kind(&self, group: &str, kind: &str) -> Option<&KnownType> {
        self.types.iter().find(|t| t.group == group && t.kind == kind)
    }

    fn by_kind(&self, kind: &str) -> Option<&KnownType> {
        self.types.iter().find(|t| t.kind == kind)
    }

    /// Resolve a class name in one of the forms `Kind`, `Kind.Group`,
    /// `Kind.Version.Group`. The core group is written with a trailing dot:
    /// `Pod.v1.`.
    pub fn parse_class_name(&self, name: &str) -> Option<&KnownType> {
        if let Some((kind, rest)) = name.split_once('.') {
            if let Some((version, group)) = rest.split_once('.') {
                if let Some(t) = self.find(group, version, kind) {
                    return Some(t);
                }
            }
            if let Some(t) = self.by_group_kind(rest, kind) {
                return Some(t);
            }
        }
        self.by_kind(name)
    }
}

#[derive(Debug)]
struct K8sClass(KnownType);

impl ClassSpec for K8sClass {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    // Kind.Version.Group, with a trailing dot for the core group so the
    // name stays reversible.
    fn name(&self) -> String {
        format!("{}.{}.{}", self.0.kind, self.0.version, self.0.group)
    }

    fn new_object(&self) -> Object {
        json!({
            "apiVersion": self.0.api_version(),
            "kind": self.0.kind,
            "metadata": {},
        })
    }

    /// `namespace/name` from the object metadata; cluster-scoped objects
    /// use an empty namespace.
    fn id(&self, obj: &Object) -> Option<Value> {
        let metadata = obj.get("metadata")?;
        let name = metadata.get("name")?.as_str()?;
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(Value::String(format!("{namespace}/{name}")))
    }

    fn contains(&self, obj: &Object) -> bool {
        match obj.get("kind").and_then(Value::as_str) {
            Some(kind) => kind == self.0.kind,
            None => true,
        }
    }
}

/// The class for a known type.
pub fn class_for(t: &KnownType) -> Class {
    Class::new(Arc::new(K8sClass(t.clone())))
}

/// The Kubernetes domain over an injected scheme.
#[derive(Debug)]
pub struct K8sDomain {
    scheme: Arc<Scheme>,
}

impl K8sDomain {
    pub fn new(scheme: Arc<Scheme>) -> Arc<Self> {
        Arc::new(K8sDomain { scheme })
    }
}

impl Domain for K8sDomain {
    fn name(&self) -> &str {
        DOMAIN_NAME
    }

    fn class(&self, name: &str) -> Option<Class> {
        self.scheme.parse_class_name(name).map(class_for)
    }

    fn classes(&self) -> Vec<Class> {
        self.scheme.types().iter().map(class_for).collect()
    }

    fn template_funcs(&self) -> TemplateFuncs {
        let mut funcs = TemplateFuncs::new();
        // selector(map) renders a label map as "k=v,k=v" with sorted keys,
        // the form the labelSelector query param takes.
        funcs.add("selector", |args| {
            let map = args.first().ok_or_else(|| {
                minijinja::Error::new(
                    minijinja::ErrorKind::MissingArgument,
                    "selector requires a map argument",
                )
            })?;
            let mut pairs = Vec::new();
            for key in map.try_iter()? {
                let value = map.get_item(&key)?;
                pairs.push(format!("{key}={value}"));
            }
            pairs.sort_unstable();
            Ok(minijinja::Value::from(pairs.join(",")))
        });
        funcs
    }
}

// Parse a K8s API path into: group, version, namespace, resource, name.
// See: https://kubernetes.io/docs/reference/using-api/api-concepts/
static API_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)(?:(?:apis/([^/]+)/)|(?:api/))([^/]+)(?:/namespaces/([^/]+))?/([^/]+)(?:/([^/]+))?$")
        .expect("static regex")
});

static CONSOLE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)(?:k8s/ns/([^/]+)|cluster)/([^/]+)(?:/([^/]+))?$").expect("static regex")
});

#[derive(Debug)]
struct ParsedPath {
    known: KnownType,
    namespace: String,
    name: String,
}

fn join_path(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// Kubernetes API store. References resolve against the API server base
/// URL; a trailing name selects a single object, otherwise the resource is
/// listed with `labelSelector`/`fieldSelector` passed through.
#[derive(Debug)]
pub struct K8sStore {
    base: Url,
    client: Client,
    scheme: Arc<Scheme>,
}

impl K8sStore {
    pub fn new(base: Url, client: Client, scheme: Arc<Scheme>) -> Self {
        K8sStore {
            base,
            client,
            scheme,
        }
    }

    /// The absolute URL a reference resolves to.
    pub fn resolve(&self, reference: &Reference) -> Result<Url, url::ParseError> {
        reference.resolve(&self.base)
    }

    fn parse_path(&self, path: &str) -> Result<ParsedPath, StoreError> {
        let caps = API_PATH.captures(path).ok_or_else(|| {
            StoreError::InvalidReference(format!("invalid k8s REST path: {path}"))
        })?;
        let group = caps.get(1).map_or("", |m| m.as_str());
        let version = &caps[2];
        let resource = &caps[4];
        let known = self
            .scheme
            .by_resource(resource)
            .filter(|t| t.group == group && t.version == version)
            .ok_or_else(|| {
                StoreError::InvalidReference(format!("unknown k8s resource: {path}"))
            })?;
        Ok(ParsedPath {
            known: known.clone(),
            namespace: caps.get(3).map_or("", |m| m.as_str()).to_string(),
            name: caps.get(5).map_or("", |m| m.as_str()).to_string(),
        })
    }
}

#[async_trait]
impl Store for K8sStore {
    fn domain_name(&self) -> &str {
        DOMAIN_NAME
    }

    async fn get(
        &self,
        ctx: &CancellationToken,
        reference: &Reference,
        result: &mut (dyn Appender + Send),
    ) -> Result<(), StoreError> {
        let parsed = self.parse_path(&reference.path)?;
        let url = self.resolve(reference)?;
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
        if parsed.name.is_empty() {
            let items = body.get("items").and_then(Value::as_array).ok_or_else(|| {
                StoreError::InvalidReference(format!("expected a list response: {reference}"))
            })?;
            for item in items {
                result.append(item.clone());
            }
        } else {
            result.append(body);
        }
        Ok(())
    }

    fn as_ref_converter(&self) -> Option<&dyn RefConverter> {
        Some(self)
    }

    fn as_ref_classer(&self) -> Option<&dyn RefClasser> {
        Some(self)
    }
}

impl RefClasser for K8sStore {
    fn ref_class(&self, reference: &Reference) -> Option<Class> {
        self.parse_path(&reference.path)
            .ok()
            .map(|p| class_for(&p.known))
    }
}

impl RefConverter for K8sStore {
    fn ref_store_to_console(
        &self,
        _class: &Class,
        reference: &Reference,
    ) -> Result<Reference, EngineError> {
        let p = self.parse_path(&reference.path).map_err(|_| {
            EngineError::InvalidReference(format!("invalid k8s reference: {reference}"))
        })?;
        let path = if p.namespace.is_empty() {
            join_path(&["k8s", "cluster", p.known.resource.as_str(), p.name.as_str()])
        } else {
            join_path(&[
                "k8s",
                "ns",
                p.namespace.as_str(),
                p.known.resource.as_str(),
                p.name.as_str(),
            ])
        };
        Ok(Reference::new(path, ""))
    }

    fn ref_console_to_store(
        &self,
        reference: &Reference,
    ) -> Result<(Class, Reference), EngineError> {
        let caps = CONSOLE_PATH.captures(&reference.path).ok_or_else(|| {
            EngineError::InvalidReference(format!("invalid k8s console reference: {reference}"))
        })?;
        let namespace = caps.get(1).map_or("", |m| m.as_str());
        let mut resource = &caps[2];
        if resource == "projects" {
            // Openshift alias for namespaces.
            resource = "namespaces";
        }
        let name = caps.get(3).map_or("", |m| m.as_str());
        let known = self.scheme.by_resource(resource).ok_or_else(|| {
            EngineError::InvalidReference(format!(
                "invalid resource in console reference: {reference}"
            ))
        })?;
        let ns_segment = prefix_ns(namespace);
        let path = if known.group.is_empty() {
            join_path(&[
                "api",
                known.version.as_str(),
                ns_segment.as_str(),
                resource,
                name,
            ])
        } else {
            join_path(&[
                "apis",
                known.group.as_str(),
                known.version.as_str(),
                ns_segment.as_str(),
                resource,
                name,
            ])
        };
        Ok((class_for(known), Reference::new(path, "")))
    }
}

fn prefix_ns(namespace: &str) -> String {
    if namespace.is_empty() {
        String::new()
    } else {
        format!("namespaces/{namespace}")
    }
}
