//! Mock domain, classes and store for tests.
//!
//! Mock objects are plain strings of the form `"domain/class:data"`; their
//! identity is the whole string. A [`MockStore`] maps reference paths to
//! seeded objects and can be told to fail, optionally after appending a
//! partial result, to exercise error aggregation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::reference::Reference;
use crate::signal::{Appender, Class, ClassSpec, Domain, Object, Store};
use crate::template::TemplateFuncs;

/// A mock domain described by a space-separated spec string: the domain
/// name followed by its class names. With no classes listed, every class
/// name resolves.
#[derive(Debug)]
pub struct MockDomain {
    name: String,
    classes: Vec<String>,
    funcs: TemplateFuncs,
}

impl MockDomain {
    pub fn new(spec: &str) -> Arc<Self> {
        Self::with_funcs(spec, TemplateFuncs::new())
    }

    /// A mock domain that contributes template helpers.
    pub fn with_funcs(spec: &str, funcs: TemplateFuncs) -> Arc<Self> {
        let mut parts = spec.split_whitespace();
        let name = parts.next().unwrap_or_default().to_string();
        let classes = parts.map(String::from).collect();
        Arc::new(MockDomain {
            name,
            classes,
            funcs,
        })
    }
}

impl Domain for MockDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self, name: &str) -> Option<Class> {
        if self.classes.is_empty() || self.classes.iter().any(|c| c == name) {
            Some(new_class(&self.name, name))
        } else {
            None
        }
    }

    fn classes(&self) -> Vec<Class> {
        self.classes
            .iter()
            .map(|c| new_class(&self.name, c))
            .collect()
    }

    fn template_funcs(&self) -> TemplateFuncs {
        self.funcs.clone()
    }
}

#[derive(Debug)]
struct MockClass {
    domain: String,
    name: String,
}

impl ClassSpec for MockClass {
    fn domain_name(&self) -> &str {
        &self.domain
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn new_object(&self) -> Object {
        Value::String(format!("{}/{}:", self.domain, self.name))
    }

    fn id(&self, obj: &Object) -> Option<Value> {
        // The whole object is its own identity.
        Some(obj.clone())
    }
}

fn new_class(domain: &str, name: &str) -> Class {
    Class::new(Arc::new(MockClass {
        domain: domain.to_string(),
        name: name.to_string(),
    }))
}

/// A mock class from a `"domain/class"` name; without a slash the domain is
/// empty.
pub fn mock_class(full: &str) -> Class {
    match full.split_once('/') {
        Some((domain, name)) => new_class(domain, name),
        None => new_class("", full),
    }
}

/// A mock object from its string form.
pub fn mock_object(s: &str) -> Object {
    Value::String(s.to_string())
}

/// Mock objects from their string forms, in order.
pub fn mock_objects<'a>(specs: impl IntoIterator<Item = &'a str>) -> Vec<Object> {
    specs.into_iter().map(mock_object).collect()
}

/// A store over seeded data: reference path -> objects.
#[derive(Debug, Default)]
pub struct MockStore {
    domain: String,
    data: HashMap<String, Vec<Object>>,
    failures: HashMap<String, (Vec<Object>, String)>,
}

impl MockStore {
    pub fn new(domain: impl Into<String>) -> Self {
        MockStore {
            domain: domain.into(),
            data: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    /// Seed objects under a reference path.
    pub fn with<'a>(
        mut self,
        path: &str,
        objects: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.data.insert(path.to_string(), mock_objects(objects));
        self
    }

    /// Make `path` fail with `message`, after appending `partial` objects.
    pub fn with_failure<'a>(
        mut self,
        path: &str,
        partial: impl IntoIterator<Item = &'a str>,
        message: &str,
    ) -> Self {
        self.failures
            .insert(path.to_string(), (mock_objects(partial), message.to_string()));
        self
    }

    /// The reference that fetches the objects seeded under `path`.
    pub fn reference(path: &str) -> Reference {
        Reference::new(path, "")
    }
}

#[async_trait]
impl Store for MockStore {
    fn domain_name(&self) -> &str {
        &self.domain
    }

    async fn get(
        &self,
        ctx: &CancellationToken,
        reference: &Reference,
        result: &mut (dyn Appender + Send),
    ) -> Result<(), StoreError> {
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if let Some((partial, message)) = self.failures.get(&reference.path) {
            for obj in partial {
                result.append(obj.clone());
            }
            return Err(StoreError::Status {
                status: 500,
                body: message.clone(),
            });
        }
        let objects = self.data.get(&reference.path).ok_or_else(|| {
            StoreError::InvalidReference(format!("no mock data for reference: {reference}"))
        })?;
        for obj in objects {
            result.append(obj.clone());
        }
        Ok(())
    }
}
