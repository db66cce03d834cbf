//! Rule implementations.
//!
//! [`FnRule`] wraps a closure for programmatic wiring and tests.
//! [`TemplateRule`] renders a Minijinja template against the start object to
//! build the goal reference; this is the shape rule loaders produce.

use std::fmt;
use std::sync::Arc;

use minijinja::{context, Environment, UndefinedBehavior};

use crate::error::RuleError;
use crate::reference::Reference;
use crate::signal::{Class, Constraint, Object, Rule, RuleRef};
use crate::template::TemplateFuncs;

type ApplyFn =
    dyn Fn(&Object, Option<&Constraint>) -> Result<Reference, RuleError> + Send + Sync;

/// A rule backed by a closure.
pub struct FnRule {
    name: String,
    start: Class,
    goal: Class,
    apply: Box<ApplyFn>,
}

impl FnRule {
    pub fn new<F>(name: impl Into<String>, start: Class, goal: Class, apply: F) -> RuleRef
    where
        F: Fn(&Object, Option<&Constraint>) -> Result<Reference, RuleError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(FnRule {
            name: name.into(),
            start,
            goal,
            apply: Box::new(apply),
        })
    }

    /// A rule that declines every object. Useful for wiring up graphs whose
    /// edges are never applied.
    pub fn decline(name: impl Into<String>, start: Class, goal: Class) -> RuleRef {
        FnRule::new(name, start, goal, |_, _| Ok(Reference::EMPTY))
    }
}

impl Rule for FnRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Class {
        self.start.clone()
    }

    fn goal(&self) -> Class {
        self.goal.clone()
    }

    fn apply(
        &self,
        start: &Object,
        constraint: Option<&Constraint>,
    ) -> Result<Reference, RuleError> {
        (self.apply)(start, constraint)
    }
}

impl fmt::Debug for FnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnRule({}: {} -> {})", self.name, self.start, self.goal)
    }
}

/// A rule that renders a template into a `path?query` reference.
///
/// The template sees `object` (the start object) and `constraint`. Undefined
/// lookups are strict errors; rules decline by rendering nothing, e.g.
/// `{% if object.kind is defined %}...{% endif %}`.
pub struct TemplateRule {
    name: String,
    start: Class,
    goal: Class,
    template: String,
    env: Environment<'static>,
}

impl TemplateRule {
    pub fn new(
        name: impl Into<String>,
        start: Class,
        goal: Class,
        template: impl Into<String>,
    ) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        TemplateRule {
            name: name.into(),
            start,
            goal,
            template: template.into(),
            env,
        }
    }

    /// Install helper functions, typically the engine's merged table.
    pub fn with_funcs(mut self, funcs: &TemplateFuncs) -> Self {
        funcs.install(&mut self.env);
        self
    }
}

impl Rule for TemplateRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Class {
        self.start.clone()
    }

    fn goal(&self) -> Class {
        self.goal.clone()
    }

    fn apply(
        &self,
        start: &Object,
        constraint: Option<&Constraint>,
    ) -> Result<Reference, RuleError> {
        let tmpl = self
            .env
            .template_from_str(&self.template)
            .map_err(|e| RuleError::Template(format!("template compile error: {e}")))?;
        let ctx = context! {
            object => minijinja::Value::from_serialize(start),
            constraint => minijinja::Value::from_serialize(&constraint),
        };
        let out = tmpl
            .render(ctx)
            .map_err(|e| RuleError::Template(format!("template render error: {e}")))?;
        let out = out.trim();
        if out.is_empty() {
            return Ok(Reference::EMPTY);
        }
        Reference::parse(out).map_err(|e| RuleError::Other(e.to_string()))
    }
}

impl fmt::Debug for TemplateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TemplateRule({}: {} -> {})",
            self.name, self.start, self.goal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::mock::{mock_class, mock_object};
    use serde_json::json;

    #[test]
    fn test_fn_rule_apply() {
        let r = FnRule::new(
            "echo",
            mock_class("d/a"),
            mock_class("d/b"),
            |obj, _| Ok(Reference::new(obj.as_str().unwrap_or("").to_string(), "")),
        );
        assert_eq!(r.name(), "echo");
        assert_eq!(r.start().full_name(), "d/a");
        assert_eq!(r.goal().full_name(), "d/b");
        let reference = r.apply(&mock_object("d/a:x"), None).unwrap();
        assert_eq!(reference, Reference::new("d/a:x", ""));
    }

    #[test]
    fn test_decline_rule_returns_empty() {
        let r = FnRule::decline("never", mock_class("d/a"), mock_class("d/b"));
        assert!(r.apply(&mock_object("d/a:x"), None).unwrap().is_empty());
    }

    #[test]
    fn test_template_rule_builds_reference() {
        let r = TemplateRule::new(
            "pod-logs",
            mock_class("k8s/pod"),
            mock_class("loki/log"),
            "loki/api/v1/query_range?query={{ object.metadata.name }}",
        );
        let obj = json!({"metadata": {"name": "p1", "namespace": "ns1"}});
        let reference = r.apply(&obj, None).unwrap();
        assert_eq!(reference.path, "loki/api/v1/query_range");
        assert_eq!(reference.raw_query, "query=p1");
    }

    #[test]
    fn test_template_rule_declines_on_empty_output() {
        let r = TemplateRule::new(
            "conditional",
            mock_class("d/a"),
            mock_class("d/b"),
            "{% if object.present is defined %}path/{{ object.present }}{% endif %}",
        );
        assert!(r.apply(&json!({}), None).unwrap().is_empty());
        assert_eq!(
            r.apply(&json!({"present": "x"}), None).unwrap().path,
            "path/x"
        );
    }

    #[test]
    fn test_template_rule_missing_field_is_error() {
        let r = TemplateRule::new(
            "strict",
            mock_class("d/a"),
            mock_class("d/b"),
            "path/{{ object.missing }}",
        );
        let err = r.apply(&json!({}), None).unwrap_err();
        assert!(matches!(err, RuleError::Template(_)));
    }

    #[test]
    fn test_template_rule_uses_helpers() {
        let mut funcs = TemplateFuncs::new();
        funcs.add("selector", |args| {
            Ok(minijinja::Value::from(format!("app={}", args[0])))
        });
        let r = TemplateRule::new(
            "with-helper",
            mock_class("d/a"),
            mock_class("d/b"),
            "pods?labelSelector={{ selector(object.app) }}",
        )
        .with_funcs(&funcs);
        let reference = r.apply(&json!({"app": "web"}), None).unwrap();
        assert_eq!(reference.raw_query, "labelSelector=app=web");
    }

    #[test]
    fn test_template_rule_sees_constraint() {
        let r = TemplateRule::new(
            "windowed",
            mock_class("d/a"),
            mock_class("d/b"),
            "{% if constraint %}q?start={{ constraint.start }}{% else %}q{% endif %}",
        );
        let reference = r.apply(&json!({}), None).unwrap();
        assert_eq!(reference.path, "q");
    }
}
