//! Template helper functions contributed by domains and stores.
//!
//! Domains and stores publish named helpers for use by template-backed
//! rules; the engine merges all contributions into one table and installs
//! them into a Minijinja [`Environment`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::Rest;
use minijinja::{Environment, Value};

/// A variadic template helper over Minijinja values.
pub type TemplateFunc =
    Arc<dyn Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync>;

/// Named helper-function table.
///
/// Merging overwrites on name collision; the last registration wins.
#[derive(Clone, Default)]
pub struct TemplateFuncs {
    funcs: HashMap<String, TemplateFunc>,
}

impl TemplateFuncs {
    pub fn new() -> Self {
        TemplateFuncs::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, func: TemplateFunc) {
        self.funcs.insert(name.into(), func);
    }

    /// Convenience wrapper around [`insert`](Self::insert) for closures.
    pub fn add<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(func));
    }

    /// Copy every helper from `other` into this table, overwriting on
    /// collision.
    pub fn merge(&mut self, other: &TemplateFuncs) {
        for (name, func) in &other.funcs {
            self.funcs.insert(name.clone(), Arc::clone(func));
        }
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFunc> {
        self.funcs.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.funcs.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Register every helper as a global function in `env`.
    pub fn install(&self, env: &mut Environment<'_>) {
        for (name, func) in &self.funcs {
            let func = Arc::clone(func);
            env.add_function(name.clone(), move |args: Rest<Value>| (*func)(&args.0));
        }
    }
}

impl fmt::Debug for TemplateFuncs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_tuple("TemplateFuncs").field(&names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    fn upper(args: &[Value]) -> Result<Value, minijinja::Error> {
        Ok(Value::from(args[0].to_string().to_uppercase()))
    }

    #[test]
    fn test_merge_overwrites_on_collision() {
        let mut a = TemplateFuncs::new();
        a.add("f", |_| Ok(Value::from("first")));
        let mut b = TemplateFuncs::new();
        b.add("f", |_| Ok(Value::from("second")));
        a.merge(&b);
        assert_eq!(a.len(), 1);
        let f = a.get("f").unwrap().as_ref();
        assert_eq!(f(&[]).unwrap().to_string(), "second");
    }

    #[test]
    fn test_install_and_render() {
        let mut funcs = TemplateFuncs::new();
        funcs.add("shout", upper);
        let mut env = Environment::new();
        funcs.install(&mut env);
        let tmpl = env.template_from_str("{{ shout(name) }}").unwrap();
        let out = tmpl.render(context! { name => "pod" }).unwrap();
        assert_eq!(out, "POD");
    }
}
