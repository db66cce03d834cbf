//! The correlation engine: registries plus traversal.
//!
//! An [`Engine`] combines a set of domains, their stores, and a set of rules
//! so it can correlate across domains. Callers configure first
//! (`add_domain`/`add_rule`, `&mut self`), then traverse concurrently
//! (`follow`/`get_all`, `&self`) with one [`Results`] per traversal.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{EngineError, EngineResult, Errors};
use crate::graph::{Data, Graph, MultiPath};
use crate::reference::Reference;
use crate::result::{ListResult, Results};
use crate::signal::{
    Appender, Class, Constraint, Domain, Object, RefClasser, RefConverter, RuleRef, Store,
};
use crate::template::TemplateFuncs;
use crate::unique;

/// Correlation engine over a set of domains, stores and rules.
#[derive(Default)]
pub struct Engine {
    domains: HashMap<String, Arc<dyn Domain>>,
    stores: HashMap<String, Arc<dyn Store>>,
    rules: Vec<RuleRef>,
    graph: OnceLock<Graph>,
    template_funcs: TemplateFuncs,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    /// Register a domain and, optionally, its store, under the domain name.
    /// Re-registering a name replaces the prior entry. Template helpers
    /// contributed by the domain or store are merged into the engine's
    /// table; name collisions overwrite silently.
    pub fn add_domain(&mut self, domain: Arc<dyn Domain>, store: Option<Arc<dyn Store>>) {
        let name = domain.name().to_string();
        self.template_funcs.merge(&domain.template_funcs());
        self.domains.insert(name.clone(), domain);
        if let Some(store) = store {
            self.template_funcs.merge(&store.template_funcs());
            self.stores.insert(name, store);
        }
    }

    /// Get a registered domain by name.
    pub fn domain(&self, name: &str) -> EngineResult<Arc<dyn Domain>> {
        self.domains
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::DomainNotFound(name.to_string()))
    }

    pub fn domains(&self) -> Vec<Arc<dyn Domain>> {
        self.domains.values().cloned().collect()
    }

    /// Get the store for a domain by name.
    pub fn store(&self, name: &str) -> EngineResult<Arc<dyn Store>> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NoStore(name.to_string()))
    }

    /// Parse a full `domain/class` name and return the class.
    pub fn parse_class(&self, name: &str) -> EngineResult<Class> {
        let Some((domain_name, class_name)) = name.split_once('/') else {
            return Err(EngineError::InvalidClassName(name.to_string()));
        };
        if domain_name.is_empty() || class_name.is_empty() {
            return Err(EngineError::InvalidClassName(name.to_string()));
        }
        let domain = self.domain(domain_name)?;
        domain
            .class(class_name)
            .ok_or_else(|| EngineError::ClassNotFound {
                domain: domain_name.to_string(),
                class: class_name.to_string(),
            })
    }

    pub fn rules(&self) -> &[RuleRef] {
        &self.rules
    }

    /// Append a rule. Fails once the graph has been built: graphs share the
    /// engine's rule pool and never see later additions.
    pub fn add_rule(&mut self, rule: RuleRef) -> EngineResult<()> {
        if self.graph.get().is_some() {
            return Err(EngineError::RulesSealed);
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = RuleRef>) -> EngineResult<()> {
        for rule in rules {
            self.add_rule(rule)?;
        }
        Ok(())
    }

    /// The rule graph, computed from the engine's rules on the first call.
    /// Subsequent calls return the same graph.
    pub fn graph(&self) -> &Graph {
        self.graph
            .get_or_init(|| Data::new(self.rules.iter().cloned()).new_graph())
    }

    /// Template helper functions merged from every registered domain and
    /// store.
    pub fn template_funcs(&self) -> &TemplateFuncs {
        &self.template_funcs
    }

    /// Reference converter for a domain: the domain itself, or its store.
    pub fn ref_converter(&self, name: &str) -> EngineResult<&dyn RefConverter> {
        let domain = self
            .domains
            .get(name)
            .ok_or_else(|| EngineError::DomainNotFound(name.to_string()))?;
        if let Some(converter) = domain.as_ref_converter() {
            return Ok(converter);
        }
        if let Some(converter) = self.stores.get(name).and_then(|s| s.as_ref_converter()) {
            return Ok(converter);
        }
        Err(EngineError::NoRefConverter(name.to_string()))
    }

    /// Reference classer for a domain: the domain itself, or its store.
    pub fn ref_classer(&self, name: &str) -> EngineResult<&dyn RefClasser> {
        let domain = self
            .domains
            .get(name)
            .ok_or_else(|| EngineError::DomainNotFound(name.to_string()))?;
        if let Some(classer) = domain.as_ref_classer() {
            return Ok(classer);
        }
        if let Some(classer) = self.stores.get(name).and_then(|s| s.as_ref_classer()) {
            return Ok(classer);
        }
        Err(EngineError::NoRefClasser(name.to_string()))
    }

    /// Follow the rules of a multipath from `starters`, accumulating
    /// references and objects per class into `results`.
    ///
    /// Rule and store failures are collected, not fatal: the walk continues
    /// and the aggregated errors are returned at the end. Cancellation
    /// between hops returns the partial error plus `Cancelled`.
    pub async fn follow(
        &self,
        ctx: &CancellationToken,
        starters: &[Object],
        constraint: Option<&Constraint>,
        path: &MultiPath,
        results: &mut Results,
    ) -> Result<(), Errors> {
        if !path.valid() {
            return Err(Errors::from(EngineError::InvalidPath(path.to_string())));
        }
        debug!(%path, "follow path");
        let mut errs = Errors::new();
        let mut starters: Vec<Object> = starters.to_vec();
        let mut refs: unique::List<Reference> = unique::List::new();
        for (i, links) in path.links().iter().enumerate() {
            if ctx.is_cancelled() {
                errs.push(EngineError::Cancelled);
                break;
            }
            let Some(goal) = links.goal() else {
                errs.push(EngineError::Internal(format!("empty links in {path}")));
                break;
            };
            refs.clear();
            debug!(%links, %goal, "follow links");
            for rule in links.rules() {
                self.follow_each(rule, &starters, constraint, &mut refs, &mut errs);
            }
            results.get(&goal).references.extend(refs.iter().cloned());
            if i == path.len() - 1 || refs.is_empty() {
                break;
            }
            let mut objects = ListResult::new();
            if let Err(e) = self.get_all(ctx, &goal, refs.as_slice(), &mut objects).await {
                errs.merge(e);
            }
            starters = objects.into_list();
            let entry = results.get(&goal);
            for obj in &starters {
                entry.objects.append(obj.clone());
            }
            debug!(%goal, count = starters.len(), "follow got objects");
        }
        errs.into_result()
    }

    /// Follow multiple paths independently, concatenating results. No
    /// cross-path dedup; errors from all paths aggregate.
    pub async fn follow_all(
        &self,
        ctx: &CancellationToken,
        starters: &[Object],
        constraint: Option<&Constraint>,
        paths: &[MultiPath],
        results: &mut Results,
    ) -> Result<(), Errors> {
        debug!(paths = paths.len(), objects = starters.len(), "follow all");
        let mut errs = Errors::new();
        for path in paths {
            if let Err(e) = self.follow(ctx, starters, constraint, path, results).await {
                errs.merge(e);
            }
        }
        errs.into_result()
    }

    /// Execute every reference against the class's store, appending objects
    /// to `result`. Errors are aggregated per reference; iteration stops
    /// early only on cancellation.
    pub async fn get_all(
        &self,
        ctx: &CancellationToken,
        class: &Class,
        refs: &[Reference],
        result: &mut (dyn Appender + Send),
    ) -> Result<(), Errors> {
        let store = self.store(class.domain_name()).map_err(Errors::from)?;
        let mut errs = Errors::new();
        for reference in refs {
            if ctx.is_cancelled() {
                errs.push(EngineError::Cancelled);
                break;
            }
            if let Err(e) = store.get(ctx, reference, result).await {
                errs.push(EngineError::Store {
                    reference: reference.to_string(),
                    source: e,
                });
            }
        }
        errs.into_result()
    }

    /// Dereference the references of the most recently added entry in
    /// `results` into its objects. No-op on empty results.
    pub async fn get_last(
        &self,
        ctx: &CancellationToken,
        results: &mut Results,
    ) -> Result<(), Errors> {
        let Some(entry) = results.last_mut() else {
            return Ok(());
        };
        let class = entry.class.clone();
        let refs = entry.references.to_vec();
        self.get_all(ctx, &class, &refs, &mut entry.objects).await
    }

    // Apply one rule to every starter, collecting non-empty references.
    // Empty references are silently dropped; errors are tagged with the
    // rule name and collected.
    fn follow_each(
        &self,
        rule: &RuleRef,
        starters: &[Object],
        constraint: Option<&Constraint>,
        refs: &mut unique::List<Reference>,
        errs: &mut Errors,
    ) {
        for starter in starters {
            match rule.apply(starter, constraint) {
                Err(e) => errs.push(EngineError::Rule {
                    rule: rule.name().to_string(),
                    source: e,
                }),
                Ok(reference) if reference.is_empty() => {}
                Ok(reference) => {
                    refs.append(reference);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::mock::{mock_class, MockDomain, MockStore};
    use crate::rules::FnRule;

    fn engine_with_mock() -> Engine {
        let mut e = Engine::new();
        e.add_domain(
            MockDomain::new("foo a b c"),
            Some(Arc::new(MockStore::new("foo"))),
        );
        e
    }

    #[test]
    fn test_domain_lookup() {
        let e = engine_with_mock();
        assert_eq!(e.domain("foo").unwrap().name(), "foo");
        assert!(matches!(
            e.domain("bar").unwrap_err(),
            EngineError::DomainNotFound(_)
        ));
    }

    #[test]
    fn test_store_lookup() {
        let mut e = engine_with_mock();
        assert!(e.store("foo").is_ok());
        // Domain without store.
        e.add_domain(MockDomain::new("nostore x"), None);
        assert!(matches!(e.store("nostore").unwrap_err(), EngineError::NoStore(_)));
    }

    #[test]
    fn test_add_domain_replaces_prior_entry() {
        let mut e = Engine::new();
        e.add_domain(MockDomain::new("foo a"), None);
        e.add_domain(MockDomain::new("foo b"), None);
        assert!(e.domain("foo").unwrap().class("b").is_some());
        assert!(e.domain("foo").unwrap().class("a").is_none());
        assert_eq!(e.domains().len(), 1);
    }

    #[test]
    fn test_parse_class() {
        let e = engine_with_mock();
        assert_eq!(e.parse_class("foo/a").unwrap().full_name(), "foo/a");
        assert!(matches!(
            e.parse_class("foo").unwrap_err(),
            EngineError::InvalidClassName(_)
        ));
        assert!(matches!(
            e.parse_class("/a").unwrap_err(),
            EngineError::InvalidClassName(_)
        ));
        assert!(matches!(
            e.parse_class("foo/").unwrap_err(),
            EngineError::InvalidClassName(_)
        ));
        assert!(matches!(
            e.parse_class("bar/a").unwrap_err(),
            EngineError::DomainNotFound(_)
        ));
        assert!(matches!(
            e.parse_class("foo/x").unwrap_err(),
            EngineError::ClassNotFound { .. }
        ));
    }

    #[test]
    fn test_rules_sealed_after_graph() {
        let mut e = engine_with_mock();
        e.add_rule(FnRule::decline("r0", mock_class("foo/a"), mock_class("foo/b")))
            .unwrap();
        let graph = e.graph();
        assert_eq!(graph.lines().len(), 1);
        let err = e
            .add_rule(FnRule::decline("r1", mock_class("foo/b"), mock_class("foo/c")))
            .unwrap_err();
        assert!(matches!(err, EngineError::RulesSealed));
        // The graph is not recomputed.
        assert_eq!(e.graph().lines().len(), 1);
    }

    #[test]
    fn test_graph_rules_match_engine_rules() {
        let mut e = engine_with_mock();
        e.add_rules([
            FnRule::decline("r0", mock_class("foo/a"), mock_class("foo/b")),
            FnRule::decline("r1", mock_class("foo/b"), mock_class("foo/c")),
        ])
        .unwrap();
        let graph = e.graph();
        let names: Vec<&str> = graph.lines().iter().map(|l| l.rule().name()).collect();
        assert_eq!(names, vec!["r0", "r1"]);
        assert_eq!(graph.nodes().len(), 3);
    }

    #[test]
    fn test_template_funcs_merged_from_domain() {
        let mut funcs = TemplateFuncs::new();
        funcs.add("hello", |_| Ok(minijinja::Value::from("hi")));
        let mut e = Engine::new();
        e.add_domain(MockDomain::with_funcs("foo a", funcs), None);
        assert!(e.template_funcs().get("hello").is_some());
    }

    #[test]
    fn test_ref_converter_not_found() {
        let e = engine_with_mock();
        assert!(matches!(
            e.ref_converter("foo").unwrap_err(),
            EngineError::NoRefConverter(_)
        ));
        assert!(matches!(
            e.ref_converter("missing").unwrap_err(),
            EngineError::DomainNotFound(_)
        ));
    }
}
