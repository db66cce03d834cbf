//! Append-only node and line pools for rule/class graphs.
//!
//! All graphs built from the same [`Data`] share stable, consistent node and
//! line ids: ids are dense and equal the index in the pool. Rules can be
//! added to a `Data` but never removed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::reference::Reference;
use crate::result::SetResult;
use crate::signal::{Class, RuleRef};

use super::Graph;

/// Counts of the queries that touched a node or line.
#[derive(Debug, Clone, Default)]
pub struct QueryCounts(HashMap<Reference, usize>);

impl QueryCounts {
    pub fn new() -> Self {
        QueryCounts::default()
    }

    /// Count one occurrence of `reference`.
    pub fn update(&mut self, reference: Reference) {
        *self.0.entry(reference).or_insert(0) += 1;
    }

    pub fn get(&self, reference: &Reference) -> usize {
        self.0.get(reference).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Reference, usize)> {
        self.0.iter().map(|(r, &c)| (r, c))
    }
}

/// Graph node; corresponds to a class. The accumulators stay mutable after
/// graph construction.
#[derive(Debug)]
pub struct Node {
    id: usize,
    class: Class,
    /// Query results accumulated at this node, deduplicated by object id.
    pub result: Mutex<SetResult>,
    /// All queries leading to this node.
    pub query_counts: Mutex<QueryCounts>,
}

impl Node {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn class(&self) -> &Class {
        &self.class
    }
}

/// One line of a multi-edge; corresponds to a rule. Parallel lines between
/// the same node pair coexist.
#[derive(Debug)]
pub struct Line {
    id: usize,
    start: usize,
    goal: usize,
    rule: RuleRef,
    /// Queries generated by this line's rule.
    pub query_counts: Mutex<QueryCounts>,
}

impl Line {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Node id of the start class.
    pub fn start_id(&self) -> usize {
        self.start
    }

    /// Node id of the goal class.
    pub fn goal_id(&self) -> usize {
        self.goal
    }

    pub fn rule(&self) -> &RuleRef {
        &self.rule
    }
}

/// The class nodes and rule lines backing rule/class graphs.
#[derive(Default)]
pub struct Data {
    nodes: Vec<Arc<Node>>,
    lines: Vec<Arc<Line>>,
    node_id: HashMap<Class, usize>,
}

impl Data {
    pub fn new(rules: impl IntoIterator<Item = RuleRef>) -> Self {
        let mut data = Data::default();
        for rule in rules {
            data.add_rule(rule);
        }
        data
    }

    /// Append a line for `rule`, creating start and goal nodes on demand.
    pub fn add_rule(&mut self, rule: RuleRef) {
        let start = self.node_for(&rule.start()).id();
        let goal = self.node_for(&rule.goal()).id();
        let id = self.lines.len();
        self.lines.push(Arc::new(Line {
            id,
            start,
            goal,
            rule,
            query_counts: Mutex::new(QueryCounts::new()),
        }));
    }

    /// The node for `class`, created if necessary. Repeated calls return
    /// the same node.
    pub fn node_for(&mut self, class: &Class) -> Arc<Node> {
        if let Some(&id) = self.node_id.get(class) {
            return Arc::clone(&self.nodes[id]);
        }
        let id = self.nodes.len();
        let node = Arc::new(Node {
            id,
            class: class.clone(),
            result: Mutex::new(SetResult::new(class.clone())),
            query_counts: Mutex::new(QueryCounts::new()),
        });
        self.nodes.push(Arc::clone(&node));
        self.node_id.insert(class.clone(), id);
        node
    }

    pub fn node(&self, id: usize) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn id_of(&self, class: &Class) -> Option<usize> {
        self.node_id.get(class).copied()
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn lines(&self) -> &[Arc<Line>] {
        &self.lines
    }

    pub fn classes(&self) -> Vec<Class> {
        self.nodes.iter().map(|n| n.class.clone()).collect()
    }

    pub fn rules(&self) -> Vec<RuleRef> {
        self.lines.iter().map(|l| Arc::clone(&l.rule)).collect()
    }

    /// A graph with all nodes and no edges.
    pub fn empty_graph(&self) -> Graph {
        Graph::build(self, false)
    }

    /// A graph with all nodes and all lines.
    pub fn new_graph(&self) -> Graph {
        Graph::build(self, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::mock::mock_class;
    use crate::reference::Reference;
    use crate::rules::FnRule;

    fn rule(name: &str, start: &str, goal: &str) -> RuleRef {
        FnRule::decline(name, mock_class(start), mock_class(goal))
    }

    #[test]
    fn test_node_for_is_idempotent() {
        let mut data = Data::default();
        let a = data.node_for(&mock_class("d/a"));
        let b = data.node_for(&mock_class("d/a"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(data.nodes().len(), 1);
    }

    #[test]
    fn test_ids_are_dense_and_match_index() {
        let data = Data::new([
            rule("r0", "d/a", "d/b"),
            rule("r1", "d/b", "d/c"),
            rule("r2", "d/a", "d/b"),
        ]);
        for (i, n) in data.nodes().iter().enumerate() {
            assert_eq!(n.id(), i);
        }
        for (i, l) in data.lines().iter().enumerate() {
            assert_eq!(l.id(), i);
        }
        // Lines keep rule insertion order.
        let names: Vec<&str> = data.lines().iter().map(|l| l.rule().name()).collect();
        assert_eq!(names, vec!["r0", "r1", "r2"]);
    }

    #[test]
    fn test_line_endpoints_are_valid_node_ids() {
        let data = Data::new([rule("r", "d/a", "d/b")]);
        for l in data.lines() {
            assert!(data.node(l.start_id()).is_some());
            assert!(data.node(l.goal_id()).is_some());
        }
        assert_eq!(data.id_of(&mock_class("d/a")), Some(0));
        assert_eq!(data.id_of(&mock_class("d/b")), Some(1));
    }

    #[test]
    fn test_query_counts() {
        let mut qc = QueryCounts::new();
        let r = Reference::new("p", "a=1");
        qc.update(r.clone());
        qc.update(r.clone());
        qc.update(Reference::new("q", ""));
        assert_eq!(qc.get(&r), 2);
        assert_eq!(qc.total(), 3);
        assert_eq!(qc.len(), 2);
    }
}
