//! The class multigraph: rule lines over class nodes.
//!
//! [`Data`] owns the append-only node/line pools; [`Graph`] is an immutable
//! snapshot backed by a petgraph multigraph, offering the path queries the
//! engine and its callers consume. Path enumeration is deterministic:
//! successors are visited in node-id order and parallel lines are listed in
//! line-id order.

pub mod data;
pub mod multipath;

pub use data::{Data, Line, Node, QueryCounts};
pub use multipath::{Links, MultiPath};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::signal::{Class, RuleRef};

/// Immutable snapshot of a [`Data`] pool.
///
/// Node and line ids match the backing pools; the per-node and per-line
/// accumulators remain mutable through their locks after the snapshot is
/// taken.
pub struct Graph {
    nodes: Vec<Arc<Node>>,
    lines: Vec<Arc<Line>>,
    node_id: HashMap<Class, usize>,
    indices: Vec<NodeIndex>,
    graph: StableDiGraph<usize, usize>,
}

impl Graph {
    pub(crate) fn build(data: &Data, with_lines: bool) -> Self {
        let mut graph = StableDiGraph::new();
        let indices: Vec<NodeIndex> =
            data.nodes().iter().map(|n| graph.add_node(n.id())).collect();
        if with_lines {
            for line in data.lines() {
                graph.add_edge(indices[line.start_id()], indices[line.goal_id()], line.id());
            }
        }
        let node_id = data
            .nodes()
            .iter()
            .map(|n| (n.class().clone(), n.id()))
            .collect();
        Graph {
            nodes: data.nodes().to_vec(),
            lines: if with_lines { data.lines().to_vec() } else { Vec::new() },
            node_id,
            indices,
            graph,
        }
    }

    /// The node for `class`, if the class was ever touched by a rule.
    pub fn node_for(&self, class: &Class) -> Option<&Arc<Node>> {
        self.node_id.get(class).map(|&id| &self.nodes[id])
    }

    pub fn node(&self, id: usize) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn line(&self, id: usize) -> Option<&Arc<Line>> {
        self.lines.get(id)
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn lines(&self) -> &[Arc<Line>] {
        &self.lines
    }

    pub fn classes(&self) -> Vec<Class> {
        self.nodes.iter().map(|n| n.class().clone()).collect()
    }

    pub fn rules(&self) -> Vec<RuleRef> {
        self.lines.iter().map(|l| Arc::clone(l.rule())).collect()
    }

    /// All lines from node `start` to node `goal`, in line-id order.
    pub fn lines_between(&self, start: usize, goal: usize) -> Vec<Arc<Line>> {
        let mut lines: Vec<Arc<Line>> = self
            .graph
            .edges_connecting(self.indices[start], self.indices[goal])
            .map(|e| Arc::clone(&self.lines[*e.weight()]))
            .collect();
        lines.sort_by_key(|l| l.id());
        lines
    }

    /// Every simple path from `start` to `goal`, one [`MultiPath`] per node
    /// sequence, with parallel rules grouped per hop.
    pub fn all_paths(&self, start: &Class, goal: &Class) -> Vec<MultiPath> {
        let (Some(&s), Some(&g)) = (self.node_id.get(start), self.node_id.get(goal)) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        visited[s] = true;
        let mut path = vec![s];
        self.dfs(s, g, &mut visited, &mut path, &mut found);
        self.to_multipaths(found)
    }

    /// Every minimum-length simple path from `start` to `goal`.
    pub fn shortest_paths(&self, start: &Class, goal: &Class) -> Vec<MultiPath> {
        let (Some(&s), Some(&g)) = (self.node_id.get(start), self.node_id.get(goal)) else {
            return Vec::new();
        };
        let dist = self.distance_to(g);
        if dist[s].is_none() || s == g {
            return Vec::new();
        }
        let mut found = Vec::new();
        let mut path = vec![s];
        self.dfs_descending(s, g, &dist, &mut path, &mut found);
        self.to_multipaths(found)
    }

    fn dfs(
        &self,
        current: usize,
        goal: usize,
        visited: &mut Vec<bool>,
        path: &mut Vec<usize>,
        found: &mut Vec<Vec<usize>>,
    ) {
        if current == goal && path.len() > 1 {
            found.push(path.clone());
            return;
        }
        for next in self.successors(current) {
            if !visited[next] {
                visited[next] = true;
                path.push(next);
                self.dfs(next, goal, visited, path, found);
                path.pop();
                visited[next] = false;
            }
        }
    }

    // Follows only edges that strictly decrease the distance to the goal,
    // so every recorded path has minimum length.
    fn dfs_descending(
        &self,
        current: usize,
        goal: usize,
        dist: &[Option<usize>],
        path: &mut Vec<usize>,
        found: &mut Vec<Vec<usize>>,
    ) {
        if current == goal {
            found.push(path.clone());
            return;
        }
        let Some(d) = dist[current] else {
            return;
        };
        for next in self.successors(current) {
            if dist[next] == Some(d - 1) {
                path.push(next);
                self.dfs_descending(next, goal, dist, path, found);
                path.pop();
            }
        }
    }

    /// BFS distances to `goal` over reversed edges.
    fn distance_to(&self, goal: usize) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.nodes.len()];
        dist[goal] = Some(0);
        let mut queue = VecDeque::from([goal]);
        while let Some(id) = queue.pop_front() {
            let d = dist[id].unwrap_or(0);
            for prev in self.predecessors(id) {
                if dist[prev].is_none() {
                    dist[prev] = Some(d + 1);
                    queue.push_back(prev);
                }
            }
        }
        dist
    }

    /// Distinct successor node ids, ascending.
    fn successors(&self, id: usize) -> Vec<usize> {
        let mut v: Vec<usize> = self
            .graph
            .neighbors_directed(self.indices[id], Direction::Outgoing)
            .map(|ix| self.graph[ix])
            .collect();
        v.sort_unstable();
        v.dedup();
        v
    }

    /// Distinct predecessor node ids, ascending.
    fn predecessors(&self, id: usize) -> Vec<usize> {
        let mut v: Vec<usize> = self
            .graph
            .neighbors_directed(self.indices[id], Direction::Incoming)
            .map(|ix| self.graph[ix])
            .collect();
        v.sort_unstable();
        v.dedup();
        v
    }

    fn to_multipaths(&self, node_paths: Vec<Vec<usize>>) -> Vec<MultiPath> {
        node_paths
            .into_iter()
            .map(|path| {
                path.windows(2)
                    .map(|w| {
                        self.lines_between(w[0], w[1])
                            .iter()
                            .map(|l| Arc::clone(l.rule()))
                            .collect::<Links>()
                    })
                    .collect::<MultiPath>()
            })
            .collect()
    }
}
