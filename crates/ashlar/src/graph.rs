use std::collections::{BTreeMap, HashMap};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;

use crate::{AshlarError, Node, NodeKind, Result};

/// Edge payload. Dependency edges carry no data of their own; direction and
/// endpoints are the whole story.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Edge;

/// A directed acyclic dependency graph with id-keyed nodes. Acyclicity is
/// established by the normalizer's cycle-breaking step; until then the
/// structure merely stores whatever the crawler found.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub(crate) inner: StableGraph<Node, Edge>,
    pub(crate) index: HashMap<String, NodeIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Default::default()
    }

    /// Test/fixture helper: a graph of regular nodes from an edge list.
    pub fn from_edge_list<'a>(edges: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut graph = Graph::new();
        for (from, to) in edges {
            graph.add_node(from);
            graph.add_node(to);
            let _ = graph.ensure_edge(from, to);
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Gets or inserts a regular node with this id.
    pub fn add_node(&mut self, id: impl AsRef<str>) -> &mut Node {
        let id = id.as_ref();
        let idx = match self.index.get(id) {
            Some(idx) => *idx,
            None => {
                let idx = self.inner.add_node(Node::new(id));
                self.index.insert(id.to_owned(), idx);
                idx
            }
        };
        &mut self.inner[idx]
    }

    /// Inserts a fully formed node, failing on id collision.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        if self.index.contains_key(&node.id) {
            return Err(AshlarError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.index.insert(id, idx);
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|idx| &self.inner[*idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let idx = *self.index.get(id)?;
        Some(&mut self.inner[idx])
    }

    /// All node ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.node_weights()
    }

    /// Adds a directed edge, rejecting self-edges, duplicates, and edges with
    /// missing endpoints. Endpoints in non-adjacent rows are fine; the
    /// normalizer's subdivision step resolves those.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        if self.ensure_edge(from, to)? {
            Ok(())
        } else {
            Err(AshlarError::DuplicateEdge(from.into(), to.into()))
        }
    }

    /// Like [`Graph::add_edge`], but an already-present edge is a no-op.
    /// Returns whether an edge was actually inserted.
    pub fn ensure_edge(&mut self, from: &str, to: &str) -> Result<bool> {
        if from == to {
            return Err(AshlarError::SelfEdge(from.into()));
        }
        let from_idx = *self
            .index
            .get(from)
            .ok_or_else(|| AshlarError::MissingNode(from.into()))?;
        let to_idx = *self
            .index
            .get(to)
            .ok_or_else(|| AshlarError::MissingNode(to.into()))?;
        if self.inner.find_edge(from_idx, to_idx).is_some() {
            return Ok(false);
        }
        self.inner.add_edge(from_idx, to_idx, Edge);
        Ok(true)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(f), Some(t)) => self.inner.find_edge(*f, *t).is_some(),
            _ => false,
        }
    }

    /// Removes an edge if present. Returns whether anything was removed.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let (Some(f), Some(t)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        match self.inner.find_edge(*f, *t) {
            Some(edge) => {
                self.inner.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    /// Removes a node and all incident edges. Returns whether anything was
    /// removed.
    pub fn remove_node(&mut self, id: &str) -> bool {
        match self.index.remove(id) {
            Some(idx) => {
                self.inner.remove_node(idx);
                true
            }
            None => false,
        }
    }

    /// Renames a node, updating all `master_id` back-references.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.index.contains_key(new) {
            return Err(AshlarError::DuplicateNode(new.into()));
        }
        let idx = self
            .index
            .remove(old)
            .ok_or_else(|| AshlarError::MissingNode(old.into()))?;
        self.inner[idx].id = new.to_owned();
        self.index.insert(new.to_owned(), idx);
        for node in self.inner.node_weights_mut() {
            if node.master_id.as_deref() == Some(old) {
                node.master_id = Some(new.to_owned());
            }
        }
        Ok(())
    }

    /// All edges as (from, to) id pairs, sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<_> = self
            .inner
            .edge_references()
            .map(|edge| {
                (
                    self.inner[edge.source()].id.clone(),
                    self.inner[edge.target()].id.clone(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    fn neighbors(&self, id: &str, dir: Direction) -> Vec<String> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .inner
            .neighbors_directed(*idx, dir)
            .map(|n| self.inner[n].id.clone())
            .collect();
        out.sort();
        out
    }

    /// Direct dependencies of `id` (edge targets), sorted.
    pub fn children(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Direct dependents of `id` (edge sources), sorted.
    pub fn parents(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|idx| {
                self.inner
                    .neighbors_directed(*idx, Direction::Incoming)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|idx| {
                self.inner
                    .neighbors_directed(*idx, Direction::Outgoing)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Nodes with no incoming edges, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut out: Vec<_> = self
            .nodes()
            .filter(|n| self.in_degree(&n.id) == 0)
            .map(|n| n.id.clone())
            .collect();
        out.sort();
        out
    }

    /// Nodes with no outgoing edges, sorted.
    pub fn sinks(&self) -> Vec<String> {
        let mut out: Vec<_> = self
            .nodes()
            .filter(|n| self.out_degree(&n.id) == 0)
            .map(|n| n.id.clone())
            .collect();
        out.sort();
        out
    }

    /// Whether every node has a row assignment.
    pub fn is_layered(&self) -> bool {
        self.nodes().all(|n| n.row.is_some())
    }

    /// Number of rows (`max(row) + 1`), 0 when unlayered or empty.
    pub fn row_count(&self) -> usize {
        self.nodes()
            .filter_map(|n| n.row)
            .max()
            .map(|r| r + 1)
            .unwrap_or(0)
    }

    /// Row index -> sorted node ids. Unlayered nodes are skipped.
    pub fn rows(&self) -> BTreeMap<usize, Vec<String>> {
        let mut rows: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for node in self.nodes() {
            if let Some(row) = node.row {
                rows.entry(row).or_default().push(node.id.clone());
            }
        }
        for ids in rows.values_mut() {
            ids.sort();
        }
        rows
    }

    /// Subdivider ids per master id, sorted by row. Masters without
    /// subdividers are absent.
    pub fn subdivider_chains(&self) -> BTreeMap<String, Vec<String>> {
        let mut chains: BTreeMap<String, Vec<(usize, String)>> = BTreeMap::new();
        for node in self.nodes() {
            if node.kind == NodeKind::Subdivider {
                if let (Some(master), Some(row)) = (&node.master_id, node.row) {
                    chains
                        .entry(master.clone())
                        .or_default()
                        .push((row, node.id.clone()));
                }
            }
        }
        chains
            .into_iter()
            .map(|(master, mut members)| {
                members.sort();
                (master, members.into_iter().map(|(_, id)| id).collect())
            })
            .collect()
    }

    /// Picks an id not yet in the graph, starting from `base`.
    pub(crate) fn fresh_id(&self, base: &str) -> String {
        if !self.index.contains_key(base) {
            return base.to_owned();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{base}.{n}");
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_node_is_get_or_insert() {
        let mut g = Graph::new();
        g.add_node("a").label = Some("A".into());
        g.add_node("a");
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.node("a").unwrap().label.as_deref(), Some("A"));
    }

    #[test]
    fn self_and_duplicate_edges_are_rejected() {
        let mut g = Graph::from_edge_list([("a", "b")]);
        assert!(matches!(
            g.add_edge("a", "a"),
            Err(AshlarError::SelfEdge(_))
        ));
        assert!(matches!(
            g.add_edge("a", "b"),
            Err(AshlarError::DuplicateEdge(..))
        ));
        assert_eq!(g.ensure_edge("a", "b").unwrap(), false);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn edge_endpoints_must_exist() {
        let mut g = Graph::new();
        g.add_node("a");
        assert!(matches!(
            g.add_edge("a", "ghost"),
            Err(AshlarError::MissingNode(_))
        ));
    }

    #[test]
    fn degrees_and_adjacency() {
        let g = Graph::from_edge_list([("a", "b"), ("a", "c"), ("b", "c")]);
        assert_eq!(g.children("a"), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(g.parents("c"), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(g.in_degree("c"), 2);
        assert_eq!(g.out_degree("a"), 2);
        assert_eq!(g.sources(), vec!["a".to_string()]);
        assert_eq!(g.sinks(), vec!["c".to_string()]);
    }

    #[test]
    fn rename_updates_master_references() {
        let mut g = Graph::from_edge_list([("a", "b")]);
        g.insert_node(Node::synthetic("a#1", NodeKind::Subdivider, "a", 1))
            .unwrap();
        g.rename("a", "alpha").unwrap();
        assert!(g.has_node("alpha"));
        assert!(!g.has_node("a"));
        assert_eq!(
            g.node("a#1").unwrap().master_id.as_deref(),
            Some("alpha")
        );
        assert!(g.has_edge("alpha", "b"));
    }

    #[test]
    fn clone_is_deep() {
        let mut g = Graph::from_edge_list([("a", "b")]);
        let snapshot = g.clone();
        g.remove_edge("a", "b");
        g.remove_node("b");
        assert_eq!(snapshot.node_count(), 2);
        assert_eq!(snapshot.edge_count(), 1);
    }
}
