use plinth_common::{keys, Meta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AshlarError, Graph, Node, NodeKind, Result};

/// Canonical serialized form of a [`Graph`]: nodes sorted by id, edges sorted
/// by (from, to), so the same graph always serializes to the same bytes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireGraph {
    #[serde(default)]
    pub nodes: Vec<WireNode>,
    #[serde(default)]
    pub edges: Vec<WireEdge>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub brittle: bool,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireEdge {
    pub from: String,
    pub to: String,
}

fn kind_tag(kind: NodeKind) -> Option<String> {
    match kind {
        NodeKind::Regular => None,
        NodeKind::Subdivider => Some("subdivider".into()),
        NodeKind::Auxiliary => Some("auxiliary".into()),
    }
}

fn kind_from_tag(tag: Option<&str>) -> Result<NodeKind> {
    match tag {
        None => Ok(NodeKind::Regular),
        Some("subdivider") => Ok(NodeKind::Subdivider),
        Some("auxiliary") => Ok(NodeKind::Auxiliary),
        Some(other) => Err(AshlarError::InvalidWire(format!(
            "unknown node kind `{other}`"
        ))),
    }
}

impl Graph {
    pub fn to_wire(&self) -> WireGraph {
        let mut nodes: Vec<WireNode> = self
            .nodes()
            .map(|node| WireNode {
                id: node.id.clone(),
                label: node.label.clone(),
                row: node.row,
                kind: kind_tag(node.kind),
                master_id: node.master_id.clone(),
                url: node.url.clone(),
                brittle: node.brittle,
                meta: node.meta.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let edges = self
            .edges()
            .into_iter()
            .map(|(from, to)| WireEdge { from, to })
            .collect();
        WireGraph { nodes, edges }
    }

    pub fn from_wire(wire: &WireGraph) -> Result<Self> {
        let mut graph = Graph::new();
        for wnode in &wire.nodes {
            let label = wnode.label.clone().or_else(|| {
                wnode
                    .meta
                    .get(keys::LABEL)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            });
            graph.insert_node(Node {
                id: wnode.id.clone(),
                label,
                row: wnode.row,
                kind: kind_from_tag(wnode.kind.as_deref())?,
                master_id: wnode.master_id.clone(),
                url: wnode.url.clone(),
                brittle: wnode.brittle,
                meta: wnode.meta.clone(),
            })?;
        }
        for wedge in &wire.edges {
            graph.add_edge(&wedge.from, &wedge.to)?;
        }
        Ok(graph)
    }

    /// Serializes to the canonical JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_wire())?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let wire: WireGraph = serde_json::from_slice(bytes)?;
        Graph::from_wire(&wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serialization_is_canonical() {
        let mut a = Graph::new();
        a.add_node("z");
        a.add_node("a");
        a.ensure_edge("z", "a").unwrap();

        let mut b = Graph::new();
        b.add_node("a");
        b.add_node("z");
        b.ensure_edge("z", "a").unwrap();

        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn round_trip_preserves_everything() {
        let mut g = Graph::new();
        let node = g.add_node("a");
        node.label = Some("Package A".into());
        node.brittle = true;
        node.meta.set_version("1.0.0");
        g.add_node("b").row = Some(1);
        g.add_edge("a", "b").unwrap();

        let bytes = g.to_json().unwrap();
        let back = Graph::from_json(&bytes).unwrap();
        assert_eq!(back.to_json().unwrap(), bytes);
        assert_eq!(back.node("a").unwrap().label.as_deref(), Some("Package A"));
        assert_eq!(back.node("a").unwrap().meta.version(), Some("1.0.0"));
        assert!(back.node("a").unwrap().brittle);
        assert_eq!(back.node("b").unwrap().row, Some(1));
    }

    #[test]
    fn label_round_trips_through_reserved_meta_key() {
        let json = br#"{"nodes":[{"id":"a","meta":{"_label":"From Meta"}}],"edges":[]}"#;
        let g = Graph::from_json(json).unwrap();
        assert_eq!(g.node("a").unwrap().label.as_deref(), Some("From Meta"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let json = br#"{"nodes":[{"id":"a","kind":"pillar"}],"edges":[]}"#;
        assert!(matches!(
            Graph::from_json(json),
            Err(AshlarError::InvalidWire(_))
        ));
    }

    #[test]
    fn edges_referencing_missing_nodes_are_rejected() {
        let json = br#"{"nodes":[{"id":"a"}],"edges":[{"from":"a","to":"ghost"}]}"#;
        assert!(matches!(
            Graph::from_json(json),
            Err(AshlarError::MissingNode(_))
        ));
    }
}
