use plinth_common::Meta;
use serde::{Deserialize, Serialize};

/// What a node stands for in the tower.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A real package.
    #[default]
    Regular,
    /// A synthetic segment of a long edge, one per spanned row. Carries the
    /// origin node's id as `master_id`.
    Subdivider,
    /// A synthetic separator beam inserted to break an unavoidable crossing
    /// pattern.
    Auxiliary,
}

impl NodeKind {
    pub fn is_synthetic(self) -> bool {
        !matches!(self, NodeKind::Regular)
    }
}

/// A node in the dependency DAG.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: Option<String>,
    /// Layer index, root row = 0, increasing downward. Absent on a freshly
    /// crawled graph; the normalizer establishes it.
    pub row: Option<usize>,
    pub kind: NodeKind,
    /// For subdividers and separators: the id of the regular node this one
    /// was created for. Stored as an id, not an index, so clones and
    /// serialization stay acyclic.
    pub master_id: Option<String>,
    pub url: Option<String>,
    pub brittle: bool,
    pub meta: Meta,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            label: None,
            row: None,
            kind: NodeKind::Regular,
            master_id: None,
            url: None,
            brittle: false,
            meta: Meta::new(),
        }
    }

    pub(crate) fn synthetic(
        id: impl Into<String>,
        kind: NodeKind,
        master_id: impl Into<String>,
        row: usize,
    ) -> Self {
        Node {
            id: id.into(),
            label: None,
            row: Some(row),
            kind,
            master_id: Some(master_id.into()),
            url: None,
            brittle: false,
            meta: Meta::new(),
        }
    }

    /// Display label, falling back to the id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}
