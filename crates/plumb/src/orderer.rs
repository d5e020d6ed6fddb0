use ashlar::Graph;

use crate::{PlumbError, Result};

/// One ordered id list per row, indexed by row.
pub type RowOrders = Vec<Vec<String>>;

/// A row-ordering strategy. The pipeline runner is generic over this.
pub trait Orderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produces an ordering for every row of a normalized graph.
    fn order_rows(&self, graph: &Graph) -> Result<RowOrders>;
}

/// Validates that `graph` is ordering-ready (layered, unit-span edges) and
/// returns the base ordering: each row's ids sorted alphabetically.
pub(crate) fn base_rows(graph: &Graph) -> Result<RowOrders> {
    if graph.node_count() == 0 {
        return Ok(Vec::new());
    }
    if !graph.is_layered() {
        return Err(PlumbError::UnlayeredGraph);
    }
    for (from, to) in graph.edges() {
        let from_row = graph.node(&from).and_then(|n| n.row).unwrap_or(0);
        let to_row = graph.node(&to).and_then(|n| n.row).unwrap_or(0);
        if to_row != from_row + 1 {
            return Err(PlumbError::NonUnitEdge { from, to });
        }
    }
    let mut rows: RowOrders = vec![Vec::new(); graph.row_count()];
    for (row, ids) in graph.rows() {
        rows[row] = ids;
    }
    Ok(rows)
}
