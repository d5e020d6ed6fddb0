use std::collections::{BTreeMap, HashMap};

use ashlar::{Graph, NodeKind};

use crate::{
    Block, FlowDirection, GantryError, Layout, LayoutBlock, LayoutOptions, Result,
};

const EPS: f64 = 1e-6;

/// Builds a tower layout from a normalized graph and its row orders.
///
/// Widths come from the support-weight flow, each row is justified to fill
/// the frame, then the overlap repair pass widens blocks until every edge's
/// blocks share at least `min_overlap` horizontally (or the round cap is
/// hit; leftovers are counted on the layout).
pub fn build(graph: &Graph, orders: &[Vec<String>], opts: &LayoutOptions) -> Result<Layout> {
    if graph.node_count() == 0 {
        return Ok(empty_layout(opts));
    }
    if !graph.is_layered() {
        return Err(GantryError::UnlayeredGraph);
    }
    if orders.len() != graph.row_count() {
        return Err(GantryError::RowMismatch {
            expected: graph.row_count(),
            got: orders.len(),
        });
    }
    for row in orders {
        for id in row {
            if !graph.has_node(id) {
                return Err(GantryError::MissingNode(id.clone()));
            }
        }
    }

    let weights = support_weights(graph, opts.flow);
    let row_tops = row_bands(graph, orders, opts);

    let mut blocks: BTreeMap<String, LayoutBlock> = BTreeMap::new();
    for (r, row) in orders.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let (top, bottom) = row_tops[r];
        let count = row.len();
        let avail = (opts.frame.inner_width() - opts.gap * (count - 1) as f64).max(0.0);
        let total: f64 = row.iter().map(|id| weights.get(id).copied().unwrap_or(1.0)).sum();
        let mut x = opts.frame.margin_x;
        for id in row {
            let share = if total > EPS {
                weights.get(id).copied().unwrap_or(1.0) / total
            } else {
                1.0 / count as f64
            };
            let width = (avail * share).max(1.0);
            let node = graph.node(id).expect("validated above");
            blocks.insert(
                id.clone(),
                LayoutBlock {
                    block: Block {
                        left: x,
                        right: x + width,
                        top,
                        bottom,
                    },
                    label: Some(node.display_label().to_string()),
                    url: node.url.clone(),
                    brittle: node.brittle,
                    meta: node.meta.clone(),
                },
            );
            x += width + opts.gap;
        }
    }

    let mut layout = Layout {
        frame: opts.frame,
        style: opts.style,
        viz: opts.viz,
        seed: opts.seed,
        randomized: false,
        merged: false,
        rows: orders
            .iter()
            .enumerate()
            .map(|(r, ids)| (r, ids.clone()))
            .collect(),
        blocks,
        nebraska: None,
        overlap_violations: 0,
    };
    layout.overlap_violations = fix_overlaps(graph, &mut layout, opts);
    tracing::debug!(
        "laid out {} blocks in {} rows ({} residual overlap violations)",
        layout.blocks.len(),
        layout.rows.len(),
        layout.overlap_violations,
    );
    Ok(layout)
}

fn empty_layout(opts: &LayoutOptions) -> Layout {
    Layout {
        frame: opts.frame,
        style: opts.style,
        viz: opts.viz,
        seed: opts.seed,
        randomized: false,
        merged: false,
        rows: BTreeMap::new(),
        blocks: BTreeMap::new(),
        nebraska: None,
        overlap_violations: 0,
    }
}

/// Per-node support weight. Bottom-up: a sink weighs 1 and an internal node
/// carries the sum of its children's weights split by their in-degrees, so a
/// shared dependency is not double-counted. Top-down mirrors it from the
/// sources.
pub fn support_weights(graph: &Graph, flow: FlowDirection) -> HashMap<String, f64> {
    let rows = graph.rows();
    let mut weights: HashMap<String, f64> = HashMap::new();
    match flow {
        FlowDirection::BottomUp => {
            for (_, ids) in rows.iter().rev() {
                for id in ids {
                    let children = graph.children(id);
                    let weight = if children.is_empty() {
                        1.0
                    } else {
                        children
                            .iter()
                            .map(|c| {
                                weights.get(c).copied().unwrap_or(1.0)
                                    / graph.in_degree(c).max(1) as f64
                            })
                            .sum()
                    };
                    weights.insert(id.clone(), weight);
                }
            }
        }
        FlowDirection::TopDown => {
            for (_, ids) in rows.iter() {
                for id in ids {
                    let parents = graph.parents(id);
                    let weight = if parents.is_empty() {
                        1.0
                    } else {
                        parents
                            .iter()
                            .map(|p| {
                                weights.get(p).copied().unwrap_or(1.0)
                                    / graph.out_degree(p).max(1) as f64
                            })
                            .sum()
                    };
                    weights.insert(id.clone(), weight);
                }
            }
        }
    }
    weights
}

/// Vertical bands per row: uniform height, with auxiliary-only rows scaled
/// down to `aux_row_scale` of a regular row.
fn row_bands(graph: &Graph, orders: &[Vec<String>], opts: &LayoutOptions) -> Vec<(f64, f64)> {
    let aux_only: Vec<bool> = orders
        .iter()
        .map(|row| {
            !row.is_empty()
                && row.iter().all(|id| {
                    graph
                        .node(id)
                        .map(|n| n.kind == NodeKind::Auxiliary)
                        .unwrap_or(false)
                })
        })
        .collect();
    let units: f64 = aux_only
        .iter()
        .map(|aux| if *aux { opts.aux_row_scale } else { 1.0 })
        .sum();
    let unit_height = if units > EPS {
        opts.frame.inner_height() / units
    } else {
        0.0
    };
    let mut bands = Vec::with_capacity(orders.len());
    let mut y = opts.frame.margin_y;
    for aux in aux_only {
        let height = if aux {
            unit_height * opts.aux_row_scale
        } else {
            unit_height
        };
        bands.push((y, y + height));
        y += height;
    }
    bands
}

/// Widens blocks until every edge's endpoints intersect horizontally by at
/// least `min_overlap`. Symmetric expansion first; when one side would
/// collide with a same-row neighbor, the other side takes the slack. Gives
/// up after `max_fix_rounds` and returns the residual violation count.
pub(crate) fn fix_overlaps(graph: &Graph, layout: &mut Layout, opts: &LayoutOptions) -> usize {
    let edges = graph.edges();
    let neighbor_bounds = |layout: &Layout, id: &str| -> (f64, f64) {
        // The space this block may grow into without crossing a neighbor.
        let row = layout
            .rows
            .iter()
            .find(|(_, ids)| ids.iter().any(|x| x == id))
            .map(|(r, _)| *r);
        let Some(row) = row else {
            return (f64::NEG_INFINITY, f64::INFINITY);
        };
        let ids = &layout.rows[&row];
        let pos = ids.iter().position(|x| x == id).expect("id in row");
        let lo = if pos == 0 {
            opts.frame.margin_x
        } else {
            layout.blocks[&ids[pos - 1]].block.right + opts.gap
        };
        let hi = if pos + 1 == ids.len() {
            opts.frame.width - opts.frame.margin_x
        } else {
            layout.blocks[&ids[pos + 1]].block.left - opts.gap
        };
        (lo, hi)
    };

    for _ in 0..opts.max_fix_rounds {
        let mut violations = 0;
        for (from, to) in &edges {
            let (Some(a), Some(b)) = (layout.blocks.get(from), layout.blocks.get(to)) else {
                continue;
            };
            let overlap = a.block.x_overlap(&b.block);
            if overlap >= opts.min_overlap - EPS {
                continue;
            }
            violations += 1;
            let needed = opts.min_overlap - overlap;
            // Grow each block toward the other's center.
            let (grow_right_id, grow_left_id) = if a.block.center_x() <= b.block.center_x() {
                (from.clone(), to.clone())
            } else {
                (to.clone(), from.clone())
            };
            let (_, hi) = neighbor_bounds(layout, &grow_right_id);
            let (lo, _) = neighbor_bounds(layout, &grow_left_id);
            let right_block = layout.blocks[&grow_right_id].block;
            let left_block = layout.blocks[&grow_left_id].block;
            let right_room = (hi - right_block.right).max(0.0);
            let left_room = (left_block.left - lo).max(0.0);
            let mut grow_right = (needed / 2.0).min(right_room);
            let mut grow_left = (needed / 2.0).min(left_room);
            // Shift whatever one side cannot take onto the other.
            grow_left = (grow_left + (needed / 2.0 - grow_right)).min(left_room);
            grow_right = (grow_right + (needed - grow_right - grow_left)).min(right_room);
            if grow_right > 0.0 {
                layout
                    .blocks
                    .get_mut(&grow_right_id)
                    .expect("block exists")
                    .block
                    .right += grow_right;
            }
            if grow_left > 0.0 {
                layout
                    .blocks
                    .get_mut(&grow_left_id)
                    .expect("block exists")
                    .block
                    .left -= grow_left;
            }
        }
        if violations == 0 {
            return 0;
        }
    }

    // Count what is still violated after the final round.
    edges
        .iter()
        .filter(|(from, to)| {
            match (layout.blocks.get(from), layout.blocks.get(to)) {
                (Some(a), Some(b)) => a.block.x_overlap(&b.block) < opts.min_overlap - EPS,
                _ => false,
            }
        })
        .count()
}
