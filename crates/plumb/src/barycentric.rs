use std::cmp::Ordering;
use std::collections::HashMap;

use ashlar::Graph;

use crate::orderer::{base_rows, Orderer, RowOrders};
use crate::{count_crossings, crossings_between, Result};

pub const DEFAULT_SWEEPS: usize = 24;

/// The barycentric heuristic: rows start alphabetical, then alternating
/// top-down/bottom-up sweeps place each node near the mean position of its
/// neighbors in the adjacent row, followed by a local transpose pass. Fast,
/// no optimality guarantee.
#[derive(Clone, Copy, Debug)]
pub struct BarycentricOrderer {
    pub sweeps: usize,
}

impl Default for BarycentricOrderer {
    fn default() -> Self {
        Self {
            sweeps: DEFAULT_SWEEPS,
        }
    }
}

impl Orderer for BarycentricOrderer {
    fn name(&self) -> &'static str {
        "barycentric"
    }

    fn order_rows(&self, graph: &Graph) -> Result<RowOrders> {
        let mut rows = base_rows(graph)?;
        if rows.len() <= 1 {
            return Ok(rows);
        }
        let mut best = rows.clone();
        let mut best_score = count_crossings(graph, &rows);
        for sweep in 0..self.sweeps.max(1) {
            if best_score == 0 {
                break;
            }
            if sweep % 2 == 0 {
                for r in 1..rows.len() {
                    let (above, row) = split_at_row(&mut rows, r);
                    sort_by_barycenter(row, above, |id| graph.parents(id));
                }
            } else {
                for r in (0..rows.len() - 1).rev() {
                    let (row, below) = split_at_row_rev(&mut rows, r);
                    sort_by_barycenter(row, below, |id| graph.children(id));
                }
            }
            transpose(graph, &mut rows);
            let score = count_crossings(graph, &rows);
            if score < best_score {
                best_score = score;
                best = rows.clone();
            }
        }
        Ok(best)
    }
}

fn split_at_row<'a>(rows: &'a mut RowOrders, r: usize) -> (&'a [String], &'a mut Vec<String>) {
    let (head, tail) = rows.split_at_mut(r);
    (&head[r - 1], &mut tail[0])
}

fn split_at_row_rev<'a>(rows: &'a mut RowOrders, r: usize) -> (&'a mut Vec<String>, &'a [String]) {
    let (head, tail) = rows.split_at_mut(r + 1);
    (&mut head[r], &tail[0])
}

/// Sorts `row` by the mean position of each node's neighbors in `adjacent`;
/// nodes with no neighbors keep their current position; ties break
/// lexicographically.
fn sort_by_barycenter(
    row: &mut Vec<String>,
    adjacent: &[String],
    neighbors: impl Fn(&str) -> Vec<String>,
) {
    let adjacent_pos: HashMap<&str, usize> = adjacent
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mut keyed: Vec<(f64, String)> = row
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let positions: Vec<usize> = neighbors(id)
                .iter()
                .filter_map(|n| adjacent_pos.get(n.as_str()).copied())
                .collect();
            let key = if positions.is_empty() {
                i as f64
            } else {
                positions.iter().sum::<usize>() as f64 / positions.len() as f64
            };
            (key, id.clone())
        })
        .collect();
    keyed.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    *row = keyed.into_iter().map(|(_, id)| id).collect();
}

/// Local improvement: swap adjacent pairs whenever the swap reduces the
/// crossings in the two incident row pairs.
fn transpose(graph: &Graph, rows: &mut RowOrders) {
    let mut improved = true;
    let mut rounds = 0;
    while improved && rounds < 4 {
        improved = false;
        rounds += 1;
        for r in 0..rows.len() {
            for i in 0..rows[r].len().saturating_sub(1) {
                let before = incident_crossings(graph, rows, r);
                rows[r].swap(i, i + 1);
                let after = incident_crossings(graph, rows, r);
                if after < before {
                    improved = true;
                } else {
                    rows[r].swap(i, i + 1);
                }
            }
        }
    }
}

fn incident_crossings(graph: &Graph, rows: &RowOrders, r: usize) -> usize {
    let mut total = 0;
    if r > 0 {
        total += crossings_between(graph, &rows[r - 1], &rows[r]);
    }
    if r + 1 < rows.len() {
        total += crossings_between(graph, &rows[r], &rows[r + 1]);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashlar::{normalize, NormalizeOptions};
    use pretty_assertions::assert_eq;

    #[test]
    fn untangles_a_flipped_ladder() {
        // a->y, b->x starts crossed under alphabetical order.
        let mut g = Graph::from_edge_list([("a", "y"), ("b", "x")]);
        normalize(&mut g, &NormalizeOptions::default()).unwrap();
        let orders = BarycentricOrderer::default().order_rows(&g).unwrap();
        assert_eq!(count_crossings(&g, &orders), 0);
    }

    #[test]
    fn top_row_starts_alphabetical() {
        let mut g = Graph::from_edge_list([("b", "x"), ("a", "x"), ("c", "x")]);
        normalize(&mut g, &NormalizeOptions::default()).unwrap();
        let orders = BarycentricOrderer::default().order_rows(&g).unwrap();
        assert_eq!(orders[0], vec!["a", "b", "c"]);
    }

    #[test]
    fn unlayered_graphs_are_rejected() {
        let g = Graph::from_edge_list([("a", "b")]);
        assert!(matches!(
            BarycentricOrderer::default().order_rows(&g),
            Err(crate::PlumbError::UnlayeredGraph)
        ));
    }
}
