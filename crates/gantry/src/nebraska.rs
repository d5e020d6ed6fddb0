use std::cmp::Ordering;
use std::collections::HashMap;

use ashlar::{Graph, NodeKind};
use plinth_common::MaintainerRole;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RANKING_SIZE: usize = 10;

/// One maintainer in the influence ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InfluenceEntry {
    pub name: String,
    pub score: f64,
    pub role: MaintainerRole,
}

/// Depth-weighted maintainer influence ("some person in Nebraska"): every
/// real node somebody depends on distributes `depth * role-weight` points
/// across its maintainers, where depth counts rows below the shallowest
/// ranked node. Deeper dependencies hold more of the tower up.
pub fn influence_ranking(graph: &Graph, top: usize) -> Vec<InfluenceEntry> {
    let eligible: Vec<_> = graph
        .nodes()
        .filter(|n| n.kind == NodeKind::Regular && n.row.is_some())
        .filter(|n| graph.in_degree(&n.id) > 0)
        .collect();
    let Some(min_row) = eligible.iter().filter_map(|n| n.row).min() else {
        return Vec::new();
    };

    let mut scores: HashMap<String, (f64, MaintainerRole)> = HashMap::new();
    for node in eligible {
        let depth = (node.row.expect("filtered") - min_row) as f64;
        for maintainer in node.meta.maintainers() {
            let entry = scores
                .entry(maintainer.name.clone())
                .or_insert((0.0, maintainer.role));
            entry.0 += depth * maintainer.role.weight();
            // Keep the best (lowest-ranked) role for tie-breaks.
            entry.1 = entry.1.min(maintainer.role);
        }
    }

    let mut ranking: Vec<InfluenceEntry> = scores
        .into_iter()
        .map(|(name, (score, role))| InfluenceEntry { name, score, role })
        .collect();
    ranking.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.role.cmp(&b.role))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranking.truncate(top);
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashlar::{normalize, NormalizeOptions};
    use plinth_common::Maintainer;
    use pretty_assertions::assert_eq;

    #[test]
    fn deeper_maintainers_outrank_shallow_ones() {
        let mut g = Graph::from_edge_list([("app", "mid"), ("mid", "deep")]);
        normalize(&mut g, &NormalizeOptions::default()).unwrap();
        g.node_mut("mid").unwrap().meta.set_maintainers(&[Maintainer {
            name: "shallow".into(),
            role: MaintainerRole::Owner,
        }]);
        g.node_mut("deep").unwrap().meta.set_maintainers(&[Maintainer {
            name: "nebraska".into(),
            role: MaintainerRole::Maintainer,
        }]);

        // Rows: app 0, mid 1, deep 2; eligible rows are 1 and 2, so depths
        // are 0 and 1: the deep maintainer wins despite the lesser role.
        let ranking = influence_ranking(&g, DEFAULT_RANKING_SIZE);
        assert_eq!(ranking[0].name, "nebraska");
        assert_eq!(ranking[0].score, 1.0);
        assert_eq!(ranking[1].name, "shallow");
        assert_eq!(ranking[1].score, 0.0);
    }

    #[test]
    fn ties_break_by_role_then_name() {
        let mut g = Graph::from_edge_list([("app", "x"), ("app", "y")]);
        normalize(&mut g, &NormalizeOptions::default()).unwrap();
        g.node_mut("x").unwrap().meta.set_maintainers(&[Maintainer {
            name: "zoe".into(),
            role: MaintainerRole::Owner,
        }]);
        g.node_mut("y").unwrap().meta.set_maintainers(&[Maintainer {
            name: "amy".into(),
            role: MaintainerRole::Maintainer,
        }]);

        let ranking = influence_ranking(&g, DEFAULT_RANKING_SIZE);
        // Both score zero (single eligible row); the owner role wins.
        assert_eq!(ranking[0].name, "zoe");
        assert_eq!(ranking[1].name, "amy");
    }

    #[test]
    fn synthetic_nodes_are_ignored() {
        let mut g = Graph::from_edge_list([("app", "lib"), ("app", "deep"), ("lib", "deep")]);
        normalize(&mut g, &NormalizeOptions::default()).unwrap();
        // No maintainers anywhere: empty ranking rather than synthetic junk.
        assert!(influence_ranking(&g, 5).is_empty());
    }
}
