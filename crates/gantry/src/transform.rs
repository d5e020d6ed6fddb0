use ashlar::Graph;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::build::fix_overlaps;
use crate::{Layout, LayoutOptions};

const RANDOMIZE_SALT: u64 = 0xDEAD_BEEF;

impl Layout {
    /// Checkerboard shrink: every odd row's blocks narrow by a factor drawn
    /// from `[width_shrink, 1]`, clamped to the minimum block width, then the
    /// overlap repair runs again. Deterministic for a given seed; returns a
    /// new layout.
    pub fn randomize(&self, graph: &Graph, opts: &LayoutOptions) -> Layout {
        let mut out = self.clone();
        let mut rng = StdRng::seed_from_u64(self.seed ^ RANDOMIZE_SALT);
        let rows: Vec<(usize, Vec<String>)> = out
            .rows
            .iter()
            .map(|(row, ids)| (*row, ids.clone()))
            .collect();
        for (row, ids) in rows {
            if row % 2 == 0 {
                continue;
            }
            for id in &ids {
                let factor: f64 = rng.gen_range(opts.width_shrink..=1.0);
                let Some(entry) = out.blocks.get_mut(id) else {
                    continue;
                };
                let width = (entry.block.width() * factor).max(opts.min_block_width);
                let center = entry.block.center_x();
                entry.block.left = center - width / 2.0;
                entry.block.right = center + width / 2.0;
            }
        }
        out.overlap_violations = fix_overlaps(graph, &mut out, opts);
        out.randomized = true;
        out
    }

    /// Fuses every subdivider chain plus its origin block into one tall
    /// pillar spanning the rows of its members. Row lists are rewritten to
    /// the master id. Returns a new layout.
    pub fn merge(&self, graph: &Graph) -> Layout {
        let mut out = self.clone();
        for (master, chain) in graph.subdivider_chains() {
            let Some(origin) = out.blocks.get(&master).map(|b| b.block) else {
                continue;
            };
            let mut fused = origin;
            let mut absorbed = false;
            for member in &chain {
                if let Some(entry) = out.blocks.remove(member) {
                    fused.left = fused.left.min(entry.block.left);
                    fused.right = fused.right.max(entry.block.right);
                    fused.top = fused.top.min(entry.block.top);
                    fused.bottom = fused.bottom.max(entry.block.bottom);
                    absorbed = true;
                }
            }
            if !absorbed {
                continue;
            }
            out.blocks
                .get_mut(&master)
                .expect("origin block present")
                .block = fused;
            for ids in out.rows.values_mut() {
                for id in ids.iter_mut() {
                    if chain.contains(id) {
                        *id = master.clone();
                    }
                }
                // A master may already sit in a row its chain crosses.
                ids.dedup();
            }
        }
        out.merged = true;
        out
    }
}
