use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ashlar::Graph;
use rayon::prelude::*;

use crate::orderer::{base_rows, Orderer, RowOrders};
use crate::{count_crossings, crossings_between, BarycentricOrderer, PlumbError, PqTree, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_ROW_CANDIDATE_LIMIT: usize = 2048;

/// Periodic search progress: (branches explored, branches pruned, best
/// score so far).
pub type ProgressHandler = Arc<dyn Fn(u64, u64, u64) + Send + Sync>;
/// Called once at completion with per-row candidate counts, for bottleneck
/// diagnosis.
pub type DebugHandler = Arc<dyn Fn(&[RowStats]) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowStats {
    pub row: usize,
    pub candidates: usize,
}

/// Branch-and-bound search for the minimum-crossing row ordering, seeded by
/// the barycentric heuristic. PQ-trees built from common-parent and
/// common-child consecutiveness constraints shrink each row's candidate set;
/// partial crossing counts prune dominated branches. The result never has
/// more crossings than the barycentric seed. A timeout makes the search
/// soft: the best found so far wins.
#[derive(Clone)]
pub struct OptimalOrderer {
    timeout: Option<Duration>,
    workers: usize,
    seed_sweeps: usize,
    row_candidate_limit: usize,
    strict_constraints: bool,
    progress: Option<ProgressHandler>,
    debug: Option<DebugHandler>,
}

impl Default for OptimalOrderer {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            workers: DEFAULT_WORKERS,
            seed_sweeps: crate::DEFAULT_SWEEPS,
            row_candidate_limit: DEFAULT_ROW_CANDIDATE_LIMIT,
            strict_constraints: false,
            progress: None,
            debug: None,
        }
    }
}

impl OptimalOrderer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Wall-clock bound; `None` searches to completion.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of parallel worker tasks exploring starting permutations.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Cap on enumerated candidate orderings per row.
    pub fn row_candidate_limit(mut self, limit: usize) -> Self {
        self.row_candidate_limit = limit.max(1);
        self
    }

    /// When true, a consecutiveness constraint that empties a row's family
    /// is an error instead of being dropped, so the caller can fall back to
    /// the heuristic orderer.
    pub fn strict_constraints(mut self, strict: bool) -> Self {
        self.strict_constraints = strict;
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u64, u64, u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn on_debug<F>(mut self, f: F) -> Self
    where
        F: Fn(&[RowStats]) + Send + Sync + 'static,
    {
        self.debug = Some(Arc::new(f));
        self
    }

    fn build_row_tree(&self, graph: &Graph, base: &RowOrders, r: usize) -> Result<PqTree> {
        let row = &base[r];
        let pos: HashMap<&str, usize> = row
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut tree = PqTree::new(row.len());
        if r > 0 {
            // Children of the same parent should sit together.
            for parent in &base[r - 1] {
                let set: Vec<usize> = graph
                    .children(parent)
                    .iter()
                    .filter_map(|c| pos.get(c.as_str()).copied())
                    .collect();
                self.apply_constraint(&mut tree, set, r)?;
            }
        }
        if r + 1 < base.len() {
            // Parents of the same child should sit together.
            for child in &base[r + 1] {
                let set: Vec<usize> = graph
                    .parents(child)
                    .iter()
                    .filter_map(|p| pos.get(p.as_str()).copied())
                    .collect();
                self.apply_constraint(&mut tree, set, r)?;
            }
        }
        Ok(tree)
    }

    fn apply_constraint(&self, tree: &mut PqTree, set: Vec<usize>, row: usize) -> Result<()> {
        if set.len() < 2 {
            return Ok(());
        }
        if !tree.reduce(set) {
            if self.strict_constraints {
                return Err(PlumbError::ConstraintUnsatisfiable { row });
            }
            tracing::debug!("row {row}: dropped an unsatisfiable consecutiveness constraint");
        }
        Ok(())
    }

    fn dfs(
        &self,
        graph: &Graph,
        candidates: &[Vec<Vec<String>>],
        current: &mut RowOrders,
        partial: usize,
        deadline: Option<Instant>,
        shared: &SearchShared,
    ) {
        if shared.timed_out.load(AtomicOrdering::Relaxed) {
            return;
        }
        if let Some(deadline) = deadline {
            if Instant::now() > deadline {
                shared.timed_out.store(true, AtomicOrdering::Relaxed);
                return;
            }
        }
        let explored = shared.explored.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        if explored % 1024 == 0 {
            if let Some(progress) = &self.progress {
                progress(
                    explored,
                    shared.pruned.load(AtomicOrdering::Relaxed),
                    shared.best_score.load(AtomicOrdering::Relaxed) as u64,
                );
            }
        }

        let depth = current.len();
        if depth == candidates.len() {
            let mut best = shared.best.lock().expect("best lock");
            let improves = match &*best {
                None => true,
                Some((score, orders)) => {
                    partial < *score || (partial == *score && *current < *orders)
                }
            };
            if improves {
                *best = Some((partial, current.clone()));
                shared
                    .best_score
                    .fetch_min(partial, AtomicOrdering::Relaxed);
            }
            return;
        }

        // Best-first: cheaper extensions explored before expensive ones.
        let prev = &current[depth - 1];
        let mut scored: Vec<(usize, usize)> = candidates[depth]
            .iter()
            .enumerate()
            .map(|(i, cand)| (crossings_between(graph, prev, cand), i))
            .collect();
        scored.sort_unstable();
        for (rank, (added, idx)) in scored.iter().enumerate() {
            let next = partial + added;
            // Strict pruning: branches tying the best are still explored, so
            // every minimum-score ordering is reached and the lexicographic
            // tie-break stays deterministic under parallelism.
            if next > shared.best_score.load(AtomicOrdering::Relaxed) {
                shared
                    .pruned
                    .fetch_add((scored.len() - rank) as u64, AtomicOrdering::Relaxed);
                break;
            }
            current.push(candidates[depth][*idx].clone());
            self.dfs(graph, candidates, current, next, deadline, shared);
            current.pop();
        }
    }
}

struct SearchShared {
    best_score: AtomicUsize,
    best: Mutex<Option<(usize, RowOrders)>>,
    explored: AtomicU64,
    pruned: AtomicU64,
    timed_out: AtomicBool,
}

impl Orderer for OptimalOrderer {
    fn name(&self) -> &'static str {
        "optimal"
    }

    fn order_rows(&self, graph: &Graph) -> Result<RowOrders> {
        let base = base_rows(graph)?;
        if base.len() <= 1 {
            return Ok(base);
        }
        let incumbent = BarycentricOrderer {
            sweeps: self.seed_sweeps,
        }
        .order_rows(graph)?;
        let incumbent_score = count_crossings(graph, &incumbent);

        let mut stats = Vec::with_capacity(base.len());
        let mut candidates: Vec<Vec<Vec<String>>> = Vec::with_capacity(base.len());
        for (r, row) in base.iter().enumerate() {
            let tree = self.build_row_tree(graph, &base, r)?;
            let cands: Vec<Vec<String>> = tree
                .enumerate(self.row_candidate_limit)
                .map(|perm| perm.into_iter().map(|i| row[i].clone()).collect())
                .collect();
            if (cands.len() as u128) < tree.valid_count() {
                tracing::debug!(
                    "row {r}: candidate set truncated to {} of {}",
                    cands.len(),
                    tree.valid_count()
                );
            }
            stats.push(RowStats {
                row: r,
                candidates: cands.len(),
            });
            candidates.push(cands);
        }

        let shared = SearchShared {
            best_score: AtomicUsize::new(incumbent_score),
            best: Mutex::new(None),
            explored: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
            timed_out: AtomicBool::new(false),
        };
        if incumbent_score > 0 {
            let deadline = self.timeout.map(|t| Instant::now() + t);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(|err| PlumbError::WorkerPool(err.to_string()))?;
            pool.install(|| {
                candidates[0].par_iter().for_each(|first| {
                    let mut current = vec![first.clone()];
                    self.dfs(graph, &candidates, &mut current, 0, deadline, &shared);
                });
            });
        }

        if let Some(debug) = &self.debug {
            debug(&stats);
        }
        if let Some(progress) = &self.progress {
            progress(
                shared.explored.load(AtomicOrdering::Relaxed),
                shared.pruned.load(AtomicOrdering::Relaxed),
                shared.best_score.load(AtomicOrdering::Relaxed) as u64,
            );
        }
        if shared.timed_out.load(AtomicOrdering::Relaxed) {
            tracing::debug!("ordering search timed out; returning best found so far");
        }

        let found = shared.best.into_inner().expect("best lock");
        match found {
            Some((score, orders)) if score < incumbent_score => Ok(orders),
            _ => Ok(incumbent),
        }
    }
}
