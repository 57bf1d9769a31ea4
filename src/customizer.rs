// CellCustomizer: fills a `Metric` level by level so that every (level,
// cell) matrix reflects the current edge weights. This is the algorithmic
// heart of the crate; see SPEC_FULL.md §4.4 for the restricted-Dijkstra rules
// this module implements. Levels are customized strictly bottom-up with a
// barrier between them (`rayon::ThreadPoolBuilder::build().install`, one
// call per level); cells within a level are customized in parallel with
// thread-local `QueryHeap`s, writing into disjoint slices of the metric's
// arrays so no locking is needed on the hot path.

use crate::cell_storage::{CellMatrixMut, CellStorage, Metric};
use crate::config::{AllowedNodes, CustomizerConfig};
use crate::error::MlcrpError;
use crate::graph::{EdgeDataPayload, MultiLevelGraph};
use crate::observability::{log_operation, Operation, PerfTimer};
use crate::partition::MultiLevelPartition;
use crate::query_heap::QueryHeap;
use crate::types::{CellID, Cost, EdgeID, LevelID, NodeID};
use rayon::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;

/// Per-node auxiliary heap payload. `from_clique` suppresses a second clique
/// expansion from a node that was itself reached via a clique arc: per the
/// triangle inequality, any path from that node through another clique arc
/// is dominated by relaxing the parent clique arc directly, so re-expanding
/// would only waste work, never find a shorter path.
#[derive(Debug, Clone, Copy)]
struct HeapData {
    from_clique: bool,
}

/// Runs the level-by-level customization algorithm described in SPEC_FULL.md
/// §4.4 against a `MultiLevelGraph` + `MultiLevelPartition` + `CellStorage`
/// triple, filling a caller-provided `Metric`.
pub struct CellCustomizer {
    config: CustomizerConfig,
}

impl CellCustomizer {
    pub fn new(config: CustomizerConfig) -> Self {
        Self { config }
    }

    /// Fill `metric` for every level, 1..=L, in order. `graph` and
    /// `partition` must be the same pair `storage` was built from; this is
    /// not re-validated here (the caller is expected to have checked
    /// `graph.checksum()` / `partition.checksum()` against whatever archive
    /// they came from, per the IncompatibleData error path in `archive`).
    pub fn customize<D: EdgeDataPayload + Sync>(
        &self,
        graph: &MultiLevelGraph<'_, D>,
        partition: &MultiLevelPartition<'_>,
        storage: &CellStorage,
        metric: &mut Metric,
    ) -> Result<(), MlcrpError> {
        let node_count = graph.number_of_nodes();
        let allowed = self.config.allowed_nodes.clone().unwrap_or_else(|| AllowedNodes::all_allowed(node_count));
        let backing = self.config.heap_backing;

        let pool = match self.config.thread_count {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| MlcrpError::StructuralInvariant {
                        detail: format!("failed to build customizer thread pool: {e}"),
                    })?,
            ),
            None => None,
        };

        for level_raw in 1..=storage.number_of_levels() {
            let level = LevelID::new(level_raw).map_err(MlcrpError::Validation)?;
            let timer = PerfTimer::new("level_customization");
            let cells = storage.cells_for_level(level)?;
            let first_offset = cells.first().map(|c| c.value_offset).unwrap_or(0);
            let level_area: u64 = cells.iter().map(|c| c.matrix_area()).sum();

            let (prefix, w, d, dist) = metric.split_prefix_and_level_mut(first_offset, level_area);
            let matrices = CellMatrixMut::split_cells_mut(first_offset, cells, w, d, dist);

            let run = || -> Result<(), MlcrpError> {
                cells
                    .par_iter()
                    .zip(matrices)
                    .enumerate()
                    .try_for_each(|(cell_idx, (_layout, mut matrix))| -> Result<(), MlcrpError> {
                        let cell = CellID::new_unchecked(cell_idx as u32);
                        customize_cell(
                            graph,
                            partition,
                            storage,
                            &prefix,
                            level,
                            cell,
                            &mut matrix,
                            &allowed,
                            backing,
                            node_count,
                        )
                    })
            };

            let result = match &pool {
                Some(p) => p.install(run),
                None => run(),
            };
            result?;

            log_operation(&Operation::LevelCustomized {
                level: level_raw,
                cells: cells.len(),
                elapsed: timer.elapsed(),
            });
        }

        Ok(())
    }
}

thread_local! {
    static HEAP: RefCell<Option<(QueryHeap<HeapData>, crate::config::HeapBacking)>> = const { RefCell::new(None) };
}

fn with_thread_local_heap<R>(
    capacity: usize,
    backing: crate::config::HeapBacking,
    f: impl FnOnce(&mut QueryHeap<HeapData>) -> R,
) -> R {
    HEAP.with(|cell| {
        let mut slot = cell.borrow_mut();
        let needs_fresh = match &*slot {
            Some((_, existing_backing)) => *existing_backing != backing,
            None => true,
        };
        if needs_fresh {
            *slot = Some((QueryHeap::new(capacity, backing), backing));
        }
        let (heap, _) = slot.as_mut().expect("just initialized");
        heap.clear();
        f(heap)
    })
}

#[allow(clippy::too_many_arguments)]
fn customize_cell<D: EdgeDataPayload>(
    graph: &MultiLevelGraph<'_, D>,
    partition: &MultiLevelPartition<'_>,
    storage: &CellStorage,
    prefix: &crate::cell_storage::MetricPrefixView<'_>,
    level: LevelID,
    cell: CellID,
    matrix: &mut CellMatrixMut<'_>,
    allowed: &AllowedNodes,
    backing: crate::config::HeapBacking,
    node_count: usize,
) -> Result<(), MlcrpError> {
    let sources = storage.source_nodes(level, cell)?;
    let destinations = storage.destination_nodes(level, cell)?;
    let child_level = level.child().filter(|c| c.get() >= 1);

    for (source_index, &s) in sources.iter().enumerate() {
        let best = with_thread_local_heap(node_count, backing, |heap| {
            run_dijkstra(graph, partition, storage, prefix, level, child_level, s, destinations, allowed, heap)
        })?;

        for (dest_index, cost) in best.into_iter().enumerate() {
            matrix.set(source_index, dest_index, cost);
        }
    }

    Ok(())
}

/// Runs one source's bounded Dijkstra search within cell `cell` at `level`
/// and returns the final cost to every entry of `destinations`, in the same
/// order, `Cost::INFINITE` for anything never reached.
#[allow(clippy::too_many_arguments)]
fn run_dijkstra<D: EdgeDataPayload>(
    graph: &MultiLevelGraph<'_, D>,
    partition: &MultiLevelPartition<'_>,
    storage: &CellStorage,
    prefix: &crate::cell_storage::MetricPrefixView<'_>,
    level: LevelID,
    child_level: Option<LevelID>,
    source: NodeID,
    destinations: &[NodeID],
    allowed: &AllowedNodes,
    heap: &mut QueryHeap<HeapData>,
) -> Result<Vec<Cost>, MlcrpError> {
    let mut remaining: HashMap<u32, ()> = destinations
        .iter()
        .filter(|d| allowed.is_allowed(**d))
        .map(|d| (d.get(), ()))
        .collect();
    let mut best: HashMap<u32, Cost> = HashMap::new();

    heap.insert(source, Cost::ZERO, HeapData { from_clique: false });

    while !heap.is_empty() && !remaining.is_empty() {
        let (u, cost_u, data_u) = heap.delete_min().expect("heap nonempty");
        best.entry(u.get()).or_insert(cost_u);
        remaining.remove(&u.get());

        for edge_idx in graph.adjacent_edges(u)? {
            let edge = graph.edge_data(EdgeID::new_unchecked(edge_idx))?;
            if !edge.forward() {
                continue;
            }
            let v = graph.target(EdgeID::new_unchecked(edge_idx))?;
            if level.get() >= 2 {
                let child = child_level.expect("level >= 2 has a child level");
                if partition.cell(child, u)? == partition.cell(child, v)? {
                    continue;
                }
            }
            if !allowed.is_allowed(v) {
                continue;
            }
            let edge_cost = Cost {
                weight: edge.weight(),
                duration: edge.duration(),
                distance: edge.distance(),
            };
            let new_cost = cost_u.checked_add(edge_cost);
            if new_cost.weight.is_finite() && !heap.was_removed(v) {
                if !heap.was_inserted(v) {
                    heap.insert(v, new_cost, HeapData { from_clique: false });
                } else {
                    heap.decrease_key(v, new_cost, HeapData { from_clique: false });
                }
            }
        }

        if !data_u.from_clique {
            if let Some(child) = child_level {
                let sub_cell = partition.cell(child, u)?;
                let sub_sources = storage.source_nodes(child, sub_cell)?;
                if let Ok(src_idx) = sub_sources.binary_search(&u) {
                    let sub_dests = storage.destination_nodes(child, sub_cell)?;
                    let sub_layout = storage.layout(child, sub_cell)?;
                    for (dest_idx, &t) in sub_dests.iter().enumerate() {
                        if !allowed.is_allowed(t) {
                            continue;
                        }
                        let clique_cost = prefix.get(sub_layout.value_offset, src_idx, sub_dests.len(), dest_idx);
                        if !clique_cost.weight.is_finite() {
                            continue;
                        }
                        let new_cost = cost_u.checked_add(clique_cost);
                        if new_cost.weight.is_finite() && !heap.was_removed(t) {
                            if !heap.was_inserted(t) {
                                heap.insert(t, new_cost, HeapData { from_clique: true });
                            } else {
                                heap.decrease_key(t, new_cost, HeapData { from_clique: true });
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(destinations
        .iter()
        .map(|d| best.get(&d.get()).copied().unwrap_or(Cost::INFINITE))
        .collect())
}
