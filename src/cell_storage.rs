// CellStorage: per-(level, cell) source/destination border-node sets and
// their pairwise distance matrices (the "metric"). Structural arrays (which
// nodes are sources/destinations, and where each cell's matrix lives) are
// built once from a graph + partition and are immutable afterward; a metric
// (the matrix contents) is a separate, independently addressable value so
// several metrics can coexist over one CellStorage. See `customizer` for the
// single writer that fills a metric's matrix cells.

use crate::error::MlcrpError;
use crate::graph::{EdgeDataPayload, MultiLevelGraph};
use crate::partition::MultiLevelPartition;
use crate::types::{CellID, Cost, EdgeDistance, EdgeDuration, EdgeWeight, LevelID, NodeID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Structural layout of one (level, cell)'s matrix: where its sources and
/// destinations live in the flattened boundary arrays, and where its
/// weight/duration/distance rows begin in the flattened metric arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLayout {
    pub source_begin: u32,
    pub source_len: u32,
    pub dest_begin: u32,
    pub dest_len: u32,
    pub value_offset: u64,
}

impl CellLayout {
    pub(crate) fn matrix_area(self) -> u64 {
        self.source_len as u64 * self.dest_len as u64
    }
}

/// Immutable structural data: which nodes are sources/destinations of which
/// cell at which level, and the row-major layout of each cell's matrix.
pub struct CellStorage {
    /// Concatenated sorted source-node lists, one run per (level, cell).
    source_boundary: Vec<NodeID>,
    /// Concatenated sorted destination-node lists, one run per (level, cell).
    destination_boundary: Vec<NodeID>,
    /// Per-cell layout, indexed by a flat (level, cell) -> index map via
    /// `level_offsets`.
    cells: Vec<CellLayout>,
    /// Prefix sums over cells by level: cells at level `ℓ` occupy
    /// `cells[level_offsets[ℓ-1]..level_offsets[ℓ]]`.
    level_offsets: Vec<u32>,
    total_matrix_area: u64,
}

impl CellStorage {
    /// Derive structural CellStorage from a graph and the partition that
    /// keyed it. For every directed edge `(u, v)` crossing cells at level
    /// `ℓ` (`cell(ℓ,u) != cell(ℓ,v)`): `v` becomes a source of its cell,
    /// `u` a destination of its cell.
    pub fn build<D: EdgeDataPayload>(
        graph: &MultiLevelGraph<'_, D>,
        partition: &MultiLevelPartition<'_>,
    ) -> Result<Self, MlcrpError> {
        let num_levels = partition.number_of_levels();
        let node_count = graph.number_of_nodes();

        // sources_by[(level, cell)] / destinations_by[(level, cell)].
        let mut sources_by: BTreeMap<(u8, u32), BTreeSet<u32>> = BTreeMap::new();
        let mut destinations_by: BTreeMap<(u8, u32), BTreeSet<u32>> = BTreeMap::new();

        for raw_u in 0..node_count as u32 {
            let u = NodeID::new(raw_u).map_err(MlcrpError::Validation)?;
            for edge_idx in graph.adjacent_edges(u)? {
                let v = graph.target(crate::types::EdgeID::new_unchecked(edge_idx))?;
                if u == v {
                    continue;
                }
                for level_raw in 1..=num_levels {
                    let level = LevelID::new(level_raw).map_err(MlcrpError::Validation)?;
                    let cu = partition.cell(level, u)?;
                    let cv = partition.cell(level, v)?;
                    if cu != cv {
                        sources_by.entry((level_raw, cv.get())).or_default().insert(v.get());
                        destinations_by.entry((level_raw, cu.get())).or_default().insert(u.get());
                    }
                }
            }
        }

        let mut source_boundary = Vec::new();
        let mut destination_boundary = Vec::new();
        let mut cells = Vec::new();
        let mut level_offsets = Vec::with_capacity(num_levels as usize + 1);
        level_offsets.push(0);
        let mut value_cursor = 0u64;

        for level_raw in 1..=num_levels {
            let cell_count = partition
                .number_of_cells(LevelID::new(level_raw).map_err(MlcrpError::Validation)?)?;
            for cell_raw in 0..cell_count {
                let sources: Vec<u32> = sources_by
                    .get(&(level_raw, cell_raw))
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();
                let destinations: Vec<u32> = destinations_by
                    .get(&(level_raw, cell_raw))
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();

                let source_begin = source_boundary.len() as u32;
                let dest_begin = destination_boundary.len() as u32;
                let layout = CellLayout {
                    source_begin,
                    source_len: sources.len() as u32,
                    dest_begin,
                    dest_len: destinations.len() as u32,
                    value_offset: value_cursor,
                };
                value_cursor += layout.matrix_area();

                source_boundary.extend(sources.into_iter().map(NodeID::new_unchecked));
                destination_boundary
                    .extend(destinations.into_iter().map(NodeID::new_unchecked));
                cells.push(layout);
            }
            level_offsets.push(cells.len() as u32);
        }

        Ok(Self {
            source_boundary,
            destination_boundary,
            cells,
            level_offsets,
            total_matrix_area: value_cursor,
        })
    }

    pub fn number_of_levels(&self) -> u8 {
        self.level_offsets.len().saturating_sub(1) as u8
    }

    fn cell_index(&self, level: LevelID, cell: CellID) -> Result<usize, MlcrpError> {
        if level.get() == 0 || level.index() > self.level_offsets.len() - 1 {
            return Err(MlcrpError::OutOfRange {
                detail: format!("level {level} out of range for cell storage"),
            });
        }
        let begin = self.level_offsets[level.index() - 1];
        let end = self.level_offsets[level.index()];
        let idx = begin as usize + cell.index();
        if idx >= end as usize {
            return Err(MlcrpError::OutOfRange {
                detail: format!("cell {cell} out of range at level {level}"),
            });
        }
        Ok(idx)
    }

    pub fn layout(&self, level: LevelID, cell: CellID) -> Result<CellLayout, MlcrpError> {
        let idx = self.cell_index(level, cell)?;
        Ok(self.cells[idx])
    }

    /// The layouts of every cell at `level`, in cell-id order. Used by the
    /// customizer to split a metric's arrays into disjoint per-cell slices
    /// before parallelizing over cells.
    pub(crate) fn cells_for_level(&self, level: LevelID) -> Result<&[CellLayout], MlcrpError> {
        if level.get() == 0 || level.index() > self.level_offsets.len() - 1 {
            return Err(MlcrpError::OutOfRange {
                detail: format!("level {level} out of range for cell storage"),
            });
        }
        let begin = self.level_offsets[level.index() - 1] as usize;
        let end = self.level_offsets[level.index()] as usize;
        Ok(&self.cells[begin..end])
    }

    pub fn source_nodes(&self, level: LevelID, cell: CellID) -> Result<&[NodeID], MlcrpError> {
        let layout = self.layout(level, cell)?;
        let begin = layout.source_begin as usize;
        let end = begin + layout.source_len as usize;
        Ok(&self.source_boundary[begin..end])
    }

    pub fn destination_nodes(&self, level: LevelID, cell: CellID) -> Result<&[NodeID], MlcrpError> {
        let layout = self.layout(level, cell)?;
        let begin = layout.dest_begin as usize;
        let end = begin + layout.dest_len as usize;
        Ok(&self.destination_boundary[begin..end])
    }

    pub fn total_matrix_area(&self) -> u64 {
        self.total_matrix_area
    }

    /// Re-wrap raw structural arrays already validated elsewhere (loaded
    /// from an archive). Skips the derivation pass `build` performs.
    pub fn from_parts(
        source_boundary: Vec<NodeID>,
        destination_boundary: Vec<NodeID>,
        cells: Vec<CellLayout>,
        level_offsets: Vec<u32>,
    ) -> Self {
        let total_matrix_area = cells.iter().map(|c| c.matrix_area()).sum();
        Self {
            source_boundary,
            destination_boundary,
            cells,
            level_offsets,
            total_matrix_area,
        }
    }

    pub fn source_boundary_raw(&self) -> &[NodeID] {
        &self.source_boundary
    }

    pub fn destination_boundary_raw(&self) -> &[NodeID] {
        &self.destination_boundary
    }

    pub fn cells_raw(&self) -> &[CellLayout] {
        &self.cells
    }

    pub fn level_offsets_raw(&self) -> &[u32] {
        &self.level_offsets
    }

    /// Allocate a fresh `Metric`, initialized to INFINITY/MAX/INVALID
    /// everywhere, sized to this storage's total matrix area.
    pub fn new_metric(&self) -> Metric {
        let area = self.total_matrix_area as usize;
        Metric {
            weight: vec![EdgeWeight::INFINITY; area],
            duration: vec![EdgeDuration::MAX; area],
            distance: vec![EdgeDistance::INVALID; area],
        }
    }

    /// A lightweight read/write handle into one (level, cell)'s matrix rows
    /// within `metric`. Row/column order always matches `source_nodes()` /
    /// `destination_nodes()`.
    pub fn cell<'s, 'm>(
        &'s self,
        metric: &'m mut Metric,
        level: LevelID,
        cell: CellID,
    ) -> Result<CellHandle<'s, 'm>, MlcrpError> {
        let layout = self.layout(level, cell)?;
        let sources = self.source_nodes(level, cell)?;
        let destinations = self.destination_nodes(level, cell)?;
        Ok(CellHandle { layout, sources, destinations, metric })
    }

    /// A read-only handle, for query-time consumers that never write.
    pub fn cell_readonly<'s, 'm>(
        &'s self,
        metric: &'m Metric,
        level: LevelID,
        cell: CellID,
    ) -> Result<ReadOnlyCellHandle<'s, 'm>, MlcrpError> {
        let layout = self.layout(level, cell)?;
        let sources = self.source_nodes(level, cell)?;
        let destinations = self.destination_nodes(level, cell)?;
        Ok(ReadOnlyCellHandle { layout, sources, destinations, metric })
    }
}

/// Three parallel dense arrays (weight, duration, distance), sized to the
/// sum of per-cell matrix areas across all levels >= 1. Multiple `Metric`
/// instances may exist over one `CellStorage`; each is independent.
#[derive(Debug, Clone)]
pub struct Metric {
    weight: Vec<EdgeWeight>,
    duration: Vec<EdgeDuration>,
    distance: Vec<EdgeDistance>,
}

impl Metric {
    pub fn len(&self) -> usize {
        self.weight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_empty()
    }

    /// Re-wrap raw parallel arrays already sized to some `CellStorage`'s
    /// total matrix area (loaded from an archive's `metric/*` blocks).
    pub fn from_parts(
        weight: Vec<EdgeWeight>,
        duration: Vec<EdgeDuration>,
        distance: Vec<EdgeDistance>,
    ) -> Self {
        Self { weight, duration, distance }
    }

    pub fn weight_raw(&self) -> &[EdgeWeight] {
        &self.weight
    }

    pub fn duration_raw(&self) -> &[EdgeDuration] {
        &self.duration
    }

    pub fn distance_raw(&self) -> &[EdgeDistance] {
        &self.distance
    }

    /// Split the metric's arrays into a read-only view of every value below
    /// `first_value_offset` (every level already customized) and a single
    /// contiguous mutable window covering the level currently being
    /// customized. The caller further splits the mutable window per cell via
    /// [`CellMatrixMut::split_cells_mut`]. Both halves borrow disjoint memory,
    /// so this needs no interior mutability or unsafe code to let the
    /// customizer read finished lower levels while writing the current one.
    pub(crate) fn split_prefix_and_level_mut(
        &mut self,
        first_value_offset: u64,
        level_area: u64,
    ) -> (MetricPrefixView<'_>, &mut [EdgeWeight], &mut [EdgeDuration], &mut [EdgeDistance]) {
        let off = first_value_offset as usize;
        let area = level_area as usize;
        let (w_before, w_rest) = self.weight.split_at_mut(off);
        let (w_cur, _w_after) = w_rest.split_at_mut(area);
        let (d_before, d_rest) = self.duration.split_at_mut(off);
        let (d_cur, _d_after) = d_rest.split_at_mut(area);
        let (dist_before, dist_rest) = self.distance.split_at_mut(off);
        let (dist_cur, _dist_after) = dist_rest.split_at_mut(area);
        (
            MetricPrefixView { weight: w_before, duration: d_before, distance: dist_before },
            w_cur,
            d_cur,
            dist_cur,
        )
    }
}

/// Read-only view over every metric value below some cutoff, indexed by a
/// cell's absolute `value_offset` (as stored in its `CellLayout`).
pub(crate) struct MetricPrefixView<'m> {
    weight: &'m [EdgeWeight],
    duration: &'m [EdgeDuration],
    distance: &'m [EdgeDistance],
}

impl<'m> MetricPrefixView<'m> {
    pub fn get(&self, value_offset: u64, source_index: usize, dest_len: usize, dest_index: usize) -> Cost {
        let idx = value_offset as usize + source_index * dest_len + dest_index;
        Cost {
            weight: self.weight[idx],
            duration: self.duration[idx],
            distance: self.distance[idx],
        }
    }
}

/// Disjoint mutable view into one (level, cell)'s matrix, carved out of the
/// level-wide window returned by [`Metric::split_prefix_and_level_mut`].
/// `value_offset` here is relative to the start of that window, not the
/// metric's absolute offset.
pub(crate) struct CellMatrixMut<'m> {
    weight: &'m mut [EdgeWeight],
    duration: &'m mut [EdgeDuration],
    distance: &'m mut [EdgeDistance],
    dest_len: usize,
}

impl<'m> CellMatrixMut<'m> {
    /// Split a level-wide mutable window into one disjoint slice per cell, in
    /// the same order as `cells` (which must be the level's own layouts, as
    /// returned by `CellStorage::cells_for_level`). `cells`' `value_offset`s
    /// are rebased to the window by subtracting `window_base`.
    pub fn split_cells_mut(
        window_base: u64,
        cells: &[CellLayout],
        weight: &'m mut [EdgeWeight],
        duration: &'m mut [EdgeDuration],
        distance: &'m mut [EdgeDistance],
    ) -> Vec<Self> {
        let mut w_rest = weight;
        let mut d_rest = duration;
        let mut dist_rest = distance;
        let mut out = Vec::with_capacity(cells.len());
        for layout in cells {
            debug_assert!(layout.value_offset >= window_base);
            let area = layout.matrix_area() as usize;
            let (w, w_tail) = w_rest.split_at_mut(area);
            let (d, d_tail) = d_rest.split_at_mut(area);
            let (dist, dist_tail) = dist_rest.split_at_mut(area);
            w_rest = w_tail;
            d_rest = d_tail;
            dist_rest = dist_tail;
            out.push(CellMatrixMut {
                weight: w,
                duration: d,
                distance: dist,
                dest_len: layout.dest_len as usize,
            });
        }
        out
    }

    pub fn set(&mut self, source_index: usize, destination_index: usize, cost: Cost) {
        let idx = source_index * self.dest_len + destination_index;
        self.weight[idx] = cost.weight;
        self.duration[idx] = cost.duration;
        self.distance[idx] = cost.distance;
    }
}

/// Mutable row/column view into one (level, cell)'s matrix. `source_index`
/// and `destination_index` are positions into `sources()`/`destinations()`,
/// not raw node ids.
pub struct CellHandle<'s, 'm> {
    layout: CellLayout,
    sources: &'s [NodeID],
    destinations: &'s [NodeID],
    metric: &'m mut Metric,
}

impl<'s, 'm> CellHandle<'s, 'm> {
    pub fn source_nodes(&self) -> &[NodeID] {
        self.sources
    }

    pub fn destination_nodes(&self) -> &[NodeID] {
        self.destinations
    }

    fn index_of(&self, source_index: usize, destination_index: usize) -> usize {
        self.layout.value_offset as usize
            + source_index * self.destinations.len()
            + destination_index
    }

    pub fn set(&mut self, source_index: usize, destination_index: usize, cost: Cost) {
        let idx = self.index_of(source_index, destination_index);
        self.metric.weight[idx] = cost.weight;
        self.metric.duration[idx] = cost.duration;
        self.metric.distance[idx] = cost.distance;
    }

    pub fn get(&self, source_index: usize, destination_index: usize) -> Cost {
        let idx = self.index_of(source_index, destination_index);
        Cost {
            weight: self.metric.weight[idx],
            duration: self.metric.duration[idx],
            distance: self.metric.distance[idx],
        }
    }

    /// Row view (length `|destinations|`) for a given source, in destination
    /// order.
    pub fn out_weight(&self, source_index: usize) -> &[EdgeWeight] {
        let base = self.layout.value_offset as usize + source_index * self.destinations.len();
        &self.metric.weight[base..base + self.destinations.len()]
    }

    pub fn out_duration(&self, source_index: usize) -> &[EdgeDuration] {
        let base = self.layout.value_offset as usize + source_index * self.destinations.len();
        &self.metric.duration[base..base + self.destinations.len()]
    }

    pub fn out_distance(&self, source_index: usize) -> &[EdgeDistance] {
        let base = self.layout.value_offset as usize + source_index * self.destinations.len();
        &self.metric.distance[base..base + self.destinations.len()]
    }

    /// Column view (length `|sources|`) for a given destination, in source
    /// order. Row-major storage means this is a strided gather, not a slice.
    pub fn in_weight(&self, destination_index: usize) -> Vec<EdgeWeight> {
        (0..self.sources.len())
            .map(|s| self.metric.weight[self.index_of(s, destination_index)])
            .collect()
    }

    pub fn in_duration(&self, destination_index: usize) -> Vec<EdgeDuration> {
        (0..self.sources.len())
            .map(|s| self.metric.duration[self.index_of(s, destination_index)])
            .collect()
    }

    pub fn in_distance(&self, destination_index: usize) -> Vec<EdgeDistance> {
        (0..self.sources.len())
            .map(|s| self.metric.distance[self.index_of(s, destination_index)])
            .collect()
    }
}

/// Read-only counterpart of `CellHandle`, for query-time consumers.
pub struct ReadOnlyCellHandle<'s, 'm> {
    layout: CellLayout,
    sources: &'s [NodeID],
    destinations: &'s [NodeID],
    metric: &'m Metric,
}

impl<'s, 'm> ReadOnlyCellHandle<'s, 'm> {
    pub fn source_nodes(&self) -> &[NodeID] {
        self.sources
    }

    pub fn destination_nodes(&self) -> &[NodeID] {
        self.destinations
    }

    fn index_of(&self, source_index: usize, destination_index: usize) -> usize {
        self.layout.value_offset as usize
            + source_index * self.destinations.len()
            + destination_index
    }

    pub fn out_weight(&self, source_index: usize) -> &[EdgeWeight] {
        let base = self.layout.value_offset as usize + source_index * self.destinations.len();
        &self.metric.weight[base..base + self.destinations.len()]
    }

    pub fn out_duration(&self, source_index: usize) -> &[EdgeDuration] {
        let base = self.layout.value_offset as usize + source_index * self.destinations.len();
        &self.metric.duration[base..base + self.destinations.len()]
    }

    pub fn out_distance(&self, source_index: usize) -> &[EdgeDistance] {
        let base = self.layout.value_offset as usize + source_index * self.destinations.len();
        &self.metric.distance[base..base + self.destinations.len()]
    }

    pub fn get(&self, source_index: usize, destination_index: usize) -> Cost {
        let idx = self.index_of(source_index, destination_index);
        Cost {
            weight: self.metric.weight[idx],
            duration: self.metric.duration[idx],
            distance: self.metric.distance[idx],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CustomizationEdgeData, InputEdge, MultiLevelGraph};

    fn edge(source: u32, target: u32, weight: i64) -> InputEdge<CustomizationEdgeData> {
        InputEdge {
            source: NodeID::new(source).unwrap(),
            target: NodeID::new(target).unwrap(),
            data: CustomizationEdgeData {
                weight: EdgeWeight::new(weight).unwrap(),
                duration: EdgeDuration::new(weight as u32).unwrap(),
                distance: EdgeDistance::new(weight as f64).unwrap(),
                forward: true,
                backward: false,
            },
        }
    }

    /// Scenario 1 from the spec: nodes 0..3, level-1 cells [0,0,1,1],
    /// undirected edges 0-1, 0-2, 2-3, 3-1, 3-2.
    fn scenario_1() -> (MultiLevelPartition<'static>, MultiLevelGraph<'static, CustomizationEdgeData>) {
        let partition = MultiLevelPartition::new(vec![vec![0, 0, 1, 1]], vec![2]).unwrap();
        let edges = vec![
            edge(0, 1, 1),
            edge(1, 0, 1),
            edge(0, 2, 1),
            edge(2, 0, 1),
            edge(2, 3, 1),
            edge(3, 2, 1),
            edge(3, 1, 1),
            edge(1, 3, 1),
        ];
        let graph = MultiLevelGraph::new(4, edges, &partition).unwrap();
        (partition, graph)
    }

    #[test]
    fn scenario_1_sources_and_destinations_match_spec() {
        let (partition, graph) = scenario_1();
        let storage = CellStorage::build(&graph, &partition).unwrap();
        let l1 = LevelID::new(1).unwrap();

        let cell0 = CellID::new(0).unwrap();
        let sources0: Vec<u32> = storage.source_nodes(l1, cell0).unwrap().iter().map(|n| n.get()).collect();
        let dests0: Vec<u32> = storage.destination_nodes(l1, cell0).unwrap().iter().map(|n| n.get()).collect();
        assert_eq!(sources0, vec![0]);
        assert_eq!(dests0, vec![1]);

        let cell1 = CellID::new(1).unwrap();
        let sources1: Vec<u32> = storage.source_nodes(l1, cell1).unwrap().iter().map(|n| n.get()).collect();
        let dests1: Vec<u32> = storage.destination_nodes(l1, cell1).unwrap().iter().map(|n| n.get()).collect();
        assert_eq!(sources1, vec![2, 3]);
        assert_eq!(dests1, vec![2, 3]);
    }

    #[test]
    fn new_metric_is_all_infinite() {
        let (partition, graph) = scenario_1();
        let storage = CellStorage::build(&graph, &partition).unwrap();
        let metric = storage.new_metric();
        assert_eq!(metric.len() as u64, storage.total_matrix_area());
    }

    #[test]
    fn cell_handle_row_and_column_views_agree() {
        let (partition, graph) = scenario_1();
        let storage = CellStorage::build(&graph, &partition).unwrap();
        let mut metric = storage.new_metric();
        let l1 = LevelID::new(1).unwrap();
        let cell1 = CellID::new(1).unwrap();
        {
            let mut handle = storage.cell(&mut metric, l1, cell1).unwrap();
            handle.set(0, 0, Cost { weight: EdgeWeight::new(1).unwrap(), duration: EdgeDuration::ZERO, distance: EdgeDistance::ZERO });
            handle.set(0, 1, Cost { weight: EdgeWeight::new(1).unwrap(), duration: EdgeDuration::ZERO, distance: EdgeDistance::ZERO });
        }
        let handle = storage.cell(&mut metric, l1, cell1).unwrap();
        assert_eq!(handle.out_weight(0)[1].get(), 1);
        assert_eq!(handle.in_weight(1)[0].get(), 1);
    }

    #[test]
    fn cells_out_of_range_are_rejected() {
        let (partition, graph) = scenario_1();
        let storage = CellStorage::build(&graph, &partition).unwrap();
        let l1 = LevelID::new(1).unwrap();
        assert!(storage.source_nodes(l1, CellID::new(99).unwrap()).is_err());
        assert!(storage.source_nodes(LevelID::BASE, CellID::new(0).unwrap()).is_err());
    }
}
