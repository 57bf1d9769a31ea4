// Fluent builders for the three structural types: a partitioner's raw
// per-level cell assignments become a `MultiLevelPartition`, an extractor's
// edge list becomes a `MultiLevelGraph`, and a `CellStorage` is derived from
// both. These exist so callers assembling a network from an external
// partitioner/extractor don't have to hand-construct the `Vec<Vec<u32>>` /
// `Vec<InputEdge<D>>` shapes `MultiLevelPartition::new` and
// `MultiLevelGraph::new` take directly.

use crate::cell_storage::CellStorage;
use crate::error::MlcrpError;
use crate::graph::{EdgeDataPayload, InputEdge, MultiLevelGraph};
use crate::observability::{log_operation, Operation};
use crate::partition::MultiLevelPartition;
use crate::types::NodeID;

/// Builds a `MultiLevelPartition` one level at a time.
///
/// ```ignore
/// let partition = PartitionBuilder::new()
///     .level(vec![0, 0, 1, 1], 2)
///     .level(vec![0, 0, 0, 0], 1)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct PartitionBuilder {
    levels: Vec<Vec<u32>>,
    cell_counts: Vec<u32>,
}

impl PartitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next level (ℓ = levels already added, + 1): one cell id
    /// per node, plus that level's declared cell count upper bound.
    pub fn level(mut self, cell_ids: Vec<u32>, cell_count: u32) -> Self {
        self.levels.push(cell_ids);
        self.cell_counts.push(cell_count);
        self
    }

    pub fn build(self) -> Result<MultiLevelPartition<'static>, MlcrpError> {
        let node_count = self.levels.first().map(|l| l.len()).unwrap_or(0);
        let levels = self.levels.len();
        let partition = MultiLevelPartition::new(self.levels, self.cell_counts)?;
        log_operation(&Operation::PartitionBuilt { node_count, levels });
        Ok(partition)
    }
}

/// Builds a `MultiLevelGraph<D>` from a node count and an incrementally
/// assembled edge list.
///
/// ```ignore
/// let graph = GraphBuilder::new(4)
///     .edge(InputEdge { source, target, data })
///     .edges(more_edges)
///     .build(&partition)?;
/// ```
#[derive(Debug)]
pub struct GraphBuilder<D> {
    node_count: usize,
    edges: Vec<InputEdge<D>>,
}

impl<D: EdgeDataPayload> GraphBuilder<D> {
    pub fn new(node_count: usize) -> Self {
        Self { node_count, edges: Vec::new() }
    }

    pub fn edge(mut self, edge: InputEdge<D>) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn edges(mut self, edges: impl IntoIterator<Item = InputEdge<D>>) -> Self {
        self.edges.extend(edges);
        self
    }

    /// Convenience over `edge()` for the common `(source, target, data)`
    /// shape, avoiding a caller-constructed `InputEdge` for every edge.
    pub fn add_edge(mut self, source: NodeID, target: NodeID, data: D) -> Self {
        self.edges.push(InputEdge { source, target, data });
        self
    }

    pub fn build(self, partition: &MultiLevelPartition<'_>) -> Result<MultiLevelGraph<'static, D>, MlcrpError> {
        let node_count = self.node_count;
        let edge_count = self.edges.len();
        let graph = MultiLevelGraph::new(node_count, self.edges, partition)?;
        log_operation(&Operation::GraphBuilt { node_count, edge_count });
        Ok(graph)
    }
}

/// Thin wrapper around `CellStorage::build`, kept for symmetry with
/// `PartitionBuilder`/`GraphBuilder` and as the natural place to hang future
/// cell-storage construction options (e.g. a restricted set of levels to
/// materialize).
#[derive(Debug, Default)]
pub struct CellStorageBuilder;

impl CellStorageBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build<D: EdgeDataPayload>(
        self,
        graph: &MultiLevelGraph<'_, D>,
        partition: &MultiLevelPartition<'_>,
    ) -> Result<CellStorage, MlcrpError> {
        let storage = CellStorage::build(graph, partition)?;
        log_operation(&Operation::CellStorageBuilt {
            cell_count: storage.cells_raw().len(),
        });
        Ok(storage)
    }
}
