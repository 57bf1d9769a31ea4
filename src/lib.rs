// mlcrp - a Multi-Level Partition / Customizable Route Planning core.
//
// Four structural types carry a routing network through the CRP pipeline:
// `MultiLevelPartition` (the cell hierarchy), `MultiLevelGraph` (the CSR
// base graph, keyed on that hierarchy), `CellStorage` (per-cell matrix
// layout) and `Metric` (the matrix contents). `CellCustomizer` fills a
// `Metric` level by level; `QueryHeap` is its inner-loop priority queue.
// `archive` persists all of the above in one block-structured file.

pub mod archive;
pub mod builders;
pub mod cell_storage;
pub mod config;
pub mod customizer;
pub mod error;
pub mod graph;
pub mod observability;
pub mod partition;
pub mod query_heap;
pub mod storage;
pub mod types;
pub mod validation;

pub use archive::{Archive, ArchiveReader, ArchiveWriter};
pub use builders::{CellStorageBuilder, GraphBuilder, PartitionBuilder};
pub use cell_storage::{CellHandle, CellLayout, CellStorage, Metric, ReadOnlyCellHandle};
pub use config::{AllowedNodes, CustomizerConfig, HeapBacking};
pub use customizer::CellCustomizer;
pub use error::{MlcrpError, Result};
pub use graph::{CustomizationEdgeData, EdgeDataPayload, InputEdge, MultiLevelGraph};
pub use observability::{init_logging, init_logging_with_level, log_operation, Operation};
pub use partition::{LevelInfo, MultiLevelPartition};
pub use query_heap::QueryHeap;
pub use storage::Backing;
pub use types::{
    Cost, EdgeDistance, EdgeDuration, EdgeID, EdgeWeight, LevelID, NodeID, CellID, MAX_LEVELS,
};
pub use validation::{ValidationContext, ValidationError};
