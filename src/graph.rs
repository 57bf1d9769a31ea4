// MultiLevelGraph: a CSR directed graph whose per-node adjacency list is
// sorted ascending by `highestDifferentLevel(u, target)`, so that for any
// node and level a single contiguous range yields every border edge at that
// level. See `partition::MultiLevelPartition` for the level computation this
// is keyed on.

use crate::error::MlcrpError;
use crate::partition::MultiLevelPartition;
use crate::storage::Backing;
use crate::types::{EdgeDistance, EdgeDuration, EdgeID, EdgeWeight, LevelID, NodeID, MAX_LEVELS};
use crate::validation;
use serde::{Deserialize, Serialize};

/// The accessor surface the graph requires of its edge payload. One concrete
/// payload serves customization (this crate); a separate one with turn and
/// shortcut metadata would serve query-time code, which is out of scope here
/// but can implement the same trait.
pub trait EdgeDataPayload: Clone {
    fn weight(&self) -> EdgeWeight;
    fn duration(&self) -> EdgeDuration;
    fn distance(&self) -> EdgeDistance;
    fn forward(&self) -> bool;
    fn backward(&self) -> bool;
}

/// The payload used by the customizer: weight/duration/distance plus
/// directionality. Turn ids and shortcut flags belong to query-time edge
/// data and are not modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationEdgeData {
    pub weight: EdgeWeight,
    pub duration: EdgeDuration,
    pub distance: EdgeDistance,
    pub forward: bool,
    pub backward: bool,
}

impl EdgeDataPayload for CustomizationEdgeData {
    fn weight(&self) -> EdgeWeight {
        self.weight
    }
    fn duration(&self) -> EdgeDuration {
        self.duration
    }
    fn distance(&self) -> EdgeDistance {
        self.distance
    }
    fn forward(&self) -> bool {
        self.forward
    }
    fn backward(&self) -> bool {
        self.backward
    }
}

/// One edge as supplied by the extractor, prior to CSR construction.
#[derive(Debug, Clone)]
pub struct InputEdge<D> {
    pub source: NodeID,
    pub target: NodeID,
    pub data: D,
}

/// Directed adjacency with the extra guarantee that, for any node `u` and
/// level `ℓ`, a single contiguous edge range yields every outgoing edge
/// whose target leaves `u`'s level-ℓ cell.
pub struct MultiLevelGraph<'a, D> {
    node_array: Backing<'a, u32>,
    targets: Backing<'a, u32>,
    edge_data: Backing<'a, D>,
    /// Flattened `[node * stride + level]` offsets into `[node_array[node],
    /// node_array[node+1])`, for nodes `0..=max_border_node_id`. `stride` is
    /// `num_levels + 2` (level 0 plus the sentinel at `num_levels + 1`).
    node_to_edge_offset: Backing<'a, u8>,
    num_levels: u8,
    max_border_node_id: Option<u32>,
    checksum: u32,
}

impl<'a, D: EdgeDataPayload> MultiLevelGraph<'a, D> {
    pub fn new(
        node_count: usize,
        mut edges: Vec<InputEdge<D>>,
        partition: &MultiLevelPartition,
    ) -> Result<Self, MlcrpError> {
        let num_levels = partition.number_of_levels();
        if num_levels > MAX_LEVELS {
            return Err(MlcrpError::StructuralInvariant {
                detail: format!("partition has {num_levels} levels, exceeding MAX_LEVELS"),
            });
        }

        for e in &edges {
            validation::graph::validate_node_id(e.source.get(), node_count as u32)
                .map_err(MlcrpError::Validation)?;
            validation::graph::validate_node_id(e.target.get(), node_count as u32)
                .map_err(MlcrpError::Validation)?;
        }

        // (1) level per edge, (2) sort by (source, level, target).
        let levels: Vec<u8> = edges
            .iter()
            .map(|e| partition.highest_different_level(e.source, e.target).get())
            .collect();
        let mut order: Vec<usize> = (0..edges.len()).collect();
        order.sort_by_key(|&i| (edges[i].source.get(), levels[i], edges[i].target.get()));

        let sorted_levels: Vec<u8> = order.iter().map(|&i| levels[i]).collect();
        let mut sorted_edges = Vec::with_capacity(edges.len());
        // Reorder `edges` in place by draining through a temp to avoid O(n^2) clone.
        let mut placeholder: Vec<Option<InputEdge<D>>> = edges.drain(..).map(Some).collect();
        for &i in &order {
            sorted_edges.push(placeholder[i].take().expect("each index visited once"));
        }
        drop(placeholder);

        // (3) CSR node array.
        let mut node_array = vec![0u32; node_count + 1];
        for e in &sorted_edges {
            node_array[e.source.index() + 1] += 1;
        }
        for i in 0..node_count {
            node_array[i + 1] += node_array[i];
        }

        for (node, w) in node_array.windows(2).enumerate() {
            let degree = (w[1] - w[0]) as usize;
            validation::graph::validate_degree(node as u32, degree).map_err(MlcrpError::Validation)?;
        }

        let targets: Vec<u32> = sorted_edges.iter().map(|e| e.target.get()).collect();
        let edge_data: Vec<D> = sorted_edges.iter().map(|e| e.data.clone()).collect();

        // (4) per-node per-level offsets, with the border-node truncation.
        let stride = num_levels as usize + 2;
        let mut per_node_offsets: Vec<Vec<u8>> = Vec::with_capacity(node_count);
        let mut max_border_node_id: Option<u32> = None;

        for node in 0..node_count {
            let begin = node_array[node] as usize;
            let end = node_array[node + 1] as usize;
            let degree = (end - begin) as u8;
            let mut offsets = vec![degree; stride];
            offsets[0] = 0;
            // offsets[level] = first local index with sorted_levels >= level, for level=1..=num_levels
            let mut cursor = 0u8;
            for level in 1..=num_levels {
                while (cursor as usize) < (end - begin) && sorted_levels[begin + cursor as usize] < level {
                    cursor += 1;
                }
                offsets[level as usize] = cursor;
            }
            offsets[stride - 1] = degree; // sentinel
            if offsets[1] < degree {
                max_border_node_id = Some(node as u32);
            }
            per_node_offsets.push(offsets);
        }

        let flat_len = max_border_node_id.map(|m| (m as usize + 1) * stride).unwrap_or(0);
        let mut node_to_edge_offset = vec![0u8; flat_len];
        if let Some(max_id) = max_border_node_id {
            for node in 0..=(max_id as usize) {
                let base = node * stride;
                node_to_edge_offset[base..base + stride].copy_from_slice(&per_node_offsets[node]);
            }
        }

        let checksum = compute_checksum(node_count, &node_array, &targets);

        Ok(Self {
            node_array: Backing::Owned(node_array),
            targets: Backing::Owned(targets),
            edge_data: Backing::Owned(edge_data),
            node_to_edge_offset: Backing::Owned(node_to_edge_offset),
            num_levels,
            max_border_node_id,
            checksum,
        })
    }

    /// Re-wrap raw CSR arrays already validated elsewhere (loaded from an
    /// archive, or a memory map). Skips the sort/degree/checksum work that
    /// `new` performs, since a loaded archive's arrays are assumed to have
    /// already passed that validation when they were first built.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        node_array: Backing<'a, u32>,
        targets: Backing<'a, u32>,
        edge_data: Backing<'a, D>,
        node_to_edge_offset: Backing<'a, u8>,
        num_levels: u8,
        max_border_node_id: Option<u32>,
        checksum: u32,
    ) -> Self {
        Self {
            node_array,
            targets,
            edge_data,
            node_to_edge_offset,
            num_levels,
            max_border_node_id,
            checksum,
        }
    }

    pub fn node_array_raw(&self) -> &[u32] {
        self.node_array.as_slice()
    }

    pub fn targets_raw(&self) -> &[u32] {
        self.targets.as_slice()
    }

    pub fn edge_data_raw(&self) -> &[D] {
        self.edge_data.as_slice()
    }

    pub fn node_to_edge_offset_raw(&self) -> &[u8] {
        self.node_to_edge_offset.as_slice()
    }

    pub fn max_border_node_id(&self) -> Option<u32> {
        self.max_border_node_id
    }

    pub fn number_of_nodes(&self) -> usize {
        self.node_array.len().saturating_sub(1)
    }

    pub fn number_of_edges(&self) -> usize {
        self.targets.len()
    }

    pub fn number_of_levels(&self) -> u8 {
        self.num_levels
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    fn edge_range(&self, node: NodeID) -> Result<(u32, u32), MlcrpError> {
        let n = node.index();
        if n + 1 >= self.node_array.len() {
            return Err(MlcrpError::OutOfRange {
                detail: format!("node {node} out of range"),
            });
        }
        Ok((self.node_array[n], self.node_array[n + 1]))
    }

    /// Full outgoing edge range of `u`.
    pub fn adjacent_edges(&self, node: NodeID) -> Result<std::ops::Range<u32>, MlcrpError> {
        let (begin, end) = self.edge_range(node)?;
        Ok(begin..end)
    }

    fn level_offset(&self, node: NodeID, level: u8) -> Result<u8, MlcrpError> {
        let (begin, end) = self.edge_range(node)?;
        let degree = (end - begin) as u8;
        if level == 0 {
            return Ok(0);
        }
        match self.max_border_node_id {
            Some(max_id) if node.get() <= max_id => {
                let stride = self.num_levels as usize + 2;
                let base = node.index() * stride;
                Ok(self.node_to_edge_offset[base + level as usize])
            }
            _ => Ok(degree), // non-border node: no edges at level >= 1
        }
    }

    /// Edges of `u` that cross `u`'s level-ℓ cell boundary. At ℓ=0 this is
    /// `adjacent_edges`.
    pub fn border_edges(&self, level: LevelID, node: NodeID) -> Result<std::ops::Range<u32>, MlcrpError> {
        let (begin, end) = self.edge_range(node)?;
        let offset = self.level_offset(node, level.get())?;
        Ok((begin + offset as u32)..end)
    }

    /// Edges of `u` that stay inside `u`'s level-ℓ cell. Empty at ℓ=0.
    pub fn internal_edges(&self, level: LevelID, node: NodeID) -> Result<std::ops::Range<u32>, MlcrpError> {
        let (begin, _end) = self.edge_range(node)?;
        let offset = self.level_offset(node, level.get())?;
        Ok(begin..(begin + offset as u32))
    }

    pub fn target(&self, edge: EdgeID) -> Result<NodeID, MlcrpError> {
        let raw = *self
            .targets
            .get(edge.index())
            .ok_or_else(|| MlcrpError::OutOfRange {
                detail: format!("edge {edge} out of range"),
            })?;
        NodeID::new(raw).map_err(MlcrpError::Validation)
    }

    pub fn edge_data(&self, edge: EdgeID) -> Result<&D, MlcrpError> {
        self.edge_data.get(edge.index()).ok_or_else(|| MlcrpError::OutOfRange {
            detail: format!("edge {edge} out of range"),
        })
    }

    /// Linear scan within `u`'s adjacency for an edge to `v`.
    pub fn find_edge(&self, u: NodeID, v: NodeID) -> Result<EdgeID, MlcrpError> {
        let range = self.adjacent_edges(u)?;
        for idx in range {
            if self.targets[idx as usize] == v.get() {
                return Ok(EdgeID::new_unchecked(idx));
            }
        }
        Ok(EdgeID::INVALID)
    }
}

pub(crate) fn compute_checksum(node_count: usize, node_array: &[u32], targets: &[u32]) -> u32 {
    let mut bytes = Vec::with_capacity(8 + node_array.len() * 4 + targets.len() * 4);
    bytes.extend_from_slice(&(node_count as u64).to_le_bytes());
    for &v in node_array {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for &v in targets {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    crc32c::crc32c(&bytes)
}
