// Block-structured on-disk archive for a (partition, graph, cell storage,
// metric) quadruple. Each named block is framed by a 4-byte canary at its
// start and end (corruption detection) and a 64-bit element count (so a
// reader can sanity-check a block's length against the layout it expects)
// before the bincode-encoded payload. See SPEC_FULL.md §6 for the required
// block names; this module mirrors the page-header/magic-number idiom this
// codebase already uses for on-disk framing elsewhere (`native_graph_storage`).

use crate::cell_storage::{CellLayout, CellStorage, Metric};
use crate::error::MlcrpError;
use crate::graph::{self, EdgeDataPayload, MultiLevelGraph};
use crate::observability::{log_operation, Operation};
use crate::partition::{LevelInfo, MultiLevelPartition};
use crate::storage::Backing;
use crate::types::{EdgeDistance, EdgeDuration, EdgeWeight, NodeID};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC_START: &[u8; 4] = b"MLC[";
const MAGIC_END: &[u8; 4] = b"]MLC";

fn io_err(detail: impl std::fmt::Display) -> MlcrpError {
    MlcrpError::IncompatibleData {
        block: "<io>".to_string(),
        detail: detail.to_string(),
    }
}

/// Sequential writer for one archive file. Blocks must be written in the
/// same order a matching `ArchiveReader` will read them; the format carries
/// no block index, matching the "append-only named byte blocks" contract in
/// SPEC_FULL.md §6.
pub struct ArchiveWriter {
    writer: BufWriter<File>,
}

impl ArchiveWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, MlcrpError> {
        let file = File::create(path).map_err(io_err)?;
        Ok(Self { writer: BufWriter::new(file) })
    }

    /// Write one named block: start canary, name, element count, payload
    /// length, bincode-encoded payload, end canary.
    pub fn write_block<T: Serialize>(
        &mut self,
        name: &str,
        element_count: u64,
        value: &T,
    ) -> Result<(), MlcrpError> {
        let payload = bincode::serialize(value).map_err(|e| MlcrpError::IncompatibleData {
            block: name.to_string(),
            detail: format!("failed to encode block: {e}"),
        })?;

        self.writer.write_all(MAGIC_START).map_err(io_err)?;
        let name_bytes = name.as_bytes();
        self.writer.write_all(&(name_bytes.len() as u32).to_le_bytes()).map_err(io_err)?;
        self.writer.write_all(name_bytes).map_err(io_err)?;
        self.writer.write_all(&element_count.to_le_bytes()).map_err(io_err)?;
        self.writer.write_all(&(payload.len() as u64).to_le_bytes()).map_err(io_err)?;
        self.writer.write_all(&payload).map_err(io_err)?;
        self.writer.write_all(MAGIC_END).map_err(io_err)?;

        log_operation(&Operation::ArchiveSaved { block: name.to_string() });
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), MlcrpError> {
        self.writer.flush().map_err(io_err)
    }
}

/// Sequential reader, the dual of `ArchiveWriter`.
pub struct ArchiveReader {
    reader: BufReader<File>,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MlcrpError> {
        let file = File::open(path).map_err(io_err)?;
        Ok(Self { reader: BufReader::new(file) })
    }

    /// Read the next block, asserting its name matches `expected_name` and
    /// both canaries are intact. Returns `(element_count, value)`.
    pub fn read_block<T: DeserializeOwned>(
        &mut self,
        expected_name: &str,
    ) -> Result<(u64, T), MlcrpError> {
        let mut magic = [0u8; 4];
        self.reader.read_exact(&mut magic).map_err(io_err)?;
        if &magic != MAGIC_START {
            return Err(MlcrpError::IncompatibleData {
                block: expected_name.to_string(),
                detail: "start canary mismatch".to_string(),
            });
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(io_err)?;
        let name_len = u32::from_le_bytes(len_buf) as usize;
        let mut name_buf = vec![0u8; name_len];
        self.reader.read_exact(&mut name_buf).map_err(io_err)?;
        let name = String::from_utf8(name_buf).map_err(|e| MlcrpError::IncompatibleData {
            block: expected_name.to_string(),
            detail: format!("block name is not valid utf-8: {e}"),
        })?;
        if name != expected_name {
            return Err(MlcrpError::IncompatibleData {
                block: expected_name.to_string(),
                detail: format!("expected block `{expected_name}`, found `{name}`"),
            });
        }

        let mut count_buf = [0u8; 8];
        self.reader.read_exact(&mut count_buf).map_err(io_err)?;
        let element_count = u64::from_le_bytes(count_buf);

        let mut payload_len_buf = [0u8; 8];
        self.reader.read_exact(&mut payload_len_buf).map_err(io_err)?;
        let payload_len = u64::from_le_bytes(payload_len_buf) as usize;
        let mut payload = vec![0u8; payload_len];
        self.reader.read_exact(&mut payload).map_err(io_err)?;

        let value: T = bincode::deserialize(&payload).map_err(|e| MlcrpError::IncompatibleData {
            block: name.clone(),
            detail: format!("failed to decode block: {e}"),
        })?;

        let mut end_magic = [0u8; 4];
        self.reader.read_exact(&mut end_magic).map_err(io_err)?;
        if &end_magic != MAGIC_END {
            return Err(MlcrpError::IncompatibleData {
                block: name,
                detail: "end canary mismatch".to_string(),
            });
        }

        log_operation(&Operation::ArchiveLoaded { block: expected_name.to_string() });
        Ok((element_count, value))
    }
}

fn check_len(block: &str, declared: u64, actual: usize) -> Result<(), MlcrpError> {
    if declared != actual as u64 {
        return Err(MlcrpError::IncompatibleData {
            block: block.to_string(),
            detail: format!("declared element count {declared} does not match decoded length {actual}"),
        });
    }
    Ok(())
}

/// Persists or restores the full (partition, graph, cell storage, metric)
/// quadruple as one archive file, block by block, in the order listed in
/// SPEC_FULL.md §6.
pub struct Archive;

impl Archive {
    pub fn save<D: EdgeDataPayload + Serialize>(
        path: impl AsRef<Path>,
        partition: &MultiLevelPartition<'_>,
        graph: &MultiLevelGraph<'_, D>,
        storage: &CellStorage,
        metric: &Metric,
    ) -> Result<(), MlcrpError> {
        let mut w = ArchiveWriter::create(path)?;

        w.write_block("mlp/level_data", partition.level_infos().len() as u64, &partition.level_infos().to_vec())?;
        w.write_block("mlp/partition", partition.packed_words().len() as u64, &partition.packed_words().to_vec())?;
        let (children_flat, children_offsets) = partition.children_tables();
        let children_element_count: u64 = children_flat.iter().map(|v| v.len() as u64).sum();
        w.write_block(
            "mlp/cell_to_children",
            children_element_count,
            &(children_flat.to_vec(), children_offsets.to_vec()),
        )?;

        w.write_block("mlg/node_array", graph.node_array_raw().len() as u64, &graph.node_array_raw().to_vec())?;
        w.write_block(
            "mlg/edge_array",
            graph.targets_raw().len() as u64,
            &(graph.targets_raw().to_vec(), graph.edge_data_raw().to_vec()),
        )?;
        w.write_block(
            "mlg/node_to_edge_offset",
            graph.node_to_edge_offset_raw().len() as u64,
            &graph.node_to_edge_offset_raw().to_vec(),
        )?;
        w.write_block("mlg/connectivity_checksum", 1, &graph.checksum())?;

        w.write_block(
            "cells/source_boundary",
            storage.source_boundary_raw().len() as u64,
            &storage.source_boundary_raw().to_vec(),
        )?;
        w.write_block(
            "cells/destination_boundary",
            storage.destination_boundary_raw().len() as u64,
            &storage.destination_boundary_raw().to_vec(),
        )?;
        w.write_block("cells/cells", storage.cells_raw().len() as u64, &storage.cells_raw().to_vec())?;
        w.write_block("cells/level_offsets", storage.level_offsets_raw().len() as u64, &storage.level_offsets_raw().to_vec())?;

        w.write_block("metric/weights", metric.len() as u64, &metric.weight_raw().to_vec())?;
        w.write_block("metric/durations", metric.len() as u64, &metric.duration_raw().to_vec())?;
        w.write_block("metric/distances", metric.len() as u64, &metric.distance_raw().to_vec())?;

        w.finish()
    }

    /// Load a previously saved archive. The graph's stored connectivity
    /// checksum is recomputed from the loaded CSR arrays and compared to the
    /// stored value; a mismatch is reported as `IncompatibleData` naming
    /// `mlg/connectivity_checksum` rather than silently trusting stale data.
    #[allow(clippy::type_complexity)]
    pub fn load<D: EdgeDataPayload + DeserializeOwned>(
        path: impl AsRef<Path>,
    ) -> Result<(MultiLevelPartition<'static>, MultiLevelGraph<'static, D>, CellStorage, Metric), MlcrpError> {
        let mut r = ArchiveReader::open(path)?;

        let (level_count, level_info): (u64, Vec<LevelInfo>) = r.read_block("mlp/level_data")?;
        check_len("mlp/level_data", level_count, level_info.len())?;
        let (node_count, packed): (u64, Vec<u64>) = r.read_block("mlp/partition")?;
        check_len("mlp/partition", node_count, packed.len())?;
        let (_, (children_flat, children_offsets)): (u64, (Vec<Vec<u32>>, Vec<Vec<(u32, u32)>>)) =
            r.read_block("mlp/cell_to_children")?;

        let partition = MultiLevelPartition::from_parts(
            Backing::Owned(packed),
            level_info,
            children_flat,
            children_offsets,
        );

        let (node_array_count, node_array): (u64, Vec<u32>) = r.read_block("mlg/node_array")?;
        check_len("mlg/node_array", node_array_count, node_array.len())?;
        let (edge_count, (targets, edge_data)): (u64, (Vec<u32>, Vec<D>)) = r.read_block("mlg/edge_array")?;
        check_len("mlg/edge_array", edge_count, targets.len())?;
        if edge_data.len() != targets.len() {
            return Err(MlcrpError::IncompatibleData {
                block: "mlg/edge_array".to_string(),
                detail: "target and edge-data arrays have different lengths".to_string(),
            });
        }
        let (offset_count, node_to_edge_offset): (u64, Vec<u8>) = r.read_block("mlg/node_to_edge_offset")?;
        check_len("mlg/node_to_edge_offset", offset_count, node_to_edge_offset.len())?;
        let (_, stored_checksum): (u64, u32) = r.read_block("mlg/connectivity_checksum")?;

        let graph_node_count = node_array.len().saturating_sub(1);
        let recomputed = graph::compute_checksum(graph_node_count, &node_array, &targets);
        if recomputed != stored_checksum {
            return Err(MlcrpError::IncompatibleData {
                block: "mlg/connectivity_checksum".to_string(),
                detail: format!(
                    "stored checksum {stored_checksum} does not match recomputed checksum {recomputed}"
                ),
            });
        }

        let num_levels = partition.number_of_levels();
        let stride = num_levels as usize + 2;
        let max_border_node_id = if node_to_edge_offset.is_empty() || stride == 0 {
            None
        } else {
            Some((node_to_edge_offset.len() / stride).saturating_sub(1) as u32)
        };

        let graph = MultiLevelGraph::from_parts(
            Backing::Owned(node_array),
            Backing::Owned(targets),
            Backing::Owned(edge_data),
            Backing::Owned(node_to_edge_offset),
            num_levels,
            max_border_node_id,
            stored_checksum,
        );

        let (source_count, source_boundary): (u64, Vec<NodeID>) = r.read_block("cells/source_boundary")?;
        check_len("cells/source_boundary", source_count, source_boundary.len())?;
        let (dest_count, destination_boundary): (u64, Vec<NodeID>) = r.read_block("cells/destination_boundary")?;
        check_len("cells/destination_boundary", dest_count, destination_boundary.len())?;
        let (cell_count, cells): (u64, Vec<CellLayout>) = r.read_block("cells/cells")?;
        check_len("cells/cells", cell_count, cells.len())?;
        let (offsets_count, level_offsets): (u64, Vec<u32>) = r.read_block("cells/level_offsets")?;
        check_len("cells/level_offsets", offsets_count, level_offsets.len())?;

        let storage = CellStorage::from_parts(source_boundary, destination_boundary, cells, level_offsets);

        let (weight_count, weight): (u64, Vec<EdgeWeight>) = r.read_block("metric/weights")?;
        check_len("metric/weights", weight_count, weight.len())?;
        let (duration_count, duration): (u64, Vec<EdgeDuration>) = r.read_block("metric/durations")?;
        check_len("metric/durations", duration_count, duration.len())?;
        let (distance_count, distance): (u64, Vec<EdgeDistance>) = r.read_block("metric/distances")?;
        check_len("metric/distances", distance_count, distance.len())?;

        let metric = Metric::from_parts(weight, duration, distance);

        Ok((partition, graph, storage, metric))
    }
}
