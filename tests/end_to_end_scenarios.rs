// End-to-end scenarios exercising the full pipeline: builders -> CellStorage
// -> CellCustomizer -> archive round-trip, through the crate's public API only.

use anyhow::Result;
use mlcrp::{
    Archive, CellCustomizer, CellID, CellStorage, CustomizationEdgeData, CustomizerConfig,
    EdgeDistance, EdgeDuration, EdgeWeight, GraphBuilder, LevelID, MlcrpError, NodeID,
    PartitionBuilder,
};

fn edge_data(weight: i64) -> CustomizationEdgeData {
    CustomizationEdgeData {
        weight: EdgeWeight::new(weight).unwrap(),
        duration: EdgeDuration::new(weight as u32).unwrap(),
        distance: EdgeDistance::new(weight as f64).unwrap(),
        forward: true,
        backward: false,
    }
}

fn n(raw: u32) -> NodeID {
    NodeID::new(raw).unwrap()
}

/// Scenario 1: a 4-node, two-cell graph. Every within-cell edge must show up
/// directly in its cell's matrix after customization.
#[test]
fn scenario_1_two_cell_graph_round_trips_through_the_full_pipeline() -> Result<()> {
    let partition = PartitionBuilder::new().level(vec![0, 0, 1, 1], 2).build()?;
    let graph = GraphBuilder::new(4)
        .add_edge(n(0), n(1), edge_data(1))
        .add_edge(n(1), n(0), edge_data(1))
        .add_edge(n(0), n(2), edge_data(1))
        .add_edge(n(2), n(0), edge_data(1))
        .add_edge(n(2), n(3), edge_data(1))
        .add_edge(n(3), n(2), edge_data(1))
        .add_edge(n(3), n(1), edge_data(1))
        .add_edge(n(1), n(3), edge_data(1))
        .build(&partition)?;
    let storage = CellStorage::build(&graph, &partition)?;
    let mut metric = storage.new_metric();
    CellCustomizer::new(CustomizerConfig::default()).customize(&graph, &partition, &storage, &mut metric)?;

    let l1 = LevelID::new(1)?;
    let cell0 = CellID::new(0)?;
    let handle0 = storage.cell_readonly(&metric, l1, cell0)?;
    assert_eq!(handle0.source_nodes().iter().map(|x| x.get()).collect::<Vec<_>>(), vec![0]);
    assert_eq!(handle0.destination_nodes().iter().map(|x| x.get()).collect::<Vec<_>>(), vec![1]);
    assert_eq!(handle0.out_weight(0)[0].get(), 1);

    let cell1 = CellID::new(1)?;
    let handle1 = storage.cell_readonly(&metric, l1, cell1)?;
    let s2 = handle1.source_nodes().iter().position(|x| x.get() == 2).unwrap();
    let s3 = handle1.source_nodes().iter().position(|x| x.get() == 3).unwrap();
    let d2 = handle1.destination_nodes().iter().position(|x| x.get() == 2).unwrap();
    let d3 = handle1.destination_nodes().iter().position(|x| x.get() == 3).unwrap();
    assert_eq!(handle1.out_weight(s2)[d3].get(), 1);
    assert_eq!(handle1.out_weight(s3)[d2].get(), 1);
    Ok(())
}

/// Scenario 2: a four-level hierarchy (levels 1-3 plus the implicit base).
/// A single internal edge's weight must appear, unchanged, in the matrices
/// of every cell whose level it borders, at every level that registers it.
#[test]
fn scenario_2_four_level_hierarchy_propagates_an_edge_weight_through_two_levels() -> Result<()> {
    let l1 = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3];
    let l2 = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];
    let l3 = vec![0u32; 16];
    let partition = PartitionBuilder::new().level(l1, 4).level(l2, 2).level(l3, 1).build()?;

    // 11->13 and 2->13 both register node 13 as a source of its level-1 and
    // level-2 cells; 12->8 and 12->1 both register node 12 as a destination
    // of the same cells. 13->12 is the only path between them at either
    // level, so its weight must appear unchanged in both matrices.
    let graph = GraphBuilder::new(16)
        .add_edge(n(11), n(13), edge_data(1))
        .add_edge(n(2), n(13), edge_data(1))
        .add_edge(n(12), n(8), edge_data(1))
        .add_edge(n(12), n(1), edge_data(1))
        .add_edge(n(13), n(12), edge_data(10))
        .build(&partition)?;
    let storage = CellStorage::build(&graph, &partition)?;
    let mut metric = storage.new_metric();
    CellCustomizer::new(CustomizerConfig::default()).customize(&graph, &partition, &storage, &mut metric)?;

    let l1_id = LevelID::new(1)?;
    let n13 = n(13);
    let n12 = n(12);
    let cell3 = partition.cell(l1_id, n13)?;
    assert_eq!(cell3, partition.cell(l1_id, n12)?);
    let handle1 = storage.cell_readonly(&metric, l1_id, cell3)?;
    let s = handle1.source_nodes().iter().position(|x| *x == n13).unwrap();
    let d = handle1.destination_nodes().iter().position(|x| *x == n12).unwrap();
    assert_eq!(handle1.out_weight(s)[d].get(), 10);

    let l2_id = LevelID::new(2)?;
    let cell1_at_l2 = partition.cell(l2_id, n13)?;
    assert_eq!(cell1_at_l2, partition.cell(l2_id, n12)?);
    let handle2 = storage.cell_readonly(&metric, l2_id, cell1_at_l2)?;
    let s2 = handle2.source_nodes().iter().position(|x| *x == n13).unwrap();
    let d2 = handle2.destination_nodes().iter().position(|x| *x == n12).unwrap();
    assert_eq!(handle2.out_weight(s2)[d2].get(), 10);
    Ok(())
}

/// Scenario 3: a triangle-inequality shortcut. Level 1 establishes a clique
/// entry `0->1 = 5` inside one sub-cell and `2->3 = 1` inside another. At
/// level 2, the only route from 0 to 3 chains both clique entries across a
/// level-1 border edge (`1->2`, weight 1) for a true cost of 5+1+1=7. A
/// direct, deliberately expensive raw edge `0->3` (weight 50) must lose to
/// that chained route, and the `fromClique` suppression must not cause the
/// chain to be skipped or double-counted.
#[test]
fn scenario_3_clique_chain_beats_an_expensive_direct_edge() -> Result<()> {
    // l1: {0,1} -> cell 0, {2,3} -> cell 1, {4,5} -> cell 2.
    // l2: {0,1,2,3} -> cell 0, {4,5} -> cell 1.
    // l3: everything -> cell 0 (trivial top).
    let partition = PartitionBuilder::new()
        .level(vec![0, 0, 1, 1, 2, 2], 3)
        .level(vec![0, 0, 0, 0, 1, 1], 2)
        .level(vec![0, 0, 0, 0, 0, 0], 1)
        .build()?;

    let graph = GraphBuilder::new(6)
        .add_edge(n(0), n(1), edge_data(5)) // clique candidate inside l1 cell 0
        .add_edge(n(1), n(2), edge_data(1)) // border edge, l1 cell 0 -> l1 cell 1
        .add_edge(n(2), n(0), edge_data(100)) // makes node 0 a source of l1 cell 0
        .add_edge(n(2), n(3), edge_data(1)) // clique candidate inside l1 cell 1
        .add_edge(n(3), n(4), edge_data(1)) // makes node 3 a destination of l2 cell 0
        .add_edge(n(5), n(0), edge_data(1)) // makes node 0 a source of l2 cell 0
        .add_edge(n(0), n(3), edge_data(50)) // expensive direct shortcut, must lose
        .build(&partition)?;
    let storage = CellStorage::build(&graph, &partition)?;
    let mut metric = storage.new_metric();
    CellCustomizer::new(CustomizerConfig::default()).customize(&graph, &partition, &storage, &mut metric)?;

    // Level 1 clique entries feeding the level-2 chain.
    let l1_id = LevelID::new(1)?;
    let cell0_l1 = partition.cell(l1_id, n(0))?;
    let handle_l1_cell0 = storage.cell_readonly(&metric, l1_id, cell0_l1)?;
    let s0 = handle_l1_cell0.source_nodes().iter().position(|x| x.get() == 0).unwrap();
    let d1 = handle_l1_cell0.destination_nodes().iter().position(|x| x.get() == 1).unwrap();
    assert_eq!(handle_l1_cell0.out_weight(s0)[d1].get(), 5);

    let cell1_l1 = partition.cell(l1_id, n(2))?;
    let handle_l1_cell1 = storage.cell_readonly(&metric, l1_id, cell1_l1)?;
    let s2 = handle_l1_cell1.source_nodes().iter().position(|x| x.get() == 2).unwrap();
    let d3 = handle_l1_cell1.destination_nodes().iter().position(|x| x.get() == 3).unwrap();
    assert_eq!(handle_l1_cell1.out_weight(s2)[d3].get(), 1);

    // Level 2: the chained route (5 + 1 + 1 = 7) must win over the direct,
    // expensive edge (50).
    let l2_id = LevelID::new(2)?;
    let cell0_l2 = partition.cell(l2_id, n(0))?;
    assert_eq!(cell0_l2, partition.cell(l2_id, n(3))?);
    let handle_l2 = storage.cell_readonly(&metric, l2_id, cell0_l2)?;
    let s = handle_l2.source_nodes().iter().position(|x| x.get() == 0).unwrap();
    let d = handle_l2.destination_nodes().iter().position(|x| x.get() == 3).unwrap();
    assert_eq!(handle_l2.out_weight(s)[d].get(), 7);
    Ok(())
}

/// Scenario 4: an unreachable destination reads back as the INFINITY /
/// MAX / INVALID sentinel, never as zero or a partially written value.
#[test]
fn scenario_4_unreachable_pair_reads_back_as_infinity() -> Result<()> {
    // l1: {0,1,2,3} -> cell 0, {4} -> cell 1 (a single border node).
    // l2: everything -> cell 0 (trivial top, required by the partition's
    // monotonic-cell-count invariant).
    let partition = PartitionBuilder::new()
        .level(vec![0, 0, 0, 0, 1], 2)
        .level(vec![0, 0, 0, 0, 0], 1)
        .build()?;
    let graph = GraphBuilder::new(5)
        .add_edge(n(4), n(0), edge_data(1)) // node 0 becomes a source of cell 0
        .add_edge(n(1), n(4), edge_data(1)) // node 1 becomes a destination of cell 0
        .add_edge(n(3), n(4), edge_data(1)) // node 3 becomes a destination of cell 0
        .add_edge(n(0), n(1), edge_data(1)) // 0 -> 1 is reachable
        // node 2 stays fully isolated: 0 -> 3 has no path through cell 0's nodes
        .build(&partition)?;
    let storage = CellStorage::build(&graph, &partition)?;
    let mut metric = storage.new_metric();
    CellCustomizer::new(CustomizerConfig::default()).customize(&graph, &partition, &storage, &mut metric)?;

    let l1 = LevelID::new(1)?;
    let cell0 = CellID::new(0)?;
    let handle = storage.cell_readonly(&metric, l1, cell0)?;
    let s0 = handle.source_nodes().iter().position(|x| x.get() == 0).unwrap();
    let d1 = handle.destination_nodes().iter().position(|x| x.get() == 1).unwrap();
    let d3 = handle.destination_nodes().iter().position(|x| x.get() == 3).unwrap();

    assert_eq!(handle.out_weight(s0)[d1].get(), 1);
    assert_eq!(handle.out_weight(s0)[d3], EdgeWeight::INFINITY);
    assert_eq!(handle.out_duration(s0)[d3], EdgeDuration::MAX);
    assert_eq!(handle.out_distance(s0)[d3], EdgeDistance::INVALID);
    Ok(())
}

/// Scenario 5: an archive round-trips exactly, and loading one whose
/// connectivity checksum does not match its own CSR arrays fails with
/// `IncompatibleData` rather than silently loading stale data.
#[test]
fn scenario_5_archive_round_trip_and_checksum_mismatch_detection() -> Result<()> {
    let partition = PartitionBuilder::new().level(vec![0, 0, 1, 1], 2).build()?;
    let graph = GraphBuilder::new(4)
        .add_edge(n(0), n(1), edge_data(1))
        .add_edge(n(2), n(3), edge_data(1))
        .build(&partition)?;
    let storage = CellStorage::build(&graph, &partition)?;
    let mut metric = storage.new_metric();
    CellCustomizer::new(CustomizerConfig::default()).customize(&graph, &partition, &storage, &mut metric)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scenario5.bin");
    Archive::save(&path, &partition, &graph, &storage, &metric)?;

    type Quad = (
        mlcrp::MultiLevelPartition<'static>,
        mlcrp::MultiLevelGraph<'static, CustomizationEdgeData>,
        CellStorage,
        mlcrp::Metric,
    );
    let loaded: Quad = Archive::load(&path)?;
    assert_eq!(loaded.1.checksum(), graph.checksum());
    assert_eq!(loaded.0.checksum(), partition.checksum());

    // Corrupt the connectivity checksum block's payload byte-for-byte.
    let mut bytes = std::fs::read(&path)?;
    let needle = b"mlg/connectivity_checksum";
    let pos = bytes.windows(needle.len()).position(|w| w == needle).unwrap();
    let payload_start = pos + needle.len() + 8 + 8;
    bytes[payload_start] ^= 0xFF;
    std::fs::write(&path, &bytes)?;

    let reload: Result<Quad, MlcrpError> = Archive::load(&path);
    assert!(matches!(reload, Err(MlcrpError::IncompatibleData { .. })));
    Ok(())
}
