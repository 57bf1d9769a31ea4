// MultiLevelPartition: a compact, cache-friendly encoding of a nested cell
// hierarchy. Each node's cell id at every level ℓ = 1..=L is packed into one
// machine word; `highestDifferentLevel` is then a XOR followed by a
// most-significant-set-bit scan over the per-level bit fields.

use crate::error::MlcrpError;
use crate::storage::Backing;
use crate::types::{CellID, LevelID, NodeID, MAX_LEVELS};
use crate::validation::{self as validation_mod};
use serde::{Deserialize, Serialize};

/// Bit offset and width of one level's field within the packed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub cell_count: u32,
    pub bit_offset: u32,
    pub bit_width: u32,
}

impl LevelInfo {
    fn mask(self) -> u64 {
        if self.bit_width == 0 {
            0
        } else {
            ((1u64 << self.bit_width) - 1) << self.bit_offset
        }
    }
}

fn bits_for_count(cell_count: u32) -> u32 {
    // ceil(log2(cell_count + 1)), with a floor of 1 bit so a single-cell
    // level still has an addressable (all-zero) code.
    let n = cell_count as u64 + 1;
    (64 - (n.saturating_sub(1)).leading_zeros()).max(1)
}

/// A packed, immutable multi-level cell hierarchy. `'a` is the lifetime of
/// borrowed (e.g. memory-mapped) backing storage; construction always
/// produces the owned (`'static`) flavor.
pub struct MultiLevelPartition<'a> {
    packed: Backing<'a, u64>,
    level_info: Vec<LevelInfo>,
    /// Flat, parent-sorted child cell ids for levels ℓ = 2..=L. Entry `i`
    /// holds the children of level `i + 2`, i.e. cells at level `i + 1`.
    children_flat: Vec<Vec<u32>>,
    /// Per level (same indexing as `children_flat`), per parent cell id:
    /// `(begin, end)` range into `children_flat[i]`.
    children_offsets: Vec<Vec<(u32, u32)>>,
}

impl<'a> MultiLevelPartition<'a> {
    /// Build a partition from a partitioner's raw output: for each level
    /// ℓ = 1..=L, a cell-id vector of length N plus that level's cell count
    /// upper bound. Level 0 (the node id itself) is implicit and is not
    /// passed in.
    pub fn new(levels: Vec<Vec<u32>>, cell_counts: Vec<u32>) -> Result<Self, MlcrpError> {
        if levels.len() != cell_counts.len() {
            return Err(MlcrpError::StructuralInvariant {
                detail: "levels and cell_counts must have the same length".to_string(),
            });
        }
        let num_levels = levels.len();
        if num_levels == 0 {
            return Err(MlcrpError::StructuralInvariant {
                detail: "a partition needs at least one level".to_string(),
            });
        }
        if num_levels > MAX_LEVELS as usize {
            return Err(MlcrpError::StructuralInvariant {
                detail: format!("{num_levels} levels exceeds MAX_LEVELS ({MAX_LEVELS})"),
            });
        }
        let node_count = levels[0].len();

        validation_mod::partition::validate_nesting(&levels)?;
        validation_mod::partition::validate_monotonic_cell_counts(&levels)?;

        let mut level_info = Vec::with_capacity(num_levels);
        let mut offset = 0u32;
        for &count in &cell_counts {
            let width = bits_for_count(count);
            if offset as u64 + width as u64 > 64 {
                return Err(MlcrpError::StructuralInvariant {
                    detail: format!(
                        "packed partition word overflow: {} bits needed across {} levels (this implementation supports a single 64-bit word)",
                        offset + width,
                        num_levels
                    ),
                });
            }
            level_info.push(LevelInfo {
                cell_count: count,
                bit_offset: offset,
                bit_width: width,
            });
            offset += width;
        }

        let mut packed = vec![0u64; node_count];
        for (level_idx, cells) in levels.iter().enumerate() {
            let info = level_info[level_idx];
            for (node, &cell) in cells.iter().enumerate() {
                if cell >= info.cell_count.max(1) && info.cell_count != 0 {
                    return Err(MlcrpError::StructuralInvariant {
                        detail: format!(
                            "cell id {cell} at level {} exceeds declared cell_count {}",
                            level_idx + 1,
                            info.cell_count
                        ),
                    });
                }
                packed[node] |= (cell as u64) << info.bit_offset;
            }
        }

        let (children_flat, children_offsets) = build_children_tables(&levels);

        Ok(Self {
            packed: Backing::Owned(packed),
            level_info,
            children_flat,
            children_offsets,
        })
    }

    /// Re-wrap an externally-decoded, already-validated packed array (e.g.
    /// loaded from an archive block or a memory map) without re-running
    /// structural validation.
    pub fn from_parts(
        packed: Backing<'a, u64>,
        level_info: Vec<LevelInfo>,
        children_flat: Vec<Vec<u32>>,
        children_offsets: Vec<Vec<(u32, u32)>>,
    ) -> Self {
        Self {
            packed,
            level_info,
            children_flat,
            children_offsets,
        }
    }

    pub fn number_of_levels(&self) -> u8 {
        self.level_info.len() as u8
    }

    pub fn number_of_cells(&self, level: LevelID) -> Result<u32, MlcrpError> {
        self.info(level).map(|info| info.cell_count)
    }

    pub fn number_of_nodes(&self) -> usize {
        self.packed.len()
    }

    pub fn level_info(&self, level: LevelID) -> Result<LevelInfo, MlcrpError> {
        self.info(level)
    }

    fn info(&self, level: LevelID) -> Result<LevelInfo, MlcrpError> {
        if level.is_base() || level.index() > self.level_info.len() {
            return Err(MlcrpError::OutOfRange {
                detail: format!("level {level} has no LevelInfo (base level is synthetic)"),
            });
        }
        Ok(self.level_info[level.index() - 1])
    }

    /// `cell(ℓ, node)`. Level 0 is synthetic and always equals the node id.
    pub fn cell(&self, level: LevelID, node: NodeID) -> Result<CellID, MlcrpError> {
        if node.index() >= self.packed.len() {
            return Err(MlcrpError::OutOfRange {
                detail: format!("node {node} out of range ({} nodes)", self.packed.len()),
            });
        }
        if level.is_base() {
            return CellID::new(node.get()).map_err(MlcrpError::Validation);
        }
        let info = self.info(level)?;
        let word = self.packed[node.index()];
        let raw = ((word & info.mask()) >> info.bit_offset) as u32;
        CellID::new(raw).map_err(MlcrpError::Validation)
    }

    /// The largest ℓ such that `cell(ℓ,u) ≠ cell(ℓ,v)`. Returns level 0 both
    /// when `u == v` (a documented edge case callers must not rely on for
    /// anything but equality) and when u and v agree at every level ≥ 1 (the
    /// only level distinguishing them is the implicit, per-node level 0).
    pub fn highest_different_level(&self, u: NodeID, v: NodeID) -> LevelID {
        if u == v {
            return LevelID::BASE;
        }
        let wu = self.packed.as_slice().get(u.index()).copied().unwrap_or(0);
        let wv = self.packed.as_slice().get(v.index()).copied().unwrap_or(0);
        let diff = wu ^ wv;
        if diff == 0 {
            return LevelID::BASE;
        }
        for (idx, info) in self.level_info.iter().enumerate().rev() {
            if diff & info.mask() != 0 {
                return LevelID::new_unchecked((idx + 1) as u8);
            }
        }
        LevelID::BASE
    }

    /// `[beginChildren(ℓ,c), endChildren(ℓ,c))`: the level-(ℓ-1) cell ids
    /// nested inside level-ℓ cell `c`. Only defined for ℓ ≥ 2.
    pub fn children(&self, level: LevelID, cell: CellID) -> Result<&[u32], MlcrpError> {
        if level.get() < 2 {
            return Err(MlcrpError::OutOfRange {
                detail: format!("children() requires level >= 2, got {level}"),
            });
        }
        let table_idx = level.index() - 2;
        let offsets = self.children_offsets.get(table_idx).ok_or_else(|| {
            MlcrpError::OutOfRange {
                detail: format!("level {level} has no children table"),
            }
        })?;
        let (begin, end) = *offsets.get(cell.index()).ok_or_else(|| MlcrpError::OutOfRange {
            detail: format!("cell {cell} out of range at level {level}"),
        })?;
        Ok(&self.children_flat[table_idx][begin as usize..end as usize])
    }

    /// A 32-bit checksum over the packed partition data, so an archive
    /// reader can sanity-check it was loaded against a compatible graph.
    pub fn checksum(&self) -> u32 {
        let bytes: Vec<u8> = self.packed.as_slice().iter().flat_map(|w| w.to_le_bytes()).collect();
        crc32c::crc32c(&bytes)
    }

    pub fn packed_words(&self) -> &[u64] {
        self.packed.as_slice()
    }

    /// This level's bit layout, for every level, in level order. Exposed for
    /// archive serialization (`archive::mlp/level_data`).
    pub fn level_infos(&self) -> &[LevelInfo] {
        &self.level_info
    }

    /// The flattened children tables, for archive serialization
    /// (`archive::mlp/cell_to_children`). See `children_flat` for layout.
    pub fn children_tables(&self) -> (&[Vec<u32>], &[Vec<(u32, u32)>]) {
        (&self.children_flat, &self.children_offsets)
    }
}

fn build_children_tables(levels: &[Vec<u32>]) -> (Vec<Vec<u32>>, Vec<Vec<(u32, u32)>>) {
    let num_levels = levels.len();
    let mut children_flat = Vec::new();
    let mut children_offsets = Vec::new();

    // Level ℓ in 2..=num_levels (1-based); levels[ℓ-1] holds parent ids,
    // levels[ℓ-2] holds child ids, both indexed by node.
    for level in 2..=num_levels {
        let child_level_cells = &levels[level - 2]; // level ℓ-1 per node
        let parent_level_cells = &levels[level - 1]; // level ℓ per node

        // Map each distinct (ℓ-1) cell id to its (ℓ) parent cell id.
        let mut parent_of_child: std::collections::BTreeMap<u32, u32> =
            std::collections::BTreeMap::new();
        for (node, &child_cell) in child_level_cells.iter().enumerate() {
            parent_of_child.entry(child_cell).or_insert(parent_level_cells[node]);
        }

        let mut children_by_parent: std::collections::BTreeMap<u32, Vec<u32>> =
            std::collections::BTreeMap::new();
        for (&child, &parent) in &parent_of_child {
            children_by_parent.entry(parent).or_default().push(child);
        }

        let max_parent = parent_level_cells.iter().copied().max().unwrap_or(0);
        let mut flat = Vec::new();
        let mut offsets = vec![(0u32, 0u32); max_parent as usize + 1];
        for (&parent, children) in &children_by_parent {
            let begin = flat.len() as u32;
            flat.extend(children.iter().copied());
            offsets[parent as usize] = (begin, flat.len() as u32);
        }

        children_flat.push(flat);
        children_offsets.push(offsets);
    }

    (children_flat, children_offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_partition() -> MultiLevelPartition<'static> {
        // 4 nodes, 2 levels: level 1 splits {0,1} vs {2,3}; level 2 merges
        // everything into one cell (top level).
        let levels = vec![vec![0, 0, 1, 1], vec![0, 0, 0, 0]];
        let cell_counts = vec![2, 1];
        MultiLevelPartition::new(levels, cell_counts).unwrap()
    }

    #[test]
    fn cell_lookup_matches_input() {
        let p = sample_partition();
        let l1 = LevelID::new(1).unwrap();
        assert_eq!(p.cell(l1, NodeID::new(0).unwrap()).unwrap().get(), 0);
        assert_eq!(p.cell(l1, NodeID::new(2).unwrap()).unwrap().get(), 1);
        let l2 = LevelID::new(2).unwrap();
        assert_eq!(p.cell(l2, NodeID::new(3).unwrap()).unwrap().get(), 0);
    }

    #[test]
    fn highest_different_level_is_zero_for_equal_nodes() {
        let p = sample_partition();
        let n0 = NodeID::new(0).unwrap();
        assert_eq!(p.highest_different_level(n0, n0), LevelID::BASE);
    }

    #[test]
    fn highest_different_level_separates_level_1_cells() {
        let p = sample_partition();
        let n0 = NodeID::new(0).unwrap();
        let n2 = NodeID::new(2).unwrap();
        assert_eq!(p.highest_different_level(n0, n2).get(), 1);
    }

    #[test]
    fn highest_different_level_is_zero_within_same_finest_cell() {
        let p = sample_partition();
        let n0 = NodeID::new(0).unwrap();
        let n1 = NodeID::new(1).unwrap();
        // 0 and 1 share cell 0 at level 1 and (trivially) at level 2.
        assert_eq!(p.highest_different_level(n0, n1), LevelID::BASE);
    }

    #[test]
    fn children_navigation_round_trips() {
        let p = sample_partition();
        let l2 = LevelID::new(2).unwrap();
        let top_cell = CellID::new(0).unwrap();
        let children = p.children(l2, top_cell).unwrap();
        let mut sorted = children.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1]);
    }

    #[test]
    fn nesting_violation_is_rejected_at_construction() {
        let levels = vec![vec![0, 0], vec![0, 1]];
        let cell_counts = vec![1, 2];
        assert!(MultiLevelPartition::new(levels, cell_counts).is_err());
    }

    #[test]
    fn checksum_is_stable_across_equivalent_rebuilds() {
        let a = sample_partition();
        let b = sample_partition();
        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn scenario_2_four_level_hierarchy_highest_different_level() {
        // 16 nodes; l1 groups by 4, l2 groups by 8, l3 is a single cell.
        let l1 = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3];
        let l2 = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];
        let l3 = vec![0; 16];
        let cell_counts = vec![4, 2, 1];
        let p = MultiLevelPartition::new(vec![l1, l2, l3], cell_counts).unwrap();

        let n13 = NodeID::new(13).unwrap();
        let n12 = NodeID::new(12).unwrap();
        // Both in l1 cell 3, l2 cell 1, l3 cell 0: every level ℓ>=1 agrees.
        assert_eq!(p.highest_different_level(n13, n12), LevelID::BASE);

        let n8 = NodeID::new(8).unwrap();
        // Node 8 is in l1 cell 2 vs node 13's l1 cell 3, but both in l2 cell 1.
        assert_eq!(p.highest_different_level(n13, n8).get(), 1);
    }
}
