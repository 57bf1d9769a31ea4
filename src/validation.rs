// Validation layer: runtime checks that back the constructors in `types` and
// `config`, plus structural checks for partition/graph construction that are
// closer to "programmer error, abort with context" than to a recoverable
// condition.

use std::collections::HashMap;

/// Validation errors with detailed context. Converted into
/// `crate::error::MlcrpError::Validation` at the crate boundary.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("precondition failed: {condition}")]
    PreconditionFailed { condition: String, context: String },
}

/// Validation context for attaching operation/attribute breadcrumbs to a
/// failed check, so a construction failure can be diagnosed without a
/// debugger attached to the partitioner or customizer process.
#[derive(Clone)]
pub struct ValidationContext {
    operation: String,
    attributes: HashMap<String, String>,
}

impl ValidationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn check(self, condition: bool, message: &str) -> Result<(), ValidationError> {
        if !condition {
            let context = format!(
                "operation: {}, attributes: {:?}",
                self.operation, self.attributes
            );
            return Err(ValidationError::PreconditionFailed {
                condition: message.to_string(),
                context,
            });
        }
        Ok(())
    }
}

/// Structural checks over a raw partition assignment, run once at
/// `MultiLevelPartition` construction time (see `partition::MultiLevelPartition::new`).
pub mod partition {
    use super::*;

    /// Checks the nesting invariant: every level-(ℓ-1) cell must be fully
    /// contained in a single level-ℓ cell. `levels` is indexed `[level][node]`
    /// for levels 1..=L (level 0 is synthetic and is not passed in).
    pub fn validate_nesting(levels: &[Vec<u32>]) -> Result<(), ValidationError> {
        let ctx = ValidationContext::new("partition_nesting")
            .with_attribute("num_levels", levels.len().to_string());

        if levels.is_empty() {
            return Ok(());
        }
        let n = levels[0].len();
        ctx.clone()
            .check(levels.iter().all(|l| l.len() == n), "every level must assign every node")?;

        for pair in levels.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            let mut parent_of: HashMap<u32, u32> = HashMap::new();
            for node in 0..n {
                let entry = parent_of.entry(lower[node]).or_insert(upper[node]);
                if *entry != upper[node] {
                    return Err(ValidationError::InvalidInput {
                        field: "partition".to_string(),
                        reason: format!(
                            "lower-level cell {} spans two upper-level cells ({} and {})",
                            lower[node], entry, upper[node]
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks that the number of distinct cells is non-increasing in level
    /// and that the top level collapses to exactly one cell.
    pub fn validate_monotonic_cell_counts(levels: &[Vec<u32>]) -> Result<(), ValidationError> {
        let ctx = ValidationContext::new("partition_cell_counts");
        let mut previous_count: Option<usize> = None;
        for (idx, level) in levels.iter().enumerate() {
            let count = level.iter().collect::<std::collections::HashSet<_>>().len();
            if let Some(prev) = previous_count {
                ctx.clone().check(
                    count <= prev,
                    &format!("cell count must be non-increasing by level (level {idx})"),
                )?;
            }
            previous_count = Some(count);
        }
        if let Some(top_level_count) = previous_count {
            ctx.check(top_level_count == 1, "top level must have exactly one cell")?;
        }
        Ok(())
    }
}

/// Structural checks over raw edge lists, run once at `MultiLevelGraph`
/// construction time.
pub mod graph {
    use super::*;

    /// Per-node degree must fit the 8-bit border-edge offset width.
    pub fn validate_degree(node: u32, degree: usize) -> Result<(), ValidationError> {
        ValidationContext::new("graph_degree")
            .with_attribute("node", node.to_string())
            .with_attribute("degree", degree.to_string())
            .check(degree <= u8::MAX as usize, "node degree exceeds the 8-bit offset width")
    }

    pub fn validate_node_id(node: u32, node_count: u32) -> Result<(), ValidationError> {
        ValidationContext::new("graph_node_id")
            .with_attribute("node", node.to_string())
            .with_attribute("node_count", node_count.to_string())
            .check(node < node_count, "node id out of range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_violation_is_rejected() {
        // Node 0 and 1 share level-1 cell 0, but diverge at level 2.
        let levels = vec![vec![0, 0], vec![0, 1]];
        assert!(partition::validate_nesting(&levels).is_err());
    }

    #[test]
    fn valid_nesting_is_accepted() {
        let levels = vec![vec![0, 0, 1, 1], vec![0, 0, 0, 0]];
        assert!(partition::validate_nesting(&levels).is_ok());
    }

    #[test]
    fn monotonic_cell_counts_enforced() {
        let ok = vec![vec![0, 1, 2, 3], vec![0, 0, 1, 1], vec![0, 0, 0, 0]];
        assert!(partition::validate_monotonic_cell_counts(&ok).is_ok());

        let bad = vec![vec![0, 0], vec![0, 1]];
        assert!(partition::validate_monotonic_cell_counts(&bad).is_err());
    }

    #[test]
    fn degree_over_255_is_rejected() {
        assert!(graph::validate_degree(0, 255).is_ok());
        assert!(graph::validate_degree(0, 256).is_err());
    }
}
