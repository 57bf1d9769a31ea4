// Construction-time configuration for the parts of the core that are
// deliberately left open: thread count, QueryHeap index backing, and the
// allowedNodes predicate. Collected into one validated, serializable value
// rather than threaded through function signatures as bare parameters.

use crate::types::NodeID;
use crate::validation::{ValidationContext, ValidationError};
use serde::{Deserialize, Serialize};

/// Which `QueryHeap` index-storage strategy the customizer should use.
/// See `query_heap` for the tradeoffs of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapBacking {
    /// O(1) lookup, O(N) memory. The customizer's documented default.
    Array,
    /// Sparse; good when a search only ever touches a handful of nodes.
    UnorderedMap,
    /// Sparse with deterministic iteration order.
    Map,
    /// Dense array for border nodes overlaid on a sparse map for the rest.
    TwoLevel,
    /// Array backing with generation counters, avoiding an O(N) clear.
    Generation,
}

impl Default for HeapBacking {
    fn default() -> Self {
        HeapBacking::Array
    }
}

/// A boolean predicate over nodes, used to produce metric variants that
/// exclude certain nodes (e.g. a tolls-off profile) without rebuilding
/// CellStorage. Unset entries are treated as blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedNodes {
    allowed: Vec<bool>,
}

impl AllowedNodes {
    /// Every node allowed.
    pub fn all_allowed(node_count: usize) -> Self {
        Self {
            allowed: vec![true; node_count],
        }
    }

    pub fn from_vec(allowed: Vec<bool>) -> Self {
        Self { allowed }
    }

    pub fn is_allowed(&self, node: NodeID) -> bool {
        self.allowed.get(node.index()).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Customization-time configuration, constructed or loaded by the embedding
/// application. This crate never parses argv or reads environment variables
/// itself; the CLI surface is explicitly out of scope for the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomizerConfig {
    /// `None` defers to rayon's default (the machine's core count).
    pub thread_count: Option<usize>,
    pub heap_backing: HeapBacking,
    #[serde(skip)]
    pub allowed_nodes: Option<AllowedNodes>,
}

impl Default for CustomizerConfig {
    fn default() -> Self {
        Self {
            thread_count: None,
            heap_backing: HeapBacking::default(),
            allowed_nodes: None,
        }
    }
}

impl CustomizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread_count(mut self, count: usize) -> Result<Self, ValidationError> {
        ValidationContext::new("customizer_config")
            .with_attribute("thread_count", count.to_string())
            .check(count > 0, "thread_count must be nonzero")?;
        self.thread_count = Some(count);
        Ok(self)
    }

    pub fn with_heap_backing(mut self, backing: HeapBacking) -> Self {
        self.heap_backing = backing;
        self
    }

    pub fn with_allowed_nodes(mut self, allowed: AllowedNodes) -> Self {
        self.allowed_nodes = Some(allowed);
        self
    }

    /// Load a config from a TOML file. `allowed_nodes` is never persisted
    /// this way (it is sized to a specific graph instance); load it
    /// separately and attach it with `with_allowed_nodes`.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        if let Some(count) = config.thread_count {
            ValidationContext::new("customizer_config")
                .with_attribute("thread_count", count.to_string())
                .check(count > 0, "thread_count must be nonzero")?;
        }
        Ok(config)
    }
}
