// QueryHeap: a 4-ary min-heap of `(key=Cost, value=NodeID)` with pluggable
// node-id -> slot-index storage. On the hot path of every cell customization
// (and, per the design notes, of query-time search as well, though that
// algorithm lives outside this crate). See `config::HeapBacking` for the
// index-storage tradeoffs this module implements.

use crate::types::{Cost, NodeID};
use std::collections::HashMap;

const ARITY: usize = 4;

/// Sentinel slot-index value meaning "never inserted".
const NONE_SLOT: u32 = u32::MAX;

/// Sentinel slot-index value meaning "inserted, then settled via
/// `delete_min`". Kept distinct from `NONE_SLOT` so `was_removed` can tell
/// a settled node from one the heap has never seen.
const REMOVED_SLOT: u32 = u32::MAX - 1;

/// One entry in the d-ary heap array.
#[derive(Debug, Clone)]
struct HeapEntry<D> {
    node: NodeID,
    key: Cost,
    data: D,
}

/// Pluggable node-id -> heap-slot-index backing. Each variant trades off
/// lookup cost against memory, matching `config::HeapBacking`.
enum IndexStore {
    /// O(1) lookup, O(N) memory. The customizer's default.
    Array(Vec<u32>),
    /// Sparse; good when a search only ever touches a handful of nodes.
    UnorderedMap(HashMap<u32, u32>),
    /// Sparse with deterministic iteration order (not exercised by lookup,
    /// but by anything that walks the backing store directly).
    Map(std::collections::BTreeMap<u32, u32>),
    /// Dense array for nodes `< border_bound`, sparse map beyond.
    TwoLevel {
        dense: Vec<u32>,
        border_bound: u32,
        sparse: HashMap<u32, u32>,
    },
    /// Array backing with a generation counter per slot so `clear()` is O(1)
    /// amortized: a slot is "live" only if its stored generation matches the
    /// heap's current generation.
    Generation {
        slots: Vec<u32>,
        generations: Vec<u16>,
        current_generation: u16,
    },
}

impl IndexStore {
    fn new(backing: crate::config::HeapBacking, capacity: usize) -> Self {
        use crate::config::HeapBacking as HB;
        match backing {
            HB::Array => IndexStore::Array(vec![NONE_SLOT; capacity]),
            HB::UnorderedMap => IndexStore::UnorderedMap(HashMap::new()),
            HB::Map => IndexStore::Map(std::collections::BTreeMap::new()),
            HB::TwoLevel => IndexStore::TwoLevel {
                dense: vec![NONE_SLOT; capacity],
                border_bound: capacity as u32,
                sparse: HashMap::new(),
            },
            HB::Generation => IndexStore::Generation {
                slots: vec![NONE_SLOT; capacity],
                generations: vec![0; capacity],
                current_generation: 1,
            },
        }
    }

    /// Raw stored slot value for `node`, or `NONE_SLOT` if the backing has
    /// never recorded one (including nodes from a prior `clear()` epoch).
    /// Unlike `get`, this does not hide `REMOVED_SLOT`.
    fn raw(&self, node: NodeID) -> u32 {
        let raw = node.get();
        match self {
            IndexStore::Array(v) => v.get(raw as usize).copied().unwrap_or(NONE_SLOT),
            IndexStore::UnorderedMap(m) => m.get(&raw).copied().unwrap_or(NONE_SLOT),
            IndexStore::Map(m) => m.get(&raw).copied().unwrap_or(NONE_SLOT),
            IndexStore::TwoLevel { dense, border_bound, sparse } => {
                if raw < *border_bound {
                    dense.get(raw as usize).copied().unwrap_or(NONE_SLOT)
                } else {
                    sparse.get(&raw).copied().unwrap_or(NONE_SLOT)
                }
            }
            IndexStore::Generation { slots, generations, current_generation } => {
                let idx = raw as usize;
                if generations.get(idx).copied() == Some(*current_generation) {
                    slots.get(idx).copied().unwrap_or(NONE_SLOT)
                } else {
                    NONE_SLOT
                }
            }
        }
    }

    /// Live heap-array index for `node`, or `None` if it was never inserted
    /// or has since been removed.
    fn get(&self, node: NodeID) -> Option<u32> {
        match self.raw(node) {
            NONE_SLOT | REMOVED_SLOT => None,
            slot => Some(slot),
        }
    }

    /// Whether `node` was inserted at some point and has since been removed
    /// via `delete_min`, as opposed to never having been touched at all.
    fn is_removed(&self, node: NodeID) -> bool {
        self.raw(node) == REMOVED_SLOT
    }

    fn set(&mut self, node: NodeID, slot: u32) {
        let raw = node.get();
        match self {
            IndexStore::Array(v) => v[raw as usize] = slot,
            IndexStore::UnorderedMap(m) => {
                m.insert(raw, slot);
            }
            IndexStore::Map(m) => {
                m.insert(raw, slot);
            }
            IndexStore::TwoLevel { dense, border_bound, sparse } => {
                if raw < *border_bound {
                    dense[raw as usize] = slot;
                } else {
                    sparse.insert(raw, slot);
                }
            }
            IndexStore::Generation { slots, generations, current_generation } => {
                let idx = raw as usize;
                slots[idx] = slot;
                generations[idx] = *current_generation;
            }
        }
    }

    fn clear(&mut self) {
        match self {
            IndexStore::Array(v) => v.iter_mut().for_each(|s| *s = NONE_SLOT),
            IndexStore::UnorderedMap(m) => m.clear(),
            IndexStore::Map(m) => m.clear(),
            IndexStore::TwoLevel { dense, sparse, .. } => {
                dense.iter_mut().for_each(|s| *s = NONE_SLOT);
                sparse.clear();
            }
            IndexStore::Generation { current_generation, .. } => {
                // Overflow every 2^16 calls; wrapping keeps `clear` O(1)
                // amortized at the cost of a once-per-wraparound false
                // "still live" hit, which a fresh heap never observes because
                // every slot's generation is reset at construction to 1 and
                // compared for exact equality, not staleness.
                *current_generation = current_generation.wrapping_add(1);
                if *current_generation == 0 {
                    *current_generation = 1;
                }
            }
        }
    }
}

/// A 4-ary mutable min-heap of `(key, NodeID)` pairs with an O(1) node ->
/// slot-index lookup and a typed, per-node auxiliary "heap data" payload.
pub struct QueryHeap<D> {
    heap: Vec<HeapEntry<D>>,
    index: IndexStore,
}

impl<D: Clone> QueryHeap<D> {
    /// Construct a heap sized for `capacity` distinct node ids using the
    /// given index-storage strategy (see `config::HeapBacking`).
    pub fn new(capacity: usize, backing: crate::config::HeapBacking) -> Self {
        Self {
            heap: Vec::with_capacity(capacity.min(1024)),
            index: IndexStore::new(backing, capacity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether `node` currently occupies a live heap slot (inserted and not
    /// yet removed by `delete_min`).
    pub fn was_inserted(&self, node: NodeID) -> bool {
        self.index.get(node).is_some()
    }

    /// Whether `node` was inserted and has since been settled (removed via
    /// `delete_min`). False both for nodes never inserted and for nodes
    /// currently live in the heap; detected by a sentinel slot value
    /// distinct from the "never inserted" one, not by negating
    /// `was_inserted`.
    pub fn was_removed(&self, node: NodeID) -> bool {
        self.index.is_removed(node)
    }

    pub fn get_key(&self, node: NodeID) -> Option<Cost> {
        self.index.get(node).map(|slot| self.heap[slot as usize].key)
    }

    pub fn get_data(&self, node: NodeID) -> Option<&D> {
        self.index.get(node).map(|slot| &self.heap[slot as usize].data)
    }

    /// Insert a new node. If `node` is already live in the heap, this is
    /// equivalent to `decrease_key`, overwriting its data only when the key
    /// strictly improves (matching the customizer's tie-break rule).
    ///
    /// Does not itself guard against a settled node: calling this on a node
    /// for which `was_removed` is true re-inserts it as fresh, which is
    /// incorrect once a node's cost has been finalized by `delete_min`.
    /// Callers must check `was_removed` themselves before relaxing an edge,
    /// matching the usual restricted-Dijkstra relaxation guard.
    pub fn insert(&mut self, node: NodeID, key: Cost, data: D) {
        if let Some(slot) = self.index.get(node) {
            if key < self.heap[slot as usize].key {
                self.heap[slot as usize].key = key;
                self.heap[slot as usize].data = data;
                self.sift_up(slot as usize);
            }
            return;
        }
        let slot = self.heap.len() as u32;
        self.heap.push(HeapEntry { node, key, data });
        self.index.set(node, slot);
        self.sift_up(slot as usize);
    }

    /// Decrease `node`'s key and overwrite its data. No-op (besides the data
    /// overwrite never happening) if `node` is absent or the new key does
    /// not strictly improve on the current one.
    pub fn decrease_key(&mut self, node: NodeID, key: Cost, data: D) -> bool {
        let Some(slot) = self.index.get(node) else {
            return false;
        };
        let slot = slot as usize;
        if key < self.heap[slot].key {
            self.heap[slot].key = key;
            self.heap[slot].data = data;
            self.sift_up(slot);
            true
        } else {
            false
        }
    }

    pub fn min(&self) -> Option<(NodeID, Cost)> {
        self.heap.first().map(|e| (e.node, e.key))
    }

    /// Remove and return the minimum-key entry.
    pub fn delete_min(&mut self) -> Option<(NodeID, Cost, D)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let HeapEntry { node, key, data } = self.heap.pop().expect("heap nonempty");
        self.index.set(node, REMOVED_SLOT);
        if !self.heap.is_empty() {
            self.index.set(self.heap[0].node, 0);
            self.sift_down(0);
        }
        Some((node, key, data))
    }

    /// Reset for reuse on the next cell. With `HeapBacking::Generation` this
    /// is O(1) amortized; other backings pay O(capacity) or O(touched).
    pub fn clear(&mut self) {
        self.heap.clear();
        self.index.clear();
    }

    fn parent(i: usize) -> usize {
        (i - 1) / ARITY
    }

    fn first_child(i: usize) -> usize {
        i * ARITY + 1
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let p = Self::parent(i);
            if self.heap[i].key < self.heap[p].key {
                self.swap_slots(i, p);
                i = p;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let first = Self::first_child(i);
            if first >= self.heap.len() {
                break;
            }
            let last_child = (first + ARITY).min(self.heap.len());
            let mut smallest = first;
            for c in (first + 1)..last_child {
                if self.heap[c].key < self.heap[smallest].key {
                    smallest = c;
                }
            }
            if self.heap[smallest].key < self.heap[i].key {
                self.swap_slots(i, smallest);
                i = smallest;
            } else {
                break;
            }
        }
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.index.set(self.heap[a].node, a as u32);
        self.index.set(self.heap[b].node, b as u32);
    }
}
