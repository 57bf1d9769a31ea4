// Validated primitive types for the MLP/CRP core.
// Every externally-facing numeric id or cost is wrapped in a newtype that
// enforces its range and sentinel at construction, so "is this id valid" is
// answered once, at the boundary, instead of re-checked at every call site.

use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

type Result<T> = std::result::Result<T, ValidationError>;

/// Upper bound on the number of levels a partition may have. Chosen to match
/// the "Σ bits ≤ 64, single machine word" common case this core targets; a
/// hierarchy deeper than this should split its packed word (see `partition`),
/// which this crate does not implement since no corpus graph needs it.
pub const MAX_LEVELS: u8 = 8;

macro_rules! dense_index_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Reserved sentinel meaning "no such id".
            pub const INVALID: $name = $name(u32::MAX);

            /// Construct from a raw index, rejecting the reserved sentinel value.
            pub fn new(raw: u32) -> Result<Self> {
                if raw == u32::MAX {
                    return Err(ValidationError::InvalidInput {
                        field: stringify!($name).to_string(),
                        reason: "raw value collides with the reserved INVALID sentinel"
                            .to_string(),
                    });
                }
                Ok(Self(raw))
            }

            /// Construct without validation. Used internally when the value is
            /// already known to be in range (e.g. loop counters bounded by a
            /// validated count).
            pub const fn new_unchecked(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn invalid() -> Self {
                Self::INVALID
            }

            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            pub const fn get(self) -> u32 {
                self.0
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}", self.0)
                } else {
                    write!(f, "{}(INVALID)", stringify!($name))
                }
            }
        }

        impl From<$name> for usize {
            fn from(id: $name) -> usize {
                id.index()
            }
        }
    };
}

dense_index_newtype!(NodeID, "Dense index over graph nodes.");
dense_index_newtype!(EdgeID, "Dense index over graph edges.");
dense_index_newtype!(CellID, "Cell index within a single level.");

/// 1..=MAX_LEVELS, with 0 reserved for the (synthetic) base graph level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LevelID(u8);

impl LevelID {
    pub const BASE: LevelID = LevelID(0);

    pub fn new(raw: u8) -> Result<Self> {
        if raw > MAX_LEVELS {
            return Err(ValidationError::InvalidInput {
                field: "LevelID".to_string(),
                reason: format!("level {raw} exceeds MAX_LEVELS ({MAX_LEVELS})"),
            });
        }
        Ok(Self(raw))
    }

    pub const fn new_unchecked(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_base(self) -> bool {
        self.0 == 0
    }

    pub fn parent(self) -> LevelID {
        LevelID(self.0 + 1)
    }

    pub fn child(self) -> Option<LevelID> {
        self.0.checked_sub(1).map(LevelID)
    }
}

impl fmt::Display for LevelID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Additive edge cost. Reserves `INFINITY` for "unreachable" / "no edge".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeWeight(i64);

impl EdgeWeight {
    pub const INFINITY: EdgeWeight = EdgeWeight(i64::MAX);
    pub const ZERO: EdgeWeight = EdgeWeight(0);

    pub fn new(raw: i64) -> Result<Self> {
        if raw == i64::MAX {
            return Err(ValidationError::InvalidInput {
                field: "EdgeWeight".to_string(),
                reason: "raw value collides with the reserved INFINITY sentinel".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub const fn new_unchecked(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn is_finite(self) -> bool {
        self.0 != i64::MAX
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Saturating add: overflow (including adding to INFINITY) collapses to
    /// INFINITY rather than panicking or wrapping. This is the "arithmetic
    /// overflow is not an edge that relaxes" rule from the customizer.
    pub fn checked_add(self, other: EdgeWeight) -> EdgeWeight {
        if !self.is_finite() || !other.is_finite() {
            return Self::INFINITY;
        }
        match self.0.checked_add(other.0) {
            Some(sum) if sum != i64::MAX => EdgeWeight(sum),
            _ => Self::INFINITY,
        }
    }
}

impl fmt::Display for EdgeWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_finite() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "INFINITY")
        }
    }
}

/// Additive travel time, same width policy as EdgeWeight but reserves `MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeDuration(u32);

impl EdgeDuration {
    pub const MAX: EdgeDuration = EdgeDuration(u32::MAX);
    pub const ZERO: EdgeDuration = EdgeDuration(0);

    pub fn new(raw: u32) -> Result<Self> {
        if raw == u32::MAX {
            return Err(ValidationError::InvalidInput {
                field: "EdgeDuration".to_string(),
                reason: "raw value collides with the reserved MAX sentinel".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub const fn new_unchecked(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn is_finite(self) -> bool {
        self.0 != u32::MAX
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn checked_add(self, other: EdgeDuration) -> EdgeDuration {
        if !self.is_finite() || !other.is_finite() {
            return Self::MAX;
        }
        match self.0.checked_add(other.0) {
            Some(sum) if sum != u32::MAX => EdgeDuration(sum),
            _ => Self::MAX,
        }
    }
}

impl fmt::Display for EdgeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_finite() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "MAX")
        }
    }
}

/// Additive distance in meters. Floating point, so ordering is via
/// `f64::total_cmp` rather than the derived `PartialOrd`/`Ord` (which would
/// be unsound to derive over a bare `f64` field).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgeDistance(f64);

impl EdgeDistance {
    pub const INVALID: EdgeDistance = EdgeDistance(f64::MAX);
    pub const ZERO: EdgeDistance = EdgeDistance(0.0);

    pub fn new(raw: f64) -> Result<Self> {
        if !raw.is_finite() {
            return Err(ValidationError::InvalidInput {
                field: "EdgeDistance".to_string(),
                reason: "distance must be finite".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub const fn new_unchecked(raw: f64) -> Self {
        Self(raw)
    }

    pub fn is_valid(self) -> bool {
        self.0 != f64::MAX
    }

    pub const fn get(self) -> f64 {
        self.0
    }

    pub fn checked_add(self, other: EdgeDistance) -> EdgeDistance {
        if !self.is_valid() || !other.is_valid() {
            return Self::INVALID;
        }
        let sum = self.0 + other.0;
        if sum.is_finite() {
            EdgeDistance(sum)
        } else {
            Self::INVALID
        }
    }
}

impl PartialEq for EdgeDistance {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}
impl Eq for EdgeDistance {}
impl PartialOrd for EdgeDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for EdgeDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for EdgeDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{:.3}", self.0)
        } else {
            write!(f, "INVALID")
        }
    }
}

/// The `(weight, duration, distance)` triple the customizer compares
/// lexicographically when deciding whether to decrease-key a heap entry.
/// Mirrors `std::tie(weight, duration, distance)` in the original algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    pub weight: EdgeWeight,
    pub duration: EdgeDuration,
    pub distance: EdgeDistance,
}

impl Cost {
    pub const INFINITE: Cost = Cost {
        weight: EdgeWeight::INFINITY,
        duration: EdgeDuration::MAX,
        distance: EdgeDistance::INVALID,
    };

    pub const ZERO: Cost = Cost {
        weight: EdgeWeight::ZERO,
        duration: EdgeDuration::ZERO,
        distance: EdgeDistance::ZERO,
    };

    pub fn checked_add(self, edge: Cost) -> Cost {
        Cost {
            weight: self.weight.checked_add(edge.weight),
            duration: self.duration.checked_add(edge.duration),
            distance: self.distance.checked_add(edge.distance),
        }
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.weight, self.duration, self.distance).cmp(&(
            other.weight,
            other.duration,
            other.distance,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_rejects_sentinel() {
        assert!(NodeID::new(u32::MAX).is_err());
        assert!(NodeID::new(0).is_ok());
        assert!(!NodeID::INVALID.is_valid());
    }

    #[test]
    fn level_id_rejects_out_of_range() {
        assert!(LevelID::new(MAX_LEVELS).is_ok());
        assert!(LevelID::new(MAX_LEVELS + 1).is_err());
        assert!(LevelID::new(0).unwrap().is_base());
    }

    #[test]
    fn edge_weight_overflow_collapses_to_infinity() {
        let a = EdgeWeight::new(i64::MAX - 1).unwrap();
        let b = EdgeWeight::new(10).unwrap();
        assert_eq!(a.checked_add(b), EdgeWeight::INFINITY);
        assert_eq!(EdgeWeight::INFINITY.checked_add(EdgeWeight::ZERO), EdgeWeight::INFINITY);
    }

    #[test]
    fn cost_lexicographic_order_prefers_weight_first() {
        let cheaper_but_slower = Cost {
            weight: EdgeWeight::new(1).unwrap(),
            duration: EdgeDuration::new(100).unwrap(),
            distance: EdgeDistance::new(0.0).unwrap(),
        };
        let pricier_but_faster = Cost {
            weight: EdgeWeight::new(2).unwrap(),
            duration: EdgeDuration::new(1).unwrap(),
            distance: EdgeDistance::new(0.0).unwrap(),
        };
        assert!(cheaper_but_slower < pricier_but_faster);
    }

    #[test]
    fn cost_infinite_is_the_top_element() {
        let finite = Cost {
            weight: EdgeWeight::new(1_000_000).unwrap(),
            duration: EdgeDuration::MAX,
            distance: EdgeDistance::INVALID,
        };
        assert!(finite < Cost::INFINITE);
    }
}
