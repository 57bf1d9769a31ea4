// Structured error types for the MLP/CRP core.
// Call sites wrap these in anyhow::Result with .context() for operation narrative;
// the variants themselves carry the structured detail a caller might match on.

use crate::validation::ValidationError;

/// Errors the core can raise. Every non-arithmetic variant is fatal to the
/// operation that raised it; see the module docs on `customizer` for the one
/// exception (`ArithmeticOverflow` during edge relaxation degrades to the
/// INFINITY sentinel instead of aborting).
#[derive(Debug, thiserror::Error)]
pub enum MlcrpError {
    /// A structural invariant of the partition or graph was violated: nesting
    /// broken, degree overflow, or a level index that does not match its
    /// endpoints' `highestDifferentLevel`.
    #[error("structural invariant violated: {detail}")]
    StructuralInvariant { detail: String },

    /// On-disk (or mmap'd) data failed a compatibility check: canary
    /// mismatch, element-size mismatch, or checksum mismatch.
    #[error("incompatible data in block `{block}`: {detail}")]
    IncompatibleData { block: String, detail: String },

    /// Weight/duration/distance addition would overflow the representable
    /// range. Raised only where overflow cannot be locally absorbed into the
    /// INFINITY sentinel (e.g. while packing partition bit widths).
    #[error("arithmetic overflow: {detail}")]
    ArithmeticOverflow { detail: String },

    /// Caller passed an out-of-range (level, cell), node id, or edge id.
    #[error("out of range: {detail}")]
    OutOfRange { detail: String },

    /// A value failed newtype/config validation before ever reaching a
    /// structural check.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, MlcrpError>;
