//! Error types for binary model dump and load.

use thiserror::Error;

use rein_core::{CoreError, OpKind};

use crate::version::FormatVersion;

/// Result type for format operations.
pub type Result<T> = std::result::Result<T, FormatError>;

/// Errors produced while dumping or loading a binary model.
///
/// These replace the legacy log-plus-sentinel returns with typed results;
/// observable behavior on valid input is unchanged.
///
/// Fatal configuration problems (pointer width, location overflow, unknown
/// operator codes) abort the operation; a corrupt blob is never emitted and
/// a corrupt model is never silently accepted.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The platform's pointer width does not match the 64-bit offset format.
    #[error("pointer width {width} bits does not match the 64-bit offset format")]
    PointerWidth {
        /// Pointer width of the running platform, in bits.
        width: usize,
    },

    /// A read ran past the end of a block.
    #[error("truncated block: needed {need} bytes at offset {at}, only {have} available")]
    Truncated {
        /// Offset the read started at.
        at: usize,
        /// Bytes the read required.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// A stored block-relative offset points outside its block.
    #[error("bad block-relative offset {offset}")]
    BadOffset {
        /// The offending offset value.
        offset: i64,
    },

    /// A stored string is unterminated or not UTF-8.
    #[error("string at offset {at} is unterminated or not valid UTF-8")]
    BadString {
        /// Block-relative offset of the string.
        at: usize,
    },

    /// A graph exceeds the location-code field widths.
    #[error("location code overflow: layer {layer} (max 65535) slot {slot} (max 255)")]
    LocationOverflow {
        /// Layer index that did not fit.
        layer: usize,
        /// Slot index that did not fit.
        slot: usize,
    },

    /// A location code references a layer or slot not yet loaded.
    #[error("location code {code:#018x} cannot be resolved while loading layer {layer}")]
    UnresolvedLocation {
        /// The raw encoded code.
        code: u64,
        /// Index of the layer being loaded.
        layer: usize,
    },

    /// The model names an operator this build does not know.
    #[error("unknown operator code {code} in model")]
    UnknownOp {
        /// The stored operator discriminant.
        code: i32,
    },

    /// A stored enum code has no in-memory counterpart.
    #[error("unknown {what} code {code} in model")]
    UnknownEnum {
        /// Which enumeration was being decoded.
        what: &'static str,
        /// The stored code.
        code: u32,
    },

    /// An operator carries parameters of the wrong shape for its kind.
    #[error("operator '{name}' of kind {kind:?} has parameters of the wrong shape")]
    ParamsShape {
        /// Operator instance name.
        name: String,
        /// The operator kind.
        kind: OpKind,
    },

    /// The model violates a structural rule not covered by a variant above.
    #[error("malformed model: {0}")]
    Malformed(String),

    /// The buffer does not start with the REIN container header.
    #[error("model header is not a REIN binary model")]
    BadHeader,

    /// The container predates the oldest supported format revision.
    #[error("model version {found} is below the oldest supported {min}")]
    UnsupportedVersion {
        /// Version parsed from the header.
        found: FormatVersion,
        /// Oldest version this build accepts.
        min: FormatVersion,
    },

    /// A core object-model invariant failed during dump.
    #[error(transparent)]
    Core(#[from] CoreError),
}
