//! Deep-copy option models, kind enums and top-level error types.

use std::fmt;

use thiserror::Error;

use crate::hook::SpecCopierRegistry;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Shape category used to select a copy algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValueKind {
    /// Bool, number or text. Copied by value.
    Scalar,
    /// Array-like sequence with a static length.
    FixedSequence,
    /// Resizable list-like sequence.
    DynamicSequence,
    /// Key/value mapping.
    Mapping,
    /// Pointer-like reference to shared storage.
    Reference,
    /// Interface/"any"-like wrapper around a concrete value.
    DynamicWrapper,
    /// Struct-like record (timestamps included).
    AggregateRecord,
    /// Functions, channels, raw pointers and unrecognized foreign shapes.
    Opaque,
}

impl fmt::Display for EnumValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_name = match self {
            Self::Scalar => "scalar",
            Self::FixedSequence => "fixed_sequence",
            Self::DynamicSequence => "dynamic_sequence",
            Self::Mapping => "mapping",
            Self::Reference => "reference",
            Self::DynamicWrapper => "dynamic_wrapper",
            Self::AggregateRecord => "aggregate_record",
            Self::Opaque => "opaque",
        };
        f.write_str(c_name)
    }
}

/// Policy for non-absent opaque values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumUnsupportedStrategy {
    /// Fail the whole invocation with [`DeepCopyError::UnsupportedType`].
    #[default]
    Error,
    /// Replace the node with the zero value of its type and continue.
    Zero,
}

/// Sub-category of an opaque value, used for type naming and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumOpaqueClass {
    /// Executable code value.
    Func,
    /// Communication-channel handle.
    Chan,
    /// Raw-memory handle.
    RawPointer,
    /// Any other host object the engine does not know how to traverse.
    Foreign,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for [`crate::deep_copy`].
#[derive(Debug, Clone, Default)]
pub struct SpecDeepCopyOptions {
    /// Behavior when a non-absent opaque value is reached.
    pub rule_unsupported: EnumUnsupportedStrategy,
    /// Optional maximum structural depth (root is depth 0).
    pub depth_limit: Option<usize>,
    /// Self-copy hooks keyed by static type name.
    pub copiers: SpecCopierRegistry,
}

impl SpecDeepCopyOptions {
    /// Strict options: unsupported values fail the call.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Lenient options: unsupported values are zeroed.
    pub fn lenient() -> Self {
        Self {
            rule_unsupported: EnumUnsupportedStrategy::Zero,
            ..Self::default()
        }
    }
}

/// Failure of one deep-copy invocation. No partial copy accompanies it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeepCopyError {
    /// A non-absent opaque value was reached under the strict policy.
    #[error("unsupported non-nil value for type: {type_name} at {path}")]
    UnsupportedType {
        /// Static type name of the offending value.
        type_name: String,
        /// Location inside the input graph.
        path: String,
    },
    /// Invalid `depth_limit` option.
    #[error("{0}")]
    InvalidDepthLimit(String),
    /// The input graph is deeper than the configured `depth_limit`.
    #[error("depth limit {depth_limit} exceeded at {path}")]
    DepthLimitExceeded {
        /// Configured limit.
        depth_limit: usize,
        /// Location of the first node past the limit.
        path: String,
    },
    /// A referenced storage cell is mutably borrowed and cannot be read.
    #[error("referenced storage of type {type_name} is mutably borrowed at {path}")]
    ReferenceBusy {
        /// Static type name of the reference.
        type_name: String,
        /// Location inside the input graph.
        path: String,
    },
}

/// Result alias used across the crate.
pub type DeepCopyResult<T> = Result<T, DeepCopyError>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
