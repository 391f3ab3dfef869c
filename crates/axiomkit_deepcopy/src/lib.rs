//! `axiomkit_deepcopy` v1:
//! Rust-side deep-copy engine for typed, possibly cyclic value graphs.
//!
//! Architecture mirrors the `axiomkit_io_fs` layout:
//! - `copy`    : dispatch spine, per-kind copiers and entry points
//! - `spec`    : enums/options/errors
//! - `value`   : typed value model and kind classifier
//! - `hook`    : self-copy capability surface
//! - `tracker` : identity tracking for shared and cyclic references
//! - `report`  : per-invocation report model
//! - `util`    : shared helper functions

pub mod copy;
pub mod hook;
pub mod report;
pub mod spec;
pub mod tracker;
mod util;
pub mod value;

pub use copy::{copy, copy_skip_unsupported, deep_copy, must_copy};
pub use hook::{DeepCopier, FnCopier, ForeignObject, SpecCopierRegistry};
pub use report::{ReportDeepCopy, ReportDeepCopyBuilder};
pub use spec::{
    DeepCopyError, DeepCopyResult, EnumOpaqueClass, EnumUnsupportedStrategy, EnumValueKind,
    SpecDeepCopyOptions,
};
pub use tracker::{IdentityTracker, SpecIdentityKey};
pub use value::{
    MapKey, SpecForeignKey, SpecOpaque, SpecRecord, SpecRecordField, SpecRef, SpecTypeName, Value,
};
