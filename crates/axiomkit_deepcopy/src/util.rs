use crate::spec::{DeepCopyError, DeepCopyResult};
use crate::value::{MapKey, SpecTypeName};

////////////////////////////////////////////////////////////////////////////////
// #region OptionValidation

pub(crate) fn validate_depth_limit(depth_limit: Option<usize>) -> DeepCopyResult<()> {
    if depth_limit == Some(0) {
        return Err(DeepCopyError::InvalidDepthLimit(
            "Arg `depth_limit` must be >= 1 or None.".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn is_depth_within_limit(n_depth: usize, depth_limit: Option<usize>) -> bool {
    depth_limit.is_none_or(|n_limit| n_depth <= n_limit)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FaultPath

/// One step from a parent node to a child node.
#[derive(Debug, Clone)]
pub(crate) enum SpecPathSegment {
    Field(String),
    Index(usize),
    Key(MapKey),
    Deref,
    Unwrap(String),
}

#[derive(Debug, Clone)]
pub(crate) enum EnumFaultKind {
    Unsupported { type_name: String },
    DepthLimit { depth_limit: usize },
    ReferenceBusy { type_name: String },
}

/// Failure raised deep inside the traversal.
///
/// Segments are appended innermost-first while the error unwinds, so the
/// location is only assembled on the failure path.
#[derive(Debug, Clone)]
pub(crate) struct SpecCopyFault {
    kind: EnumFaultKind,
    l_segments_rev: Vec<SpecPathSegment>,
}

impl SpecCopyFault {
    pub(crate) fn new(kind: EnumFaultKind) -> Self {
        Self {
            kind,
            l_segments_rev: Vec::new(),
        }
    }

    pub(crate) fn unsupported(type_name: String) -> Self {
        Self::new(EnumFaultKind::Unsupported { type_name })
    }

    pub(crate) fn depth_limit(depth_limit: usize) -> Self {
        Self::new(EnumFaultKind::DepthLimit { depth_limit })
    }

    pub(crate) fn reference_busy(elem: &SpecTypeName) -> Self {
        Self::new(EnumFaultKind::ReferenceBusy {
            type_name: format!("*{elem}"),
        })
    }

    /// Prefix the fault location with the step that led to it.
    pub(crate) fn within(mut self, segment: SpecPathSegment) -> Self {
        self.l_segments_rev.push(segment);
        self
    }

    pub(crate) fn path(&self) -> String {
        let mut c_path = String::from("$");
        for segment in self.l_segments_rev.iter().rev() {
            match segment {
                SpecPathSegment::Field(name) => {
                    c_path.push('.');
                    c_path.push_str(name);
                }
                SpecPathSegment::Index(n_idx) => c_path.push_str(&format!("[{n_idx}]")),
                SpecPathSegment::Key(key) => c_path.push_str(&format!("[{key}]")),
                SpecPathSegment::Deref => c_path.push_str(".*"),
                SpecPathSegment::Unwrap(ty) => c_path.push_str(&format!(".({ty})")),
            }
        }
        c_path
    }

    pub(crate) fn into_error(self) -> DeepCopyError {
        let path = self.path();
        match self.kind {
            EnumFaultKind::Unsupported { type_name } => {
                DeepCopyError::UnsupportedType { type_name, path }
            }
            EnumFaultKind::DepthLimit { depth_limit } => {
                DeepCopyError::DepthLimitExceeded { depth_limit, path }
            }
            EnumFaultKind::ReferenceBusy { type_name } => {
                DeepCopyError::ReferenceBusy { type_name, path }
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
