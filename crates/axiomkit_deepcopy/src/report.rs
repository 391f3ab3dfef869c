//! Deep-copy report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters for one deep-copy invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportDeepCopy {
    /// Nodes dispatched by the engine.
    pub cnt_visited: u64,
    /// New storage cells allocated for references.
    pub cnt_refs_allocated: u64,
    /// References resolved to an already created copy (sharing or cycles).
    pub cnt_refs_shared: u64,
    /// Self-copy hook invocations.
    pub cnt_hooks: u64,
    /// Unsupported values replaced by their zero value.
    pub cnt_zeroed: u64,
    /// Non-exported record members left at their zero value.
    pub cnt_fields_omitted: u64,
}

impl ReportDeepCopy {
    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_visited".to_string(), self.cnt_visited);
        dict_counts.insert("cnt_refs_allocated".to_string(), self.cnt_refs_allocated);
        dict_counts.insert("cnt_refs_shared".to_string(), self.cnt_refs_shared);
        dict_counts.insert("cnt_hooks".to_string(), self.cnt_hooks);
        dict_counts.insert("cnt_zeroed".to_string(), self.cnt_zeroed);
        dict_counts.insert("cnt_fields_omitted".to_string(), self.cnt_fields_omitted);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} visited={} refs_allocated={} refs_shared={} hooks={} zeroed={} fields_omitted={}",
            self.cnt_visited,
            self.cnt_refs_allocated,
            self.cnt_refs_shared,
            self.cnt_hooks,
            self.cnt_zeroed,
            self.cnt_fields_omitted
        )
    }
}

impl fmt::Display for ReportDeepCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[DEEPCOPY]"))
    }
}

/// Mutable accumulator used while one invocation runs.
#[derive(Debug, Default, Clone)]
pub struct ReportDeepCopyBuilder {
    report: ReportDeepCopy,
}

impl ReportDeepCopyBuilder {
    pub fn add_visited(&mut self) {
        self.report.cnt_visited += 1;
    }

    pub fn add_ref_allocated(&mut self) {
        self.report.cnt_refs_allocated += 1;
    }

    pub fn add_ref_shared(&mut self) {
        self.report.cnt_refs_shared += 1;
    }

    pub fn add_hook(&mut self) {
        self.report.cnt_hooks += 1;
    }

    pub fn add_zeroed(&mut self) {
        self.report.cnt_zeroed += 1;
    }

    pub fn add_field_omitted(&mut self) {
        self.report.cnt_fields_omitted += 1;
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportDeepCopy {
        self.report
    }
}
