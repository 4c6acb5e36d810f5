//! Analysis reports handed to downstream consumers

use std::time::Duration;
use trellis_core::Diagnostic;

/// Summary of one analysis pass (full, warm, or incremental). The graph
/// itself is read through `Engine::snapshot`; the report carries the
/// bookkeeping collaborators need to decide whether to warn the user.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Files parsed (or re-parsed) by this pass.
    pub files_analyzed: usize,
    /// Files whose references were re-resolved without a reparse.
    pub files_reresolved: usize,
    /// Entity total after the pass.
    pub entities: usize,
    /// Edge total after the pass.
    pub edges: usize,
    /// Every live per-file diagnostic, sorted by file.
    pub diagnostics: Vec<Diagnostic>,
    pub duration: Duration,
}
