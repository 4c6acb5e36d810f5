//! Incremental updater
//!
//! Per-file lifecycle: unanalyzed → parsed → stale → parsed again, with
//! corrupted/unsupported terminal per revision — the file is not retried
//! until its fingerprint changes. Unchanged files are never reparsed; update
//! cost tracks the changed-file closure, not repository size.

use crate::engine::Engine;
use crate::report::AnalysisReport;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use trellis_analyzer::trigger_names;
use trellis_core::DiagnosticKind;
use trellis_scanner::{FileManifest, ManifestDelta};

impl Engine {
    /// Reconcile a set of changed files (created, modified, deleted) into
    /// the graph.
    ///
    /// For each changed file: retract what it previously declared, re-run
    /// the analyzer, insert the fresh batch, then re-resolve every file
    /// whose references could now point somewhere new — an `External` edge
    /// may resolve, a resolved edge may newly dangle.
    pub fn apply_delta(&mut self, delta: &ManifestDelta, manifest: &FileManifest) -> AnalysisReport {
        let started = Instant::now();
        if delta.is_empty() {
            self.publish_snapshot();
            return self.report(0, 0, started);
        }

        // Names whose meaning may have shifted: everything the changed
        // files declared before the change...
        let mut triggers: HashSet<String> = HashSet::new();
        for path in delta.touched() {
            self.retract_file(&path, &mut triggers);
        }

        // ...plus everything they declare after it.
        let mut fresh: Vec<PathBuf> = delta.created.clone();
        fresh.extend(delta.modified.iter().cloned());
        let analyzed = self.analyze_paths(manifest, Some(&fresh));
        for path in &fresh {
            triggers.extend(self.symbols().names_in_file(path));
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                triggers.insert(stem.to_string());
            }
        }

        // Affected set: the re-analyzed files themselves plus every file
        // whose references mention a trigger name.
        let fresh_set: HashSet<&PathBuf> = fresh.iter().collect();
        let mut affected: HashSet<PathBuf> = fresh.iter().cloned().collect();
        for name in &triggers {
            if let Some(files) = self.ref_index.get(name) {
                affected.extend(files.iter().cloned());
            }
        }
        for path in &delta.deleted {
            affected.remove(path);
        }

        // Strip the affected files' old dependency edges (containment
        // stays), clear their stale resolution diagnostics, resolve anew.
        let affected: Vec<PathBuf> = affected.into_iter().collect();
        for path in &affected {
            if let Some(entities) = self.records.get(path).map(|r| r.entities.clone()) {
                for id in entities {
                    self.graph_mut().remove_reference_edges(id);
                }
            }
            if let Some(diagnostics) = self.file_diagnostics.get_mut(path) {
                diagnostics.retain(|d| d.kind != DiagnosticKind::UnresolvedReference);
            }
        }
        self.resolve_files(&affected);

        // Retraction can orphan external placeholders and empty out
        // directories; prune both so the result matches a from-scratch
        // analysis of the final file set.
        self.graph_mut().prune_dangling_externals();
        self.graph_mut().prune_empty_directories();
        self.publish_snapshot();

        let reresolved = affected
            .iter()
            .filter(|path| !fresh_set.contains(path))
            .count();
        tracing::info!(
            analyzed,
            reresolved,
            entities = self.graph().entity_count(),
            edges = self.graph().edge_count(),
            "incremental update complete"
        );
        self.report(analyzed, reresolved, started)
    }

    /// Retract everything one file contributed: its entities (edges cascade
    /// with them), its symbol-table entries, its stashed references, and its
    /// diagnostics. Collects the names it declared into `triggers`.
    fn retract_file(&mut self, path: &Path, triggers: &mut HashSet<String>) {
        if let Some(record) = self.records.remove(path) {
            let entities = record.entities.clone();
            self.graph_mut().remove_entities(&entities);
        }
        triggers.extend(self.symbols().remove_file(path));
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            triggers.insert(stem.to_string());
        }
        if let Some(references) = self.references.remove(path) {
            for name in trigger_names(&references) {
                if let Some(files) = self.ref_index.get_mut(&name) {
                    files.remove(path);
                    if files.is_empty() {
                        self.ref_index.remove(&name);
                    }
                }
            }
        }
        self.file_diagnostics.remove(path);
    }
}
