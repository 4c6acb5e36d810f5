//! Analysis session
//!
//! One `Engine` per analyzed repository; no process-wide state. Per-file
//! analysis fans out over a worker pool (analyzers share no mutable state),
//! and workers submit per-file batches through an mpsc channel into a
//! serialized merge loop — the one writer the graph ever sees. Readers take
//! `Arc<CodeGraph>` snapshots published after each fully-merged pass and
//! never observe a partially-merged graph.

use crate::report::AnalysisReport;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, mpsc};
use std::time::Instant;
use trellis_analyzer::analyzer::FileAnalysis;
use trellis_analyzer::{SymbolTable, analyze_file, resolve_references, trigger_names};
use trellis_cache::{CacheOutcome, CachedSnapshot, FileReferences, SnapshotStore};
use trellis_core::{
    CancelToken, CodeGraph, Diagnostic, DiagnosticKind, EngineError, Entity, EntityId, EntityKind,
    FileRecord, PathSearch, RelationKind, Relationship, SymbolReference, Traversal,
};
use trellis_scanner::{FileManifest, ManifestEntry};

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Analysis worker threads; 0 uses the process-wide default pool.
    pub workers: usize,
    /// Default depth bound for dependency/dependent trees.
    pub default_depth: u32,
    /// Path cap for simple-path enumeration.
    pub max_paths: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: 0,
            default_depth: 5,
            max_paths: 256,
        }
    }
}

/// The analysis session for one repository.
pub struct Engine {
    config: EngineConfig,
    graph: CodeGraph,
    symbols: SymbolTable,
    pub(crate) records: HashMap<PathBuf, FileRecord>,
    pub(crate) references: HashMap<PathBuf, Vec<SymbolReference>>,
    /// Trigger name -> files whose references mention it. Keeps change
    /// impact proportional to the changed-file closure, not repo size.
    pub(crate) ref_index: HashMap<String, HashSet<PathBuf>>,
    pub(crate) file_diagnostics: HashMap<PathBuf, Vec<Diagnostic>>,
    snapshot: RwLock<Arc<CodeGraph>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            graph: CodeGraph::new(),
            symbols: SymbolTable::new(),
            records: HashMap::new(),
            references: HashMap::new(),
            ref_index: HashMap::new(),
            file_diagnostics: HashMap::new(),
            snapshot: RwLock::new(Arc::new(CodeGraph::new())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The mutable graph, for in-process inspection. Concurrent readers
    /// should prefer `snapshot`.
    pub fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    /// The last fully-merged snapshot. Cheap to clone, safe to read while
    /// further merges run.
    pub fn snapshot(&self) -> Arc<CodeGraph> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn record(&self, path: &Path) -> Option<&FileRecord> {
        self.records.get(path)
    }

    /// Dependency tree from the session's configured depth bound, read off
    /// the current snapshot.
    pub fn dependencies(&self, id: EntityId, token: &CancelToken) -> Traversal {
        self.snapshot()
            .dependencies(id, self.config.default_depth, token)
    }

    /// Dependent tree from the session's configured depth bound.
    pub fn dependents(&self, id: EntityId, token: &CancelToken) -> Traversal {
        self.snapshot()
            .dependents(id, self.config.default_depth, token)
    }

    /// Simple paths between two entities under the session's depth and
    /// path-count bounds.
    pub fn paths_between(&self, from: EntityId, to: EntityId, token: &CancelToken) -> PathSearch {
        self.snapshot().simple_paths(
            from,
            to,
            self.config.default_depth,
            self.config.max_paths,
            token,
        )
    }

    /// All file records, sorted by path.
    pub fn records(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Every live diagnostic, sorted by file then line.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut all: Vec<Diagnostic> = self.file_diagnostics.values().flatten().cloned().collect();
        all.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        all
    }

    /// Full from-scratch analysis of a manifest.
    pub fn analyze_full(&mut self, manifest: &FileManifest) -> AnalysisReport {
        let started = Instant::now();
        self.reset();
        let analyzed = self.analyze_paths(manifest, None);
        let paths: Vec<PathBuf> = self.references.keys().cloned().collect();
        self.resolve_files(&paths);
        self.graph.prune_dangling_externals();
        self.publish_snapshot();
        tracing::info!(
            files = analyzed,
            entities = self.graph.entity_count(),
            edges = self.graph.edge_count(),
            "full analysis complete"
        );
        self.report(analyzed, 0, started)
    }

    /// Resume from a cached snapshot, re-analyzing only what the manifest
    /// says changed. Cache corruption or a schema mismatch degrades to a
    /// cold full analysis with a diagnostic, never a crash.
    pub fn warm_start(
        &mut self,
        store: &SnapshotStore,
        repo_key: &str,
        manifest: &FileManifest,
    ) -> AnalysisReport {
        match store.retrieve(repo_key) {
            CacheOutcome::Hit(snapshot) => {
                let delta = snapshot.stale_paths(manifest);
                self.load_snapshot(*snapshot);
                tracing::info!(
                    created = delta.created.len(),
                    modified = delta.modified.len(),
                    deleted = delta.deleted.len(),
                    "warm start"
                );
                self.apply_delta(&delta, manifest)
            }
            CacheOutcome::Miss => self.analyze_full(manifest),
            CacheOutcome::Invalid(err) => {
                let kind = match err {
                    EngineError::CacheVersionMismatch { .. } => {
                        DiagnosticKind::CacheVersionMismatch
                    }
                    _ => DiagnosticKind::CacheCorruption,
                };
                let fallback = Diagnostic::new(PathBuf::from(repo_key), kind, err.to_string());
                let mut report = self.analyze_full(manifest);
                report.diagnostics.insert(0, fallback);
                report
            }
        }
    }

    /// Persist the current state. Called outside the merge critical section;
    /// a slow write never stalls in-memory graph availability.
    pub fn persist(&self, store: &SnapshotStore, repo_key: &str) -> anyhow::Result<()> {
        let records = self.records();
        let mut references: Vec<FileReferences> = self
            .references
            .iter()
            .map(|(path, references)| FileReferences {
                path: path.clone(),
                references: references.clone(),
            })
            .collect();
        references.sort_by(|a, b| a.path.cmp(&b.path));
        let snapshot =
            CachedSnapshot::capture(repo_key, &self.graph, records, references, self.diagnostics());
        store.store(&snapshot)
    }

    pub(crate) fn reset(&mut self) {
        self.graph = CodeGraph::new();
        self.symbols = SymbolTable::new();
        self.records.clear();
        self.references.clear();
        self.ref_index.clear();
        self.file_diagnostics.clear();
    }

    fn load_snapshot(&mut self, snapshot: CachedSnapshot) {
        self.reset();
        let diagnostics = snapshot.diagnostics.clone();
        let (graph, records, references) = snapshot.into_graph();
        self.graph = graph;
        for entity in self.graph.entities() {
            if !matches!(
                entity.kind,
                EntityKind::File | EntityKind::Directory | EntityKind::External
            ) {
                self.symbols.insert_symbol(entity);
            }
        }
        for record in records {
            self.symbols.insert_file(&record.path);
            self.records.insert(record.path.clone(), record);
        }
        for file_references in references {
            for name in trigger_names(&file_references.references) {
                self.ref_index
                    .entry(name)
                    .or_default()
                    .insert(file_references.path.clone());
            }
            self.references
                .insert(file_references.path, file_references.references);
        }
        for diagnostic in diagnostics {
            self.file_diagnostics
                .entry(diagnostic.file.clone())
                .or_default()
                .push(diagnostic);
        }
    }

    /// Fan analysis out over the worker pool and merge results serially as
    /// they arrive. Returns how many files were analyzed.
    pub(crate) fn analyze_paths(
        &mut self,
        manifest: &FileManifest,
        only: Option<&[PathBuf]>,
    ) -> usize {
        let entries: Vec<&ManifestEntry> = match only {
            None => manifest.entries.values().collect(),
            Some(paths) => paths.iter().filter_map(|path| manifest.get(path)).collect(),
        };
        if entries.is_empty() {
            return 0;
        }
        let analyzed = entries.len();
        let pool = build_pool(self.config.workers);
        let (tx, rx) = mpsc::channel::<(FileAnalysis, String)>();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                let produce = move || {
                    entries.par_iter().for_each_with(tx, |tx, entry| {
                        let analysis = analyze_file(&entry.path, &entry.content);
                        let _ = tx.send((analysis, entry.fingerprint.clone()));
                    });
                };
                match pool {
                    Some(pool) => pool.install(produce),
                    None => produce(),
                }
            });
            // The one writer: merge batches in arrival order.
            for (analysis, fingerprint) in rx.iter() {
                self.merge_analysis(analysis, fingerprint);
            }
        });
        analyzed
    }

    /// Serialized merge of one file's batch into the graph and indexes.
    fn merge_analysis(&mut self, analysis: FileAnalysis, fingerprint: String) {
        let path = analysis.path.clone();
        let file_id = analysis.file_entity.id;

        // Directory chain: every file participates in directory-structure
        // edges, whatever its parse status.
        let mut parent: Option<EntityId> = None;
        let mut current = PathBuf::new();
        if let Some(dirs) = path.parent() {
            for component in dirs.components() {
                current.push(component);
                let directory = Entity::for_directory(&current);
                let dir_id = directory.id;
                self.graph.add_entity(directory);
                if let Some(parent) = parent {
                    if !self.graph.has_edge(parent, dir_id, RelationKind::Contains) {
                        self.graph.add_edge(Relationship::contains(parent, dir_id));
                    }
                }
                parent = Some(dir_id);
            }
        }
        self.graph.add_entity(analysis.file_entity);
        if let Some(parent) = parent {
            if !self.graph.has_edge(parent, file_id, RelationKind::Contains) {
                self.graph.add_edge(Relationship::contains(parent, file_id));
            }
        }

        let mut declared = vec![file_id];
        let mut seen: HashSet<EntityId> = HashSet::from([file_id]);
        self.symbols.insert_file(&path);
        for symbol in &analysis.symbols {
            self.symbols.insert_symbol(symbol);
            if seen.insert(symbol.id) {
                declared.push(symbol.id);
            }
        }
        for symbol in analysis.symbols {
            let symbol_id = symbol.id;
            self.graph.add_entity(symbol);
            self.graph
                .add_edge(Relationship::contains(file_id, symbol_id));
        }

        self.records.insert(
            path.clone(),
            FileRecord {
                path: path.clone(),
                fingerprint,
                entities: declared,
                status: analysis.status,
            },
        );
        for name in trigger_names(&analysis.references) {
            self.ref_index.entry(name).or_default().insert(path.clone());
        }
        self.references.insert(path.clone(), analysis.references);
        self.file_diagnostics.insert(path, analysis.diagnostics);
    }

    /// Resolve the references of the given files (in parallel against the
    /// shared symbol index) and apply the edges serially.
    pub(crate) fn resolve_files(&mut self, paths: &[PathBuf]) -> usize {
        let jobs: Vec<(PathBuf, &Vec<SymbolReference>)> = paths
            .iter()
            .filter_map(|path| {
                self.references
                    .get(path)
                    .map(|references| (path.clone(), references))
            })
            .collect();
        if jobs.is_empty() {
            return 0;
        }
        let resolved = jobs.len();
        let symbols = &self.symbols;
        let outcomes: Vec<_> = jobs
            .par_iter()
            .map(|(path, references)| {
                (
                    path.clone(),
                    resolve_references(symbols, path, references.as_slice()),
                )
            })
            .collect();

        for (path, outcome) in outcomes {
            self.graph.add_entities(outcome.externals);
            self.graph.add_edges(outcome.edges);
            if !outcome.diagnostics.is_empty() {
                self.file_diagnostics
                    .entry(path)
                    .or_default()
                    .extend(outcome.diagnostics);
            }
        }
        resolved
    }

    pub(crate) fn publish_snapshot(&self) {
        let published = Arc::new(self.graph.clone());
        match self.snapshot.write() {
            Ok(mut guard) => *guard = published,
            Err(poisoned) => *poisoned.into_inner() = published,
        }
    }

    pub(crate) fn report(
        &self,
        files_analyzed: usize,
        files_reresolved: usize,
        started: Instant,
    ) -> AnalysisReport {
        AnalysisReport {
            files_analyzed,
            files_reresolved,
            entities: self.graph.entity_count(),
            edges: self.graph.edge_count(),
            diagnostics: self.diagnostics(),
            duration: started.elapsed(),
        }
    }

    pub(crate) fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub(crate) fn graph_mut(&mut self) -> &mut CodeGraph {
        &mut self.graph
    }
}

fn build_pool(workers: usize) -> Option<rayon::ThreadPool> {
    if workers == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to the default worker pool");
            None
        }
    }
}
