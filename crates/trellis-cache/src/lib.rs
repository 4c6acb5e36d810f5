//! Trellis Cache — persisted graph snapshots keyed by content fingerprints
//!
//! A snapshot is valid only where its per-file fingerprints still match the
//! repository; any mismatch invalidates that file's portion only and feeds
//! the incremental updater. Unreadable or version-mismatched snapshots
//! degrade to a cold re-analysis — a safety fallback, never a crash.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trellis_core::{
    CodeGraph, Diagnostic, EngineError, Entity, FileRecord, Relationship, SymbolReference,
};
use trellis_scanner::{FileManifest, ManifestDelta};

/// Bumped whenever the snapshot layout changes; a mismatch triggers full
/// invalidation.
pub const SCHEMA_VERSION: u32 = 1;

/// Cache directory under the repository root.
pub const CACHE_DIR: &str = ".trellis";

/// Raw references per file, persisted so a warm start can re-resolve
/// changed files without reparsing their dependents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileReferences {
    pub path: PathBuf,
    pub references: Vec<SymbolReference>,
}

/// The on-disk snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub schema_version: u32,
    pub repo_key: String,
    pub cached_at: String,
    pub entities: Vec<Entity>,
    pub edges: Vec<Relationship>,
    pub records: Vec<FileRecord>,
    pub references: Vec<FileReferences>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CachedSnapshot {
    pub fn capture(
        repo_key: &str,
        graph: &CodeGraph,
        records: Vec<FileRecord>,
        references: Vec<FileReferences>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let (entities, edges) = graph.to_parts();
        CachedSnapshot {
            schema_version: SCHEMA_VERSION,
            repo_key: repo_key.to_string(),
            cached_at: chrono::Utc::now().to_rfc3339(),
            entities,
            edges,
            records,
            references,
            diagnostics,
        }
    }

    /// Rebuild the graph. Ordering of adjacency lists is not guaranteed;
    /// entity and edge sets are.
    pub fn into_graph(self) -> (CodeGraph, Vec<FileRecord>, Vec<FileReferences>) {
        let graph = CodeGraph::from_parts(self.entities, self.edges);
        (graph, self.records, self.references)
    }

    /// Per-file validation against the current manifest. Only mismatched
    /// files land in the delta; everything else stays served from cache.
    pub fn stale_paths(&self, manifest: &FileManifest) -> ManifestDelta {
        let mut delta = ManifestDelta::default();
        for record in &self.records {
            match manifest.get(&record.path) {
                None => delta.deleted.push(record.path.clone()),
                Some(entry) if entry.fingerprint != record.fingerprint => {
                    delta.modified.push(record.path.clone());
                }
                Some(_) => {}
            }
        }
        for path in manifest.entries.keys() {
            if !self.records.iter().any(|r| &r.path == path) {
                delta.created.push(path.clone());
            }
        }
        delta
    }
}

/// Outcome of a retrieval. `Invalid` carries the reason so callers can
/// surface a diagnostic while falling back to cold analysis.
pub enum CacheOutcome {
    Hit(Box<CachedSnapshot>),
    Miss,
    Invalid(EngineError),
}

/// Snapshot persistence under `<root>/.trellis/`.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: &Path) -> Self {
        SnapshotStore {
            dir: root.join(CACHE_DIR),
        }
    }

    fn path_for(&self, repo_key: &str) -> PathBuf {
        self.dir.join(format!("{repo_key}.json"))
    }

    /// Persist a snapshot. Invoked outside the merge critical section, so a
    /// slow write never stalls in-memory graph availability.
    pub fn store(&self, snapshot: &CachedSnapshot) -> anyhow::Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
        }
        let path = self.path_for(&snapshot.repo_key);
        let json = serde_json::to_string(snapshot)?;
        std::fs::write(&path, json)?;
        tracing::debug!(
            path = %path.display(),
            entities = snapshot.entities.len(),
            edges = snapshot.edges.len(),
            "snapshot stored"
        );
        Ok(())
    }

    /// Load a snapshot. Corruption and version mismatch are recovered
    /// outcomes, never errors: the caller re-analyzes from scratch.
    pub fn retrieve(&self, repo_key: &str) -> CacheOutcome {
        let path = self.path_for(repo_key);
        if !path.exists() {
            return CacheOutcome::Miss;
        }
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "snapshot unreadable");
                return CacheOutcome::Invalid(EngineError::CacheCorruption(err.to_string()));
            }
        };
        let snapshot: CachedSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "snapshot failed to parse");
                return CacheOutcome::Invalid(EngineError::CacheCorruption(err.to_string()));
            }
        };
        if snapshot.schema_version != SCHEMA_VERSION {
            tracing::info!(
                found = snapshot.schema_version,
                expected = SCHEMA_VERSION,
                "snapshot schema changed, full re-analysis"
            );
            return CacheOutcome::Invalid(EngineError::CacheVersionMismatch {
                found: snapshot.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        tracing::debug!(path = %path.display(), "snapshot loaded");
        CacheOutcome::Hit(Box::new(snapshot))
    }

    /// Drop the cached snapshot for a repository.
    pub fn invalidate(&self, repo_key: &str) -> std::io::Result<()> {
        let path = self.path_for(repo_key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
