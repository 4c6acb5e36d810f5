//! Integration tests for Trellis
//!
//! These drive the whole pipeline: scan a repository tree, analyze it into
//! a graph, query it, persist it, and update it incrementally.

use std::path::Path;
use tempfile::TempDir;
use trellis::{
    CancelToken, DiagnosticKind, Engine, EngineConfig, EntityId, EntityKind, ParseStatus,
    RelationKind, Resolution, ScanOptions, SnapshotStore, scan,
};

fn write(dir: &TempDir, path: &str, content: &str) {
    let full = dir.path().join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, content).unwrap();
}

fn sample_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "src/storage.rs",
        r#"
/// Persistent key store.
pub struct Store {
    entries: Vec<String>,
}

impl Store {
    pub fn insert(&mut self, key: String) {
        self.entries.push(key);
    }
}

pub fn open() -> Store {
    Store { entries: Vec::new() }
}
"#,
    );
    write(
        &dir,
        "src/server.rs",
        r#"
pub fn serve() {
    let store = open();
    handle();
}

fn handle() {
    respond();
}

fn respond() {}
"#,
    );
    write(
        &dir,
        "scripts/report.py",
        r#"
import json

def build_report(data):
    return json.dumps(data)

class Reporter:
    def run(self):
        return build_report({})
"#,
    );
    write(&dir, "README.md", "# sample\n");
    dir
}

#[test]
fn scan_analyze_and_query_end_to_end() {
    let repo = sample_repo();
    let manifest = scan(repo.path(), &ScanOptions::default()).unwrap();
    assert_eq!(manifest.len(), 4);

    let mut engine = Engine::new(EngineConfig::default());
    let report = engine.analyze_full(&manifest);
    assert_eq!(report.files_analyzed, 4);
    assert!(report.entities > 0);
    assert!(report.edges > 0);

    let snapshot = engine.snapshot();

    // Cross-file call: serve() -> open() in storage.rs.
    let serve = snapshot.find_by_name("serve").expect("serve entity");
    let open = snapshot.find_by_name("open").expect("open entity");
    let deps = snapshot.dependencies(serve, 3, &CancelToken::none());
    assert!(deps.ids().contains(&open));

    // And the reverse view agrees.
    let dependents = snapshot.dependents(open, 1, &CancelToken::none());
    assert!(dependents.ids().contains(&serve));

    // The markdown file is an opaque entity, still inside the tree.
    let readme = EntityId::for_file(Path::new("README.md"));
    assert_eq!(
        snapshot.entity(readme).map(|e| e.kind),
        Some(EntityKind::File)
    );

    // Python analysis rode along: the class and its method exist.
    let reporter = snapshot.find_by_name("Reporter").expect("Reporter entity");
    assert_eq!(snapshot.entity(reporter).unwrap().kind, EntityKind::Class);
    assert!(
        snapshot
            .relationships()
            .any(|r| r.kind == RelationKind::Call
                && r.resolution == Resolution::Resolved
                && snapshot.entity(r.target).is_some_and(|e| e.name == "build_report"))
    );
}

#[test]
fn incremental_rescan_matches_fresh_analysis() {
    let repo = sample_repo();
    let manifest = scan(repo.path(), &ScanOptions::default()).unwrap();

    let mut engine = Engine::new(EngineConfig::default());
    engine.analyze_full(&manifest);

    // Grow the API of storage.rs and point server.rs at it.
    write(
        &repo,
        "src/storage.rs",
        r#"
pub struct Store {
    entries: Vec<String>,
}

impl Store {
    pub fn insert(&mut self, key: String) {
        self.entries.push(key);
    }
}

pub fn open() -> Store {
    Store { entries: Vec::new() }
}

pub fn compact() {}
"#,
    );
    write(
        &repo,
        "src/server.rs",
        r#"
pub fn serve() {
    let store = open();
    compact();
}
"#,
    );
    let rescanned = scan(repo.path(), &ScanOptions::default()).unwrap();
    let delta = manifest.diff(&rescanned);
    assert_eq!(delta.modified.len(), 2);

    let report = engine.apply_delta(&delta, &rescanned);
    assert_eq!(report.files_analyzed, 2);

    let mut fresh = Engine::new(EngineConfig::default());
    fresh.analyze_full(&rescanned);

    let mut incremental_entities: Vec<EntityId> =
        engine.graph().entities().map(|e| e.id).collect();
    incremental_entities.sort();
    let mut fresh_entities: Vec<EntityId> = fresh.graph().entities().map(|e| e.id).collect();
    fresh_entities.sort();
    assert_eq!(incremental_entities, fresh_entities);
    assert_eq!(engine.graph().edge_count(), fresh.graph().edge_count());
}

#[test]
fn cache_persists_across_sessions() {
    let repo = sample_repo();
    let manifest = scan(repo.path(), &ScanOptions::default()).unwrap();
    let store = SnapshotStore::new(repo.path());

    let mut first = Engine::new(EngineConfig::default());
    first.analyze_full(&manifest);
    first.persist(&store, "sample").unwrap();
    let entities = first.graph().entity_count();
    let edges = first.graph().edge_count();

    // A new session resumes from cache without parsing anything.
    let mut second = Engine::new(EngineConfig::default());
    let report = second.warm_start(&store, "sample", &manifest);
    assert_eq!(report.files_analyzed, 0);
    assert_eq!(second.graph().entity_count(), entities);
    assert_eq!(second.graph().edge_count(), edges);

    // Touching one file re-analyzes exactly one file.
    write(&repo, "scripts/report.py", "def build_report(data):\n    return data\n");
    let rescanned = scan(repo.path(), &ScanOptions::default()).unwrap();
    let mut third = Engine::new(EngineConfig::default());
    let report = third.warm_start(&store, "sample", &rescanned);
    assert_eq!(report.files_analyzed, 1);
}

#[test]
fn circular_imports_are_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    write(&dir, "alpha.py", "import beta\n\ndef a():\n    beta.b()\n");
    write(&dir, "beta.py", "import alpha\n\ndef b():\n    alpha.a()\n");

    let manifest = scan(dir.path(), &ScanOptions::default()).unwrap();
    let mut engine = Engine::new(EngineConfig::default());
    engine.analyze_full(&manifest);

    let snapshot = engine.snapshot();
    let cycles = snapshot.find_cycles(&CancelToken::none());
    assert!(!cycles.incomplete);
    assert!(!cycles.cycles.is_empty());

    // The import cycle between the two files is one component.
    let alpha = EntityId::for_file(Path::new("alpha.py"));
    let beta = EntityId::for_file(Path::new("beta.py"));
    assert!(
        cycles
            .cycles
            .iter()
            .any(|c| c.members.contains(&alpha) && c.members.contains(&beta))
    );
}

#[test]
fn broken_file_degrades_gracefully() {
    let dir = TempDir::new().unwrap();
    write(&dir, "ok.rs", "pub fn fine() {}\n");
    write(&dir, "broken.rs", "fn broken( {\n");
    std::fs::write(dir.path().join("binary.rs"), [0xFFu8, 0xFE, 0x00, 0x01]).unwrap();

    let manifest = scan(dir.path(), &ScanOptions::default()).unwrap();
    let mut engine = Engine::new(EngineConfig::default());
    let report = engine.analyze_full(&manifest);

    // Nothing is fatal: all three files are tracked, two with diagnostics.
    assert_eq!(
        engine.record(Path::new("ok.rs")).map(|r| r.status),
        Some(ParseStatus::Parsed)
    );
    assert_eq!(
        engine.record(Path::new("broken.rs")).map(|r| r.status),
        Some(ParseStatus::Partial)
    );
    assert_eq!(
        engine.record(Path::new("binary.rs")).map(|r| r.status),
        Some(ParseStatus::Corrupted)
    );
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ParseError)
    );
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::CorruptedFile)
    );
    assert!(engine.graph().find_by_name("fine").is_some());
}

#[test]
fn path_search_traces_call_chains() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "chain.rs",
        "pub fn a() { b(); }\npub fn b() { c(); }\npub fn c() {}\n",
    );

    let manifest = scan(dir.path(), &ScanOptions::default()).unwrap();
    let mut engine = Engine::new(EngineConfig::default());
    engine.analyze_full(&manifest);

    let snapshot = engine.snapshot();
    let a = snapshot.find_by_name("a").unwrap();
    let c = snapshot.find_by_name("c").unwrap();

    let shortest = snapshot.shortest_path(a, c, &CancelToken::none());
    assert_eq!(shortest.paths.len(), 1);
    assert_eq!(shortest.paths[0].len(), 3);

    let all = snapshot.simple_paths(a, c, 8, 32, &CancelToken::none());
    assert!(!all.incomplete);
    assert_eq!(all.paths.len(), 1);

    // A tight depth bound is reported, not silently truncated.
    let bounded = snapshot.simple_paths(a, c, 1, 32, &CancelToken::none());
    assert!(bounded.paths.is_empty());
    assert!(bounded.incomplete);
}
