//! Trellis — a code graph engine
//!
//! Parses source files, extracts symbols and their relationships, assembles
//! them into a queryable directed graph, and keeps that graph correct as
//! files change. This crate is the umbrella: it re-exports the engine's
//! public surface so consumers depend on one crate.
//!
//! The engine emits structured data only — graphs, records, diagnostics.
//! Query parsing, explanation, rendering, and any user interface are
//! downstream concerns.

pub use trellis_analyzer::{
    FileAnalysis, LanguageAnalyzer, ParsedFile, SymbolTable, analyze_file, analyzer_for,
    resolve_references,
};
pub use trellis_cache::{
    CacheOutcome, CachedSnapshot, FileReferences, SCHEMA_VERSION, SnapshotStore,
};
pub use trellis_core::{
    CancelToken, CodeGraph, Cycle, CycleSearch, Diagnostic, DiagnosticKind, EngineError, Entity,
    EntityId, EntityKind, FileRecord, Language, ParseStatus, PathSearch, RelationKind,
    Relationship, Resolution, Result, SourceSpan, SymbolReference, Traversal, TraversalStep,
    Visibility,
};
pub use trellis_engine::{AnalysisReport, Engine, EngineConfig};
pub use trellis_scanner::{
    FileManifest, ManifestDelta, ManifestEntry, ScanOptions, fingerprint, scan,
};
