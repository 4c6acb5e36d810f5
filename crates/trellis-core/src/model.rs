//! Core data structures for the code graph

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Unique, stable identifier for an entity.
///
/// Derived from the declaring file path, the entity kind, and the qualified
/// name — never from physical line position, so it survives unrelated edits
/// elsewhere in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn new(file_path: &Path, kind: EntityKind, qualified_name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        kind.hash(&mut hasher);
        qualified_name.hash(&mut hasher);
        EntityId(hasher.finish())
    }

    /// Identifier for a target that could not be resolved inside the
    /// repository. All references to the same unresolved name share one id.
    pub fn external(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        "external".hash(&mut hasher);
        name.hash(&mut hasher);
        EntityId(hasher.finish())
    }

    /// Identifier of the entity representing a file itself, computable from
    /// the path alone.
    pub fn for_file(path: &Path) -> Self {
        EntityId::new(path, EntityKind::File, &path.display().to_string())
    }
}

/// Discriminates what kind of code unit an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    // ── Structural ──────────────────────────────────────────
    Directory,
    File,

    // ── Code entities (tree-sitter extracted) ───────────────
    Module,
    Class,
    Struct,
    Enum,
    Interface,
    Function,
    Method,
    Variable,
    Constant,
    TypeAlias,

    // ── Placeholder for unresolved targets ──────────────────
    External,

    // ── Fallback ────────────────────────────────────────────
    Unknown,
}

/// Supported languages for syntax-aware analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => Language::Rust,
            Some("ts") | Some("tsx") => Language::TypeScript,
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Language::JavaScript,
            Some("py") | Some("pyi") => Language::Python,
            _ => Language::Other,
        }
    }
}

/// Where an entity's declaration sits in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// 1-based line of the first declaration token.
    pub start_line: u32,
    /// 1-based line of the last declaration token.
    pub end_line: u32,
}

impl SourceSpan {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        SourceSpan { start_line, end_line }
    }

    pub fn lines(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Declared visibility of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Visibility {
    Public,
    Private,
    #[default]
    Unknown,
}

/// A single named code unit in the graph.
///
/// Immutable once created: a changed declaration produces a new `Entity`
/// value under the same identifier, replacing the old one atomically within
/// a graph update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub qualified_name: String,
    /// File that declares this entity. For `Directory` and `External`
    /// entities this is the directory path / an empty path respectively.
    pub file_path: PathBuf,
    pub span: Option<SourceSpan>,
    pub visibility: Visibility,
    pub language: Option<Language>,
    /// Declaration signature, when the analyzer recovered one.
    pub signature: Option<String>,
    /// First line of the declaration's doc comment, when present.
    pub doc_summary: Option<String>,
    /// Untyped extension map for analyzer-specific annotations.
    pub metadata: HashMap<String, String>,
}

impl Entity {
    /// Entity representing a file itself. Every manifest file gets one,
    /// whatever its parse status, so directory structure stays total.
    pub fn for_file(path: &Path, language: Language) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let qualified_name = path.display().to_string();
        Entity {
            id: EntityId::new(path, EntityKind::File, &qualified_name),
            kind: EntityKind::File,
            name,
            qualified_name,
            file_path: path.to_path_buf(),
            span: None,
            visibility: Visibility::Unknown,
            language: Some(language),
            signature: None,
            doc_summary: None,
            metadata: HashMap::new(),
        }
    }

    /// Entity representing a directory on the path to a file.
    pub fn for_directory(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let qualified_name = path.display().to_string();
        Entity {
            id: EntityId::new(path, EntityKind::Directory, &qualified_name),
            kind: EntityKind::Directory,
            name,
            qualified_name,
            file_path: path.to_path_buf(),
            span: None,
            visibility: Visibility::Unknown,
            language: None,
            signature: None,
            doc_summary: None,
            metadata: HashMap::new(),
        }
    }

    /// Placeholder entity for a reference target that lives outside the
    /// repository (or failed to resolve inside it).
    pub fn external(name: &str) -> Self {
        Entity {
            id: EntityId::external(name),
            kind: EntityKind::External,
            name: name.to_string(),
            qualified_name: name.to_string(),
            file_path: PathBuf::new(),
            span: None,
            visibility: Visibility::Unknown,
            language: None,
            signature: None,
            doc_summary: None,
            metadata: HashMap::new(),
        }
    }
}

/// What kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Filesystem / declaration containment. Defines hierarchy, not a
    /// dependency; traversals skip it.
    Contains,

    // ── Dependencies (from AST) ─────────────────────────────
    Import,
    Call,
    Inherit,
    Compose,
    DataFlow,
    Reference,
}

impl RelationKind {
    /// Containment edges define hierarchy; everything else is a dependency.
    pub fn is_dependency(self) -> bool {
        self != RelationKind::Contains
    }
}

/// How a reference target was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// Target is a known entity inside the repository.
    Resolved,
    /// Target could not be resolved inside the repository.
    External,
    /// Several candidate targets matched; one edge is emitted per candidate.
    Ambiguous,
}

/// A directed, typed edge between two entities.
///
/// Not unique per (source, target, kind): every call site between the same
/// two entities is a distinct edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub source: EntityId,
    pub target: EntityId,
    pub kind: RelationKind,
    pub resolution: Resolution,
    /// File in which this relationship is expressed.
    pub site_file: Option<PathBuf>,
    /// 1-based line of the reference site.
    pub site_line: Option<u32>,
    /// Untyped extension map.
    pub metadata: HashMap<String, String>,
}

impl Relationship {
    pub fn contains(source: EntityId, target: EntityId) -> Self {
        Relationship {
            source,
            target,
            kind: RelationKind::Contains,
            resolution: Resolution::Resolved,
            site_file: None,
            site_line: None,
            metadata: HashMap::new(),
        }
    }
}

/// An unresolved reference emitted by a language analyzer.
///
/// Resolution into a `Relationship` happens later, against the repository
/// symbol index, so a changed file can be re-resolved without reparsing the
/// files that mention it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolReference {
    /// Entity the reference occurs in (innermost enclosing symbol, or the
    /// file entity at top level).
    pub from: EntityId,
    /// Referenced name as written in source.
    pub name: String,
    pub kind: RelationKind,
    /// 1-based line of the reference site.
    pub line: u32,
}

/// Outcome of analyzing one file revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    /// Clean parse.
    Parsed,
    /// Syntax errors; recovered top-level declarations only.
    Partial,
    /// No analyzer for this language; opaque file entity only.
    Unsupported,
    /// Unreadable content; file skipped, surfaced as a diagnostic.
    Corrupted,
}

/// Per-file bookkeeping used by the incremental updater to know exactly what
/// to retract when the file changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Content fingerprint at last analysis. Fingerprint comparison, not
    /// timestamp comparison, decides whether a file changed.
    pub fingerprint: String,
    /// Every entity this file declared, file entity included.
    pub entities: Vec<EntityId>,
    pub status: ParseStatus,
}

/// Classifies a per-file diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    ParseError,
    UnsupportedLanguage,
    CorruptedFile,
    UnresolvedReference,
    CacheCorruption,
    CacheVersionMismatch,
}

/// A recovered failure, accumulated per file and returned alongside the
/// graph. Nothing in this engine is fatal; diagnostics are how degradation
/// is surfaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new(file: impl Into<PathBuf>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            file: file.into(),
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}
