//! Language analyzer capability interface
//!
//! One implementation per supported language. A new language plugs in here
//! without touching the graph store or the updater.

use crate::languages;
use std::path::{Path, PathBuf};
use tree_sitter::Tree;
use trellis_core::{
    Diagnostic, DiagnosticKind, EngineError, Entity, EntityId, Language, ParseStatus,
    SymbolReference,
};

/// A parsed file: the syntax tree plus the source it was parsed from.
///
/// `partial` means the tree contains error nodes; extraction still runs and
/// recovers whatever declarations parsed cleanly.
pub struct ParsedFile {
    pub tree: Tree,
    pub source: String,
    pub partial: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-language analysis capability.
pub trait LanguageAnalyzer: Send + Sync {
    fn language(&self) -> Language;

    /// Parse file content. Syntax errors degrade to a partial tree; only
    /// unreadable content errors out (as `CorruptedFile`).
    fn parse(&self, path: &Path, content: &[u8]) -> Result<ParsedFile, EngineError>;

    /// Extract declared symbols in source order.
    fn extract_symbols(&self, path: &Path, parsed: &ParsedFile) -> Vec<Entity>;

    /// Detect raw, unresolved references. `file_entity` is the id references
    /// at top level attribute to; nested references attribute to their
    /// innermost enclosing symbol.
    fn detect_relationships(
        &self,
        path: &Path,
        parsed: &ParsedFile,
        file_entity: EntityId,
        symbols: &[Entity],
    ) -> Vec<SymbolReference>;
}

/// Everything one file contributes to the graph, before reference
/// resolution. Produced by analysis workers, consumed by the serialized
/// merge step.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub language: Language,
    pub status: ParseStatus,
    /// The file's own entity. Present whatever the parse status, so every
    /// file participates in directory-structure edges.
    pub file_entity: Entity,
    pub symbols: Vec<Entity>,
    pub references: Vec<SymbolReference>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyze one file: dispatch to the language analyzer, degrade gracefully.
///
/// No input aborts analysis. Unsupported languages short-circuit to an
/// opaque file entity; unreadable content is skipped with a diagnostic;
/// syntax errors yield partial results.
pub fn analyze_file(path: &Path, content: &[u8]) -> FileAnalysis {
    let language = Language::from_path(path);
    let file_entity = Entity::for_file(path, language);

    let Some(analyzer) = languages::analyzer_for(language) else {
        return FileAnalysis {
            path: path.to_path_buf(),
            language,
            status: ParseStatus::Unsupported,
            file_entity,
            symbols: Vec::new(),
            references: Vec::new(),
            diagnostics: vec![Diagnostic::new(
                path,
                DiagnosticKind::UnsupportedLanguage,
                "no analyzer for this language; file kept as an opaque entity",
            )],
        };
    };

    match analyzer.parse(path, content) {
        Ok(parsed) => {
            let symbols = analyzer.extract_symbols(path, &parsed);
            let references =
                analyzer.detect_relationships(path, &parsed, file_entity.id, &symbols);
            let status = if parsed.partial {
                ParseStatus::Partial
            } else {
                ParseStatus::Parsed
            };
            FileAnalysis {
                path: path.to_path_buf(),
                language,
                status,
                file_entity,
                symbols,
                references,
                diagnostics: parsed.diagnostics,
            }
        }
        Err(err) => {
            tracing::debug!(file = %path.display(), error = %err, "file skipped");
            FileAnalysis {
                path: path.to_path_buf(),
                language,
                status: ParseStatus::Corrupted,
                file_entity,
                symbols: Vec::new(),
                references: Vec::new(),
                diagnostics: vec![Diagnostic::new(
                    path,
                    DiagnosticKind::CorruptedFile,
                    err.to_string(),
                )],
            }
        }
    }
}
