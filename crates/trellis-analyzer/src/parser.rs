//! Tree-sitter parser management
//!
//! Tree-sitter parsers are not Send + Sync, and re-creating one per file is
//! wasteful across a large repository pass. Analysis workers are synchronous
//! threads, so each thread keeps one parser per language in a thread-local
//! cache and reuses it for every file it analyzes.

use crate::analyzer::ParsedFile;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::{Node, Parser};
use trellis_core::{Diagnostic, DiagnosticKind, EngineError, Language};

thread_local! {
    static PARSERS: RefCell<HashMap<Language, Parser>> = RefCell::new(HashMap::new());
}

/// Get the tree-sitter grammar for a language, if one is wired up.
fn grammar(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Other => None,
    }
}

/// Parse file content with this thread's cached parser for the language.
///
/// A syntax error fails nothing: tree-sitter recovers and the outcome is
/// marked partial with a diagnostic pointing at the first error. Non-UTF-8
/// content is the one unrecoverable input, surfaced as `CorruptedFile`.
pub fn parse_source(
    language: Language,
    path: &Path,
    content: &[u8],
) -> Result<ParsedFile, EngineError> {
    let source = std::str::from_utf8(content)
        .map_err(|e| EngineError::CorruptedFile {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?
        .to_string();

    let tree = PARSERS.with(|parsers| -> Result<tree_sitter::Tree, EngineError> {
        let mut parsers = parsers.borrow_mut();
        if !parsers.contains_key(&language) {
            let mut parser = Parser::new();
            let grammar = grammar(language).ok_or_else(|| EngineError::UnsupportedLanguage {
                file: path.to_path_buf(),
            })?;
            parser
                .set_language(&grammar)
                .map_err(|e| EngineError::Parse {
                    file: path.to_path_buf(),
                    message: format!("failed to set language: {e}"),
                })?;
            parsers.insert(language, parser);
        }
        let Some(parser) = parsers.get_mut(&language) else {
            return Err(EngineError::UnsupportedLanguage {
                file: path.to_path_buf(),
            });
        };
        parser.parse(&source, None).ok_or_else(|| EngineError::CorruptedFile {
            file: path.to_path_buf(),
            message: "parser produced no tree".to_string(),
        })
    })?;

    let mut diagnostics = Vec::new();
    let partial = tree.root_node().has_error();
    if partial {
        let line = first_error_line(tree.root_node());
        let mut diagnostic = Diagnostic::new(
            path,
            DiagnosticKind::ParseError,
            "syntax errors; recovered top-level declarations only",
        );
        if let Some(line) = line {
            diagnostic = diagnostic.at_line(line);
        }
        tracing::debug!(file = %path.display(), line, "partial parse");
        diagnostics.push(diagnostic);
    }

    Ok(ParsedFile {
        tree,
        source,
        partial,
        diagnostics,
    })
}

/// 1-based line of the first ERROR or missing node, depth-first.
fn first_error_line(node: Node) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row as u32 + 1);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(line) = first_error_line(child) {
            return Some(line);
        }
    }
    Some(node.start_position().row as u32 + 1)
}

/// 1-based line for a tree-sitter position.
pub fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line for a tree-sitter node.
pub fn end_line_of(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}
