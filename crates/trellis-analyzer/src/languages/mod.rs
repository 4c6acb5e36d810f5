//! Language analyzers for the supported languages

mod ecma;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

use crate::analyzer::LanguageAnalyzer;
use crate::parser::{end_line_of, line_of};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::Node;
use trellis_core::{Entity, EntityId, EntityKind, Language, SourceSpan, Visibility};

/// Get the analyzer for a language. `None` means unsupported: the file
/// short-circuits to a single opaque entity with no internal symbols.
pub fn analyzer_for(language: Language) -> Option<&'static dyn LanguageAnalyzer> {
    match language {
        Language::Rust => Some(&rust::RustAnalyzer),
        Language::TypeScript => Some(&typescript::TypeScriptAnalyzer),
        Language::JavaScript => Some(&javascript::JavaScriptAnalyzer),
        Language::Python => Some(&python::PythonAnalyzer),
        Language::Other => None,
    }
}

/// Text of a node, or empty when the slice is out of range (error nodes).
pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

/// Build a symbol entity the way every analyzer does: id from the declaring
/// file, kind, and qualified name; span from the declaration node.
#[allow(clippy::too_many_arguments)]
pub(crate) fn symbol_entity(
    path: &Path,
    node: Node,
    kind: EntityKind,
    name: &str,
    qualified_name: String,
    language: Language,
    visibility: Visibility,
    signature: Option<String>,
) -> Entity {
    Entity {
        id: EntityId::new(path, kind, &qualified_name),
        kind,
        name: name.to_string(),
        qualified_name,
        file_path: path.to_path_buf(),
        span: Some(SourceSpan::new(line_of(node), end_line_of(node))),
        visibility,
        language: Some(language),
        signature,
        doc_summary: None,
        metadata: HashMap::new(),
    }
}

/// Qualified name scheme shared by all analyzers: file path, then the
/// enclosing scopes, `::`-joined.
pub(crate) fn qualify(path: &Path, scopes: &[String], name: &str) -> String {
    let mut qualified = path.display().to_string();
    for scope in scopes {
        qualified.push_str("::");
        qualified.push_str(scope);
    }
    qualified.push_str("::");
    qualified.push_str(name);
    qualified
}
