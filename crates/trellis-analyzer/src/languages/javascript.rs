//! JavaScript language analyzer

use super::ecma;
use crate::analyzer::{LanguageAnalyzer, ParsedFile};
use crate::parser;
use std::path::Path;
use trellis_core::{EngineError, Entity, EntityId, Language, SymbolReference};

pub struct JavaScriptAnalyzer;

impl LanguageAnalyzer for JavaScriptAnalyzer {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn parse(&self, path: &Path, content: &[u8]) -> Result<ParsedFile, EngineError> {
        parser::parse_source(Language::JavaScript, path, content)
    }

    fn extract_symbols(&self, path: &Path, parsed: &ParsedFile) -> Vec<Entity> {
        let mut symbols = Vec::new();
        let mut scopes = Vec::new();
        ecma::collect_symbols(
            parsed.tree.root_node(),
            &parsed.source,
            path,
            Language::JavaScript,
            &mut scopes,
            false,
            &mut symbols,
        );
        symbols
    }

    fn detect_relationships(
        &self,
        path: &Path,
        parsed: &ParsedFile,
        file_entity: EntityId,
        _symbols: &[Entity],
    ) -> Vec<SymbolReference> {
        let mut refs = Vec::new();
        let mut scopes = Vec::new();
        let mut enclosing = Vec::new();
        ecma::collect_references(
            parsed.tree.root_node(),
            &parsed.source,
            path,
            file_entity,
            &mut scopes,
            &mut enclosing,
            &mut refs,
        );
        refs
    }
}
