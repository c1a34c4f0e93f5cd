// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Document and workspace symbol listings.

use serde_json::{json, Value};

use crate::lsp::document::DocumentState;
use crate::lsp::parse::SymbolEntry;
use crate::lsp::workspace::WorkspaceState;

fn symbol_range(symbol: &SymbolEntry) -> Value {
    let end_column = symbol.column + symbol.name.len() as u32;
    json!({
        "start": {"line": symbol.line, "character": symbol.column},
        "end": {"line": symbol.line, "character": end_column},
    })
}

/// Symbols declared in the document itself; included files contribute to
/// the outline of their own documents, not this one.
pub fn document_symbols(doc: &DocumentState) -> Value {
    let mut out = Vec::new();
    for symbol in &doc.symbols {
        if !symbol.uri.is_empty() && symbol.uri != doc.uri {
            continue;
        }
        let range = symbol_range(symbol);
        out.push(json!({
            "name": symbol.name,
            "kind": symbol.kind.lsp_symbol_kind(),
            "detail": symbol.kind.as_str(),
            "range": range.clone(),
            "selectionRange": range,
        }));
    }
    Value::Array(out)
}

fn contains_ignore_case(text: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    text.to_ascii_lowercase()
        .contains(&query.to_ascii_lowercase())
}

pub fn workspace_symbols(workspace: &WorkspaceState, query: &str) -> Value {
    let mut out = Vec::new();
    let mut uris: Vec<&String> = workspace.symbol_index.keys().collect();
    uris.sort();
    for doc_uri in uris {
        for symbol in &workspace.symbol_index[doc_uri] {
            if !contains_ignore_case(&symbol.name, query) {
                continue;
            }
            let uri = if symbol.uri.is_empty() {
                doc_uri.as_str()
            } else {
                symbol.uri.as_str()
            };
            out.push(json!({
                "name": symbol.name,
                "kind": symbol.kind.lsp_symbol_kind(),
                "containerName": symbol.kind.as_str(),
                "location": {
                    "uri": uri,
                    "range": symbol_range(symbol),
                },
            }));
        }
    }
    Value::Array(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::parse::{SymbolEntry, SymbolKind};

    fn symbol(name: &str, uri: &str, line: u32) -> SymbolEntry {
        SymbolEntry {
            name: name.to_string(),
            kind: SymbolKind::Label,
            line,
            column: 0,
            uri: uri.to_string(),
            parameters: Vec::new(),
        }
    }

    #[test]
    fn outline_excludes_symbols_from_included_files() {
        let mut doc =
            DocumentState::new("file:///main.asm".to_string(), None, 1, String::new());
        doc.symbols = vec![
            symbol("Own", "file:///main.asm", 0),
            symbol("Included", "file:///lib.inc", 3),
        ];
        let result = document_symbols(&doc);
        let names: Vec<&str> = result
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|item| item["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Own"]);
    }

    #[test]
    fn workspace_search_is_case_insensitive_substring() {
        let mut workspace = WorkspaceState::default();
        workspace.symbol_index.insert(
            "file:///a.asm".to_string(),
            vec![symbol("Oracle_SpawnItem", "file:///a.asm", 4)],
        );
        let result = workspace_symbols(&workspace, "spawn");
        let items = result.as_array().expect("array");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["location"]["uri"], "file:///a.asm");
        assert!(workspace_symbols(&workspace, "zzz")
            .as_array()
            .expect("array")
            .is_empty());
    }
}
