// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! References and rename: boundary-aware token scans across the
//! workspace, preferring in-memory buffers over disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::lsp::document::DocumentState;
use crate::lsp::session::{is_symbol_char, path_to_file_uri};
use crate::lsp::workspace::{is_source_file, WorkspaceState};

/// Every (line, column) occurrence of `token` in `text`, 0-based, matched
/// on full symbol boundaries.
fn token_occurrences(text: &str, token: &str) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    if token.is_empty() {
        return out;
    }
    for (line_number, line) in text.split('\n').enumerate() {
        let bytes = line.as_bytes();
        let mut search_from = 0usize;
        while let Some(found) = line[search_from..].find(token) {
            let start = search_from + found;
            let end = start + token.len();
            let start_ok = start == 0 || !is_symbol_char(bytes[start - 1] as char);
            let end_ok = end == bytes.len() || !is_symbol_char(bytes[end] as char);
            if start_ok && end_ok {
                out.push((line_number as u32, start as u32));
                search_from = end;
            } else {
                search_from = start + 1;
            }
            if search_from >= line.len() {
                break;
            }
        }
    }
    out
}

/// Files to scan: the workspace tree when there is a root, otherwise just
/// the open documents.
fn files_to_scan(
    workspace: &WorkspaceState,
    documents: &HashMap<String, DocumentState>,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(root) = &workspace.root {
        collect_source_files(root, workspace, &mut files);
    } else {
        for doc in documents.values() {
            if let Some(path) = &doc.path {
                files.push(path.clone());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn collect_source_files(dir: &Path, workspace: &WorkspaceState, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_source_files(&path, workspace, out);
        } else if is_source_file(&path) && !workspace.is_git_ignored(&path) {
            out.push(path);
        }
    }
}

fn text_for(path: &Path, documents: &HashMap<String, DocumentState>) -> Option<String> {
    let uri = path_to_file_uri(path);
    if let Some(doc) = documents.get(&uri) {
        return Some(doc.text.clone());
    }
    fs::read_to_string(path).ok()
}

pub fn reference_locations(
    workspace: &WorkspaceState,
    documents: &HashMap<String, DocumentState>,
    token: &str,
    declaration_site: Option<(&str, u32, u32)>,
    include_declaration: bool,
) -> Value {
    let mut out = Vec::new();
    for path in files_to_scan(workspace, documents) {
        let Some(text) = text_for(&path, documents) else {
            continue;
        };
        let uri = path_to_file_uri(&path);
        for (line, column) in token_occurrences(&text, token) {
            if !include_declaration {
                if let Some((decl_uri, decl_line, decl_column)) = declaration_site {
                    if uri == decl_uri && line == decl_line && column == decl_column {
                        continue;
                    }
                }
            }
            out.push(json!({
                "uri": uri,
                "range": {
                    "start": {"line": line, "character": column},
                    "end": {"line": line, "character": column + token.len() as u32},
                },
            }));
        }
    }
    Value::Array(out)
}

/// WorkspaceEdit replacing every boundary-exact occurrence of `token`.
pub fn rename_edits(
    workspace: &WorkspaceState,
    documents: &HashMap<String, DocumentState>,
    token: &str,
    new_name: &str,
) -> Option<Value> {
    if new_name.is_empty() || token.is_empty() {
        return None;
    }
    let mut changes = Map::new();
    for path in files_to_scan(workspace, documents) {
        let Some(text) = text_for(&path, documents) else {
            continue;
        };
        let edits: Vec<Value> = token_occurrences(&text, token)
            .into_iter()
            .map(|(line, column)| {
                json!({
                    "range": {
                        "start": {"line": line, "character": column},
                        "end": {"line": line, "character": column + token.len() as u32},
                    },
                    "newText": new_name,
                })
            })
            .collect();
        if !edits.is_empty() {
            changes.insert(path_to_file_uri(&path), Value::Array(edits));
        }
    }
    if changes.is_empty() {
        return None;
    }
    Some(json!({ "changes": Value::Object(changes) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrences_respect_symbol_boundaries() {
        let text = "Spawn:\n    jsr Spawn\n    jsr SpawnItem\n";
        let hits = token_occurrences(text, "Spawn");
        assert_eq!(hits, vec![(0, 0), (1, 8)]);
    }

    #[test]
    fn repeated_hits_on_one_line_are_all_found() {
        let hits = token_occurrences("jsr A : jsr A\n", "A");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn references_fall_back_to_open_documents_without_a_root() {
        let workspace = WorkspaceState::default();
        let mut documents = HashMap::new();
        let path = PathBuf::from("/virtual/a.asm");
        let uri = path_to_file_uri(&path);
        let mut doc = DocumentState::new(
            uri.clone(),
            Some(path),
            1,
            "Start:\n    bra Start\n".to_string(),
        );
        doc.needs_analysis = false;
        documents.insert(uri.clone(), doc);

        let all = reference_locations(&workspace, &documents, "Start", None, true);
        assert_eq!(all.as_array().expect("array").len(), 2);

        let without_decl =
            reference_locations(&workspace, &documents, "Start", Some((&uri, 0, 0)), false);
        assert_eq!(without_decl.as_array().expect("array").len(), 1);
    }

    #[test]
    fn rename_produces_edits_per_file() {
        let workspace = WorkspaceState::default();
        let mut documents = HashMap::new();
        let path = PathBuf::from("/virtual/a.asm");
        let uri = path_to_file_uri(&path);
        documents.insert(
            uri.clone(),
            DocumentState::new(
                uri.clone(),
                Some(path),
                1,
                "Old:\n    bra Old\n".to_string(),
            ),
        );
        let edit = rename_edits(&workspace, &documents, "Old", "New").expect("edit");
        let edits = edit["changes"][&uri].as_array().expect("edits");
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0]["newText"], "New");
    }
}
