// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Signature help for macro invocations.

use serde_json::{json, Value};

use crate::lsp::document::DocumentState;
use crate::lsp::messages::Position;
use crate::lsp::parse::{SymbolEntry, SymbolKind};
use crate::lsp::workspace::WorkspaceState;

/// Find the macro named `name`, preferring the current document.
fn find_macro<'a>(
    doc: &'a DocumentState,
    workspace: &'a WorkspaceState,
    name: &str,
) -> Option<&'a SymbolEntry> {
    if let Some(found) = doc
        .symbols
        .iter()
        .find(|symbol| symbol.kind == SymbolKind::Macro && symbol.name == name)
    {
        return Some(found);
    }
    workspace.symbol_index.values().flatten().find(|symbol| {
        symbol.kind == SymbolKind::Macro && symbol.name == name
    })
}

pub fn signature_help(doc: &DocumentState, workspace: &WorkspaceState, position: Position) -> Value {
    let empty = json!({
        "signatures": [],
        "activeSignature": 0,
        "activeParameter": 0,
    });

    let Some(line_text) = doc.line(position.line as usize) else {
        return empty;
    };
    let bytes = line_text.as_bytes();
    let cursor = (position.character as usize).min(bytes.len());

    // Walk left from the cursor to the opening paren, counting top-level
    // commas to find the active parameter.
    let mut balance = 0i32;
    let mut param_index = 0usize;
    let mut open_paren = None;
    for p in (0..cursor).rev() {
        match bytes[p] {
            b')' => balance += 1,
            b'(' => {
                if balance > 0 {
                    balance -= 1;
                } else {
                    open_paren = Some(p);
                    break;
                }
            }
            b',' if balance == 0 => param_index += 1,
            _ => {}
        }
    }
    let Some(open_paren) = open_paren else {
        return empty;
    };
    if open_paren == 0 {
        return empty;
    }

    let prefix = &line_text[..open_paren];
    let Some(name_end) = prefix.rfind(|c: char| !c.is_whitespace()) else {
        return empty;
    };
    let mut name_start = name_end;
    let prefix_bytes = prefix.as_bytes();
    while name_start > 0 {
        let c = prefix_bytes[name_start - 1] as char;
        if c.is_ascii_alphanumeric() || c == '_' || c == '+' {
            name_start -= 1;
        } else {
            break;
        }
    }
    let mut macro_name = &prefix[name_start..=name_end];
    // Invocation sigils are not part of the definition name.
    if macro_name.len() > 1 && macro_name.starts_with('+') {
        macro_name = &macro_name[1..];
    }

    let Some(symbol) = find_macro(doc, workspace, macro_name) else {
        return empty;
    };
    if symbol.parameters.is_empty() {
        return empty;
    }

    let label = format!("{}({})", symbol.name, symbol.parameters.join(", "));
    let parameters: Vec<Value> = symbol
        .parameters
        .iter()
        .map(|param| json!({"label": param}))
        .collect();
    json!({
        "signatures": [{
            "label": label,
            "parameters": parameters,
        }],
        "activeSignature": 0,
        "activeParameter": param_index.min(symbol.parameters.len().saturating_sub(1)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_macro(text: &str) -> DocumentState {
        let mut doc =
            DocumentState::new("file:///a.asm".to_string(), None, 1, text.to_string());
        doc.symbols = vec![SymbolEntry {
            name: "Foo".to_string(),
            kind: SymbolKind::Macro,
            line: 0,
            column: 6,
            uri: "file:///a.asm".to_string(),
            parameters: vec!["a".to_string(), "b".to_string()],
        }];
        doc
    }

    #[test]
    fn active_parameter_follows_commas() {
        let doc = doc_with_macro("macro Foo(a, b)\n    +Foo(1, 2\n");
        let workspace = WorkspaceState::default();

        let first = signature_help(
            &doc,
            &workspace,
            Position {
                line: 1,
                character: 10,
            },
        );
        assert_eq!(first["activeParameter"], 0);
        assert_eq!(first["signatures"][0]["label"], "Foo(a, b)");

        let second = signature_help(
            &doc,
            &workspace,
            Position {
                line: 1,
                character: 13,
            },
        );
        assert_eq!(second["activeParameter"], 1);
    }

    #[test]
    fn no_open_paren_means_no_signature() {
        let doc = doc_with_macro("macro Foo(a, b)\n    lda #$00\n");
        let result = signature_help(
            &doc,
            &WorkspaceState::default(),
            Position {
                line: 1,
                character: 8,
            },
        );
        assert!(result["signatures"].as_array().expect("array").is_empty());
    }
}
