// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Inlay hints: label names after raw hex addresses, and parameter names
//! inside macro invocations.

use serde_json::{json, Value};

use crate::lsp::document::DocumentState;
use crate::lsp::parse::{SymbolEntry, SymbolKind};
use crate::lsp::workspace::WorkspaceState;

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
    workspace
        .symbol_index
        .values()
        .flatten()
        .find(|symbol| symbol.kind == SymbolKind::Macro && symbol.name == name)
}

fn is_hint_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '+' | '!')
}

fn is_hint_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '!')
}

pub fn inlay_hints(
    doc: &DocumentState,
    workspace: &WorkspaceState,
    start_line: u32,
    end_line: u32,
) -> Value {
    let mut out: Vec<Value> = Vec::new();

    for (line_number, line) in doc.text.split('\n').enumerate() {
        let line_number = line_number as u32;
        if line_number > end_line {
            break;
        }
        if line_number < start_line {
            continue;
        }
        let bytes = line.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            let c = bytes[i] as char;

            // A $XXXX literal with a known label gets a trailing hint.
            if c == '$' {
                let mut j = i + 1;
                while j < bytes.len() && (bytes[j] as char).is_ascii_hexdigit() {
                    j += 1;
                }
                let len = j - (i + 1);
                if len >= 2 {
                    if let Ok(address) = u32::from_str_radix(&line[i + 1..j], 16) {
                        if let Some(label) = doc.label_for_address(address) {
                            out.push(json!({
                                "position": {"line": line_number, "character": j as u32},
                                "label": format!(" :{label}"),
                                "kind": 1,
                                "paddingLeft": true,
                            }));
                        }
                    }
                }
                i = j.max(i + 1);
                continue;
            }

            if is_hint_ident_start(c) {
                let start = i;
                let mut j = i;
                while j < bytes.len() && is_hint_ident_char(bytes[j] as char) {
                    j += 1;
                }
                let word = &line[start..j];
                let clean = word.strip_prefix('+').filter(|s| !s.is_empty()).unwrap_or(word);
                if let Some(symbol) = find_macro(doc, workspace, clean) {
                    if !symbol.parameters.is_empty() {
                        append_macro_argument_hints(line, j, line_number, symbol, &mut out);
                    }
                }
                i = j.max(i + 1);
                continue;
            }

            i += 1;
        }
    }

    Value::Array(out)
}

/// Hints for `Name(arg0, arg1, ...)` starting right after the macro name.
fn append_macro_argument_hints(
    line: &str,
    name_end: usize,
    line_number: u32,
    symbol: &SymbolEntry,
    out: &mut Vec<Value>,
) {
    let bytes = line.as_bytes();
    let mut k = name_end;
    while k < bytes.len() && (bytes[k] as char).is_ascii_whitespace() {
        k += 1;
    }
    if k >= bytes.len() || bytes[k] != b'(' {
        return;
    }
    k += 1;
    out.push(json!({
        "position": {"line": line_number, "character": k as u32},
        "label": format!("{}:", symbol.parameters[0]),
        "kind": 2,
        "paddingRight": true,
    }));

    let mut param_index = 1usize;
    let mut balance = 0i32;
    let mut in_string = false;
    while k < bytes.len() && param_index < symbol.parameters.len() {
        let c = bytes[k] as char;
        if c == '"' {
            in_string = !in_string;
        } else if !in_string {
            match c {
                '(' => balance += 1,
                ')' => {
                    if balance == 0 {
                        break;
                    }
                    balance -= 1;
                }
                ',' if balance == 0 => {
                    k += 1;
                    while k < bytes.len() && (bytes[k] as char).is_ascii_whitespace() {
                        k += 1;
                    }
                    out.push(json!({
                        "position": {"line": line_number, "character": k as u32},
                        "label": format!("{}:", symbol.parameters[param_index]),
                        "kind": 2,
                        "paddingRight": true,
                    }));
                    param_index += 1;
                    continue;
                }
                _ => {}
            }
        }
        k += 1;
    }
}
