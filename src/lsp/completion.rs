// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Prefix completion over directives, workspace symbols, labels, defines,
//! macros, and 65816 mnemonics.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::m65816::opcodes::mnemonics;
use crate::lsp::document::DocumentState;
use crate::lsp::parse::SymbolKind;
use crate::lsp::workspace::WorkspaceState;

/// Assembler directive spellings offered as completions.
pub static DIRECTIVES: &[&str] = &[
    "arch", "autoclean", "bank", "bankbyte", "base", "cleartable", "cmode", "db", "dw", "dl",
    "dd", "dq", "define", "elif", "elseif", "else", "endif", "endmacro", "endstruct", "endwhile",
    "endfor", "error", "fill", "fillbyte", "fillword", "freecode", "freedata", "freespace",
    "hirom", "if", "incbin", "incgfx", "incmsg", "incsrc", "include", "incdir", "lorom",
    "exlorom", "exhirom", "macro", "namespace", "org", "pad", "padbyte", "padword", "pc2snes",
    "print", "pullpc", "pushpc", "pushns", "popns", "snes2pc", "struct", "table", "undef",
    "warn", "warning", "while", "for", "math", "function", "reset", "optimize", "check",
    "bankcross",
];

fn completion_kind(kind: SymbolKind) -> u32 {
    match kind {
        SymbolKind::Macro => 3,
        SymbolKind::Label => 6,
        _ => 21,
    }
}

pub fn completion_items(doc: &DocumentState, workspace: &WorkspaceState, prefix: &str) -> Value {
    if prefix.is_empty() {
        return json!([]);
    }

    let mut items: Vec<Value> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let prefix_lower = prefix.to_ascii_lowercase();
    let matches = |name: &str| name.to_ascii_lowercase().starts_with(&prefix_lower);
    let mut push = |items: &mut Vec<Value>, label: &str, kind: u32, detail: &str| {
        if !seen.insert(label.to_string()) {
            return;
        }
        let mut item = json!({"label": label, "kind": kind});
        if !detail.is_empty() {
            item["detail"] = json!(detail);
        }
        items.push(item);
    };

    for directive in DIRECTIVES {
        if matches(directive) {
            push(&mut items, directive, 14, "directive");
        }
    }

    for symbols in workspace.symbol_index.values() {
        for symbol in symbols {
            if matches(&symbol.name) {
                push(
                    &mut items,
                    &symbol.name,
                    completion_kind(symbol.kind),
                    symbol.kind.as_str(),
                );
            }
        }
    }

    for label in &doc.labels {
        if matches(&label.name) {
            push(&mut items, &label.name, 6, "label");
        }
    }

    for define in &doc.defines {
        if matches(&define.name) {
            let detail = if define.value.is_empty() {
                "define"
            } else {
                define.value.as_str()
            };
            push(&mut items, &define.name, 21, detail);
        }
    }

    for symbol in &doc.symbols {
        if symbol.kind == SymbolKind::Macro && matches(&symbol.name) {
            push(&mut items, &symbol.name, 3, "macro");
        }
    }

    for mnemonic in mnemonics() {
        if matches(mnemonic) {
            push(&mut items, mnemonic, 14, "opcode 65816");
        }
    }

    Value::Array(items)
}
