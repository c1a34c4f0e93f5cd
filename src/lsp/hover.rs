// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Hover: labels with addresses, defines, mnemonics, and hardware
//! register documentation.

use serde_json::{json, Value};

use crate::m65816::knowledge::{hardware_annotation, opcode_doc};
use crate::lsp::document::DocumentState;
use crate::lsp::messages::Position;
use crate::lsp::session::extract_token_at;

fn markdown_hover(value: String) -> Value {
    json!({
        "contents": {"kind": "markdown", "value": value},
    })
}

pub fn hover_response(doc: &DocumentState, position: Position) -> Value {
    let Some(token) = extract_token_at(&doc.text, position.line, position.character) else {
        return Value::Null;
    };

    if let Some(label) = doc.label(&token) {
        let mut text = format!("{} = ${:06X}", label.name, label.address);
        if let Some(register) = hardware_annotation(label.address) {
            text.push_str(&format!(
                "\n\n**Hardware:** {}: {}",
                register.name, register.description
            ));
        }
        return markdown_hover(text);
    }

    // Raw hex address over a known hardware register.
    if let Some(hex) = token.strip_prefix('$') {
        if let Ok(address) = u32::from_str_radix(hex, 16) {
            if let Some(register) = hardware_annotation(address) {
                return markdown_hover(format!(
                    "**{}** - ${:04X}\n\n{}",
                    register.name,
                    address & 0xFFFF,
                    register.description
                ));
            }
        }
    }

    if let Some(doc_entry) = opcode_doc(&token) {
        let mut text = format!(
            "**{}** - {}\n\n{}\n\n**Flags:** {}",
            token.to_ascii_uppercase(),
            doc_entry.full_name,
            doc_entry.description,
            doc_entry.flags_affected
        );
        if doc_entry.cycles != "None" {
            text.push_str(&format!("\n\n**Cycles:** {}", doc_entry.cycles));
        }
        return markdown_hover(text);
    }

    // Define invocations carry the '!' sigil; the table does not.
    let bare = token.strip_prefix('!').unwrap_or(&token);
    if let Some(define) = doc.define(bare) {
        let text = if define.value.is_empty() {
            format!("!{}", define.name)
        } else {
            format!("!{} = {}", define.name, define.value)
        };
        return json!({
            "contents": {"kind": "plaintext", "value": text},
        });
    }

    Value::Null
}
