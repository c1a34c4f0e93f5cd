// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Whole-document semantic tokens, delta-encoded per the protocol.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::m65816::opcodes::mnemonics;
use crate::lsp::completion::DIRECTIVES;
use crate::lsp::document::DocumentState;
use crate::lsp::parse::{strip_asm_comment, SymbolKind};

pub static TOKEN_TYPES: &[&str] = &[
    "function", "macro", "variable", "keyword", "string", "number", "operator", "register",
];

const TYPE_FUNCTION: u32 = 0;
const TYPE_MACRO: u32 = 1;
const TYPE_VARIABLE: u32 = 2;
const TYPE_KEYWORD: u32 = 3;
const TYPE_STRING: u32 = 4;
const TYPE_NUMBER: u32 = 5;
const TYPE_OPERATOR: u32 = 6;
const TYPE_REGISTER: u32 = 7;

static REGISTERS: &[&str] = &["a", "x", "y", "s", "p", "d", "db", "dp", "pc", "sp", "pb"];

#[derive(Debug, Clone, Copy)]
struct Token {
    line: u32,
    column: u32,
    length: u32,
    token_type: u32,
}

fn keyword_set() -> HashSet<String> {
    let mut set: HashSet<String> = DIRECTIVES.iter().map(|s| s.to_string()).collect();
    for mnemonic in mnemonics() {
        set.insert(mnemonic.to_ascii_lowercase());
    }
    set
}

pub fn semantic_tokens_full(doc: &DocumentState) -> Value {
    let mut tokens: Vec<Token> = Vec::new();

    for symbol in &doc.symbols {
        if !symbol.uri.is_empty() && symbol.uri != doc.uri {
            continue;
        }
        let token_type = match symbol.kind {
            SymbolKind::Macro => TYPE_MACRO,
            SymbolKind::Define => TYPE_VARIABLE,
            _ => TYPE_FUNCTION,
        };
        tokens.push(Token {
            line: symbol.line,
            column: symbol.column,
            length: symbol.name.len() as u32,
            token_type,
        });
    }

    let keywords = keyword_set();
    let registers: HashSet<&str> = REGISTERS.iter().copied().collect();

    for (line_number, line) in doc.text.split('\n').enumerate() {
        let line_number = line_number as u32;
        let code = strip_asm_comment(line);
        let bytes = code.as_bytes();

        // String literals, remembered so later passes can skip them.
        let mut string_ranges: Vec<(usize, usize)> = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'"' {
                i += 1;
                continue;
            }
            let start = i;
            i += 1;
            let mut escape = false;
            while i < bytes.len() {
                if escape {
                    escape = false;
                } else if bytes[i] == b'\\' {
                    escape = true;
                } else if bytes[i] == b'"' {
                    i += 1;
                    break;
                }
                i += 1;
            }
            tokens.push(Token {
                line: line_number,
                column: start as u32,
                length: (i - start) as u32,
                token_type: TYPE_STRING,
            });
            string_ranges.push((start, i));
        }
        let in_string =
            |pos: usize| string_ranges.iter().any(|&(s, e)| pos >= s && pos < e);

        // Leading token: directive/mnemonic keyword or bare register.
        let token_start = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(bytes.len());
        let token_end = bytes[token_start..]
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .map(|idx| token_start + idx)
            .unwrap_or(bytes.len());
        if token_end > token_start && !in_string(token_start) {
            let word = code[token_start..token_end].to_ascii_lowercase();
            let token_type = if keywords.contains(&word) {
                Some(TYPE_KEYWORD)
            } else if registers.contains(word.as_str()) {
                Some(TYPE_REGISTER)
            } else {
                None
            };
            if let Some(token_type) = token_type {
                tokens.push(Token {
                    line: line_number,
                    column: token_start as u32,
                    length: (token_end - token_start) as u32,
                    token_type,
                });
            }
        }

        // Operators and numeric literals.
        let mut i = 0;
        while i < bytes.len() {
            if in_string(i) {
                i += 1;
                continue;
            }
            let c = bytes[i];
            if matches!(c, b'+' | b'-' | b'*' | b'/' | b',' | b'#' | b'(' | b')') {
                tokens.push(Token {
                    line: line_number,
                    column: i as u32,
                    length: 1,
                    token_type: TYPE_OPERATOR,
                });
                i += 1;
                continue;
            }
            if c == b'$' || c == b'%' {
                let start = i;
                i += 1;
                let mut digits = 0;
                while i < bytes.len() {
                    let d = bytes[i];
                    let ok = if c == b'$' {
                        d.is_ascii_hexdigit()
                    } else {
                        d == b'0' || d == b'1'
                    };
                    if !ok {
                        break;
                    }
                    digits += 1;
                    i += 1;
                }
                if digits > 0 {
                    tokens.push(Token {
                        line: line_number,
                        column: start as u32,
                        length: (i - start) as u32,
                        token_type: TYPE_NUMBER,
                    });
                }
                continue;
            }
            if c.is_ascii_digit() {
                if i > 0 {
                    let prev = bytes[i - 1];
                    if prev.is_ascii_alphanumeric()
                        || matches!(prev, b'_' | b'!' | b'.')
                    {
                        i += 1;
                        continue;
                    }
                }
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                tokens.push(Token {
                    line: line_number,
                    column: start as u32,
                    length: (i - start) as u32,
                    token_type: TYPE_NUMBER,
                });
                continue;
            }
            i += 1;
        }
    }

    tokens.sort_by(|a, b| a.line.cmp(&b.line).then(a.column.cmp(&b.column)));

    let mut data: Vec<u32> = Vec::with_capacity(tokens.len() * 5);
    let mut last_line = 0u32;
    let mut last_column = 0u32;
    for token in &tokens {
        let delta_line = token.line - last_line;
        let delta_start = if delta_line == 0 {
            token.column - last_column
        } else {
            token.column
        };
        data.extend_from_slice(&[delta_line, delta_start, token.length, token.token_type, 0]);
        last_line = token.line;
        last_column = token.column;
    }

    json!({ "data": data })
}
