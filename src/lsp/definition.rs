// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Go-to-definition: include-path jumps and label lookups through the
//! assembler's source map.

use std::path::Path;

use serde_json::{json, Value};

use crate::lsp::document::DocumentState;
use crate::lsp::messages::Position;
use crate::lsp::parse::{
    parse_incdir_directive, parse_include_directive, resolve_include_path, strip_asm_comment,
};
use crate::lsp::session::{extract_token_at, path_to_file_uri};

fn location(uri: String, line: u32, character: u32) -> Value {
    json!({
        "uri": uri,
        "range": {
            "start": {"line": line, "character": character},
            "end": {"line": line, "character": character},
        },
    })
}

pub fn definition_locations(doc: &DocumentState, position: Position) -> Value {
    let Some(token) = extract_token_at(&doc.text, position.line, position.character) else {
        return Value::Null;
    };

    // Include directives jump into the target file when the cursor sits
    // inside the quoted path.
    if let Some(line_text) = doc.line(position.line as usize) {
        let trimmed = strip_asm_comment(line_text).trim().to_string();
        let include_target =
            parse_include_directive(&trimmed).or_else(|| parse_incdir_directive(&trimmed));
        if let Some(raw) = include_target {
            if let Some(quote_start) = line_text.find('"') {
                let quote_end = line_text[quote_start + 1..]
                    .find('"')
                    .map(|idx| quote_start + 1 + idx);
                if let Some(quote_end) = quote_end {
                    let character = position.character as usize;
                    if character >= quote_start && character <= quote_end {
                        let base_dir = doc
                            .path
                            .as_deref()
                            .and_then(Path::parent)
                            .map(Path::to_path_buf)
                            .unwrap_or_default();
                        let search = vec![base_dir.clone()];
                        if let Some(target) = resolve_include_path(&raw, &base_dir, &search) {
                            return json!([location(path_to_file_uri(&target), 0, 0)]);
                        }
                    }
                }
            }
        }
    }

    let Some(label) = doc.label(&token) else {
        return Value::Null;
    };

    // Map the label's address back to a file and line.
    for entry in &doc.source_map.entries {
        if entry.address != label.address {
            continue;
        }
        let Some(file) = doc
            .source_map
            .files
            .iter()
            .find(|file| file.id == entry.file_id)
        else {
            continue;
        };
        let line = entry.line.saturating_sub(1);
        return json!([location(path_to_file_uri(Path::new(&file.path)), line, 0)]);
    }

    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembler::Label;
    use crate::core::source_map::{SourceFile, SourceMapEntry};

    #[test]
    fn label_definition_resolves_through_source_map() {
        let mut doc = DocumentState::new(
            "file:///p/main.asm".to_string(),
            None,
            1,
            "    jsr Start\n".to_string(),
        );
        doc.labels = vec![Label {
            name: "Start".to_string(),
            address: 0x8000,
        }];
        doc.source_map.files.push(SourceFile {
            id: 0,
            crc: 0,
            path: "/p/main.asm".to_string(),
        });
        doc.source_map.entries.push(SourceMapEntry {
            address: 0x8000,
            file_id: 0,
            line: 10,
        });
        doc.build_lookup_maps();

        let result = definition_locations(
            &doc,
            Position {
                line: 0,
                character: 9,
            },
        );
        let locations = result.as_array().expect("array");
        assert_eq!(locations[0]["range"]["start"]["line"], 9);
        assert_eq!(locations[0]["uri"], "file:///p/main.asm");
    }

    #[test]
    fn unknown_token_returns_null() {
        let doc = DocumentState::new(
            "file:///p/main.asm".to_string(),
            None,
            1,
            "    jsr Nowhere\n".to_string(),
        );
        let result = definition_locations(
            &doc,
            Position {
                line: 0,
                character: 9,
            },
        );
        assert!(result.is_null());
    }
}
