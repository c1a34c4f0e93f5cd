// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

mod common;

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use common::lsp_client::{path_to_file_uri, LspTestClient};

fn unique_temp_dir() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_micros();
    let dir = std::env::temp_dir().join(format!("snesforge-lsp-it-{now}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn initialize_reports_core_capabilities() {
    let mut client = LspTestClient::spawn().expect("spawn lsp");
    let result = client.initialize(Value::Null);
    let caps = result.get("capabilities").expect("capabilities");
    assert!(caps.get("completionProvider").is_some());
    assert!(caps.get("hoverProvider").is_some());
    assert!(caps.get("definitionProvider").is_some());
    assert!(caps.get("referencesProvider").is_some());
    assert!(caps.get("renameProvider").is_some());
    assert!(caps.get("documentSymbolProvider").is_some());
    assert!(caps.get("workspaceSymbolProvider").is_some());
    assert!(caps.get("semanticTokensProvider").is_some());
    assert!(caps.get("inlayHintProvider").is_some());
    assert!(caps.get("signatureHelpProvider").is_some());
    client.shutdown();
}

#[test]
fn did_open_publishes_diagnostics_for_the_document() {
    let dir = unique_temp_dir();
    let file = dir.join("main.asm");
    fs::write(&file, "Start:\n    nop\n").expect("write");
    let uri = path_to_file_uri(&file);

    let mut client = LspTestClient::spawn().expect("spawn lsp");
    let _ = client.initialize(json!(path_to_file_uri(&dir)));
    client.notify("initialized", json!({}));
    client.notify(
        "textDocument/didOpen",
        json!({
            "textDocument": {
                "uri": uri,
                "languageId": "asm",
                "version": 1,
                "text": "Start:\n    nop\n",
            },
        }),
    );
    let publish = client
        .wait_for_publish_diagnostics(&uri, Duration::from_secs(3))
        .expect("publishDiagnostics");
    assert!(publish.get("diagnostics").and_then(Value::as_array).is_some());
    client.shutdown();
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn document_symbols_come_from_the_text_parse() {
    let dir = unique_temp_dir();
    let file = dir.join("symbols.asm");
    let text = "namespace game\nInit:\nmacro Spawn(id, count)\nendmacro\n!speed = 4\n";
    fs::write(&file, text).expect("write");
    let uri = path_to_file_uri(&file);

    let mut client = LspTestClient::spawn().expect("spawn lsp");
    let _ = client.initialize(Value::Null);
    client.notify(
        "textDocument/didOpen",
        json!({
            "textDocument": {"uri": uri, "version": 1, "text": text},
        }),
    );
    let result = client.request(
        "textDocument/documentSymbol",
        json!({"textDocument": {"uri": uri}}),
    );
    let names: Vec<String> = result
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|item| item.get("name").and_then(Value::as_str))
        .map(ToString::to_string)
        .collect();
    assert!(names.contains(&"game_Init".to_string()));
    assert!(names.contains(&"game_Spawn".to_string()));
    assert!(names.contains(&"speed".to_string()));
    client.shutdown();
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn completion_offers_directives_and_mnemonics() {
    let dir = unique_temp_dir();
    let file = dir.join("completion.asm");
    let text = "    inc\n";
    fs::write(&file, text).expect("write");
    let uri = path_to_file_uri(&file);

    let mut client = LspTestClient::spawn().expect("spawn lsp");
    let _ = client.initialize(Value::Null);
    client.notify(
        "textDocument/didOpen",
        json!({
            "textDocument": {"uri": uri, "version": 1, "text": text},
        }),
    );
    let result = client.request(
        "textDocument/completion",
        json!({
            "textDocument": {"uri": uri},
            "position": {"line": 0, "character": 7},
        }),
    );
    let labels: Vec<String> = result
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|item| item.get("label").and_then(Value::as_str))
        .map(ToString::to_string)
        .collect();
    assert!(labels.iter().any(|label| label == "incsrc"));
    assert!(labels.iter().any(|label| label.eq_ignore_ascii_case("inc")));
    client.shutdown();
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn hover_documents_65816_mnemonics() {
    let uri = "file:///virtual/hover.asm";
    let text = "    rep #$30\n";

    let mut client = LspTestClient::spawn().expect("spawn lsp");
    let _ = client.initialize(Value::Null);
    client.notify(
        "textDocument/didOpen",
        json!({
            "textDocument": {"uri": uri, "version": 1, "text": text},
        }),
    );
    let result = client.request(
        "textDocument/hover",
        json!({
            "textDocument": {"uri": uri},
            "position": {"line": 0, "character": 5},
        }),
    );
    let value = result["contents"]["value"].as_str().expect("hover text");
    assert!(value.contains("Reset Processor Status Bits"));
    client.shutdown();
}

#[test]
fn closing_a_document_clears_its_diagnostics() {
    let uri = "file:///virtual/closing.asm";
    let mut client = LspTestClient::spawn().expect("spawn lsp");
    let _ = client.initialize(Value::Null);
    client.notify(
        "textDocument/didOpen",
        json!({
            "textDocument": {"uri": uri, "version": 1, "text": "Start:\n"},
        }),
    );
    let _ = client.wait_for_publish_diagnostics(uri, Duration::from_secs(3));
    client.notify(
        "textDocument/didClose",
        json!({"textDocument": {"uri": uri}}),
    );
    let publish = client
        .wait_for_publish_diagnostics(uri, Duration::from_secs(3))
        .expect("closing publish");
    assert!(publish["diagnostics"]
        .as_array()
        .expect("array")
        .is_empty());
    client.shutdown();
}
