// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Typed protocol boundary.
//!
//! Inbound JSON-RPC payloads decode exactly once, here, into a tagged
//! union per method; handlers never reach into raw JSON shapes. Params
//! that fail to decode degrade the message to `Unknown`, which the
//! session answers with a null result instead of crashing the loop.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkspaceFolder {
    pub uri: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InitializeParams {
    #[serde(rename = "rootUri")]
    pub root_uri: Option<String>,
    #[serde(rename = "rootPath")]
    pub root_path: Option<String>,
    #[serde(rename = "workspaceFolders")]
    pub workspace_folders: Vec<WorkspaceFolder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDocumentPositionParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDocumentItem {
    pub uri: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DidOpenParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionedTextDocumentIdentifier {
    pub uri: String,
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContentChange {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DidChangeParams {
    #[serde(rename = "textDocument")]
    pub text_document: VersionedTextDocumentIdentifier,
    #[serde(rename = "contentChanges", default)]
    pub content_changes: Vec<ContentChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReferenceContext {
    #[serde(rename = "includeDeclaration")]
    pub include_declaration: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
    #[serde(default)]
    pub context: ReferenceContext,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
    #[serde(rename = "newName")]
    pub new_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlayHintParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    #[serde(default)]
    pub range: Option<Range>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkspaceSymbolParams {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteCommandParams {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

/// One request, decoded per method.
#[derive(Debug, Clone)]
pub enum Request {
    Initialize(InitializeParams),
    Shutdown,
    Definition(TextDocumentPositionParams),
    Hover(TextDocumentPositionParams),
    Completion(TextDocumentPositionParams),
    DocumentSymbol(DocumentParams),
    SemanticTokensFull(DocumentParams),
    References(ReferenceParams),
    Rename(RenameParams),
    SignatureHelp(TextDocumentPositionParams),
    InlayHint(InlayHintParams),
    WorkspaceSymbol(WorkspaceSymbolParams),
    ExecuteCommand(ExecuteCommandParams),
    /// Unknown method or undecodable params; answered with null.
    Unknown(String),
}

#[derive(Debug, Clone)]
pub enum Notification {
    Initialized,
    Exit,
    DidOpen(DidOpenParams),
    DidChange(DidChangeParams),
    DidClose(DocumentParams),
    Unknown,
}

#[derive(Debug, Clone)]
pub enum ClientMessage {
    Request { id: Value, request: Request },
    Notification(Notification),
}

fn decode<T: for<'de> Deserialize<'de>>(params: &Value) -> Option<T> {
    serde_json::from_value(params.clone()).ok()
}

fn decode_request(method: &str, params: &Value) -> Request {
    match method {
        "initialize" => decode(params)
            .map(Request::Initialize)
            .unwrap_or_else(|| Request::Initialize(InitializeParams::default())),
        "shutdown" => Request::Shutdown,
        "textDocument/definition" => decode(params)
            .map(Request::Definition)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/hover" => decode(params)
            .map(Request::Hover)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/completion" => decode(params)
            .map(Request::Completion)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/documentSymbol" => decode(params)
            .map(Request::DocumentSymbol)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/semanticTokens/full" => decode(params)
            .map(Request::SemanticTokensFull)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/references" => decode(params)
            .map(Request::References)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/rename" => decode(params)
            .map(Request::Rename)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/signatureHelp" => decode(params)
            .map(Request::SignatureHelp)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "textDocument/inlayHint" => decode(params)
            .map(Request::InlayHint)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "workspace/symbol" => decode(params)
            .map(Request::WorkspaceSymbol)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        "workspace/executeCommand" => decode(params)
            .map(Request::ExecuteCommand)
            .unwrap_or_else(|| Request::Unknown(method.to_string())),
        other => Request::Unknown(other.to_string()),
    }
}

fn decode_notification(method: &str, params: &Value) -> Notification {
    match method {
        "initialized" => Notification::Initialized,
        "exit" => Notification::Exit,
        "textDocument/didOpen" => decode(params)
            .map(Notification::DidOpen)
            .unwrap_or(Notification::Unknown),
        "textDocument/didChange" => decode(params)
            .map(Notification::DidChange)
            .unwrap_or(Notification::Unknown),
        "textDocument/didClose" => decode(params)
            .map(Notification::DidClose)
            .unwrap_or(Notification::Unknown),
        _ => Notification::Unknown,
    }
}

/// Decode one inbound payload. Messages without a method are dropped.
pub fn decode_message(value: &Value) -> Option<ClientMessage> {
    let method = value.get("method").and_then(Value::as_str)?;
    let params = value.get("params").cloned().unwrap_or(Value::Null);
    match value.get("id") {
        Some(id) => Some(ClientMessage::Request {
            id: id.clone(),
            request: decode_request(method, &params),
        }),
        None => Some(ClientMessage::Notification(decode_notification(
            method, &params,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_decode_into_typed_variants() {
        let message = json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "textDocument/definition",
            "params": {
                "textDocument": {"uri": "file:///a.asm"},
                "position": {"line": 4, "character": 7},
            },
        });
        match decode_message(&message) {
            Some(ClientMessage::Request {
                request: Request::Definition(params),
                ..
            }) => {
                assert_eq!(params.text_document.uri, "file:///a.asm");
                assert_eq!(params.position.line, 4);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn malformed_params_degrade_to_unknown() {
        let message = json!({
            "id": 1,
            "method": "textDocument/hover",
            "params": {"textDocument": {}},
        });
        match decode_message(&message) {
            Some(ClientMessage::Request {
                request: Request::Unknown(method),
                ..
            }) => assert_eq!(method, "textDocument/hover"),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn notifications_decode_without_ids() {
        let message = json!({
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {"uri": "file:///a.asm", "version": 1, "text": "lda #$00"},
            },
        });
        match decode_message(&message) {
            Some(ClientMessage::Notification(Notification::DidOpen(params))) => {
                assert_eq!(params.text_document.text, "lda #$00");
            }
            other => panic!("unexpected decode: {other:?}"),
        }
        assert!(decode_message(&json!({"no": "method"})).is_none());
    }
}
