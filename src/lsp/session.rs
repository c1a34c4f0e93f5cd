// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The language-server session: one single-threaded state machine over
//! every open document.
//!
//! Each document moves from idle to edited-awaiting-debounce to
//! analyzing and back. Edits do a cheap synchronous re-parse for outline
//! freshness and mark the document; the full analysis runs from
//! [`LspSession::tick`] once the quiet window since the most recent edit
//! (across all documents) has passed. There is no timer thread; the
//! protocol loop calls `tick` between messages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::core::assembler::{AssemblerEngine, CliAssembler};
use crate::lsp::analysis::{analyze_document, AnalysisContext, RomCache};
use crate::lsp::completion::completion_items;
use crate::lsp::definition::definition_locations;
use crate::lsp::diagnostics::publish_params;
use crate::lsp::document::DocumentState;
use crate::lsp::document_symbols::{document_symbols, workspace_symbols};
use crate::lsp::hover::hover_response;
use crate::lsp::inlay_hints::inlay_hints;
use crate::lsp::logging::DiagLog;
use crate::lsp::messages::{
    decode_message, ClientMessage, DidChangeParams, DidOpenParams, DocumentParams,
    ExecuteCommandParams, InitializeParams, Notification, ReferenceParams, RenameParams, Request,
};
use crate::lsp::parse::{extract_symbols_from_text, ParseCache};
use crate::lsp::project_graph::ProjectGraph;
use crate::lsp::references::{reference_locations, rename_edits};
use crate::lsp::semantic_tokens::{semantic_tokens_full, TOKEN_TYPES};
use crate::lsp::signature_help::signature_help;
use crate::lsp::workspace::WorkspaceState;

/// Quiet window after the last edit before a full re-analysis runs.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

pub const WRITTEN_BLOCKS_COMMAND: &str = "snesforge.writtenBlocks";

#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Response { id: Value, result: Value },
    Notification { method: String, params: Value },
}

pub struct LspSession {
    workspace: WorkspaceState,
    documents: HashMap<String, DocumentState>,
    graph: ProjectGraph,
    parse_cache: ParseCache,
    rom_cache: RomCache,
    engine: Box<dyn AssemblerEngine>,
    engine_is_custom: bool,
    log: DiagLog,
    last_change: Option<Instant>,
    debounce: Duration,
    shutdown_requested: bool,
    exit_requested: bool,
}

impl Default for LspSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LspSession {
    pub fn new() -> Self {
        Self::with_engine_internal(Box::new(CliAssembler::new(None)), false)
    }

    /// Session with an injected assembler engine (tests).
    pub fn with_engine(engine: Box<dyn AssemblerEngine>) -> Self {
        Self::with_engine_internal(engine, true)
    }

    fn with_engine_internal(engine: Box<dyn AssemblerEngine>, custom: bool) -> Self {
        Self {
            workspace: WorkspaceState::default(),
            documents: HashMap::new(),
            graph: ProjectGraph::default(),
            parse_cache: ParseCache::default(),
            rom_cache: RomCache::default(),
            engine,
            engine_is_custom: custom,
            log: DiagLog::default(),
            last_change: None,
            debounce: DEBOUNCE_WINDOW,
            shutdown_requested: false,
            exit_requested: false,
        }
    }

    pub fn should_exit(&self) -> bool {
        self.exit_requested
    }

    /// Handle one inbound payload, then run the opportunistic debounce
    /// check so analysis happens between messages.
    pub fn handle_message(&mut self, value: &Value) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        match decode_message(value) {
            Some(ClientMessage::Request { id, request }) => {
                let result = self.handle_request(request);
                out.push(OutboundMessage::Response { id, result });
            }
            Some(ClientMessage::Notification(notification)) => {
                out.extend(self.handle_notification(notification));
            }
            None => {}
        }
        out.extend(self.tick());
        out
    }

    fn handle_request(&mut self, request: Request) -> Value {
        match request {
            Request::Initialize(params) => self.handle_initialize(&params),
            Request::Shutdown => {
                self.shutdown_requested = true;
                Value::Null
            }
            Request::Definition(params) => self
                .documents
                .get(&params.text_document.uri)
                .map(|doc| definition_locations(doc, params.position))
                .unwrap_or(Value::Null),
            Request::Hover(params) => self
                .documents
                .get(&params.text_document.uri)
                .map(|doc| hover_response(doc, params.position))
                .unwrap_or(Value::Null),
            Request::Completion(params) => {
                let Some(doc) = self.documents.get(&params.text_document.uri) else {
                    return json!([]);
                };
                let prefix = extract_token_prefix(
                    &doc.text,
                    params.position.line,
                    params.position.character,
                );
                match prefix {
                    Some(prefix) => completion_items(doc, &self.workspace, &prefix),
                    None => json!([]),
                }
            }
            Request::DocumentSymbol(params) => self
                .documents
                .get(&params.text_document.uri)
                .map(document_symbols)
                .unwrap_or_else(|| json!([])),
            Request::SemanticTokensFull(params) => self
                .documents
                .get(&params.text_document.uri)
                .map(semantic_tokens_full)
                .unwrap_or(Value::Null),
            Request::References(params) => self.handle_references(&params),
            Request::Rename(params) => self.handle_rename(&params),
            Request::SignatureHelp(params) => self
                .documents
                .get(&params.text_document.uri)
                .map(|doc| signature_help(doc, &self.workspace, params.position))
                .unwrap_or(Value::Null),
            Request::InlayHint(params) => {
                let Some(doc) = self.documents.get(&params.text_document.uri) else {
                    return json!([]);
                };
                let (start, end) = params
                    .range
                    .map(|range| (range.start.line, range.end.line))
                    .unwrap_or((0, u32::MAX));
                inlay_hints(doc, &self.workspace, start, end)
            }
            Request::WorkspaceSymbol(params) => workspace_symbols(&self.workspace, &params.query),
            Request::ExecuteCommand(params) => self.handle_execute_command(&params),
            Request::Unknown(_) => Value::Null,
        }
    }

    fn handle_notification(&mut self, notification: Notification) -> Vec<OutboundMessage> {
        match notification {
            Notification::Initialized | Notification::Unknown => Vec::new(),
            Notification::Exit => {
                if !self.shutdown_requested {
                    self.log.log("exit received without shutdown");
                }
                self.exit_requested = true;
                Vec::new()
            }
            Notification::DidOpen(params) => self.handle_did_open(params),
            Notification::DidChange(params) => self.handle_did_change(params),
            Notification::DidClose(params) => self.handle_did_close(params),
        }
    }

    fn handle_initialize(&mut self, params: &InitializeParams) -> Value {
        self.workspace = WorkspaceState::build(params, &mut self.parse_cache, &mut self.graph);
        if let Some(config) = &self.workspace.config {
            let config_dir = self
                .workspace
                .config_path
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let root = self.workspace.root.clone().unwrap_or_default();
            self.log.apply_config(config, &config_dir, &root);
            if !self.engine_is_custom {
                if let Some(program) = &config.assembler_path {
                    self.engine = Box::new(CliAssembler::new(Some(PathBuf::from(program))));
                }
            }
        }

        json!({
            "capabilities": {
                "textDocumentSync": 1,
                "definitionProvider": true,
                "hoverProvider": true,
                "completionProvider": {"triggerCharacters": ["!", ".", "@"]},
                "signatureHelpProvider": {"triggerCharacters": ["(", ","]},
                "inlayHintProvider": {"resolveProvider": false},
                "referencesProvider": true,
                "renameProvider": true,
                "documentSymbolProvider": true,
                "workspaceSymbolProvider": true,
                "semanticTokensProvider": {
                    "legend": {"tokenTypes": TOKEN_TYPES, "tokenModifiers": []},
                    "full": true,
                },
                "executeCommandProvider": {"commands": [WRITTEN_BLOCKS_COMMAND]},
            },
            "serverInfo": {
                "name": "snesforge-lsp",
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    fn handle_did_open(&mut self, params: DidOpenParams) -> Vec<OutboundMessage> {
        let item = params.text_document;
        let path = uri_to_path(&item.uri);
        let doc = DocumentState::new(item.uri.clone(), path, item.version, item.text);
        self.documents.insert(item.uri.clone(), doc);
        // Opening analyzes immediately; the debounce only gates edits.
        self.run_analysis(&item.uri).into_iter().collect()
    }

    fn handle_did_change(&mut self, params: DidChangeParams) -> Vec<OutboundMessage> {
        let uri = params.text_document.uri;
        let now = Instant::now();
        let Some(doc) = self.documents.get_mut(&uri) else {
            return Vec::new();
        };
        if let Some(change) = params.content_changes.last() {
            doc.text = change.text.clone();
        }
        doc.version = params.text_document.version;
        doc.needs_analysis = true;
        doc.last_change = Some(now);
        self.last_change = Some(now);

        // An edit in an included file invalidates its analysis root too.
        let root_uri = self.graph.select_root(&uri, &self.workspace.main_candidates);
        if root_uri != uri {
            if let Some(root_doc) = self.documents.get_mut(&root_uri) {
                root_doc.needs_analysis = true;
                root_doc.last_change = Some(now);
            }
        }

        // Cheap synchronous re-parse so outline and completion stay fresh
        // while the full analysis waits for the quiet window.
        let Some(doc) = self.documents.get(&uri) else {
            return Vec::new();
        };
        let text = doc.text.clone();
        let doc_path = doc.path.clone().unwrap_or_default();
        let include_paths: Vec<PathBuf> = doc_path
            .parent()
            .map(|dir| vec![dir.to_path_buf()])
            .unwrap_or_default();
        let symbols = extract_symbols_from_text(
            &text,
            &doc_path,
            &include_paths,
            &uri,
            &mut self.parse_cache,
            &mut self.graph,
        );
        if let Some(doc) = self.documents.get_mut(&uri) {
            doc.symbols = symbols;
        }
        Vec::new()
    }

    fn handle_did_close(&mut self, params: DocumentParams) -> Vec<OutboundMessage> {
        let uri = params.text_document.uri;
        let Some(mut doc) = self.documents.remove(&uri) else {
            return Vec::new();
        };
        // Final empty publish clears client-side diagnostics.
        doc.diagnostics.clear();
        vec![OutboundMessage::Notification {
            method: "textDocument/publishDiagnostics".to_string(),
            params: publish_params(&doc),
        }]
    }

    fn handle_references(&self, params: &ReferenceParams) -> Value {
        let Some(doc) = self.documents.get(&params.text_document.uri) else {
            return json!([]);
        };
        let Some(token) =
            extract_token_at(&doc.text, params.position.line, params.position.character)
        else {
            return json!([]);
        };
        let declaration = doc
            .symbols
            .iter()
            .find(|symbol| symbol.name == token)
            .map(|symbol| (doc.uri.as_str(), symbol.line, symbol.column));
        reference_locations(
            &self.workspace,
            &self.documents,
            &token,
            declaration,
            params.context.include_declaration,
        )
    }

    fn handle_rename(&self, params: &RenameParams) -> Value {
        let Some(doc) = self.documents.get(&params.text_document.uri) else {
            return Value::Null;
        };
        let Some(token) =
            extract_token_at(&doc.text, params.position.line, params.position.character)
        else {
            return Value::Null;
        };
        rename_edits(&self.workspace, &self.documents, &token, &params.new_name)
            .unwrap_or(Value::Null)
    }

    fn handle_execute_command(&self, params: &ExecuteCommandParams) -> Value {
        if params.command != WRITTEN_BLOCKS_COMMAND {
            return Value::Null;
        }
        let mut seen = std::collections::HashSet::new();
        let mut blocks = Vec::new();
        let mut uris: Vec<&String> = self.documents.keys().collect();
        uris.sort();
        for uri in uris {
            for block in &self.documents[uri].written_blocks {
                let key = (block.snes_offset, block.pc_offset, block.num_bytes);
                if !seen.insert(key) {
                    continue;
                }
                blocks.push(json!({
                    "snes": block.snes_offset,
                    "pc": block.pc_offset,
                    "size": block.num_bytes,
                }));
            }
        }
        Value::Array(blocks)
    }

    /// The opportunistic debounce check: run every flagged document's
    /// analysis once the quiet window has passed.
    pub fn tick(&mut self) -> Vec<OutboundMessage> {
        let Some(last_change) = self.last_change else {
            return Vec::new();
        };
        if last_change.elapsed() <= self.debounce {
            return Vec::new();
        }
        let pending: Vec<String> = self
            .documents
            .iter()
            .filter(|(_, doc)| doc.needs_analysis)
            .map(|(uri, _)| uri.clone())
            .collect();
        let mut out = Vec::new();
        let mut sorted = pending;
        sorted.sort();
        for uri in sorted {
            out.extend(self.run_analysis(&uri));
        }
        out
    }

    fn run_analysis(&mut self, uri: &str) -> Option<OutboundMessage> {
        let doc = self.documents.get(uri)?.clone();
        let mut ctx = AnalysisContext {
            workspace: &self.workspace,
            open_documents: &self.documents,
            graph: &mut self.graph,
            parse_cache: &mut self.parse_cache,
            rom_cache: &mut self.rom_cache,
            engine: self.engine.as_ref(),
            log: &self.log,
        };
        let updated = analyze_document(&doc, &mut ctx);
        let params = publish_params(&updated);
        self.documents.insert(uri.to_string(), updated);
        Some(OutboundMessage::Notification {
            method: "textDocument/publishDiagnostics".to_string(),
            params,
        })
    }
}

pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let raw = uri.strip_prefix("file://")?;
    let decoded = percent_decode(raw);
    if decoded.is_empty() {
        None
    } else {
        Some(PathBuf::from(decoded))
    }
}

pub fn path_to_file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("file://{}", percent_encode(raw.as_ref()))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = bytes[i + 1] as char;
            let lo = bytes[i + 2] as char;
            if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                let hex = format!("{hi}{lo}");
                if let Ok(value) = u8::from_str_radix(&hex, 16) {
                    out.push(value as char);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn percent_encode(input: &str) -> String {
    let mut out = String::new();
    for b in input.bytes() {
        let c = b as char;
        if c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~' | ':') {
            out.push(c);
        } else {
            out.push('%');
            out.push_str(&format!("{b:02X}"));
        }
    }
    out
}

pub fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '!' | '@' | '$')
}

fn line_bounds(text: &str, line: u32) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut current = 0u32;
    let mut offset = 0usize;
    while offset < bytes.len() && current < line {
        if bytes[offset] == b'\n' {
            current += 1;
        }
        offset += 1;
    }
    if current != line {
        return None;
    }
    let end = text[offset..]
        .find('\n')
        .map(|idx| offset + idx)
        .unwrap_or(text.len());
    Some((offset, end))
}

/// The symbol token under the cursor, if any.
pub fn extract_token_at(text: &str, line: u32, character: u32) -> Option<String> {
    let (line_start, line_end) = line_bounds(text, line)?;
    let pos = line_start + character as usize;
    if pos > line_end || pos >= text.len() {
        return None;
    }
    let bytes = text.as_bytes();
    let mut left = pos;
    while left > line_start && is_symbol_char(bytes[left - 1] as char) {
        left -= 1;
    }
    let mut right = pos;
    while right < line_end && is_symbol_char(bytes[right] as char) {
        right += 1;
    }
    if left == right {
        return None;
    }
    Some(text[left..right].to_string())
}

/// The symbol characters immediately before the cursor.
pub fn extract_token_prefix(text: &str, line: u32, character: u32) -> Option<String> {
    let (line_start, line_end) = line_bounds(text, line)?;
    let pos = (line_start + character as usize).min(line_end);
    let bytes = text.as_bytes();
    let mut left = pos;
    while left > line_start && is_symbol_char(bytes[left - 1] as char) {
        left -= 1;
    }
    if left == pos {
        return None;
    }
    Some(text[left..pos].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembler::{
        AssembleOptions, AssembleResult, Diagnostic, Label, Severity,
    };

    struct FakeEngine {
        result: AssembleResult,
    }

    impl AssemblerEngine for FakeEngine {
        fn assemble(&self, _options: &AssembleOptions) -> AssembleResult {
            self.result.clone()
        }
    }

    fn engine_with_error() -> Box<FakeEngine> {
        let mut diag = Diagnostic::new(Severity::Error, "Label 'Gone' wasn't found.".to_string());
        diag.line = 2;
        Box::new(FakeEngine {
            result: AssembleResult {
                success: false,
                diagnostics: vec![diag],
                labels: vec![Label {
                    name: "Start".to_string(),
                    address: 0x8000,
                }],
                ..AssembleResult::default()
            },
        })
    }

    #[test]
    fn file_uri_round_trip() {
        let path = PathBuf::from("/tmp/snesforge test.asm");
        let uri = path_to_file_uri(&path);
        assert_eq!(uri_to_path(&uri), Some(path));
    }

    #[test]
    fn token_extraction_handles_edges() {
        let text = "    jsr Spawn_Item\n";
        assert_eq!(
            extract_token_at(text, 0, 10),
            Some("Spawn_Item".to_string())
        );
        assert_eq!(extract_token_at(text, 0, 2), None);
        assert_eq!(extract_token_at(text, 5, 0), None);
        assert_eq!(extract_token_prefix(text, 0, 10), Some("Sp".to_string()));
        assert_eq!(extract_token_prefix(text, 0, 8), None);
    }

    #[test]
    fn initialize_reports_core_capabilities() {
        let mut session = LspSession::with_engine(engine_with_error());
        let out = session.handle_message(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {},
        }));
        let OutboundMessage::Response { result, .. } = &out[0] else {
            panic!("expected response");
        };
        let caps = &result["capabilities"];
        assert!(caps["hoverProvider"].as_bool().unwrap_or(false));
        assert!(caps["definitionProvider"].as_bool().unwrap_or(false));
        assert!(caps["semanticTokensProvider"]["full"]
            .as_bool()
            .unwrap_or(false));
        assert_eq!(
            caps["executeCommandProvider"]["commands"][0],
            WRITTEN_BLOCKS_COMMAND
        );
    }

    #[test]
    fn did_open_publishes_engine_diagnostics_immediately() {
        let mut session = LspSession::with_engine(engine_with_error());
        let out = session.handle_message(&json!({
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {
                    "uri": "file:///virtual/main.asm",
                    "version": 1,
                    "text": "Start:\n    jsr Gone\n",
                },
            },
        }));
        let publish = out
            .iter()
            .find_map(|msg| match msg {
                OutboundMessage::Notification { method, params }
                    if method == "textDocument/publishDiagnostics" =>
                {
                    Some(params.clone())
                }
                _ => None,
            })
            .expect("publish notification");
        assert_eq!(publish["uri"], "file:///virtual/main.asm");
        let diags = publish["diagnostics"].as_array().expect("array");
        assert_eq!(diags.len(), 1);
        assert!(diags[0]["message"]
            .as_str()
            .expect("message")
            .contains("Gone"));
    }

    #[test]
    fn edits_wait_for_the_quiet_window() {
        let mut session = LspSession::with_engine(engine_with_error());
        let _ = session.handle_message(&json!({
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {"uri": "file:///virtual/a.asm", "version": 1, "text": "Start:\n"},
            },
        }));
        session.debounce = Duration::from_millis(20);

        let out = session.handle_message(&json!({
            "method": "textDocument/didChange",
            "params": {
                "textDocument": {"uri": "file:///virtual/a.asm", "version": 2},
                "contentChanges": [{"text": "Start:\n    nop\n"}],
            },
        }));
        // Within the window: symbols refresh, no publish yet.
        assert!(out.is_empty());
        assert!(session.documents["file:///virtual/a.asm"].needs_analysis);

        std::thread::sleep(Duration::from_millis(30));
        let out = session.tick();
        assert_eq!(out.len(), 1);
        assert!(!session.documents["file:///virtual/a.asm"].needs_analysis);

        // A second tick with no further edits republishes nothing.
        assert!(session.tick().is_empty());
    }

    #[test]
    fn label_suppression_applies_through_the_session() {
        // The engine reports a missing label that the edited buffer
        // actually defines under its flattened spelling.
        let mut session = LspSession::with_engine(engine_with_error());
        let out = session.handle_message(&json!({
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {
                    "uri": "file:///virtual/b.asm",
                    "version": 1,
                    "text": "namespace ns\nGone:\n",
                },
            },
        }));
        let publish = out
            .iter()
            .find_map(|msg| match msg {
                OutboundMessage::Notification { params, .. } => Some(params.clone()),
                _ => None,
            })
            .expect("publish");
        // "ns_Gone" is known; the underscore rule maps "Gone" onto it...
        // but suppression needs the *missing* name to resolve, so the
        // diagnostic stays. Open a buffer that defines "Gone" directly.
        assert_eq!(publish["diagnostics"].as_array().expect("array").len(), 1);

        let out = session.handle_message(&json!({
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {
                    "uri": "file:///virtual/c.asm",
                    "version": 1,
                    "text": "Gone:\n",
                },
            },
        }));
        let publish = out
            .iter()
            .find_map(|msg| match msg {
                OutboundMessage::Notification { params, .. } => Some(params.clone()),
                _ => None,
            })
            .expect("publish");
        assert!(publish["diagnostics"]
            .as_array()
            .expect("array")
            .is_empty());
    }

    #[test]
    fn unknown_requests_answer_null() {
        let mut session = LspSession::with_engine(engine_with_error());
        let out = session.handle_message(&json!({
            "id": 9,
            "method": "textDocument/typeDefinition",
            "params": {},
        }));
        let OutboundMessage::Response { result, .. } = &out[0] else {
            panic!("expected response");
        };
        assert!(result.is_null());
    }

    #[test]
    fn did_close_clears_diagnostics() {
        let mut session = LspSession::with_engine(engine_with_error());
        let _ = session.handle_message(&json!({
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {"uri": "file:///virtual/d.asm", "version": 1, "text": "X:\n"},
            },
        }));
        let out = session.handle_message(&json!({
            "method": "textDocument/didClose",
            "params": {"textDocument": {"uri": "file:///virtual/d.asm"}},
        }));
        let OutboundMessage::Notification { params, .. } = &out[0] else {
            panic!("expected notification");
        };
        assert!(params["diagnostics"].as_array().expect("array").is_empty());
        assert!(!session.documents.contains_key("file:///virtual/d.asm"));
    }

    #[test]
    fn shutdown_then_exit_stops_the_session() {
        let mut session = LspSession::with_engine(engine_with_error());
        let _ = session.handle_message(&json!({"id": 1, "method": "shutdown"}));
        assert!(!session.should_exit());
        let _ = session.handle_message(&json!({"method": "exit"}));
        assert!(session.should_exit());
    }
}
