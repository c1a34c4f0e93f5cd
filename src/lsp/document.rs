// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-document state owned by the analysis pipeline.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::core::assembler::{Define, Diagnostic, Label, WrittenBlock};
use crate::core::source_map::SourceMap;
use crate::lsp::parse::SymbolEntry;

/// One open document. `text` is the in-memory buffer and is authoritative
/// over whatever is on disk while the document stays open.
#[derive(Debug, Clone)]
pub struct DocumentState {
    pub uri: String,
    pub path: Option<PathBuf>,
    pub version: i64,
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
    pub labels: Vec<Label>,
    pub defines: Vec<Define>,
    pub symbols: Vec<SymbolEntry>,
    pub source_map: SourceMap,
    pub written_blocks: Vec<WrittenBlock>,
    label_index: HashMap<String, usize>,
    define_index: HashMap<String, usize>,
    address_labels: HashMap<u32, String>,
    pub needs_analysis: bool,
    pub last_change: Option<Instant>,
}

impl DocumentState {
    pub fn new(uri: String, path: Option<PathBuf>, version: i64, text: String) -> Self {
        Self {
            uri,
            path,
            version,
            text,
            diagnostics: Vec::new(),
            labels: Vec::new(),
            defines: Vec::new(),
            symbols: Vec::new(),
            source_map: SourceMap::default(),
            written_blocks: Vec::new(),
            label_index: HashMap::new(),
            define_index: HashMap::new(),
            address_labels: HashMap::new(),
            needs_analysis: false,
            last_change: None,
        }
    }

    /// Rebuild the O(1) lookup maps from the label/define vectors.
    pub fn build_lookup_maps(&mut self) {
        self.label_index.clear();
        self.define_index.clear();
        self.address_labels.clear();
        for (idx, label) in self.labels.iter().enumerate() {
            self.label_index.insert(label.name.clone(), idx);
            self.address_labels
                .entry(label.address)
                .or_insert_with(|| label.name.clone());
        }
        for (idx, define) in self.defines.iter().enumerate() {
            self.define_index.insert(define.name.clone(), idx);
        }
    }

    pub fn label(&self, name: &str) -> Option<&Label> {
        self.label_index.get(name).map(|&idx| &self.labels[idx])
    }

    pub fn define(&self, name: &str) -> Option<&Define> {
        self.define_index.get(name).map(|&idx| &self.defines[idx])
    }

    pub fn label_for_address(&self, address: u32) -> Option<&str> {
        self.address_labels.get(&address).map(String::as_str)
    }

    /// Line text by 0-based index.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.text.split('\n').nth(index)
    }
}
