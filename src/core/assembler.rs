// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Interface to the external patching assembler.
//!
//! The assembler itself is an external tool; this module owns the data
//! model it exchanges and a bridge that shells the tool out and parses its
//! JSON report. Everything downstream (lint, analysis, the LSP) talks to
//! the [`AssemblerEngine`] trait so tests can substitute a fake.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use crate::core::source_map::{SourceFile, SourceMap, SourceMapEntry};

/// Diagnostic severity. Lint warnings are advisory; assembler errors are
/// fatal to producing a ROM but not to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One diagnostic, from the external assembler or the linter. Immutable
/// once created. Lines and columns are 1-based; 0 means "no location".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub filename: Option<String>,
    pub line: u32,
    pub column: u32,
    pub raw: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: String) -> Self {
        Self {
            severity,
            message,
            filename: None,
            line: 0,
            column: 0,
            raw: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub address: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: String,
}

/// One contiguous region the assembler wrote into the ROM image. The
/// linter scans exactly these ranges and never guesses code boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrittenBlock {
    pub pc_offset: usize,
    pub snes_offset: u32,
    pub num_bytes: usize,
}

/// In-memory overlay file, authoritative over its on-disk counterpart.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    pub patch_path: PathBuf,
    pub rom_data: Vec<u8>,
    pub include_paths: Vec<PathBuf>,
    pub defines: Vec<(String, String)>,
    pub std_includes_path: Option<PathBuf>,
    pub std_defines_path: Option<PathBuf>,
    pub memory_files: Vec<MemoryFile>,
}

#[derive(Debug, Clone, Default)]
pub struct AssembleResult {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub labels: Vec<Label>,
    pub defines: Vec<Define>,
    pub written_blocks: Vec<WrittenBlock>,
    pub rom_data: Vec<u8>,
    pub source_map: SourceMap,
}

/// The seam between this crate and the external assembler.
pub trait AssemblerEngine {
    fn assemble(&self, options: &AssembleOptions) -> AssembleResult;
}

/// Bridge that invokes the external assembler binary. The request goes to
/// the tool as one JSON document on stdin, the report comes back as one
/// JSON document on stdout; ROM bytes travel through temp files.
#[derive(Debug, Clone)]
pub struct CliAssembler {
    program: PathBuf,
}

pub const DEFAULT_ASSEMBLER_PROGRAM: &str = "snesforge-asm";

impl CliAssembler {
    pub fn new(program: Option<PathBuf>) -> Self {
        Self {
            program: program.unwrap_or_else(|| PathBuf::from(DEFAULT_ASSEMBLER_PROGRAM)),
        }
    }

    fn build_request(options: &AssembleOptions, rom_in: &Path, rom_out: &Path) -> Value {
        json!({
            "patch": options.patch_path,
            "includePaths": options.include_paths,
            "defines": options
                .defines
                .iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect::<Vec<Value>>(),
            "stdIncludes": options.std_includes_path,
            "stdDefines": options.std_defines_path,
            "romIn": if options.rom_data.is_empty() { Value::Null } else { json!(rom_in) },
            "romOut": rom_out,
            "files": options
                .memory_files
                .iter()
                .map(|file| json!({"path": file.path, "text": file.contents}))
                .collect::<Vec<Value>>(),
        })
    }
}

impl AssemblerEngine for CliAssembler {
    fn assemble(&self, options: &AssembleOptions) -> AssembleResult {
        use std::io::Write;

        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or_default();
        let work_dir = std::env::temp_dir().join(format!("snesforge-asm-{unique}"));
        if fs::create_dir_all(&work_dir).is_err() {
            return AssembleResult::default();
        }
        let rom_in = work_dir.join("rom.in");
        let rom_out = work_dir.join("rom.out");
        if !options.rom_data.is_empty() && fs::write(&rom_in, &options.rom_data).is_err() {
            let _ = fs::remove_dir_all(&work_dir);
            return AssembleResult::default();
        }

        let request = Self::build_request(options, &rom_in, &rom_out);
        let spawned = Command::new(&self.program)
            .arg("--format")
            .arg("json")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(_) => {
                let _ = fs::remove_dir_all(&work_dir);
                return AssembleResult::default();
            }
        };
        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            let _ = stdin.write_all(request.to_string().as_bytes());
        }
        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(_) => {
                let _ = fs::remove_dir_all(&work_dir);
                return AssembleResult::default();
            }
        };

        let mut result = parse_report(&String::from_utf8_lossy(&output.stdout));
        if let Ok(rom) = fs::read(&rom_out) {
            result.rom_data = rom;
        }
        let _ = fs::remove_dir_all(&work_dir);
        result
    }
}

/// Parse the tool's JSON report. Unknown fields are ignored; a report that
/// does not parse yields the empty (failed) result rather than an error.
pub fn parse_report(text: &str) -> AssembleResult {
    let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
        return AssembleResult::default();
    };
    let mut result = AssembleResult {
        success: value
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        ..AssembleResult::default()
    };

    if let Some(items) = value.get("diagnostics").and_then(Value::as_array) {
        for item in items {
            let message = item
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if message.is_empty() {
                continue;
            }
            let severity = match item.get("severity").and_then(Value::as_str) {
                Some("warning") => Severity::Warning,
                _ => Severity::Error,
            };
            result.diagnostics.push(Diagnostic {
                severity,
                message,
                filename: item
                    .get("file")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                line: item.get("line").and_then(Value::as_u64).unwrap_or(0) as u32,
                column: item.get("column").and_then(Value::as_u64).unwrap_or(0) as u32,
                raw: item
                    .get("raw")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            });
        }
    }

    if let Some(items) = value.get("labels").and_then(Value::as_array) {
        for item in items {
            let Some(name) = item.get("name").and_then(Value::as_str) else {
                continue;
            };
            result.labels.push(Label {
                name: name.to_string(),
                address: item.get("address").and_then(Value::as_u64).unwrap_or(0) as u32,
            });
        }
    }

    if let Some(items) = value.get("defines").and_then(Value::as_array) {
        for item in items {
            let Some(name) = item.get("name").and_then(Value::as_str) else {
                continue;
            };
            result.defines.push(Define {
                name: name.to_string(),
                value: item
                    .get("value")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }

    if let Some(items) = value.get("writtenBlocks").and_then(Value::as_array) {
        for item in items {
            result.written_blocks.push(WrittenBlock {
                pc_offset: item.get("pc").and_then(Value::as_u64).unwrap_or(0) as usize,
                snes_offset: item.get("snes").and_then(Value::as_u64).unwrap_or(0) as u32,
                num_bytes: item.get("size").and_then(Value::as_u64).unwrap_or(0) as usize,
            });
        }
    }

    if let Some(map) = value.get("sourceMap") {
        if let Some(files) = map.get("files").and_then(Value::as_array) {
            for file in files {
                result.source_map.files.push(SourceFile {
                    id: file.get("id").and_then(Value::as_i64).unwrap_or(0) as i32,
                    crc: file.get("crc").and_then(Value::as_u64).unwrap_or(0) as u32,
                    path: file
                        .get("path")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }
        if let Some(entries) = map.get("entries").and_then(Value::as_array) {
            for entry in entries {
                result.source_map.entries.push(SourceMapEntry {
                    address: entry.get("address").and_then(Value::as_u64).unwrap_or(0) as u32,
                    file_id: entry.get("file").and_then(Value::as_i64).unwrap_or(0) as i32,
                    line: entry.get("line").and_then(Value::as_u64).unwrap_or(0) as u32,
                });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_round_trips_core_fields() {
        let report = json!({
            "success": false,
            "diagnostics": [
                {"severity": "error", "message": "boom", "file": "main.asm", "line": 3, "column": 5},
                {"severity": "warning", "message": "meh"},
            ],
            "labels": [{"name": "Start", "address": 0x8000}],
            "defines": [{"name": "version", "value": "2"}],
            "writtenBlocks": [{"pc": 0, "snes": 0x8000, "size": 16}],
            "sourceMap": {
                "files": [{"id": 0, "crc": 1, "path": "main.asm"}],
                "entries": [{"address": 0x8000, "file": 0, "line": 1}],
            },
        })
        .to_string();
        let result = parse_report(&report);
        assert!(!result.success);
        assert_eq!(result.diagnostics.len(), 2);
        assert_eq!(result.diagnostics[0].severity, Severity::Error);
        assert_eq!(result.diagnostics[0].filename.as_deref(), Some("main.asm"));
        assert_eq!(result.diagnostics[1].line, 0);
        assert_eq!(result.labels[0].address, 0x8000);
        assert_eq!(result.written_blocks[0].num_bytes, 16);
        assert_eq!(result.source_map.entries.len(), 1);
    }

    #[test]
    fn malformed_report_degrades_to_empty_result() {
        let result = parse_report("not json at all");
        assert!(!result.success);
        assert!(result.diagnostics.is_empty());
        assert!(result.rom_data.is_empty());
    }
}
