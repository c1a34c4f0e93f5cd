// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The per-document analysis pass.
//!
//! Runs synchronously on the session loop once the debounce window has
//! passed: root selection, overlay assembly through the external engine,
//! the width lint, diagnostic filtering, and the two documented
//! suppression heuristics. Failure of the external assembler is the
//! expected path, not an exceptional one; its diagnostics are the product.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::assembler::{AssembleOptions, AssemblerEngine, Diagnostic, MemoryFile};
use crate::core::config::{load_config_if_exists, Config, CONFIG_FILE_NAME};
use crate::m65816::lint::{run_lint, LintOptions};
use crate::lsp::document::DocumentState;
use crate::lsp::logging::DiagLog;
use crate::lsp::parse::{
    extract_symbols_from_text, normalize_path, parse_incdir_directive, parse_include_directive,
    resolve_incdir_path, resolve_include_path, strip_asm_comment, ParseCache,
};
use crate::lsp::project_graph::ProjectGraph;
use crate::lsp::session::uri_to_path;
use crate::lsp::workspace::{resolve_config_path, resolve_include_paths, WorkspaceState};

/// Mtime-gated cache of baseline ROM images.
#[derive(Debug, Default)]
pub struct RomCache {
    entries: HashMap<PathBuf, (SystemTime, Vec<u8>)>,
}

impl RomCache {
    pub fn load(&mut self, path: &Path) -> Option<Vec<u8>> {
        let normalized = normalize_path(path);
        let mtime = fs::metadata(&normalized)
            .and_then(|meta| meta.modified())
            .ok()?;
        if let Some((cached_mtime, data)) = self.entries.get(&normalized) {
            if *cached_mtime == mtime {
                return Some(data.clone());
            }
        }
        let data = fs::read(&normalized).ok()?;
        if data.is_empty() {
            return None;
        }
        self.entries.insert(normalized, (mtime, data.clone()));
        Some(data)
    }
}

/// Ordered filename-matching strategies for an external tool that reports
/// paths inconsistently: absolute, root-relative, workspace-relative, then
/// path-suffix. First success wins.
pub fn path_matches_document(
    candidate: &str,
    doc_path: &Path,
    analysis_root_dir: &Path,
    workspace_root: &Path,
) -> bool {
    if candidate.is_empty() {
        return false;
    }
    let doc_norm = normalize_path(doc_path);
    let diag_path = PathBuf::from(candidate);
    if diag_path.is_absolute() {
        return normalize_path(&diag_path) == doc_norm;
    }
    if !analysis_root_dir.as_os_str().is_empty()
        && normalize_path(&analysis_root_dir.join(&diag_path)) == doc_norm
    {
        return true;
    }
    if !workspace_root.as_os_str().is_empty()
        && normalize_path(&workspace_root.join(&diag_path)) == doc_norm
    {
        return true;
    }
    ends_with_path(&doc_norm, &diag_path)
}

fn ends_with_path(full: &Path, suffix: &Path) -> bool {
    let full_str = full.to_string_lossy();
    let suffix_str = suffix.to_string_lossy();
    if suffix_str.is_empty() {
        return false;
    }
    if *full_str == *suffix_str {
        return true;
    }
    full_str
        .strip_suffix(suffix_str.as_ref())
        .is_some_and(|head| head.ends_with('/'))
}

/// A diagnostic without a filename belongs to the analysis root only.
pub fn diagnostic_matches_document(
    diag: &Diagnostic,
    doc_path: &Path,
    analysis_root_dir: &Path,
    workspace_root: &Path,
    doc_is_root: bool,
) -> bool {
    match &diag.filename {
        None => doc_is_root,
        Some(name) if name.is_empty() => doc_is_root,
        Some(name) => path_matches_document(name, doc_path, analysis_root_dir, workspace_root),
    }
}

/// Pull the symbol name out of a "Label 'X' wasn't found" style message.
pub fn extract_missing_label(message: &str) -> Option<String> {
    if let Some(start) = message.find("Label '") {
        let rest = &message[start + 7..];
        if let Some(end) = rest.find('\'') {
            if end > 0 {
                return Some(rest[..end].to_string());
            }
        }
    }
    if let Some(start) = message.find("Label ") {
        let rest = &message[start + 6..];
        if let Some(end) = rest.find(' ') {
            if end > 0 {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

fn directive_with_boundary(lower: &str, keyword: &str) -> bool {
    if !lower.starts_with(keyword) {
        return false;
    }
    match lower.as_bytes().get(keyword.len()) {
        None => true,
        Some(&next) => next.is_ascii_whitespace() || next == b'(',
    }
}

fn is_org_directive(trimmed: &str) -> bool {
    let lower = trimmed.to_ascii_lowercase();
    directive_with_boundary(&lower, "org")
        || directive_with_boundary(&lower, "freespace")
        || directive_with_boundary(&lower, "freecode")
        || directive_with_boundary(&lower, "freedata")
}

fn is_pushpc_directive(trimmed: &str) -> bool {
    directive_with_boundary(&trimmed.to_ascii_lowercase(), "pushpc")
}

fn is_pullpc_directive(trimmed: &str) -> bool {
    directive_with_boundary(&trimmed.to_ascii_lowercase(), "pullpc")
}

pub fn contains_org_directive(text: &str) -> bool {
    text.split('\n')
        .any(|line| is_org_directive(strip_asm_comment(line).trim()))
}

/// Scan a parent file for an include of `child_path` and report whether an
/// org/freespace context was live at that point. `pushpc` saves the
/// context, `pullpc` restores it.
pub fn parent_includes_child_after_org(
    parent_path: &Path,
    child_path: &Path,
    include_paths: &[PathBuf],
) -> bool {
    let Ok(text) = fs::read_to_string(parent_path) else {
        return false;
    };
    let base_dir = parent_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let child_norm = normalize_path(child_path);
    let mut current_paths = include_paths.to_vec();
    let mut org_mode = false;
    let mut org_stack: Vec<bool> = Vec::new();

    for line in text.split('\n') {
        let trimmed = strip_asm_comment(line).trim().to_string();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(raw) = parse_incdir_directive(&trimmed) {
            if let Some(resolved) = resolve_incdir_path(&raw, &base_dir) {
                if !current_paths.contains(&resolved) {
                    current_paths.push(resolved);
                }
            }
            continue;
        }
        if is_pushpc_directive(&trimmed) {
            org_stack.push(org_mode);
            continue;
        }
        if is_pullpc_directive(&trimmed) {
            if let Some(saved) = org_stack.pop() {
                org_mode = saved;
            }
            continue;
        }
        if is_org_directive(&trimmed) {
            org_mode = true;
        }
        if let Some(raw) = parse_include_directive(&trimmed) {
            if let Some(resolved) = resolve_include_path(&raw, &base_dir, &current_paths) {
                let absolute = match resolved.canonicalize() {
                    Ok(path) => path,
                    Err(_) => normalize_path(&resolved),
                };
                if absolute == child_norm || normalize_path(&resolved) == child_norm {
                    return org_mode;
                }
            }
        }
    }
    false
}

fn should_suppress_missing_label(
    diag: &Diagnostic,
    known_symbols: &HashSet<String>,
    alias_prefixes: &[String],
) -> bool {
    if !diag.message.contains("Label") || !diag.message.contains("wasn't found") {
        return false;
    }
    let Some(missing) = extract_missing_label(&diag.message) else {
        return false;
    };
    if known_symbols.contains(&missing) {
        return true;
    }
    // Configured naming-convention affixes: the assembler cannot see
    // cross-file namespace flattening, so `name` may exist as
    // `<prefix>name` and vice versa.
    for prefix in alias_prefixes {
        if prefix.is_empty() {
            continue;
        }
        match missing.strip_prefix(prefix.as_str()) {
            Some(suffix) => {
                if !suffix.is_empty() && known_symbols.contains(suffix) {
                    return true;
                }
            }
            None => {
                if known_symbols.contains(&format!("{prefix}{missing}")) {
                    return true;
                }
            }
        }
    }
    // Generic rule: this parser flattens `ns name` to `ns_name`, so the
    // text after the first underscore may be the spelling in use.
    if let Some((_, suffix)) = missing.split_once('_') {
        if !suffix.is_empty() && known_symbols.contains(suffix) {
            return true;
        }
    }
    false
}

pub struct AnalysisContext<'a> {
    pub workspace: &'a WorkspaceState,
    pub open_documents: &'a HashMap<String, DocumentState>,
    pub graph: &'a mut ProjectGraph,
    pub parse_cache: &'a mut ParseCache,
    pub rom_cache: &'a mut RomCache,
    pub engine: &'a dyn AssemblerEngine,
    pub log: &'a DiagLog,
}

/// Analyze one document and return its updated state. Never panics on
/// missing files or a failing assembler; prior good state degrades to
/// empty fields instead.
pub fn analyze_document(doc: &DocumentState, ctx: &mut AnalysisContext) -> DocumentState {
    let mut updated = doc.clone();
    let workspace_root = ctx
        .workspace
        .root
        .clone()
        .unwrap_or_default();

    let doc_path = doc.path.clone().unwrap_or_default();
    let (config, config_dir) = resolve_effective_config(ctx.workspace, &doc_path);

    let root_uri = ctx
        .graph
        .select_root(&doc.uri, &ctx.workspace.main_candidates);
    let mut analysis_root_path = doc_path.clone();
    if !root_uri.is_empty() {
        if let Some(candidate) = uri_to_path(&root_uri) {
            if candidate.exists() {
                analysis_root_path = candidate;
            }
        }
    }
    let analysis_root_dir = analysis_root_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let doc_is_root = !doc_path.as_os_str().is_empty()
        && normalize_path(&analysis_root_path) == normalize_path(&doc_path);

    let mut include_paths = resolve_include_paths(&config, &config_dir);
    if !analysis_root_dir.as_os_str().is_empty() && !include_paths.contains(&analysis_root_dir) {
        include_paths.push(analysis_root_dir.clone());
    }
    let include_paths_for_parent_check = include_paths.clone();
    let mut include_paths_for_index = include_paths.clone();
    if let Some(doc_dir) = doc_path.parent() {
        let doc_dir = doc_dir.to_path_buf();
        if !doc_dir.as_os_str().is_empty() && !include_paths_for_index.contains(&doc_dir) {
            include_paths_for_index.push(doc_dir);
        }
    }

    let doc_symbols = extract_symbols_from_text(
        &doc.text,
        &doc_path,
        &include_paths_for_index,
        &doc.uri,
        ctx.parse_cache,
        ctx.graph,
    );
    let mut known_symbols = ctx.workspace.symbol_names.clone();
    for symbol in &doc_symbols {
        known_symbols.insert(symbol.name.clone());
    }

    if ctx.workspace.is_git_ignored(&doc_path) {
        updated.symbols = doc_symbols;
        updated.diagnostics.clear();
        updated.labels.clear();
        updated.defines.clear();
        updated.source_map = Default::default();
        updated.written_blocks.clear();
        updated.build_lookup_maps();
        updated.needs_analysis = false;
        return updated;
    }

    let mut options = AssembleOptions {
        patch_path: if analysis_root_path.as_os_str().is_empty() {
            doc_path.clone()
        } else {
            analysis_root_path.clone()
        },
        include_paths,
        ..AssembleOptions::default()
    };
    for define in &config.defines {
        match define.split_once('=') {
            Some((name, value)) => options
                .defines
                .push((name.to_string(), value.to_string())),
            None => options.defines.push((define.clone(), String::new())),
        }
    }
    if let Some(mapper) = &config.mapper {
        options
            .defines
            .push(("snesforge_mapper".to_string(), mapper.clone()));
    }
    options.std_includes_path = config.std_includes_path.as_ref().map(PathBuf::from);
    options.std_defines_path = config.std_defines_path.as_ref().map(PathBuf::from);
    if let Some(rom) = &config.rom_path {
        if let Some(resolved) = resolve_config_path(rom, &config_dir, &workspace_root) {
            if let Some(data) = ctx.rom_cache.load(&resolved) {
                options.rom_data = data;
            } else {
                ctx.log
                    .log(&format!("rom not readable: {}", resolved.display()));
            }
        }
    }
    if options.rom_data.is_empty() {
        if let Some(size) = config.rom_size {
            if size > 0 {
                options.rom_data = vec![0; size as usize];
            }
        }
    }

    // Overlay every open document so multi-file edits are visible to the
    // assembler without saving; the edited buffer always wins.
    let mut overlay: HashMap<PathBuf, String> = HashMap::new();
    for open in ctx.open_documents.values() {
        if let Some(path) = &open.path {
            overlay.insert(path.clone(), open.text.clone());
        }
    }
    if !doc_path.as_os_str().is_empty() {
        overlay.insert(doc_path.clone(), doc.text.clone());
    }
    let mut overlay: Vec<(PathBuf, String)> = overlay.into_iter().collect();
    overlay.sort_by(|a, b| a.0.cmp(&b.0));
    options.memory_files = overlay
        .into_iter()
        .map(|(path, contents)| MemoryFile { path, contents })
        .collect();

    let result = ctx.engine.assemble(&options);

    let lint_options = LintOptions {
        default_m_width_bytes: config.default_m_width.unwrap_or(1),
        default_x_width_bytes: config.default_x_width.unwrap_or(1),
        warn_unknown_width: config.warn_unknown_width.unwrap_or(false),
        warn_branch_outside_bank: config.warn_branch_outside_bank.unwrap_or(false),
        warn_org_collision: config.warn_org_collision.unwrap_or(true),
    };
    let lint_result = run_lint(&result, &lint_options);

    let matches_doc = |diag: &Diagnostic| {
        diagnostic_matches_document(
            diag,
            &doc_path,
            &analysis_root_dir,
            &workspace_root,
            doc_is_root,
        )
    };
    let mut diagnostics: Vec<Diagnostic> = result
        .diagnostics
        .iter()
        .filter(|diag| matches_doc(diag))
        .cloned()
        .collect();
    diagnostics.extend(
        lint_result
            .diagnostics
            .iter()
            .filter(|diag| matches_doc(diag))
            .cloned(),
    );

    if !known_symbols.is_empty() {
        diagnostics.retain(|diag| {
            !should_suppress_missing_label(diag, &known_symbols, &config.label_alias_prefixes)
        });
    }

    // Missing-org suppression: an include file with no org context of its
    // own is clean when some parent establishes one before including it.
    if !doc_is_root && !contains_org_directive(&doc.text) {
        let parents = ctx.graph.parents(&doc.uri);
        let suppress = parents.iter().any(|parent_uri| {
            uri_to_path(parent_uri)
                .filter(|path| path.exists())
                .map(|path| {
                    parent_includes_child_after_org(
                        &path,
                        &doc_path,
                        &include_paths_for_parent_check,
                    )
                })
                .unwrap_or(false)
        });
        if suppress {
            diagnostics
                .retain(|diag| !diag.message.contains("Missing org or freespace command"));
        }
    }

    updated.diagnostics = diagnostics;
    updated.labels = result.labels;
    updated.defines = result.defines;
    updated.source_map = result.source_map;
    updated.written_blocks = result.written_blocks;
    updated.symbols = doc_symbols;
    updated.build_lookup_maps();
    updated.needs_analysis = false;
    updated
}

fn resolve_effective_config(workspace: &WorkspaceState, doc_path: &Path) -> (Config, PathBuf) {
    if let Some(config) = &workspace.config {
        let dir = workspace
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        return (config.clone(), dir);
    }
    if let Some(doc_dir) = doc_path.parent() {
        let local = doc_dir.join(CONFIG_FILE_NAME);
        if local.is_file() {
            if let Some(config) = load_config_if_exists(&local) {
                return (config, doc_dir.to_path_buf());
            }
        }
    }
    (Config::default(), PathBuf::new())
}
