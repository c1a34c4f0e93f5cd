// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Fast text-level parsing: symbol extraction, include edges, and the
//! mtime-gated per-file parse cache.
//!
//! This is deliberately not the assembler's parser. It runs on every
//! keystroke, so it reads one line at a time and extracts only what the
//! editor features need: labels, defines, macros, struct fields, data
//! symbols, and include/incdir directives. Namespace and struct scoping
//! are best-effort heuristics, not a full symbol table.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::lsp::project_graph::ProjectGraph;
use crate::lsp::session::path_to_file_uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Macro,
    Define,
    Struct,
    StructField,
    Data,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Label => "label",
            SymbolKind::Macro => "macro",
            SymbolKind::Define => "define",
            SymbolKind::Struct => "struct",
            SymbolKind::StructField => "struct-field",
            SymbolKind::Data => "data",
        }
    }

    /// LSP SymbolKind numbers: callables as Function, the rest Constant.
    pub fn lsp_symbol_kind(&self) -> u32 {
        match self {
            SymbolKind::Label | SymbolKind::Macro => 12,
            _ => 21,
        }
    }
}

/// One extracted symbol. Lines and columns are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub line: u32,
    pub column: u32,
    pub uri: String,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    Include,
    Incdir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeEvent {
    pub kind: IncludeKind,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub symbols: Vec<SymbolEntry>,
    pub events: Vec<IncludeEvent>,
}

/// Strip a `;` comment, honoring quoted strings and backslash escapes.
pub fn strip_asm_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in line.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn has_prefix_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn directive_path(rest: &str) -> Option<String> {
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        if end == 0 {
            return None;
        }
        return Some(quoted[..end].to_string());
    }
    let token = rest.split_whitespace().next()?;
    Some(token.to_string())
}

/// `incsrc`/`include` path operand, if this line is an include directive.
pub fn parse_include_directive(trimmed: &str) -> Option<String> {
    let rest = if has_prefix_ignore_case(trimmed, "incsrc") {
        &trimmed[6..]
    } else if has_prefix_ignore_case(trimmed, "include") {
        &trimmed[7..]
    } else {
        return None;
    };
    directive_path(rest)
}

/// `incdir` path operand, if this line extends the include search path.
pub fn parse_incdir_directive(trimmed: &str) -> Option<String> {
    if !has_prefix_ignore_case(trimmed, "incdir") {
        return None;
    }
    directive_path(&trimmed[6..])
}

/// Lexical `..`/`.` normalization; no filesystem access.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn resolve_incdir_path(raw: &str, base_dir: &Path) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    let mut candidate = PathBuf::from(raw);
    if !candidate.is_absolute() {
        if base_dir.as_os_str().is_empty() {
            return None;
        }
        candidate = base_dir.join(candidate);
    }
    let candidate = normalize_path(&candidate);
    candidate.exists().then_some(candidate)
}

/// Resolve an include operand: absolute as-is, else against the base dir,
/// then each configured include path; first hit wins.
pub fn resolve_include_path(
    raw: &str,
    base_dir: &Path,
    include_paths: &[PathBuf],
) -> Option<PathBuf> {
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        return candidate.exists().then_some(candidate);
    }
    if !base_dir.as_os_str().is_empty() {
        let local = base_dir.join(&candidate);
        if local.exists() {
            return Some(local);
        }
    }
    for include in include_paths {
        let path = include.join(&candidate);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Pure text parse: no I/O, no caching. Used for the live edit buffer.
pub fn parse_source(text: &str, uri: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();
    let mut namespace_stack: Vec<String> = Vec::new();
    let mut current_struct = String::new();
    let mut in_struct = false;

    let qualify = |stack: &[String], name: &str| -> String {
        if stack.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", stack.join("_"), name)
        }
    };
    let column_of = |line: &str, needle: &str| -> u32 {
        line.find(needle).unwrap_or(0) as u32
    };

    for (line_number, line) in text.split('\n').enumerate() {
        let line_number = line_number as u32;
        let stripped = strip_asm_comment(line);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(path) = parse_incdir_directive(trimmed) {
            parsed.events.push(IncludeEvent {
                kind: IncludeKind::Incdir,
                path,
            });
            continue;
        }
        if let Some(path) = parse_include_directive(trimmed) {
            parsed.events.push(IncludeEvent {
                kind: IncludeKind::Include,
                path,
            });
            continue;
        }

        if has_prefix_ignore_case(trimmed, "namespace ") {
            let name = trimmed[10..].trim();
            if name.eq_ignore_ascii_case("off") {
                namespace_stack.clear();
            } else if !name.is_empty() {
                namespace_stack.push(name.to_string());
            }
            continue;
        }

        if has_prefix_ignore_case(trimmed, "struct ") {
            let rest = trimmed[7..].trim();
            let name: &str = rest
                .split(|c: char| c.is_whitespace() || c == '{')
                .next()
                .unwrap_or("");
            if !name.is_empty() {
                let full_name = qualify(&namespace_stack, name);
                current_struct = full_name.clone();
                in_struct = true;
                parsed.symbols.push(SymbolEntry {
                    name: full_name,
                    kind: SymbolKind::Struct,
                    line: line_number,
                    column: column_of(line, name),
                    uri: uri.to_string(),
                    parameters: Vec::new(),
                });
            }
            continue;
        }

        if has_prefix_ignore_case(trimmed, "endstruct") {
            current_struct.clear();
            in_struct = false;
            continue;
        }

        if in_struct && !current_struct.is_empty() && trimmed.len() > 1 && trimmed.starts_with('.')
        {
            if let Some(colon) = trimmed.find(':') {
                let field = trimmed[1..colon].trim();
                if !field.is_empty() {
                    parsed.symbols.push(SymbolEntry {
                        name: format!("{current_struct}.{field}"),
                        kind: SymbolKind::StructField,
                        line: line_number,
                        column: column_of(line, field),
                        uri: uri.to_string(),
                        parameters: Vec::new(),
                    });
                    continue;
                }
            }
        }

        if has_prefix_ignore_case(trimmed, "pushns ") {
            let name = trimmed[7..].trim();
            if !name.is_empty() {
                namespace_stack.push(name.to_string());
            }
            continue;
        }

        if has_prefix_ignore_case(trimmed, "popns") {
            namespace_stack.pop();
            continue;
        }

        if has_prefix_ignore_case(trimmed, "macro ") {
            let rest = trimmed[6..].trim();
            let name: &str = rest
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
                .unwrap_or("");
            if !name.is_empty() {
                let parameters = rest
                    .find('(')
                    .and_then(|open| {
                        rest[open + 1..]
                            .find(')')
                            .map(|close| &rest[open + 1..open + 1 + close])
                    })
                    .map(split_macro_params)
                    .unwrap_or_default();
                parsed.symbols.push(SymbolEntry {
                    name: qualify(&namespace_stack, name),
                    kind: SymbolKind::Macro,
                    line: line_number,
                    column: column_of(line, name),
                    uri: uri.to_string(),
                    parameters,
                });
                continue;
            }
        }

        if let Some(rest) = trimmed.strip_prefix('!') {
            let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            let name = &rest[..end];
            if !name.is_empty() {
                // Bang defines opt out of namespace flattening.
                let needle = format!("!{name}");
                parsed.symbols.push(SymbolEntry {
                    name: name.to_string(),
                    kind: SymbolKind::Define,
                    line: line_number,
                    column: column_of(line, &needle) + 1,
                    uri: uri.to_string(),
                    parameters: Vec::new(),
                });
                continue;
            }
        }

        if has_prefix_ignore_case(trimmed, "define ") {
            let rest = trimmed[7..].trim();
            let name: &str = rest.split_whitespace().next().unwrap_or("");
            if !name.is_empty() {
                let full_name = if name.starts_with('.') {
                    name.to_string()
                } else {
                    qualify(&namespace_stack, name)
                };
                parsed.symbols.push(SymbolEntry {
                    name: full_name,
                    kind: SymbolKind::Define,
                    line: line_number,
                    column: column_of(line, name),
                    uri: uri.to_string(),
                    parameters: Vec::new(),
                });
                continue;
            }
        }

        if let Some((left, _)) = trimmed.split_once('=') {
            let mut name = left.trim();
            let has_bang = name.starts_with('!');
            if has_bang {
                name = name[1..].trim();
            }
            if !name.is_empty()
                && name.starts_with(is_ident_start)
                && name.chars().all(is_ident_char)
            {
                let full_name = if has_bang || name.starts_with('.') {
                    name.to_string()
                } else {
                    qualify(&namespace_stack, name)
                };
                parsed.symbols.push(SymbolEntry {
                    name: full_name,
                    kind: SymbolKind::Define,
                    line: line_number,
                    column: column_of(line, name),
                    uri: uri.to_string(),
                    parameters: Vec::new(),
                });
                continue;
            }
        }

        if let Some((token, rest)) = trimmed.split_once(|c: char| c.is_whitespace()) {
            let rest = rest.trim();
            if !token.is_empty()
                && token.starts_with(is_ident_start)
                && token.chars().all(is_ident_char)
                && !rest.is_empty()
                && (has_prefix_ignore_case(rest, "db")
                    || has_prefix_ignore_case(rest, "dw")
                    || has_prefix_ignore_case(rest, "dl"))
            {
                let full_name = if token.starts_with('.') {
                    token.to_string()
                } else {
                    qualify(&namespace_stack, token)
                };
                parsed.symbols.push(SymbolEntry {
                    name: full_name,
                    kind: SymbolKind::Data,
                    line: line_number,
                    column: column_of(line, token),
                    uri: uri.to_string(),
                    parameters: Vec::new(),
                });
                continue;
            }
        }

        let token = trimmed.split_whitespace().next().unwrap_or("");
        if token.len() > 1 && token.ends_with(':') {
            let name = &token[..token.len() - 1];
            if !name.is_empty() {
                // Sub-labels (leading '.') keep their local spelling.
                let full_name = if name.starts_with('.') {
                    name.to_string()
                } else {
                    qualify(&namespace_stack, name)
                };
                parsed.symbols.push(SymbolEntry {
                    name: full_name,
                    kind: SymbolKind::Label,
                    line: line_number,
                    column: column_of(line, name),
                    uri: uri.to_string(),
                    parameters: Vec::new(),
                });
            }
        }
    }

    parsed
}

fn split_macro_params(params: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for c in params.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                let token = current.trim();
                if !token.is_empty() {
                    out.push(token.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let token = current.trim();
    if !token.is_empty() {
        out.push(token.to_string());
    }
    out
}

#[derive(Debug, Clone)]
struct CachedParse {
    mtime: SystemTime,
    parsed: ParsedFile,
}

/// Per-path parse cache gated on file modification time. One entry per
/// path; entries are only ever replaced, never evicted.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: HashMap<PathBuf, CachedParse>,
    pub hits: u64,
    pub misses: u64,
}

impl ParseCache {
    /// Load and parse `path`, or return the cached parse when the mtime is
    /// unchanged (no I/O beyond the timestamp check).
    pub fn load(&mut self, path: &Path) -> Option<ParsedFile> {
        let mtime = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
        let key = path.to_path_buf();
        if let Some(entry) = self.entries.get(&key) {
            if entry.mtime == mtime {
                self.hits += 1;
                return Some(entry.parsed.clone());
            }
        }
        let text = fs::read_to_string(path).ok()?;
        let parsed = parse_source(&text, &path_to_file_uri(path));
        self.misses += 1;
        self.entries.insert(
            key,
            CachedParse {
                mtime,
                parsed: parsed.clone(),
            },
        );
        Some(parsed)
    }
}

/// Hitting either bound truncates traversal: a partial symbol set, never a
/// wrong one.
pub const MAX_INCLUDE_DEPTH: usize = 16;
pub const MAX_VISITED_FILES: usize = 128;

struct WalkItem {
    parsed: ParsedFile,
    base_dir: PathBuf,
    include_paths: Vec<PathBuf>,
    uri: String,
    depth: usize,
}

/// Collect a file's own symbols plus everything reachable through its
/// include graph, registering dependency edges along the way.
pub fn collect_symbols(
    root: ParsedFile,
    base_dir: &Path,
    include_paths: &[PathBuf],
    uri: &str,
    visited: &mut HashSet<PathBuf>,
    cache: &mut ParseCache,
    graph: &mut ProjectGraph,
) -> Vec<SymbolEntry> {
    let mut symbols = Vec::new();
    let mut work = VecDeque::new();
    work.push_back(WalkItem {
        parsed: root,
        base_dir: base_dir.to_path_buf(),
        include_paths: include_paths.to_vec(),
        uri: uri.to_string(),
        depth: 0,
    });

    while let Some(item) = work.pop_front() {
        if item.depth > MAX_INCLUDE_DEPTH || visited.len() > MAX_VISITED_FILES {
            continue;
        }

        for mut symbol in item.parsed.symbols {
            if symbol.uri.is_empty() {
                symbol.uri = item.uri.clone();
            }
            symbols.push(symbol);
        }

        // incdir events widen the search path for the rest of this file.
        let mut current_paths = item.include_paths.clone();
        for event in &item.parsed.events {
            match event.kind {
                IncludeKind::Incdir => {
                    if let Some(resolved) = resolve_incdir_path(&event.path, &item.base_dir) {
                        if !current_paths.contains(&resolved) {
                            current_paths.push(resolved);
                        }
                    }
                }
                IncludeKind::Include => {
                    let Some(resolved) =
                        resolve_include_path(&event.path, &item.base_dir, &current_paths)
                    else {
                        continue;
                    };
                    let absolute = match resolved.canonicalize() {
                        Ok(path) => path,
                        Err(_) => normalize_path(&resolved),
                    };
                    let child_uri = path_to_file_uri(&absolute);
                    graph.register_dependency(&item.uri, &child_uri);

                    if !visited.insert(absolute.clone()) {
                        continue;
                    }
                    let Some(child) = cache.load(&absolute) else {
                        continue;
                    };
                    let child_dir = absolute
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    work.push_back(WalkItem {
                        parsed: child,
                        base_dir: child_dir,
                        include_paths: current_paths.clone(),
                        uri: child_uri,
                        depth: item.depth + 1,
                    });
                }
            }
        }
    }

    symbols
}

/// Symbols for a live buffer plus everything its includes pull in.
pub fn extract_symbols_from_text(
    text: &str,
    doc_path: &Path,
    include_paths: &[PathBuf],
    uri: &str,
    cache: &mut ParseCache,
    graph: &mut ProjectGraph,
) -> Vec<SymbolEntry> {
    let mut visited = HashSet::new();
    if let Ok(absolute) = doc_path.canonicalize() {
        visited.insert(absolute);
    }
    let parsed = parse_source(text, uri);
    let base_dir = doc_path.parent().map(Path::to_path_buf).unwrap_or_default();
    collect_symbols(
        parsed,
        &base_dir,
        include_paths,
        uri,
        &mut visited,
        cache,
        graph,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(parsed: &ParsedFile) -> Vec<&str> {
        parsed.symbols.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn labels_defines_and_data_are_classified() {
        let parsed = parse_source(
            "Start:\n    lda #$00\n!speed = 4\nvalue = 12\ntable: dw $0000\nbuffer dw $FFFF\n",
            "file:///a.asm",
        );
        let kinds: Vec<(SymbolKind, &str)> = parsed
            .symbols
            .iter()
            .map(|s| (s.kind, s.name.as_str()))
            .collect();
        assert!(kinds.contains(&(SymbolKind::Label, "Start")));
        assert!(kinds.contains(&(SymbolKind::Define, "speed")));
        assert!(kinds.contains(&(SymbolKind::Define, "value")));
        assert!(kinds.contains(&(SymbolKind::Label, "table")));
        assert!(kinds.contains(&(SymbolKind::Data, "buffer")));
    }

    #[test]
    fn namespace_stack_flattens_with_underscores() {
        let parsed = parse_source(
            "namespace Oracle\nInit:\npushns Sub\nEntry:\npopns\nLater:\nnamespace off\nPlain:\n",
            "file:///a.asm",
        );
        assert_eq!(
            names(&parsed),
            vec!["Oracle_Init", "Oracle_Sub_Entry", "Oracle_Later", "Plain"]
        );
    }

    #[test]
    fn sub_labels_and_bang_defines_skip_qualification() {
        let parsed = parse_source(
            "namespace ns\n.local:\n!flag = 1\n",
            "file:///a.asm",
        );
        assert_eq!(names(&parsed), vec![".local", "flag"]);
    }

    #[test]
    fn struct_fields_join_with_dot() {
        let parsed = parse_source(
            "struct Enemy\n.hp: skip 2\n.x: skip 2\nendstruct\n",
            "file:///a.asm",
        );
        assert_eq!(names(&parsed), vec!["Enemy", "Enemy.hp", "Enemy.x"]);
        assert_eq!(parsed.symbols[1].kind, SymbolKind::StructField);
    }

    #[test]
    fn macro_parameters_split_on_top_level_commas() {
        let parsed = parse_source("macro Foo(a, b)\nendmacro\n", "file:///a.asm");
        let sym = &parsed.symbols[0];
        assert_eq!(sym.kind, SymbolKind::Macro);
        assert_eq!(sym.parameters, vec!["a", "b"]);
    }

    #[test]
    fn include_lines_become_events_not_symbols() {
        let parsed = parse_source(
            "incsrc \"sub dir/other.asm\"\nincdir lib\ninclude third.asm\n",
            "file:///a.asm",
        );
        assert!(parsed.symbols.is_empty());
        assert_eq!(parsed.events.len(), 3);
        assert_eq!(parsed.events[0].kind, IncludeKind::Include);
        assert_eq!(parsed.events[0].path, "sub dir/other.asm");
        assert_eq!(parsed.events[1].kind, IncludeKind::Incdir);
        assert_eq!(parsed.events[2].path, "third.asm");
    }

    #[test]
    fn semicolon_inside_string_is_not_a_comment() {
        assert_eq!(strip_asm_comment("db \"a;b\" ; real"), "db \"a;b\" ");
        assert_eq!(strip_asm_comment("lda #$00 ; tail"), "lda #$00 ");
    }

    #[test]
    fn one_classification_per_line() {
        // A bang define with a value must not be double-counted by the
        // assignment rule.
        let parsed = parse_source("!speed = 4\n", "file:///a.asm");
        assert_eq!(parsed.symbols.len(), 1);
    }

    #[test]
    fn cache_hit_skips_reparsing_unchanged_files() {
        let dir = std::env::temp_dir().join(format!(
            "snesforge-parse-cache-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        let file = dir.join("cached.asm");
        fs::write(&file, "CachedLabel:\n").expect("write");

        let mut cache = ParseCache::default();
        let first = cache.load(&file).expect("first load");
        let second = cache.load(&file).expect("second load");
        assert_eq!(first, second);
        assert_eq!(cache.misses, 1);
        assert_eq!(cache.hits, 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn collect_symbols_follows_includes_and_registers_edges() {
        let dir = std::env::temp_dir().join(format!(
            "snesforge-collect-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        let child = dir.join("child.inc");
        fs::write(&child, "ChildLabel:\n").expect("write child");

        let mut cache = ParseCache::default();
        let mut graph = ProjectGraph::default();
        let main_path = dir.join("main.asm");
        let symbols = extract_symbols_from_text(
            "MainLabel:\nincsrc child.inc\n",
            &main_path,
            &[],
            "file:///main.asm",
            &mut cache,
            &mut graph,
        );
        let found: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(found.contains(&"MainLabel"));
        assert!(found.contains(&"ChildLabel"));

        let child_uri = path_to_file_uri(&child.canonicalize().expect("canonicalize"));
        assert!(graph.parents(&child_uri).contains("file:///main.asm"));
        let _ = fs::remove_dir_all(&dir);
    }
}
