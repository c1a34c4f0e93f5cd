// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Workspace-wide state built once at `initialize`.
//!
//! The symbol index, symbol-name set, and main-candidate set built here
//! are read-only inputs to per-document analysis; analysis never mutates
//! them.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::config::{load_config_if_exists, Config, CONFIG_FILE_NAME};
use crate::lsp::messages::InitializeParams;
use crate::lsp::parse::{self, normalize_path, ParseCache, SymbolEntry};
use crate::lsp::project_graph::ProjectGraph;
use crate::lsp::session::{path_to_file_uri, uri_to_path};

#[derive(Debug, Default)]
pub struct WorkspaceState {
    pub root: Option<PathBuf>,
    pub config: Option<Config>,
    pub config_path: Option<PathBuf>,
    pub git_root: Option<PathBuf>,
    pub git_ignored_paths: HashSet<PathBuf>,
    /// Symbols per document URI, from the initial crawl.
    pub symbol_index: HashMap<String, Vec<SymbolEntry>>,
    /// Candidate analysis entry points (config mains or `*main*` stems).
    pub main_candidates: HashSet<String>,
    /// Every symbol name seen anywhere in the workspace.
    pub symbol_names: HashSet<String>,
}

impl WorkspaceState {
    /// Resolve the root, load config and git state, then crawl the tree
    /// for symbols and include edges.
    pub fn build(
        params: &InitializeParams,
        cache: &mut ParseCache,
        graph: &mut ProjectGraph,
    ) -> Self {
        let mut state = WorkspaceState::default();

        let mut root = params
            .root_uri
            .as_deref()
            .and_then(uri_to_path)
            .or_else(|| params.root_path.as_ref().map(PathBuf::from));

        let has_config = |dir: &Path| dir.join(CONFIG_FILE_NAME).is_file();
        // Prefer a workspace folder that actually carries a config file
        // when the advertised root does not.
        if root.as_deref().map(|r| !has_config(r)).unwrap_or(true) {
            for folder in &params.workspace_folders {
                let candidate = folder
                    .uri
                    .as_deref()
                    .and_then(uri_to_path)
                    .or_else(|| folder.path.as_ref().map(PathBuf::from));
                if let Some(candidate) = candidate {
                    if has_config(&candidate) {
                        root = Some(candidate);
                        break;
                    }
                }
            }
        }

        let Some(root) = root else {
            return state;
        };

        state.git_root = resolve_git_root(&root);
        if let Some(git_root) = &state.git_root {
            state.git_ignored_paths = load_git_ignored_paths(git_root);
        }

        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            state.config = load_config_if_exists(&config_path);
            state.config_path = Some(config_path);
        }

        let config_dir = state
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.clone());
        let include_paths = state
            .config
            .as_ref()
            .map(|config| resolve_include_paths(config, &config_dir))
            .unwrap_or_default();

        let mut has_config_mains = false;
        if let Some(config) = &state.config {
            has_config_mains = add_main_candidates_from_config(
                config,
                &config_dir,
                &root,
                &mut state.main_candidates,
            );
        }

        crawl_workspace(
            &root,
            &include_paths,
            !has_config_mains,
            &mut state,
            cache,
            graph,
        );
        state.root = Some(root);
        state
    }

    pub fn is_git_ignored(&self, path: &Path) -> bool {
        if self.git_ignored_paths.is_empty() {
            return false;
        }
        let Some(git_root) = &self.git_root else {
            return false;
        };
        let normalized = normalize_path(path);
        if !normalized.starts_with(git_root) {
            return false;
        }
        if self.git_ignored_paths.contains(&normalized) {
            return true;
        }
        // Directory ignores cover everything beneath them.
        let mut parent = normalized.parent();
        while let Some(dir) = parent {
            if dir == git_root.as_path() {
                break;
            }
            if self.git_ignored_paths.contains(dir) {
                return true;
            }
            parent = dir.parent();
        }
        false
    }
}

pub fn is_source_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(ext.as_str(), "asm" | "s" | "inc")
}

/// `main.asm`, `*_main.asm`, `*-main.asm` stems mark entry-point files.
pub fn is_main_file_name(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return false;
    };
    let lower = stem.to_ascii_lowercase();
    lower == "main" || lower.ends_with("_main") || lower.ends_with("-main")
}

pub fn resolve_include_paths(config: &Config, config_dir: &Path) -> Vec<PathBuf> {
    config
        .include_paths
        .iter()
        .map(|raw| {
            let path = PathBuf::from(raw);
            if path.is_absolute() {
                normalize_path(&path)
            } else {
                normalize_path(&config_dir.join(path))
            }
        })
        .collect()
}

pub fn resolve_config_path(raw: &str, config_dir: &Path, workspace_root: &Path) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return Some(normalize_path(&path));
    }
    if !config_dir.as_os_str().is_empty() {
        let candidate = normalize_path(&config_dir.join(&path));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    if !workspace_root.as_os_str().is_empty() {
        return Some(normalize_path(&workspace_root.join(&path)));
    }
    Some(normalize_path(&path))
}

fn add_main_candidates_from_config(
    config: &Config,
    config_dir: &Path,
    workspace_root: &Path,
    out: &mut HashSet<String>,
) -> bool {
    let mut added = false;
    for entry in &config.main_files {
        let Some(resolved) = resolve_config_path(entry, config_dir, workspace_root) else {
            continue;
        };
        if !resolved.exists() {
            continue;
        }
        out.insert(path_to_file_uri(&resolved));
        added = true;
    }
    added
}

fn crawl_workspace(
    dir: &Path,
    include_paths: &[PathBuf],
    seed_mains: bool,
    state: &mut WorkspaceState,
    cache: &mut ParseCache,
    graph: &mut ProjectGraph,
) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            crawl_workspace(&path, include_paths, seed_mains, state, cache, graph);
            continue;
        }
        if !is_source_file(&path) || state.is_git_ignored(&path) {
            continue;
        }
        let uri = path_to_file_uri(&path);
        let Some(parsed) = cache.load(&path) else {
            continue;
        };
        for symbol in &parsed.symbols {
            state.symbol_names.insert(symbol.name.clone());
        }
        index_include_dependencies(&parsed, &path, include_paths, graph);
        state.symbol_index.insert(uri.clone(), parsed.symbols);
        if seed_mains && is_main_file_name(&path) {
            state.main_candidates.insert(uri);
        }
    }
}

/// Register graph edges for one parsed file without recursing into its
/// includes (the crawl visits every file on its own).
pub fn index_include_dependencies(
    parsed: &parse::ParsedFile,
    parent_path: &Path,
    include_paths: &[PathBuf],
    graph: &mut ProjectGraph,
) {
    let base_dir = parent_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut current_paths = include_paths.to_vec();
    for event in &parsed.events {
        match event.kind {
            parse::IncludeKind::Incdir => {
                if let Some(resolved) = parse::resolve_incdir_path(&event.path, &base_dir) {
                    if !current_paths.contains(&resolved) {
                        current_paths.push(resolved);
                    }
                }
            }
            parse::IncludeKind::Include => {
                let Some(resolved) =
                    parse::resolve_include_path(&event.path, &base_dir, &current_paths)
                else {
                    continue;
                };
                let absolute = match resolved.canonicalize() {
                    Ok(path) => path,
                    Err(_) => normalize_path(&resolved),
                };
                graph.register_dependency(&path_to_file_uri(parent_path), &path_to_file_uri(&absolute));
            }
        }
    }
}

fn resolve_git_root(start: &Path) -> Option<PathBuf> {
    let output = Command::new("git")
        .arg("-C")
        .arg(start)
        .arg("rev-parse")
        .arg("--show-toplevel")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn load_git_ignored_paths(git_root: &Path) -> HashSet<PathBuf> {
    let mut ignored = HashSet::new();
    let Ok(output) = Command::new("git")
        .arg("-C")
        .arg(git_root)
        .arg("ls-files")
        .arg("-o")
        .arg("-i")
        .arg("--exclude-standard")
        .arg("--directory")
        .arg("-z")
        .output()
    else {
        return ignored;
    };
    if !output.status.success() {
        return ignored;
    }
    for chunk in output.stdout.split(|&byte| byte == 0) {
        if chunk.is_empty() {
            continue;
        }
        let rel = String::from_utf8_lossy(chunk);
        let rel = rel.trim_end_matches('/');
        if rel.is_empty() {
            continue;
        }
        ignored.insert(normalize_path(&git_root.join(rel)));
    }
    ignored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_file_stems_are_recognized() {
        assert!(is_main_file_name(Path::new("/p/main.asm")));
        assert!(is_main_file_name(Path::new("/p/oracle_main.asm")));
        assert!(is_main_file_name(Path::new("/p/oracle-main.s")));
        assert!(!is_main_file_name(Path::new("/p/mainline.asm")));
        assert!(!is_main_file_name(Path::new("/p/library.inc")));
    }

    #[test]
    fn source_extensions_are_case_insensitive() {
        assert!(is_source_file(Path::new("a.ASM")));
        assert!(is_source_file(Path::new("a.inc")));
        assert!(!is_source_file(Path::new("a.bin")));
    }

    #[test]
    fn git_ignored_covers_nested_paths() {
        let mut state = WorkspaceState {
            git_root: Some(PathBuf::from("/repo")),
            ..WorkspaceState::default()
        };
        state.git_ignored_paths.insert(PathBuf::from("/repo/build"));
        assert!(state.is_git_ignored(Path::new("/repo/build/out.asm")));
        assert!(state.is_git_ignored(Path::new("/repo/build")));
        assert!(!state.is_git_ignored(Path::new("/repo/src/main.asm")));
        assert!(!state.is_git_ignored(Path::new("/elsewhere/build/out.asm")));
    }

    #[test]
    fn include_paths_resolve_against_config_dir() {
        let config = Config {
            include_paths: vec!["lib".to_string(), "/abs/shared".to_string()],
            ..Config::default()
        };
        let resolved = resolve_include_paths(&config, Path::new("/project"));
        assert_eq!(resolved[0], PathBuf::from("/project/lib"));
        assert_eq!(resolved[1], PathBuf::from("/abs/shared"));
    }
}
