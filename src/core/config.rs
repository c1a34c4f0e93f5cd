// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Project configuration (`snesforge.toml`).
//!
//! The format is a flat TOML-like file: `key = value` lines, quote-aware
//! `#` comments, quoted strings with escapes, and string arrays that may
//! span lines. Deliberately not full TOML; the loader reads exactly what
//! the toolchain writes.

use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub include_paths: Vec<String>,
    pub defines: Vec<String>,
    pub main_files: Vec<String>,
    pub std_includes_path: Option<String>,
    pub std_defines_path: Option<String>,
    pub mapper: Option<String>,
    pub rom_path: Option<String>,
    pub rom_size: Option<i64>,
    pub assembler_path: Option<String>,
    pub lsp_log_enabled: Option<bool>,
    pub lsp_log_path: Option<String>,
    pub warn_unknown_width: Option<bool>,
    pub warn_branch_outside_bank: Option<bool>,
    pub warn_org_collision: Option<bool>,
    pub default_m_width: Option<i32>,
    pub default_x_width: Option<i32>,
    pub label_alias_prefixes: Vec<String>,
}

pub const CONFIG_FILE_NAME: &str = "snesforge.toml";

pub fn load_config_if_exists(path: &Path) -> Option<Config> {
    let text = fs::read_to_string(path).ok()?;
    Some(parse_config(&text))
}

pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut pending_key = String::new();
    let mut pending_value = String::new();
    let mut pending_brackets = 0i32;

    for raw_line in text.lines() {
        let stripped = strip_comment(raw_line);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !pending_key.is_empty() {
            if !pending_value.is_empty() {
                pending_value.push(' ');
            }
            pending_value.push_str(trimmed);
            pending_brackets += bracket_delta(trimmed);
            if pending_brackets <= 0 {
                apply_array_key(&mut config, &pending_key, &pending_value);
                pending_key.clear();
                pending_value.clear();
                pending_brackets = 0;
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if is_array_key(key) && contains_array_start(value) {
            let delta = bracket_delta(value);
            if delta > 0 {
                pending_key = key.to_string();
                pending_value = value.to_string();
                pending_brackets = delta;
                continue;
            }
            apply_array_key(&mut config, key, value);
            continue;
        }

        match key {
            "include_paths" | "defines" | "label_alias_prefixes" => {
                apply_array_key(&mut config, key, value)
            }
            "main" | "main_file" | "main_files" | "entry" | "entry_files" => {
                apply_array_key(&mut config, key, value)
            }
            "std_includes" => config.std_includes_path = Some(parse_string(value)),
            "std_defines" => config.std_defines_path = Some(parse_string(value)),
            "mapper" => config.mapper = Some(parse_string(value)),
            "rom" | "rom_path" => config.rom_path = Some(parse_string(value)),
            "rom_size" => config.rom_size = parse_int(value),
            "assembler" | "assembler_path" => config.assembler_path = Some(parse_string(value)),
            "lsp_log_enabled" => config.lsp_log_enabled = parse_bool(value),
            "lsp_log_path" => config.lsp_log_path = Some(parse_string(value)),
            "warn_unknown_width" => config.warn_unknown_width = parse_bool(value),
            "warn_branch_outside_bank" => config.warn_branch_outside_bank = parse_bool(value),
            "warn_org_collision" => config.warn_org_collision = parse_bool(value),
            "default_m_width" => config.default_m_width = parse_int(value).map(|v| v as i32),
            "default_x_width" => config.default_x_width = parse_int(value).map(|v| v as i32),
            _ => {}
        }
    }

    if !pending_key.is_empty() {
        apply_array_key(&mut config, &pending_key, &pending_value);
    }

    config
}

fn is_array_key(key: &str) -> bool {
    matches!(
        key,
        "include_paths"
            | "defines"
            | "main"
            | "main_file"
            | "main_files"
            | "entry"
            | "entry_files"
            | "label_alias_prefixes"
    )
}

fn apply_array_key(config: &mut Config, key: &str, value: &str) {
    let items = parse_string_array(value);
    match key {
        "include_paths" => config.include_paths = items,
        "defines" => config.defines = items,
        "label_alias_prefixes" => config.label_alias_prefixes = items,
        _ => config.main_files = items,
    }
}

fn strip_comment(line: &str) -> &str {
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
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn contains_array_start(value: &str) -> bool {
    let mut in_string = false;
    let mut escape = false;
    for c in value.chars() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            '[' if !in_string => return true,
            _ => {}
        }
    }
    false
}

fn bracket_delta(value: &str) -> i32 {
    let mut in_string = false;
    let mut escape = false;
    let mut delta = 0;
    for c in value.chars() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            '[' if !in_string => delta += 1,
            ']' if !in_string => delta -= 1,
            _ => {}
        }
    }
    delta
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut escape = false;
    for c in text.chars() {
        if escape {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escape = false;
        } else if c == '\\' {
            escape = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_string(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return unescape(&trimmed[1..trimmed.len() - 1]);
    }
    trimmed.to_string()
}

fn parse_string_array(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![parse_string(trimmed)];
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escape = false;
    for c in inner.chars() {
        if escape {
            current.push(c);
            escape = false;
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let token = current.trim();
                if !token.is_empty() {
                    out.push(parse_string(token));
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let token = current.trim();
    if !token.is_empty() {
        out.push(parse_string(token));
    }
    out
}

fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok();
    }
    trimmed.parse::<i64>().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_keys_and_arrays() {
        let config = parse_config(
            r#"
# project config
main = "main.asm"
include_paths = ["lib", "shared/includes"]
defines = [
    "DEBUG=1",
    "REGION=ntsc",
]
rom = "base.sfc"  # patched baseline
rom_size = 0x100000
warn_unknown_width = true
warn_org_collision = off
default_m_width = 1
label_alias_prefixes = ["Oracle_"]
"#,
        );
        assert_eq!(config.main_files, vec!["main.asm"]);
        assert_eq!(config.include_paths, vec!["lib", "shared/includes"]);
        assert_eq!(config.defines, vec!["DEBUG=1", "REGION=ntsc"]);
        assert_eq!(config.rom_path.as_deref(), Some("base.sfc"));
        assert_eq!(config.rom_size, Some(0x100000));
        assert_eq!(config.warn_unknown_width, Some(true));
        assert_eq!(config.warn_org_collision, Some(false));
        assert_eq!(config.default_m_width, Some(1));
        assert_eq!(config.label_alias_prefixes, vec!["Oracle_"]);
    }

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        let config = parse_config("lsp_log_path = \"logs/#lsp.log\"\n");
        assert_eq!(config.lsp_log_path.as_deref(), Some("logs/#lsp.log"));
    }

    #[test]
    fn bare_value_for_array_key_becomes_single_entry() {
        let config = parse_config("entry = patch.asm\n");
        assert_eq!(config.main_files, vec!["patch.asm"]);
    }
}
