// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Best-effort diagnostic log sink.
//!
//! The server cannot write to stdout (that is the protocol channel), so
//! internal failures go to an append-only file. Logging must never fail
//! the caller; every error here is swallowed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::config::Config;

#[derive(Debug, Clone)]
pub struct DiagLog {
    enabled: bool,
    path: PathBuf,
}

impl Default for DiagLog {
    fn default() -> Self {
        Self {
            enabled: true,
            path: std::env::temp_dir().join("snesforge-lsp.log"),
        }
    }
}

impl DiagLog {
    pub fn log(&self, message: &str) {
        if !self.enabled {
            return;
        }
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(file, "{message}");
        }
    }

    /// Apply `lsp_log_*` config keys; relative paths resolve against the
    /// config directory, then the workspace root.
    pub fn apply_config(&mut self, config: &Config, config_dir: &Path, workspace_root: &Path) {
        if let Some(enabled) = config.lsp_log_enabled {
            self.enabled = enabled;
        }
        if let Some(raw) = &config.lsp_log_path {
            let candidate = PathBuf::from(raw);
            self.path = if candidate.is_absolute() {
                candidate
            } else if !config_dir.as_os_str().is_empty() {
                config_dir.join(&candidate)
            } else if !workspace_root.as_os_str().is_empty() {
                workspace_root.join(&candidate)
            } else {
                candidate
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sink_writes_nothing() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "snesforge-log-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        let mut sink = DiagLog {
            enabled: true,
            path: path.clone(),
        };
        let config = Config {
            lsp_log_enabled: Some(false),
            ..Config::default()
        };
        sink.apply_config(&config, &dir, &dir);
        sink.log("should not appear");
        assert!(!path.exists());
    }
}
