// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Conversion of internal diagnostics to `publishDiagnostics` payloads.

use serde_json::{json, Value};

use crate::core::assembler::{Diagnostic, Severity};
use crate::lsp::document::DocumentState;

fn severity_to_lsp(severity: Severity) -> u32 {
    match severity {
        Severity::Error => 1,
        Severity::Warning => 2,
    }
}

/// Internal lines/columns are 1-based; the wire wants 0-based, clamped.
pub fn diagnostic_to_lsp(diag: &Diagnostic) -> Value {
    let line = diag.line.saturating_sub(1);
    let column = diag.column.saturating_sub(1);
    json!({
        "severity": severity_to_lsp(diag.severity),
        "message": diag.message,
        "range": {
            "start": {"line": line, "character": column},
            "end": {"line": line, "character": column},
        },
        "source": "snesforge",
    })
}

pub fn publish_params(doc: &DocumentState) -> Value {
    let diagnostics: Vec<Value> = doc.diagnostics.iter().map(diagnostic_to_lsp).collect();
    json!({
        "uri": doc.uri,
        "diagnostics": diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_positions_are_zero_based_and_clamped() {
        let mut diag = Diagnostic::new(Severity::Warning, "w".to_string());
        diag.line = 3;
        diag.column = 1;
        let value = diagnostic_to_lsp(&diag);
        assert_eq!(value["severity"], 2);
        assert_eq!(value["range"]["start"]["line"], 2);
        assert_eq!(value["range"]["start"]["character"], 0);

        let locationless = Diagnostic::new(Severity::Error, "e".to_string());
        let value = diagnostic_to_lsp(&locationless);
        assert_eq!(value["range"]["start"]["line"], 0);
        assert_eq!(value["severity"], 1);
    }
}
