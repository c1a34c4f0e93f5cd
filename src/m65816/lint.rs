// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Width-dataflow linter over assembled 65816 byte ranges.
//!
//! Walks each written block tracking the M/X register-width state, flagging
//! immediates whose size depends on an unknown flag state, relative
//! branches whose 16-bit target leaves the current bank, and overlapping
//! ORG ranges. Width state never carries across blocks; blocks can be
//! reached from arbitrary call sites, so each one is its own flow unit.

use crate::core::assembler::{AssembleResult, Diagnostic, Severity};
use crate::core::source_map::SourceIndex;
use crate::m65816::opcodes::{
    is_immediate_m_mode, is_immediate_x_mode, is_relative_mode, opcode_info, operand_size, AddrMode,
};

#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Width assumed at the start of every block; 0 means unknown.
    pub default_m_width_bytes: i32,
    pub default_x_width_bytes: i32,
    pub warn_unknown_width: bool,
    pub warn_branch_outside_bank: bool,
    pub warn_org_collision: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            default_m_width_bytes: 1,
            default_x_width_bytes: 1,
            warn_unknown_width: true,
            warn_branch_outside_bank: true,
            warn_org_collision: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct LintResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl LintResult {
    pub fn success(&self) -> bool {
        self.diagnostics
            .iter()
            .all(|diag| diag.severity != Severity::Error)
    }
}

/// M/X width-tracking state. `known` goes false after PLP/RTI because the
/// restored flags come from a stack value the analysis cannot see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidthState {
    pub m_width: usize,
    pub x_width: usize,
    pub m_known: bool,
    pub x_known: bool,
}

impl WidthState {
    pub fn from_defaults(options: &LintOptions) -> Self {
        Self {
            m_width: options.default_m_width_bytes.max(1) as usize,
            x_width: options.default_x_width_bytes.max(1) as usize,
            m_known: options.default_m_width_bytes > 0,
            x_known: options.default_x_width_bytes > 0,
        }
    }

    /// Apply one instruction's effect on the flag-width state. `operand`
    /// is the first operand byte, used by REP/SEP masks.
    pub fn apply(&mut self, mnemonic: &str, operand: Option<u8>) {
        match mnemonic {
            "REP" => {
                if let Some(mask) = operand {
                    if mask & 0x20 != 0 {
                        self.m_width = 2;
                        self.m_known = true;
                    }
                    if mask & 0x10 != 0 {
                        self.x_width = 2;
                        self.x_known = true;
                    }
                }
            }
            "SEP" => {
                if let Some(mask) = operand {
                    if mask & 0x20 != 0 {
                        self.m_width = 1;
                        self.m_known = true;
                    }
                    if mask & 0x10 != 0 {
                        self.x_width = 1;
                        self.x_known = true;
                    }
                }
            }
            "PLP" | "RTI" => {
                self.m_known = false;
                self.x_known = false;
            }
            "XCE" => {
                self.m_width = 1;
                self.x_width = 1;
                self.m_known = true;
                self.x_known = true;
            }
            _ => {}
        }
    }
}

pub fn run_lint(result: &AssembleResult, options: &LintOptions) -> LintResult {
    let mut out = LintResult::default();
    if result.rom_data.is_empty() {
        return out;
    }

    let sources = SourceIndex::build(&result.source_map);

    if options.warn_org_collision {
        check_org_collisions(result, &sources, &mut out);
    }

    for block in &result.written_blocks {
        if block.num_bytes == 0 {
            continue;
        }
        let mut pc = block.pc_offset;
        let end = block.pc_offset + block.num_bytes;
        if end > result.rom_data.len() {
            continue;
        }
        let mut snes = block.snes_offset;
        let mut state = WidthState::from_defaults(options);

        while pc < end {
            let opcode = result.rom_data[pc];
            let info = opcode_info(opcode);

            let m_width = if state.m_known {
                state.m_width
            } else {
                options.default_m_width_bytes.max(1) as usize
            };
            let x_width = if state.x_known {
                state.x_width
            } else {
                options.default_x_width_bytes.max(1) as usize
            };
            let size = operand_size(info.mode, m_width, x_width);

            // A trailing partial instruction is data, not code.
            if pc + 1 + size > end {
                break;
            }

            if options.warn_unknown_width {
                if is_immediate_m_mode(info.mode) && !state.m_known {
                    add_diagnostic(
                        &mut out,
                        Severity::Warning,
                        "Immediate size depends on M flag (unknown state)".to_string(),
                        snes,
                        &sources,
                    );
                }
                if is_immediate_x_mode(info.mode) && !state.x_known {
                    add_diagnostic(
                        &mut out,
                        Severity::Warning,
                        "Immediate size depends on X flag (unknown state)".to_string(),
                        snes,
                        &sources,
                    );
                }
            }

            if options.warn_branch_outside_bank && is_relative_mode(info.mode) {
                let offset = if info.mode == AddrMode::Relative8 {
                    result.rom_data[pc + 1] as i8 as i32
                } else {
                    let lo = result.rom_data[pc + 1] as u16;
                    let hi = result.rom_data[pc + 2] as u16;
                    ((hi << 8) | lo) as i16 as i32
                };
                let base = (snes & 0xFFFF) as i32;
                let target = base + 1 + size as i32 + offset;
                if !(0x8000..=0xFFFF).contains(&target) {
                    add_diagnostic(
                        &mut out,
                        Severity::Warning,
                        format!(
                            "Branch target leaves current bank (target ${:04X})",
                            target & 0xFFFF
                        ),
                        snes,
                        &sources,
                    );
                }
            }

            state.apply(info.mnemonic, result.rom_data.get(pc + 1).copied());

            pc += 1 + size;
            snes += (1 + size) as u32;
        }
    }

    out
}

fn check_org_collisions(result: &AssembleResult, sources: &SourceIndex, out: &mut LintResult) {
    let mut ranges: Vec<(u32, u32)> = result
        .written_blocks
        .iter()
        .filter(|block| block.num_bytes > 0)
        .map(|block| {
            (
                block.snes_offset,
                block.snes_offset + block.num_bytes as u32,
            )
        })
        .collect();
    // Sorting makes collision detection independent of block input order.
    ranges.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    for pair in ranges.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if curr.0 < prev.1 {
            add_diagnostic(
                out,
                Severity::Error,
                format!(
                    "ORG collision: overlap between ${:06X}-${:06X} and ${:06X}-${:06X}",
                    prev.0,
                    prev.1 - 1,
                    curr.0,
                    curr.1 - 1
                ),
                curr.0,
                sources,
            );
        }
    }
}

fn add_diagnostic(
    out: &mut LintResult,
    severity: Severity,
    message: String,
    address: u32,
    sources: &SourceIndex,
) {
    let mut diag = Diagnostic::new(severity, message);
    if let Some(entry) = sources.lookup(address) {
        if let Some(path) = sources.file_for_id(entry.file_id) {
            diag.filename = Some(path.to_string());
        }
        diag.line = entry.line;
        diag.column = 1;
    }
    out.diagnostics.push(diag);
}
