// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! WDC 65816 CPU support: opcode decoding, the width-dataflow linter, and
//! static hover/reference data.

pub mod knowledge;
pub mod lint;
pub mod opcodes;
