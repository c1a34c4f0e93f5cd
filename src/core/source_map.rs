// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source map support for mapping assembled addresses back to origin files.

use std::collections::HashMap;

/// One source file referenced by the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFile {
    pub id: i32,
    pub crc: u32,
    pub path: String,
}

/// One address-to-line record. The applicable record for an address is the
/// greatest entry with `entry.address <= address`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceMapEntry {
    pub address: u32,
    pub file_id: i32,
    pub line: u32,
}

/// Raw map as delivered by the assembler. Rebuilt on every assemble and
/// never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    pub files: Vec<SourceFile>,
    pub entries: Vec<SourceMapEntry>,
}

/// Floor-lookup view over a [`SourceMap`]. Immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    files: HashMap<i32, String>,
    entries: Vec<SourceMapEntry>,
}

impl SourceIndex {
    pub fn build(map: &SourceMap) -> Self {
        let mut files = HashMap::new();
        for file in &map.files {
            files.insert(file.id, file.path.clone());
        }
        let mut entries = map.entries.clone();
        entries.sort_by(|a, b| a.address.cmp(&b.address).then(a.line.cmp(&b.line)));
        Self { files, entries }
    }

    /// Greatest entry with `address <= query`, or None before the first entry.
    pub fn lookup(&self, address: u32) -> Option<&SourceMapEntry> {
        let idx = self
            .entries
            .partition_point(|entry| entry.address <= address);
        if idx == 0 {
            return None;
        }
        self.entries.get(idx - 1)
    }

    pub fn file_for_id(&self, id: i32) -> Option<&str> {
        self.files.get(&id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(address: u32, line: u32) -> SourceMapEntry {
        SourceMapEntry {
            address,
            file_id: 0,
            line,
        }
    }

    #[test]
    fn lookup_uses_floor_semantics() {
        let map = SourceMap {
            files: vec![SourceFile {
                id: 0,
                crc: 0,
                path: "main.asm".to_string(),
            }],
            entries: vec![entry(0x8010, 3), entry(0x8000, 1), entry(0x8004, 2)],
        };
        let index = SourceIndex::build(&map);

        assert!(index.lookup(0x7FFF).is_none());
        assert_eq!(index.lookup(0x8000).map(|e| e.line), Some(1));
        assert_eq!(index.lookup(0x8003).map(|e| e.line), Some(1));
        assert_eq!(index.lookup(0x8004).map(|e| e.line), Some(2));
        assert_eq!(index.lookup(0xFFFF).map(|e| e.line), Some(3));
        assert_eq!(index.file_for_id(0), Some("main.asm"));
        assert!(index.file_for_id(7).is_none());
    }

    #[test]
    fn entries_with_equal_address_sort_by_line() {
        let map = SourceMap {
            files: Vec::new(),
            entries: vec![entry(0x8000, 9), entry(0x8000, 2)],
        };
        let index = SourceIndex::build(&map);
        // Floor lookup lands on the last of the equal-address run.
        assert_eq!(index.lookup(0x8000).map(|e| e.line), Some(9));
    }
}
