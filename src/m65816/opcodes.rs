// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 65816 opcode decoding.
//!
//! A total table over all 256 opcode bytes plus the pure operand-size
//! function. Immediate-M/X modes resolve against the caller's current
//! register-width state, which is what couples this table to the width
//! dataflow walk in [`crate::m65816::lint`].

/// Addressing modes of the 65816.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,
    Immediate8,
    Immediate16,
    /// Immediate whose width follows the accumulator (M) flag.
    ImmediateM,
    /// Immediate whose width follows the index (X) flag.
    ImmediateX,
    Relative8,
    Relative16,
    DirectPage,
    DirectPageX,
    DirectPageY,
    DirectPageIndirect,
    DirectPageIndexedIndirect,
    DirectPageIndirectIndexedY,
    DirectPageIndirectLong,
    DirectPageIndirectLongY,
    StackRelative,
    StackRelativeIndirectY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    AbsoluteIndirect,
    AbsoluteIndexedIndirect,
    AbsoluteIndirectLong,
    AbsoluteLong,
    AbsoluteLongX,
    BlockMove,
}

/// One decoded opcode: mnemonic plus addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: &'static str,
    pub mode: AddrMode,
}

const fn op(mnemonic: &'static str, mode: AddrMode) -> OpcodeInfo {
    OpcodeInfo { mnemonic, mode }
}

use AddrMode::*;

/// Every byte value decodes; unused opcodes carry their documented
/// placeholder mnemonics (WDM and friends) rather than gaps.
pub static OPCODE_TABLE: [OpcodeInfo; 256] = [
    op("BRK", Immediate8),                     // 0x00
    op("ORA", DirectPageIndexedIndirect),      // 0x01
    op("COP", Immediate8),                     // 0x02
    op("ORA", StackRelative),                  // 0x03
    op("TSB", DirectPage),                     // 0x04
    op("ORA", DirectPage),                     // 0x05
    op("ASL", DirectPage),                     // 0x06
    op("ORA", DirectPageIndirectLong),         // 0x07
    op("PHP", Implied),                        // 0x08
    op("ORA", ImmediateM),                     // 0x09
    op("ASL", Implied),                        // 0x0A
    op("PHD", Implied),                        // 0x0B
    op("TSB", Absolute),                       // 0x0C
    op("ORA", Absolute),                       // 0x0D
    op("ASL", Absolute),                       // 0x0E
    op("ORA", AbsoluteLong),                   // 0x0F
    op("BPL", Relative8),                      // 0x10
    op("ORA", DirectPageIndirectIndexedY),     // 0x11
    op("ORA", DirectPageIndirect),             // 0x12
    op("ORA", StackRelativeIndirectY),         // 0x13
    op("TRB", DirectPage),                     // 0x14
    op("ORA", DirectPageX),                    // 0x15
    op("ASL", DirectPageX),                    // 0x16
    op("ORA", DirectPageIndirectLongY),        // 0x17
    op("CLC", Implied),                        // 0x18
    op("ORA", AbsoluteY),                      // 0x19
    op("INC", Implied),                        // 0x1A
    op("TCS", Implied),                        // 0x1B
    op("TRB", Absolute),                       // 0x1C
    op("ORA", AbsoluteX),                      // 0x1D
    op("ASL", AbsoluteX),                      // 0x1E
    op("ORA", AbsoluteLongX),                  // 0x1F
    op("JSR", Absolute),                       // 0x20
    op("AND", DirectPageIndexedIndirect),      // 0x21
    op("JSL", AbsoluteLong),                   // 0x22
    op("AND", StackRelative),                  // 0x23
    op("BIT", DirectPage),                     // 0x24
    op("AND", DirectPage),                     // 0x25
    op("ROL", DirectPage),                     // 0x26
    op("AND", DirectPageIndirectLong),         // 0x27
    op("PLP", Implied),                        // 0x28
    op("AND", ImmediateM),                     // 0x29
    op("ROL", Implied),                        // 0x2A
    op("PLD", Implied),                        // 0x2B
    op("BIT", Absolute),                       // 0x2C
    op("AND", Absolute),                       // 0x2D
    op("ROL", Absolute),                       // 0x2E
    op("AND", AbsoluteLong),                   // 0x2F
    op("BMI", Relative8),                      // 0x30
    op("AND", DirectPageIndirectIndexedY),     // 0x31
    op("AND", DirectPageIndirect),             // 0x32
    op("AND", StackRelativeIndirectY),         // 0x33
    op("BIT", DirectPageX),                    // 0x34
    op("AND", DirectPageX),                    // 0x35
    op("ROL", DirectPageX),                    // 0x36
    op("AND", DirectPageIndirectLongY),        // 0x37
    op("SEC", Implied),                        // 0x38
    op("AND", AbsoluteY),                      // 0x39
    op("DEC", Implied),                        // 0x3A
    op("TSC", Implied),                        // 0x3B
    op("BIT", AbsoluteX),                      // 0x3C
    op("AND", AbsoluteX),                      // 0x3D
    op("ROL", AbsoluteX),                      // 0x3E
    op("AND", AbsoluteLongX),                  // 0x3F
    op("RTI", Implied),                        // 0x40
    op("EOR", DirectPageIndexedIndirect),      // 0x41
    op("WDM", Immediate8),                     // 0x42
    op("EOR", StackRelative),                  // 0x43
    op("MVP", BlockMove),                      // 0x44
    op("EOR", DirectPage),                     // 0x45
    op("LSR", DirectPage),                     // 0x46
    op("EOR", DirectPageIndirectLong),         // 0x47
    op("PHA", Implied),                        // 0x48
    op("EOR", ImmediateM),                     // 0x49
    op("LSR", Implied),                        // 0x4A
    op("PHK", Implied),                        // 0x4B
    op("JMP", Absolute),                       // 0x4C
    op("EOR", Absolute),                       // 0x4D
    op("LSR", Absolute),                       // 0x4E
    op("EOR", AbsoluteLong),                   // 0x4F
    op("BVC", Relative8),                      // 0x50
    op("EOR", DirectPageIndirectIndexedY),     // 0x51
    op("EOR", DirectPageIndirect),             // 0x52
    op("EOR", StackRelativeIndirectY),         // 0x53
    op("MVN", BlockMove),                      // 0x54
    op("EOR", DirectPageX),                    // 0x55
    op("LSR", DirectPageX),                    // 0x56
    op("EOR", DirectPageIndirectLongY),        // 0x57
    op("CLI", Implied),                        // 0x58
    op("EOR", AbsoluteY),                      // 0x59
    op("PHY", Implied),                        // 0x5A
    op("TCD", Implied),                        // 0x5B
    op("JML", AbsoluteLong),                   // 0x5C
    op("EOR", AbsoluteX),                      // 0x5D
    op("LSR", AbsoluteX),                      // 0x5E
    op("EOR", AbsoluteLongX),                  // 0x5F
    op("RTS", Implied),                        // 0x60
    op("ADC", DirectPageIndexedIndirect),      // 0x61
    op("PER", Relative16),                     // 0x62
    op("ADC", StackRelative),                  // 0x63
    op("STZ", DirectPage),                     // 0x64
    op("ADC", DirectPage),                     // 0x65
    op("ROR", DirectPage),                     // 0x66
    op("ADC", DirectPageIndirectLong),         // 0x67
    op("PLA", Implied),                        // 0x68
    op("ADC", ImmediateM),                     // 0x69
    op("ROR", Implied),                        // 0x6A
    op("RTL", Implied),                        // 0x6B
    op("JMP", AbsoluteIndirect),               // 0x6C
    op("ADC", Absolute),                       // 0x6D
    op("ROR", Absolute),                       // 0x6E
    op("ADC", AbsoluteLong),                   // 0x6F
    op("BVS", Relative8),                      // 0x70
    op("ADC", DirectPageIndirectIndexedY),     // 0x71
    op("ADC", DirectPageIndirect),             // 0x72
    op("ADC", StackRelativeIndirectY),         // 0x73
    op("STZ", DirectPageX),                    // 0x74
    op("ADC", DirectPageX),                    // 0x75
    op("ROR", DirectPageX),                    // 0x76
    op("ADC", DirectPageIndirectLongY),        // 0x77
    op("SEI", Implied),                        // 0x78
    op("ADC", AbsoluteY),                      // 0x79
    op("PLY", Implied),                        // 0x7A
    op("TDC", Implied),                        // 0x7B
    op("JMP", AbsoluteIndexedIndirect),        // 0x7C
    op("ADC", AbsoluteX),                      // 0x7D
    op("ROR", AbsoluteX),                      // 0x7E
    op("ADC", AbsoluteLongX),                  // 0x7F
    op("BRA", Relative8),                      // 0x80
    op("STA", DirectPageIndexedIndirect),      // 0x81
    op("BRL", Relative16),                     // 0x82
    op("STA", StackRelative),                  // 0x83
    op("STY", DirectPage),                     // 0x84
    op("STA", DirectPage),                     // 0x85
    op("STX", DirectPage),                     // 0x86
    op("STA", DirectPageIndirectLong),         // 0x87
    op("DEY", Implied),                        // 0x88
    op("BIT", ImmediateM),                     // 0x89
    op("TXA", Implied),                        // 0x8A
    op("PHB", Implied),                        // 0x8B
    op("STY", Absolute),                       // 0x8C
    op("STA", Absolute),                       // 0x8D
    op("STX", Absolute),                       // 0x8E
    op("STA", AbsoluteLong),                   // 0x8F
    op("BCC", Relative8),                      // 0x90
    op("STA", DirectPageIndirectIndexedY),     // 0x91
    op("STA", DirectPageIndirect),             // 0x92
    op("STA", StackRelativeIndirectY),         // 0x93
    op("STY", DirectPageX),                    // 0x94
    op("STA", DirectPageX),                    // 0x95
    op("STX", DirectPageY),                    // 0x96
    op("STA", DirectPageIndirectLongY),        // 0x97
    op("TYA", Implied),                        // 0x98
    op("STA", AbsoluteY),                      // 0x99
    op("TXS", Implied),                        // 0x9A
    op("TXY", Implied),                        // 0x9B
    op("STZ", Absolute),                       // 0x9C
    op("STA", AbsoluteX),                      // 0x9D
    op("STZ", AbsoluteX),                      // 0x9E
    op("STA", AbsoluteLongX),                  // 0x9F
    op("LDY", ImmediateX),                     // 0xA0
    op("LDA", DirectPageIndexedIndirect),      // 0xA1
    op("LDX", ImmediateX),                     // 0xA2
    op("LDA", StackRelative),                  // 0xA3
    op("LDY", DirectPage),                     // 0xA4
    op("LDA", DirectPage),                     // 0xA5
    op("LDX", DirectPage),                     // 0xA6
    op("LDA", DirectPageIndirectLong),         // 0xA7
    op("TAY", Implied),                        // 0xA8
    op("LDA", ImmediateM),                     // 0xA9
    op("TAX", Implied),                        // 0xAA
    op("PLB", Implied),                        // 0xAB
    op("LDY", Absolute),                       // 0xAC
    op("LDA", Absolute),                       // 0xAD
    op("LDX", Absolute),                       // 0xAE
    op("LDA", AbsoluteLong),                   // 0xAF
    op("BCS", Relative8),                      // 0xB0
    op("LDA", DirectPageIndirectIndexedY),     // 0xB1
    op("LDA", DirectPageIndirect),             // 0xB2
    op("LDA", StackRelativeIndirectY),         // 0xB3
    op("LDY", DirectPageX),                    // 0xB4
    op("LDA", DirectPageX),                    // 0xB5
    op("LDX", DirectPageY),                    // 0xB6
    op("LDA", DirectPageIndirectLongY),        // 0xB7
    op("CLV", Implied),                        // 0xB8
    op("LDA", AbsoluteY),                      // 0xB9
    op("TSX", Implied),                        // 0xBA
    op("TYX", Implied),                        // 0xBB
    op("LDY", AbsoluteX),                      // 0xBC
    op("LDA", AbsoluteX),                      // 0xBD
    op("LDX", AbsoluteY),                      // 0xBE
    op("LDA", AbsoluteLongX),                  // 0xBF
    op("CPY", ImmediateX),                     // 0xC0
    op("CMP", DirectPageIndexedIndirect),      // 0xC1
    op("REP", Immediate8),                     // 0xC2
    op("CMP", StackRelative),                  // 0xC3
    op("CPY", DirectPage),                     // 0xC4
    op("CMP", DirectPage),                     // 0xC5
    op("DEC", DirectPage),                     // 0xC6
    op("CMP", DirectPageIndirectLong),         // 0xC7
    op("INY", Implied),                        // 0xC8
    op("CMP", ImmediateM),                     // 0xC9
    op("DEX", Implied),                        // 0xCA
    op("WAI", Implied),                        // 0xCB
    op("CPY", Absolute),                       // 0xCC
    op("CMP", Absolute),                       // 0xCD
    op("DEC", Absolute),                       // 0xCE
    op("CMP", AbsoluteLong),                   // 0xCF
    op("BNE", Relative8),                      // 0xD0
    op("CMP", DirectPageIndirectIndexedY),     // 0xD1
    op("CMP", DirectPageIndirect),             // 0xD2
    op("CMP", StackRelativeIndirectY),         // 0xD3
    op("PEI", DirectPage),                     // 0xD4
    op("CMP", DirectPageX),                    // 0xD5
    op("DEC", DirectPageX),                    // 0xD6
    op("CMP", DirectPageIndirectLongY),        // 0xD7
    op("CLD", Implied),                        // 0xD8
    op("CMP", AbsoluteY),                      // 0xD9
    op("PHX", Implied),                        // 0xDA
    op("STP", Implied),                        // 0xDB
    op("JML", AbsoluteIndirectLong),           // 0xDC
    op("CMP", AbsoluteX),                      // 0xDD
    op("DEC", AbsoluteX),                      // 0xDE
    op("CMP", AbsoluteLongX),                  // 0xDF
    op("CPX", ImmediateX),                     // 0xE0
    op("SBC", DirectPageIndexedIndirect),      // 0xE1
    op("SEP", Immediate8),                     // 0xE2
    op("SBC", StackRelative),                  // 0xE3
    op("CPX", DirectPage),                     // 0xE4
    op("SBC", DirectPage),                     // 0xE5
    op("INC", DirectPage),                     // 0xE6
    op("SBC", DirectPageIndirectLong),         // 0xE7
    op("INX", Implied),                        // 0xE8
    op("SBC", ImmediateM),                     // 0xE9
    op("NOP", Implied),                        // 0xEA
    op("XBA", Implied),                        // 0xEB
    op("CPX", Absolute),                       // 0xEC
    op("SBC", Absolute),                       // 0xED
    op("INC", Absolute),                       // 0xEE
    op("SBC", AbsoluteLong),                   // 0xEF
    op("BEQ", Relative8),                      // 0xF0
    op("SBC", DirectPageIndirectIndexedY),     // 0xF1
    op("SBC", DirectPageIndirect),             // 0xF2
    op("SBC", StackRelativeIndirectY),         // 0xF3
    op("PEA", Immediate16),                    // 0xF4
    op("SBC", DirectPageX),                    // 0xF5
    op("INC", DirectPageX),                    // 0xF6
    op("SBC", DirectPageIndirectLongY),        // 0xF7
    op("SED", Implied),                        // 0xF8
    op("SBC", AbsoluteY),                      // 0xF9
    op("PLX", Implied),                        // 0xFA
    op("XCE", Implied),                        // 0xFB
    op("JSR", AbsoluteIndexedIndirect),        // 0xFC
    op("SBC", AbsoluteX),                      // 0xFD
    op("INC", AbsoluteX),                      // 0xFE
    op("SBC", AbsoluteLongX),                  // 0xFF
];

/// Total constant-time decode.
pub fn opcode_info(opcode: u8) -> &'static OpcodeInfo {
    &OPCODE_TABLE[opcode as usize]
}

/// Operand byte count for a mode under the given M/X widths (in bytes).
pub fn operand_size(mode: AddrMode, m_width_bytes: usize, x_width_bytes: usize) -> usize {
    match mode {
        Implied => 0,
        Immediate8 | Relative8 => 1,
        Immediate16 | Relative16 | BlockMove => 2,
        ImmediateM => m_width_bytes,
        ImmediateX => x_width_bytes,
        DirectPage
        | DirectPageX
        | DirectPageY
        | DirectPageIndirect
        | DirectPageIndexedIndirect
        | DirectPageIndirectIndexedY
        | DirectPageIndirectLong
        | DirectPageIndirectLongY
        | StackRelative
        | StackRelativeIndirectY => 1,
        Absolute
        | AbsoluteX
        | AbsoluteY
        | AbsoluteIndirect
        | AbsoluteIndexedIndirect
        | AbsoluteIndirectLong => 2,
        AbsoluteLong | AbsoluteLongX => 3,
    }
}

pub fn is_relative_mode(mode: AddrMode) -> bool {
    matches!(mode, Relative8 | Relative16)
}

pub fn is_immediate_m_mode(mode: AddrMode) -> bool {
    mode == ImmediateM
}

pub fn is_immediate_x_mode(mode: AddrMode) -> bool {
    mode == ImmediateX
}

/// Sorted, deduplicated mnemonic list (completion and token highlighting).
pub fn mnemonics() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = OPCODE_TABLE.iter().map(|info| info.mnemonic).collect();
    names.sort_unstable();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_length_never_exceeds_four_bytes() {
        for info in OPCODE_TABLE.iter() {
            let size = operand_size(info.mode, 2, 2);
            assert!(1 + size <= 4, "{} too long", info.mnemonic);
        }
    }

    #[test]
    fn immediate_modes_track_width_state() {
        assert_eq!(operand_size(ImmediateM, 1, 2), 1);
        assert_eq!(operand_size(ImmediateM, 2, 1), 2);
        assert_eq!(operand_size(ImmediateX, 1, 2), 2);
        assert_eq!(operand_size(ImmediateX, 2, 1), 1);
    }

    #[test]
    fn decode_covers_flag_instructions() {
        assert_eq!(opcode_info(0xC2).mnemonic, "REP");
        assert_eq!(opcode_info(0xE2).mnemonic, "SEP");
        assert_eq!(opcode_info(0x28).mnemonic, "PLP");
        assert_eq!(opcode_info(0xFB).mnemonic, "XCE");
        assert_eq!(opcode_info(0x80).mode, Relative8);
        assert_eq!(opcode_info(0x82).mode, Relative16);
    }

    #[test]
    fn mnemonic_list_is_sorted_and_unique() {
        let names = mnemonics();
        assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(names.contains(&"LDA"));
    }
}
