//! Opcodes of the netlist language and their fixed signatures.

use core::fmt;

/// The closed set of netlist instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Not,
    And,
    Or,
    Xor,
    Nand,
    Nxor,
    Mux,
    Reg,
    Ram,
    Rom,
    Snip,
    Slice,
    Select,
    Concat,
    Copy,
}

/// Argument counts an opcode requires.
///
/// `buses` operands may be variables or constants; `statics` operands must
/// be integer literals and come first in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub buses: usize,
    pub statics: usize,
}

impl Opcode {
    pub const ALL: [Opcode; 15] = [
        Opcode::Not,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Nand,
        Opcode::Nxor,
        Opcode::Mux,
        Opcode::Reg,
        Opcode::Ram,
        Opcode::Rom,
        Opcode::Snip,
        Opcode::Slice,
        Opcode::Select,
        Opcode::Concat,
        Opcode::Copy,
    ];

    pub fn signature(self) -> Signature {
        let (buses, statics) = match self {
            Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Nand | Opcode::Nxor => (2, 0),
            Opcode::Not | Opcode::Reg | Opcode::Copy => (1, 0),
            Opcode::Mux => (3, 0),
            Opcode::Concat => (2, 0),
            Opcode::Snip | Opcode::Slice => (1, 2),
            Opcode::Select => (1, 1),
            Opcode::Rom => (1, 2),
            Opcode::Ram => (4, 2),
        };
        Signature { buses, statics }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Opcode::Not => "NOT",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Nand => "NAND",
            Opcode::Nxor => "NXOR",
            Opcode::Mux => "MUX",
            Opcode::Reg => "REG",
            Opcode::Ram => "RAM",
            Opcode::Rom => "ROM",
            Opcode::Snip => "SNIP",
            Opcode::Slice => "SLICE",
            Opcode::Select => "SELECT",
            Opcode::Concat => "CONCAT",
            Opcode::Copy => "COPY",
        }
    }

    pub fn from_keyword(text: &str) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| op.keyword() == text)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
