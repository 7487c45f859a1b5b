//! Raw parse tree of a netlist, before any typing.

use crate::types::Opcode;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawNetlist {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub vars: Vec<TypedVar>,
    pub equations: Vec<RawEquation>,
}

/// `name` or `name : width` from the `VAR` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedVar {
    pub name: String,
    pub width: Option<u64>,
}

/// `target = OPCODE operand+`. A missing opcode means `COPY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEquation {
    pub target: String,
    pub opcode: Option<Opcode>,
    pub operands: Vec<Operand>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Name(String),
    /// Integer literal. Bare binary strings such as `0101` carry their
    /// digit count as width.
    Literal { value: u64, width: Option<u32> },
}

impl RawEquation {
    pub fn opcode(&self) -> Opcode {
        self.opcode.unwrap_or(Opcode::Copy)
    }
}
