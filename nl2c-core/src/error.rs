use thiserror::Error;

use crate::types::Opcode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("lex error at {line}:{column}: {message}")]
    LexError {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("parse error at {line}:{column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("bus `{name}` is {width} bits wide, buses are limited to 64 bits")]
    OversizedBus { name: String, width: u64 },
    #[error("bus `{name}` would have zero width")]
    EmptyBus { name: String },
    #[error("{opcode} expects {expected} {what} argument(s), {found} provided")]
    ArityMismatch {
        opcode: Opcode,
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{opcode} static argument #{index} must be an integer literal, found `{found}`")]
    StaticArgument {
        opcode: Opcode,
        index: usize,
        found: String,
    },
    #[error("bus length mismatch: {0}")]
    BusWidthMismatch(String),
    #[error("cannot infer bus width: {0}")]
    CannotInferWidth(String),
    #[error("{opcode} static argument out of range: {message}")]
    StaticOutOfRange { opcode: Opcode, message: String },
    #[error("constant {value:#x} does not fit in {width} bit(s)")]
    ConstantTooWide { value: u64, width: u32 },
    #[error(
        "`{0}` has no value; add it to INPUT or provide a `{0} = ...` equation"
    )]
    UndeclaredVariable(String),
    #[error("`{0}` is defined more than once (inputs cannot be assigned either)")]
    Redefinition(String),
    #[error("cyclic netlist, path is made of [{}]", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    #[error("bus `{0}` reached code generation without a known width")]
    UnresolvedWidth(String),
}
