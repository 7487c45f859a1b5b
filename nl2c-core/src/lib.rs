//! Core pipeline of the nl2c netlist compiler.
//!
//! A netlist describes a synchronous circuit as equations over bit buses.
//! The pipeline turns it into C code that simulates one clock step:
//!
//!   netlist source
//!     -> lexer      (tokens)
//!     -> parser     (raw netlist)
//!     -> netlist::build (symbol table + width-checked equations)
//!     -> schedule   (combinational evaluation order)
//!     -> step_ir    (typed step program)
//!     -> codegen_c  (header + source text)
//!
//! The CLI and any other front-end should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: symbols, opcodes, width checking, netlist model
// ---------------------------------------------------------------------

pub mod symbols;
pub mod types;
pub mod typecheck;
pub mod netlist;
pub mod schedule;

// ---------------------------------------------------------------------
// Back-end: step IR, C code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod step_ir;
pub mod codegen_c;
pub mod compiler;

#[cfg(test)]
mod step_eval;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{ArtifactNames, CompilationArtifact, CompileOptions, compile, compile_netlist};
pub use error::CoreError;
