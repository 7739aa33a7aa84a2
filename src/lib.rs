//! A small block-structured language compiled to a flat jump/call tape.
//!
//! Source text goes through [`parser::parse_source`], scopes and slots are
//! assigned by [`resolve::resolve`], [`codegen::generate`] lowers the tree to
//! a [`vm::bytecode::Program`], and [`vm::Vm`] runs it against a table of
//! host functions.

pub mod ast;
pub mod codegen;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod vm;

use ast::Block;
use vm::bytecode::Program;
use vm::host::{HostContext, HostFunctions};
use vm::{RunOutcome, Vm};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Frontend(#[from] parser::FrontendError),
    #[error(transparent)]
    Compile(#[from] codegen::CompileError),
    #[error(transparent)]
    Vm(#[from] vm::VmError),
}

/// Assign slots in place, then generate code.
pub fn compile(root: &mut Block) -> Result<Program, codegen::CompileError> {
    resolve::resolve(root);
    codegen::generate(root)
}

pub fn compile_source(source: &str) -> Result<Program, Error> {
    let mut root = parser::parse_source(source)?;
    Ok(compile(&mut root)?)
}

/// Compile `source` and run it on a fresh VM until it halts, hits
/// `max_steps`, or `ctx` is cancelled.
pub fn run_source(
    source: &str,
    host: &HostFunctions,
    ctx: &HostContext,
    max_steps: Option<u64>,
) -> Result<RunOutcome, Error> {
    let program = compile_source(source)?;
    let outcome = Vm::new(&program, host).run(ctx, max_steps)?;
    tracing::debug!(?outcome, "run finished");
    Ok(outcome)
}
