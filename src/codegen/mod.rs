pub mod fmt;

use crate::ast::*;
use crate::vm::bytecode::{Instr, Program};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("unsupported expression: {what} cannot be used here")]
    UnsupportedExpression { what: String, span: Span },
    #[error("break outside loop")]
    BreakOutsideLoop { span: Span },
    #[error("unknown loop label: {label}")]
    UnknownLoopLabel { label: String, span: Span },
    #[error("loop label '{label}' is already used by an enclosing loop")]
    DuplicateLoopLabel { label: String, span: Span, previous: Span },
    #[error("variable ${name} has no slot; resolve scopes before generating code")]
    UnresolvedVariable { name: String },
    #[error("jump to undefined label L{label}")]
    UndefinedLabel { label: LabelId },
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::UnsupportedExpression { span, .. }
            | CompileError::BreakOutsideLoop { span }
            | CompileError::UnknownLoopLabel { span, .. }
            | CompileError::DuplicateLoopLabel { span, .. } => Some(*span),
            CompileError::UnresolvedVariable { .. } | CompileError::UndefinedLabel { .. } => None,
        }
    }
}

type Result<T> = std::result::Result<T, CompileError>;

pub type LabelId = u32;

/// Symbolic instruction stream: jumps name labels, labels take no pc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ir {
    Call { name: String, inputs: Vec<Slot>, output: Option<Slot> },
    /// `cond` 0 means unconditional.
    Jump { cond: Slot, label: LabelId },
    Label(LabelId),
    Grow(u32),
    Shrink(u32),
}

impl std::fmt::Display for Ir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ir::Call { name, inputs, output } => {
                let call = Instr::Call { name: name.clone(), inputs: inputs.clone(), output: *output };
                write!(f, "{call}")
            }
            Ir::Jump { cond: 0, label } => write!(f, "jump L{label}"),
            Ir::Jump { cond, label } => write!(f, "jump-if ${cond} L{label}"),
            Ir::Label(id) => write!(f, "L{id}:"),
            Ir::Grow(n) => write!(f, "grow {n}"),
            Ir::Shrink(n) => write!(f, "shrink {n}"),
        }
    }
}

// ── Lowering ────────────────────────────────────────────────────────

/// An enclosing loop a break can target.
struct LoopCtx {
    label: Option<String>,
    span: Span,
    end: LabelId,
    /// Slots grown when control is at the top of the loop body.
    depth: u32,
}

struct Lowering {
    ir: Vec<Ir>,
    next_label: LabelId,
    loops: Vec<LoopCtx>,
    /// Slots grown by all blocks currently open.
    depth: u32,
}

impl Lowering {
    fn new() -> Self {
        Lowering { ir: Vec::new(), next_label: 0, loops: Vec::new(), depth: 0 }
    }

    fn fresh_label(&mut self) -> LabelId {
        self.next_label += 1;
        self.next_label
    }

    fn emit(&mut self, ir: Ir) {
        self.ir.push(ir);
    }

    fn grow(&mut self, n: u32) {
        if n > 0 {
            self.emit(Ir::Grow(n));
            self.depth += n;
        }
    }

    fn shrink(&mut self, n: u32) {
        if n > 0 {
            self.emit(Ir::Shrink(n));
            self.depth -= n;
        }
    }

    fn lower_block(&mut self, block: &Block) -> Result<()> {
        self.grow(block.local_slots);
        self.lower_stmts(&block.stmts)?;
        self.shrink(block.local_slots);
        Ok(())
    }

    fn lower_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Call(call) => {
                let inputs = call
                    .call
                    .args
                    .iter()
                    .map(|arg| slot_of(arg, &call.call.span))
                    .collect::<Result<Vec<_>>>()?;
                let output = match &call.result {
                    Some(var) => Some(var_slot(var)?),
                    None => None,
                };
                self.emit(Ir::Call { name: call.call.name.clone(), inputs, output });
                Ok(())
            }

            // cond? goto start_of_true
            // false branch (may be empty)
            // goto end_of_true
            // start_of_true:
            // true branch
            // end_of_true:
            Stmt::Cond(cond) => {
                let cond_slot = slot_of(&cond.condition, &Span::UNKNOWN)?;
                let start_of_true = self.fresh_label();
                let end_of_true = self.fresh_label();
                self.emit(Ir::Jump { cond: cond_slot, label: start_of_true });
                if let Some(else_block) = &cond.else_block {
                    self.lower_block(else_block)?;
                }
                self.emit(Ir::Jump { cond: 0, label: end_of_true });
                self.emit(Ir::Label(start_of_true));
                self.lower_block(&cond.then_block)?;
                self.emit(Ir::Label(end_of_true));
                Ok(())
            }

            // grow (if the body declares locals)
            // start_of_loop:
            // body
            // goto start_of_loop
            // end_of_loop:
            // shrink (matching the grow)
            Stmt::Loop(lp) => {
                if let Some(label) = &lp.label {
                    if let Some(outer) =
                        self.loops.iter().find(|l| l.label.as_deref() == Some(label.as_str()))
                    {
                        return Err(CompileError::DuplicateLoopLabel {
                            label: label.clone(),
                            span: lp.span,
                            previous: outer.span,
                        });
                    }
                }
                let start_of_loop = self.fresh_label();
                let end_of_loop = self.fresh_label();

                self.grow(lp.body.local_slots);
                self.emit(Ir::Label(start_of_loop));
                self.loops.push(LoopCtx {
                    label: lp.label.clone(),
                    span: lp.span,
                    end: end_of_loop,
                    depth: self.depth,
                });
                let body = self.lower_stmts(&lp.body.stmts);
                self.loops.pop();
                body?;
                self.emit(Ir::Jump { cond: 0, label: start_of_loop });
                self.emit(Ir::Label(end_of_loop));
                self.shrink(lp.body.local_slots);
                Ok(())
            }

            Stmt::Break(brk) => {
                let target = match &brk.label {
                    None => self.loops.last(),
                    Some(label) => self.loops.iter().rev().find(|l| l.label.as_ref() == Some(label)),
                };
                let Some(target) = target else {
                    return Err(match &brk.label {
                        None => CompileError::BreakOutsideLoop { span: brk.span },
                        Some(label) => CompileError::UnknownLoopLabel { label: label.clone(), span: brk.span },
                    });
                };
                // Unwind blocks opened inside the loop body; the body's own
                // slots are released after end_of_loop.
                let unwind = self.depth - target.depth;
                let end = target.end;
                if unwind > 0 {
                    self.emit(Ir::Shrink(unwind));
                }
                self.emit(Ir::Jump { cond: 0, label: end });
                Ok(())
            }

            Stmt::Block(block) => self.lower_block(block),
        }
    }
}

fn var_slot(var: &Var) -> Result<Slot> {
    var.slot.ok_or_else(|| CompileError::UnresolvedVariable { name: var.name.clone() })
}

/// Slot read by an argument or condition. Only `$x` and `($x)` qualify.
fn slot_of(expr: &Expr, context: &Span) -> Result<Slot> {
    match expr {
        Expr::Var(var) => var_slot(var),
        Expr::Paren(inner) => slot_of(inner, context),
        Expr::Call(call) => Err(CompileError::UnsupportedExpression {
            what: format!("call to '{}' as a value", call.name),
            span: if call.span == Span::UNKNOWN { *context } else { call.span },
        }),
    }
}

/// Lower a slot-annotated block into symbolic IR.
pub fn lower(root: &Block) -> Result<Vec<Ir>> {
    let mut lowering = Lowering::new();
    lowering.lower_block(root)?;
    Ok(lowering.ir)
}

/// Replace labels with absolute pcs and drop the label pseudo-instructions.
pub fn resolve_labels(ir: &[Ir]) -> Result<Program> {
    let mut pcs: Vec<Option<usize>> = Vec::new();
    let mut pc = 0;
    for inst in ir {
        match inst {
            Ir::Label(id) => {
                let id = *id as usize;
                if pcs.len() <= id {
                    pcs.resize(id + 1, None);
                }
                pcs[id] = Some(pc);
            }
            _ => pc += 1,
        }
    }

    let mut code = Vec::with_capacity(pc);
    for inst in ir {
        match inst {
            Ir::Call { name, inputs, output } => code.push(Instr::Call {
                name: name.clone(),
                inputs: inputs.clone(),
                output: *output,
            }),
            Ir::Jump { cond, label } => {
                let target = pcs
                    .get(*label as usize)
                    .copied()
                    .flatten()
                    .ok_or(CompileError::UndefinedLabel { label: *label })?;
                code.push(Instr::JumpIf { cond: *cond, target });
            }
            Ir::Label(_) => {}
            Ir::Grow(n) => code.push(Instr::Grow(*n)),
            Ir::Shrink(n) => code.push(Instr::Shrink(*n)),
        }
    }
    Ok(Program::new(code))
}

/// Generate a runnable program from a resolved block.
pub fn generate(root: &Block) -> Result<Program> {
    let ir = lower(root)?;
    let program = resolve_labels(&ir)?;
    tracing::debug!(ir = ir.len(), instructions = program.len(), "generated bytecode");
    Ok(program)
}
