use serde::{Deserialize, Serialize};

use crate::ast::Slot;

/// One instruction of the final tape. Each occupies exactly one pc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    /// Call a host function with the values at `inputs`; store the result
    /// at `output` if present.
    Call {
        name: String,
        inputs: Vec<Slot>,
        output: Option<Slot>,
    },
    /// Jump to `target` when `cond` is 0 or the bool at slot `cond` is true.
    JumpIf { cond: Slot, target: usize },
    /// Append N zero-valued slots to memory.
    Grow(u32),
    /// Drop the last N slots of memory.
    Shrink(u32),
}

impl Instr {
    /// Unconditional jump.
    pub fn jump(target: usize) -> Self {
        Instr::JumpIf { cond: 0, target }
    }

    pub fn target(&self) -> Option<usize> {
        match self {
            Instr::JumpIf { target, .. } => Some(*target),
            _ => None,
        }
    }
}

impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instr::Call { name, inputs, output } => {
                write!(f, "call {name} [")?;
                for (i, slot) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "${slot}")?;
                }
                write!(f, "]")?;
                if let Some(out) = output {
                    write!(f, " -> ${out}")?;
                }
                Ok(())
            }
            Instr::JumpIf { cond: 0, target } => write!(f, "jump {target}"),
            Instr::JumpIf { cond, target } => write!(f, "jump-if ${cond} {target}"),
            Instr::Grow(n) => write!(f, "grow {n}"),
            Instr::Shrink(n) => write!(f, "shrink {n}"),
        }
    }
}

/// An executable instruction tape. Immutable once built; any number of VMs
/// may run the same program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<Instr>,
}

impl Program {
    pub fn new(code: Vec<Instr>) -> Self {
        Program { code }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instr> {
        self.code.get(pc)
    }

    /// Every jump lands on an instruction or on the end-of-tape sentinel.
    pub fn jump_targets_valid(&self) -> bool {
        self.code.iter().filter_map(Instr::target).all(|t| t <= self.code.len())
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (pc, instr) in self.code.iter().enumerate() {
            writeln!(f, "{pc:04}  {instr}")?;
        }
        Ok(())
    }
}
