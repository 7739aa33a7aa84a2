pub mod bytecode;
pub mod host;

use crate::ast::Slot;
use bytecode::{Instr, Program};
use host::{HostContext, HostFunctions, Value};

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },
    #[error("slot ${slot} out of range (memory holds {len} cells)")]
    SlotOutOfRange { slot: Slot, len: usize },
    #[error("cannot shrink by {count}: only {available} slots allocated")]
    ShrinkUnderflow { count: u32, available: usize },
    #[error("condition ${slot} holds {found}, expected bool")]
    ConditionNotBool { slot: Slot, found: &'static str },
    #[error("host function {name} failed: {source}")]
    Host {
        name: String,
        #[source]
        source: host::HostError,
    },
}

type VmResult<T> = Result<T, VmError>;

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction executed; more may follow.
    Continue,
    /// The pc is at or past the end of the tape. Normal termination.
    Halted,
}

/// Why [`Vm::run`] returned. Each variant carries the steps executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished { steps: u64 },
    StepLimit { steps: u64 },
    Cancelled { steps: u64 },
}

/// A single-stepping interpreter over a borrowed program.
///
/// `memory[0]` is a reserved cell so that slot `n` lives at `memory[n]`.
/// The program and host table are only read, so one program can drive many
/// VMs at once, each with its own memory.
pub struct Vm<'a> {
    program: &'a Program,
    host: &'a HostFunctions,
    pc: usize,
    memory: Vec<Value>,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a Program, host: &'a HostFunctions) -> Self {
        Vm { program, host, pc: 0, memory: vec![Value::Nil] }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Full memory, including the reserved cell at index 0.
    pub fn memory(&self) -> &[Value] {
        &self.memory
    }

    pub fn is_halted(&self) -> bool {
        self.pc >= self.program.len()
    }

    fn read(&self, slot: Slot) -> VmResult<&Value> {
        self.memory
            .get(slot as usize)
            .ok_or(VmError::SlotOutOfRange { slot, len: self.memory.len() })
    }

    /// Execute the instruction at pc. On error nothing is changed.
    pub fn step(&mut self, ctx: &HostContext) -> VmResult<Step> {
        let (program, host) = (self.program, self.host);
        let Some(instr) = program.get(self.pc) else {
            return Ok(Step::Halted);
        };
        tracing::trace!(pc = self.pc, %instr, "step");

        match instr {
            Instr::Call { name, inputs, output } => {
                let func = host
                    .get(name)
                    .ok_or_else(|| VmError::UnknownFunction { name: name.clone() })?;
                let args = inputs
                    .iter()
                    .map(|slot| self.read(*slot).cloned())
                    .collect::<VmResult<Vec<_>>>()?;
                if let Some(out) = output {
                    self.read(*out)?;
                }
                let result = func(ctx, &args).map_err(|source| {
                    tracing::warn!(function = %name, error = %source, "host call failed");
                    VmError::Host { name: name.clone(), source }
                })?;
                if let Some(out) = output {
                    self.memory[*out as usize] = result;
                }
                self.pc += 1;
            }
            Instr::JumpIf { cond: 0, target } => self.pc = *target,
            Instr::JumpIf { cond, target } => match self.read(*cond)? {
                Value::Bool(true) => self.pc = *target,
                Value::Bool(false) => self.pc += 1,
                other => {
                    return Err(VmError::ConditionNotBool { slot: *cond, found: other.type_name() });
                }
            },
            Instr::Grow(n) => {
                self.memory.resize(self.memory.len() + *n as usize, Value::Nil);
                self.pc += 1;
            }
            Instr::Shrink(n) => {
                let available = self.memory.len() - 1;
                if *n as usize > available {
                    return Err(VmError::ShrinkUnderflow { count: *n, available });
                }
                self.memory.truncate(self.memory.len() - *n as usize);
                self.pc += 1;
            }
        }
        Ok(Step::Continue)
    }

    /// Step until the program halts, `max_steps` is reached, or `ctx` is
    /// cancelled. `None` means no step limit.
    pub fn run(&mut self, ctx: &HostContext, max_steps: Option<u64>) -> VmResult<RunOutcome> {
        let mut steps = 0u64;
        loop {
            if ctx.is_cancelled() {
                return Ok(RunOutcome::Cancelled { steps });
            }
            if max_steps.is_some_and(|max| steps >= max) {
                if self.is_halted() {
                    return Ok(RunOutcome::Finished { steps });
                }
                return Ok(RunOutcome::StepLimit { steps });
            }
            match self.step(ctx)? {
                Step::Continue => steps += 1,
                Step::Halted => return Ok(RunOutcome::Finished { steps }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_source;
    use super::host::{CancelToken, HostError};
    use std::sync::{Arc, Mutex};

    /// Host table recording every `print` call.
    fn recording_host() -> (HostFunctions, Arc<Mutex<Vec<Vec<Value>>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut host = HostFunctions::new();
        host.register("true", |_, _| Ok(Value::Bool(true)))
            .register("false", |_, _| Ok(Value::Bool(false)))
            .register("num", |_, _| Ok(Value::Number(7.0)));
        let sink = Arc::clone(&log);
        host.register("print", move |_, args| {
            sink.lock().unwrap().push(args.to_vec());
            Ok(Value::Nil)
        });
        (host, log)
    }

    fn run_to_end(source: &str, host: &HostFunctions) -> Vm<'static> {
        let program = Box::leak(Box::new(compile_source(source).unwrap()));
        let host = Box::leak(Box::new(host.clone()));
        let mut vm = Vm::new(program, host);
        let outcome = vm.run(&HostContext::new(), Some(10_000)).unwrap();
        assert!(matches!(outcome, RunOutcome::Finished { .. }), "got {outcome:?}");
        vm
    }

    #[test]
    fn break_scenario_prints_once() {
        let (host, log) = recording_host();
        let vm = run_to_end(
            "{ $a = true; loop { $b = false; cond $a { print $b; break; } print $a; } }",
            &host,
        );
        assert_eq!(*log.lock().unwrap(), vec![vec![Value::Bool(false)]]);
        // Every block released its slots.
        assert_eq!(vm.memory(), &[Value::Nil]);
    }

    #[test]
    fn else_branch_runs_when_false() {
        let (host, log) = recording_host();
        run_to_end("{ $c = false; $x = num; cond $c { print $c; } else { print $x; } }", &host);
        assert_eq!(*log.lock().unwrap(), vec![vec![Value::Number(7.0)]]);
    }

    #[test]
    fn labeled_break_leaves_outer_loop() {
        let (host, log) = recording_host();
        run_to_end(
            "{ $t = true; loop outer { loop { { $n = num; cond $t { break outer; } } print $t; } print $t; } print $t; }",
            &host,
        );
        assert_eq!(*log.lock().unwrap(), vec![vec![Value::Bool(true)]]);
    }

    #[test]
    fn late_parent_binding_does_not_clobber_child() {
        let (host, log) = recording_host();
        run_to_end("{ $a = num; { $x = true; print $x $a; } $late = false; print $a $late; }", &host);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                vec![Value::Bool(true), Value::Number(7.0)],
                vec![Value::Number(7.0), Value::Bool(false)],
            ]
        );
    }

    #[test]
    fn grow_and_shrink_advance_pc() {
        let program = Program::new(vec![Instr::Grow(3), Instr::Shrink(2)]);
        let host = HostFunctions::new();
        let mut vm = Vm::new(&program, &host);
        let ctx = HostContext::new();
        assert_eq!(vm.step(&ctx).unwrap(), Step::Continue);
        assert_eq!((vm.pc(), vm.memory().len()), (1, 4));
        assert_eq!(vm.step(&ctx).unwrap(), Step::Continue);
        assert_eq!((vm.pc(), vm.memory().len()), (2, 2));
        assert_eq!(vm.step(&ctx).unwrap(), Step::Halted);
        assert_eq!(vm.step(&ctx).unwrap(), Step::Halted);
    }

    #[test]
    fn unknown_function_leaves_state_untouched() {
        let program = Program::new(vec![
            Instr::Grow(1),
            Instr::Call { name: "missing".into(), inputs: vec![], output: Some(1) },
        ]);
        let host = HostFunctions::new();
        let mut vm = Vm::new(&program, &host);
        let ctx = HostContext::new();
        vm.step(&ctx).unwrap();
        let before = vm.memory().to_vec();
        let err = vm.step(&ctx).unwrap_err();
        assert!(matches!(err, VmError::UnknownFunction { ref name } if name == "missing"));
        assert_eq!(vm.pc(), 1);
        assert_eq!(vm.memory(), before.as_slice());
    }

    #[test]
    fn input_out_of_range() {
        let program = Program::new(vec![Instr::Call { name: "f".into(), inputs: vec![1], output: None }]);
        let mut host = HostFunctions::new();
        host.register("f", |_, _| Ok(Value::Nil));
        let mut vm = Vm::new(&program, &host);
        let err = vm.step(&HostContext::new()).unwrap_err();
        assert!(matches!(err, VmError::SlotOutOfRange { slot: 1, len: 1 }));
        assert_eq!(vm.pc(), 0);
    }

    #[test]
    fn output_out_of_range_checked_before_call() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut host = HostFunctions::new();
        host.register("f", move |_, _| {
            *counter.lock().unwrap() += 1;
            Ok(Value::Nil)
        });
        let program = Program::new(vec![Instr::Call { name: "f".into(), inputs: vec![], output: Some(4) }]);
        let mut vm = Vm::new(&program, &host);
        assert!(matches!(vm.step(&HostContext::new()), Err(VmError::SlotOutOfRange { slot: 4, .. })));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn host_failure_is_a_step_error() {
        let mut host = HostFunctions::new();
        host.register("boom", |_, _| Err(HostError::new("exploded")));
        let program = Program::new(vec![
            Instr::Grow(1),
            Instr::Call { name: "boom".into(), inputs: vec![], output: Some(1) },
        ]);
        let mut vm = Vm::new(&program, &host);
        let err = vm.run(&HostContext::new(), None).unwrap_err();
        assert_eq!(err.to_string(), "host function boom failed: exploded");
        assert_eq!(vm.pc(), 1);
        assert_eq!(vm.memory(), &[Value::Nil, Value::Nil]);
    }

    #[test]
    fn condition_must_be_bool() {
        let program = Program::new(vec![Instr::Grow(1), Instr::JumpIf { cond: 1, target: 0 }]);
        let host = HostFunctions::new();
        let mut vm = Vm::new(&program, &host);
        let err = vm.run(&HostContext::new(), None).unwrap_err();
        assert!(matches!(err, VmError::ConditionNotBool { slot: 1, found: "nil" }));
        assert_eq!(vm.pc(), 1);
    }

    #[test]
    fn shrink_cannot_release_reserved_cell() {
        let program = Program::new(vec![Instr::Grow(1), Instr::Shrink(2)]);
        let host = HostFunctions::new();
        let mut vm = Vm::new(&program, &host);
        let err = vm.run(&HostContext::new(), None).unwrap_err();
        assert!(matches!(err, VmError::ShrinkUnderflow { count: 2, available: 1 }));
        assert_eq!(vm.memory().len(), 2);
    }

    #[test]
    fn infinite_loop_stops_at_step_limit() {
        let program = compile_source("{ loop { } }").unwrap();
        let host = HostFunctions::new();
        let mut vm = Vm::new(&program, &host);
        assert_eq!(
            vm.run(&HostContext::new(), Some(50)).unwrap(),
            RunOutcome::StepLimit { steps: 50 }
        );
    }

    #[test]
    fn finishing_exactly_at_limit_is_finished() {
        let program = Program::new(vec![Instr::Grow(1), Instr::Shrink(1)]);
        let host = HostFunctions::new();
        let mut vm = Vm::new(&program, &host);
        assert_eq!(
            vm.run(&HostContext::new(), Some(2)).unwrap(),
            RunOutcome::Finished { steps: 2 }
        );
    }

    #[test]
    fn host_can_cancel_the_run() {
        let token = CancelToken::new();
        let mut host = HostFunctions::new();
        host.register("stop", |ctx, _| {
            ctx.cancel.cancel();
            Ok(Value::Nil)
        });
        let program = compile_source("{ loop { stop; } }").unwrap();
        let mut vm = Vm::new(&program, &host);
        let outcome = vm.run(&HostContext::with_cancel(token.clone()), None).unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled { steps: 1 });
        assert!(token.is_cancelled());
    }

    #[test]
    fn one_program_many_vms() {
        let program = compile_source("{ $x = num; loop { $t = true; cond $t { break; } } print $x; }").unwrap();
        let (host, log) = recording_host();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut vm = Vm::new(&program, &host);
                    let outcome = vm.run(&HostContext::new(), Some(1_000)).unwrap();
                    assert!(matches!(outcome, RunOutcome::Finished { .. }));
                });
            }
        });
        assert_eq!(log.lock().unwrap().len(), 4);
    }
}
