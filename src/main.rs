use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use looplang::ast::Block;
use looplang::codegen::{self, fmt::FmtMode};
use looplang::diagnostic::{Diagnostic, ansi::AnsiRenderer, json};
use looplang::vm::host::{HostContext, prelude};
use looplang::vm::{RunOutcome, Vm};
use looplang::{parser, resolve};

/// Compile and run looplang programs
#[derive(Parser, Debug)]
#[command(name = "looplang", version)]
#[command(about = "Compile, inspect and run looplang programs", long_about = None)]
struct Cli {
    /// Report errors as one JSON object per line on stderr
    #[arg(long, global = true)]
    json_errors: bool,

    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a program and run it with the built-in host functions
    Run {
        file: PathBuf,
        /// Stop after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,
    },
    /// Print a program in canonical layout
    Fmt {
        file: PathBuf,
        /// Show the slot assigned to every variable
        #[arg(long)]
        annotate: bool,
    },
    /// Print the compiled bytecode
    Dump {
        file: PathBuf,
        /// Bytecode as JSON
        #[arg(long, conflicts_with = "ir")]
        json: bool,
        /// Symbolic code before label resolution
        #[arg(long)]
        ir: bool,
    },
    /// Print the syntax tree as JSON
    Ast { file: PathBuf },
}

/// A failure plus the source it points into, if any.
type CliResult<T> = Result<T, Diagnostic>;

fn read_source(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Diagnostic::error(format!("cannot read {}: {e}", path.display())))
}

fn parse_file(path: &Path) -> CliResult<(String, Block)> {
    let source = read_source(path)?;
    match parser::parse_source(&source) {
        Ok(block) => Ok((source, block)),
        Err(e) => Err(Diagnostic::from(&e).with_source(source)),
    }
}

fn compile_file(path: &Path) -> CliResult<looplang::vm::bytecode::Program> {
    let (source, mut block) = parse_file(path)?;
    looplang::compile(&mut block).map_err(|e| Diagnostic::from(&e).with_source(source))
}

fn to_json<T: serde::Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| Diagnostic::error(format!("serialization failed: {e}")))
}

fn cmd_run(path: &Path, max_steps: Option<u64>) -> CliResult<()> {
    let program = compile_file(path)?;
    let host = prelude();
    let mut vm = Vm::new(&program, &host);
    let outcome = vm.run(&HostContext::new(), max_steps).map_err(|e| {
        Diagnostic::from(&e).with_note(format!("at instruction {}: {}", vm.pc(), describe(&program, vm.pc())))
    })?;
    match outcome {
        RunOutcome::Finished { steps } => {
            tracing::debug!(steps, "program finished");
            Ok(())
        }
        RunOutcome::StepLimit { steps } => Err(Diagnostic::error(format!(
            "step limit reached after {steps} instructions"
        ))
        .with_code("LL-R006")
        .with_suggestion("raise --max-steps or check for a loop without a break")),
        RunOutcome::Cancelled { steps } => {
            Err(Diagnostic::error(format!("cancelled after {steps} instructions")))
        }
    }
}

fn describe(program: &looplang::vm::bytecode::Program, pc: usize) -> String {
    program.get(pc).map_or_else(|| "end of program".to_string(), |i| i.to_string())
}

fn cmd_fmt(path: &Path, annotate: bool) -> CliResult<()> {
    let (_, mut block) = parse_file(path)?;
    let mode = if annotate {
        resolve::resolve(&mut block);
        FmtMode::Annotated
    } else {
        FmtMode::Plain
    };
    print!("{}", codegen::fmt::format(&block, mode));
    Ok(())
}

fn cmd_dump(path: &Path, as_json: bool, ir: bool) -> CliResult<()> {
    if ir {
        let (source, mut block) = parse_file(path)?;
        resolve::resolve(&mut block);
        let code = codegen::lower(&block).map_err(|e| Diagnostic::from(&e).with_source(source))?;
        for inst in &code {
            println!("{inst}");
        }
        return Ok(());
    }
    let program = compile_file(path)?;
    if as_json {
        println!("{}", to_json(&program)?);
    } else {
        print!("{program}");
    }
    Ok(())
}

fn cmd_ast(path: &Path) -> CliResult<()> {
    let (_, block) = parse_file(path)?;
    println!("{}", to_json(&block)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    use tracing_subscriber::{EnvFilter, fmt};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();

    let result = match &cli.command {
        Command::Run { file, max_steps } => cmd_run(file, *max_steps),
        Command::Fmt { file, annotate } => cmd_fmt(file, *annotate),
        Command::Dump { file, json, ir } => cmd_dump(file, *json, *ir),
        Command::Ast { file } => cmd_ast(file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(d) => {
            if cli.json_errors {
                eprintln!("{}", json::render(&d));
            } else {
                let use_color = !cli.no_color && std::io::stderr().is_terminal();
                eprint!("{}", AnsiRenderer { use_color }.render(&d));
            }
            ExitCode::FAILURE
        }
    }
}
