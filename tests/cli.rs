use std::io::Write;
use std::process::{Command, Output};

fn looplang() -> Command {
    Command::new(env!("CARGO_BIN_EXE_looplang"))
}

fn source_file(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".ll").tempfile().expect("temp file");
    file.write_all(source.as_bytes()).expect("write source");
    file
}

fn run(args: &[&str], source: &str) -> Output {
    let file = source_file(source);
    looplang()
        .args(args)
        .arg(file.path())
        .output()
        .expect("failed to run looplang")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

const SCENARIO: &str = "{ $a = true; loop { $b = false; cond $a { print $b; break; } print $a; } }";

// --- run ---

#[test]
fn run_break_scenario() {
    let out = run(&["run"], SCENARIO);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "false\n");
}

#[test]
fn run_else_branch_and_logic() {
    let src = "{\n  $t = true;\n  $f = false;\n  $c = and $t $f;\n  cond $c { print $t; } else { $n = not $c; print $n $f; }\n}\n";
    let out = run(&["run"], src);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "true false\n");
}

#[test]
fn run_step_limit_fails() {
    let out = run(&["run", "--max-steps", "100", "--no-color"], "{ loop { } }");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("error[LL-R006]"), "stderr: {}", stderr(&out));
}

#[test]
fn run_unknown_function_fails() {
    let out = run(&["run", "--no-color"], "{ launch; }");
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("unknown function: launch"), "stderr: {err}");
    assert!(err.contains("at instruction 0"), "stderr: {err}");
}

// --- errors ---

#[test]
fn parse_error_points_at_source() {
    let out = run(&["run", "--no-color"], "{\n  print $x\n}");
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("error[LL-P"), "stderr: {err}");
    assert!(err.contains("-->"), "stderr: {err}");
}

#[test]
fn compile_error_as_json() {
    let out = run(&["run", "--json-errors"], "{ break; }");
    assert!(!out.status.success());
    let line = stderr(&out);
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("json diagnostic");
    assert_eq!(v["code"], "LL-C002");
    assert_eq!(v["labels"][0]["line"], 1);
}

#[test]
fn missing_file() {
    let out = looplang()
        .args(["run", "--no-color", "/nonexistent/prog.ll"])
        .output()
        .expect("failed to run looplang");
    assert!(!out.status.success());
    assert!(stderr(&out).contains("cannot read"));
}

// --- fmt ---

#[test]
fn fmt_plain_is_canonical() {
    let out = run(&["fmt"], "{ $x = f;   cond $x {print $x;} }");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "{\n  $x = f;\n  cond $x {\n    print $x;\n  }\n}\n");
}

#[test]
fn fmt_annotated_reparses() {
    let first = run(&["fmt", "--annotate"], SCENARIO);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let text = stdout(&first);
    assert!(text.contains("$a:1"), "got: {text}");
    let second = run(&["fmt", "--annotate"], &text);
    assert_eq!(stdout(&second), text);
}

// --- dump / ast ---

#[test]
fn dump_listing() {
    let out = run(&["dump"], "{ $a = true; print $a; }");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(
        stdout(&out),
        "0000  grow 1\n0001  call true [] -> $1\n0002  call print [$1]\n0003  shrink 1\n"
    );
}

#[test]
fn dump_json() {
    let out = run(&["dump", "--json"], "{ $a = true; }");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("json program");
    assert_eq!(v["code"][0]["Grow"], 1);
    assert_eq!(v["code"][1]["Call"]["name"], "true");
}

#[test]
fn dump_ir_keeps_labels() {
    let out = run(&["dump", "--ir"], "{ loop { break; } }");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.lines().any(|l| l.ends_with(':')), "got: {text}");
}

#[test]
fn ast_is_json() {
    let out = run(&["ast"], "{ f $x; }");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("\"name\": \"f\""), "got: {text}");
}
