use crate::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtMode {
    /// Source text as written.
    Plain,
    /// Every resolved variable carries its slot: `$name:slot`.
    /// Still valid input; the annotation is ignored when parsing.
    Annotated,
}

const INDENT: &str = "  ";

pub fn format(root: &Block, mode: FmtMode) -> String {
    let mut out = String::new();
    fmt_block(&mut out, root, 0, mode);
    out.push('\n');
    out
}

fn fmt_block(out: &mut String, block: &Block, level: usize, mode: FmtMode) {
    if block.stmts.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    for stmt in &block.stmts {
        out.push_str(&INDENT.repeat(level + 1));
        fmt_stmt(out, stmt, level + 1, mode);
        out.push('\n');
    }
    out.push_str(&INDENT.repeat(level));
    out.push('}');
}

fn fmt_stmt(out: &mut String, stmt: &Stmt, level: usize, mode: FmtMode) {
    match stmt {
        Stmt::Call(call) => {
            if let Some(result) = &call.result {
                fmt_var(out, result, mode);
                out.push_str(" = ");
            }
            fmt_call(out, &call.call, mode);
            out.push(';');
        }
        Stmt::Cond(cond) => {
            out.push_str("cond ");
            fmt_expr(out, &cond.condition, mode);
            out.push(' ');
            fmt_block(out, &cond.then_block, level, mode);
            if let Some(else_block) = &cond.else_block {
                out.push_str(" else ");
                fmt_block(out, else_block, level, mode);
            }
        }
        Stmt::Loop(lp) => {
            out.push_str("loop ");
            if let Some(label) = &lp.label {
                out.push_str(label);
                out.push(' ');
            }
            fmt_block(out, &lp.body, level, mode);
        }
        Stmt::Break(brk) => {
            out.push_str("break");
            if let Some(label) = &brk.label {
                out.push(' ');
                out.push_str(label);
            }
            out.push(';');
        }
        Stmt::Block(block) => fmt_block(out, block, level, mode),
    }
}

/// Arguments are parsed greedily, so a call in any position but the last
/// is wrapped in parentheses to keep the following arguments its own.
/// Such an argument re-parses as `Expr::Paren(Expr::Call)`; printing that
/// again gives the same text, so the text is the fixed point.
fn fmt_call(out: &mut String, call: &CallExpr, mode: FmtMode) {
    out.push_str(&call.name);
    let last = call.args.len().saturating_sub(1);
    for (i, arg) in call.args.iter().enumerate() {
        out.push(' ');
        match arg {
            Expr::Call(_) if i < last => {
                out.push('(');
                fmt_expr(out, arg, mode);
                out.push(')');
            }
            _ => fmt_expr(out, arg, mode),
        }
    }
}

fn fmt_expr(out: &mut String, expr: &Expr, mode: FmtMode) {
    match expr {
        Expr::Var(var) => fmt_var(out, var, mode),
        Expr::Paren(inner) => {
            out.push('(');
            fmt_expr(out, inner, mode);
            out.push(')');
        }
        Expr::Call(call) => fmt_call(out, call, mode),
    }
}

fn fmt_var(out: &mut String, var: &Var, mode: FmtMode) {
    out.push('$');
    out.push_str(&var.name);
    if let (FmtMode::Annotated, Some(slot)) = (mode, var.slot) {
        out.push(':');
        out.push_str(&slot.to_string());
    }
}
