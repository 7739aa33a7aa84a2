use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// A value stored in a memory slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// The zero value written by `Grow`, and the result of calls that return nothing.
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => {
                if *n == (*n as i64) as f64 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
        }
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handed to every host call and to the run driver.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    pub cancel: CancelToken,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancelToken) -> Self {
        HostContext { cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(msg: impl Into<String>) -> Self {
        HostError { message: msg.into() }
    }
}

pub type HostFn = Arc<dyn Fn(&HostContext, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Name -> callable. The only way a program reaches the outside world.
#[derive(Clone, Default)]
pub struct HostFunctions {
    funcs: HashMap<String, HostFn>,
}

impl HostFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&HostContext, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&HostFn> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.funcs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HostFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunctions").field("names", &self.names()).finish()
    }
}

fn expect_arity(name: &str, args: &[Value], n: usize) -> Result<(), HostError> {
    if args.len() != n {
        return Err(HostError::new(format!("{name}: expected {n} args, got {}", args.len())));
    }
    Ok(())
}

fn expect_bool(name: &str, v: &Value) -> Result<bool, HostError> {
    match v {
        Value::Bool(b) => Ok(*b),
        other => Err(HostError::new(format!("{name} requires bool, got {}", other.type_name()))),
    }
}

/// Functions the command-line runner offers every program.
pub fn prelude() -> HostFunctions {
    let mut host = HostFunctions::new();
    host.register("true", |_, args| {
        expect_arity("true", args, 0)?;
        Ok(Value::Bool(true))
    })
    .register("false", |_, args| {
        expect_arity("false", args, 0)?;
        Ok(Value::Bool(false))
    })
    .register("not", |_, args| {
        expect_arity("not", args, 1)?;
        Ok(Value::Bool(!expect_bool("not", &args[0])?))
    })
    .register("and", |_, args| {
        expect_arity("and", args, 2)?;
        Ok(Value::Bool(expect_bool("and", &args[0])? && expect_bool("and", &args[1])?))
    })
    .register("or", |_, args| {
        expect_arity("or", args, 2)?;
        Ok(Value::Bool(expect_bool("or", &args[0])? || expect_bool("or", &args[1])?))
    })
    .register("eq", |_, args| {
        expect_arity("eq", args, 2)?;
        Ok(Value::Bool(args[0] == args[1]))
    })
    .register("print", |_, args| {
        let line: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        println!("{}", line.join(" "));
        Ok(Value::Nil)
    });
    host
}
