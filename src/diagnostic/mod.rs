pub mod ansi;
pub mod json;

use crate::ast::Span;

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

/// A compile or run failure, ready for rendering.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into(), is_primary: true });
        self
    }

    pub fn with_secondary_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into(), is_primary: false });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- From impls for each stage's error type ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        let span = Span::new(e.position, e.position + e.snippet.len().max(1));
        let mut d = Diagnostic::error(format!("unexpected input '{}'", e.snippet))
            .with_code("LL-L001")
            .with_span(span, "here");
        if !e.suggestion.is_empty() {
            d = d.with_suggestion(e.suggestion.clone());
        }
        d
    }
}

impl From<&crate::parser::ParseError> for Diagnostic {
    fn from(e: &crate::parser::ParseError) -> Self {
        Diagnostic::error(&e.message).with_code(e.code).with_span(e.span, "here")
    }
}

impl From<&crate::parser::FrontendError> for Diagnostic {
    fn from(e: &crate::parser::FrontendError) -> Self {
        match e {
            crate::parser::FrontendError::Lex(e) => e.into(),
            crate::parser::FrontendError::Parse(e) => e.into(),
        }
    }
}

impl From<&crate::codegen::CompileError> for Diagnostic {
    fn from(e: &crate::codegen::CompileError) -> Self {
        use crate::codegen::CompileError;
        let code = match e {
            CompileError::UnsupportedExpression { .. } => "LL-C001",
            CompileError::BreakOutsideLoop { .. } => "LL-C002",
            CompileError::UnknownLoopLabel { .. } => "LL-C003",
            CompileError::DuplicateLoopLabel { .. } => "LL-C004",
            CompileError::UnresolvedVariable { .. } => "LL-C005",
            CompileError::UndefinedLabel { .. } => "LL-C006",
        };
        let mut d = Diagnostic::error(e.to_string()).with_code(code);
        if let Some(span) = e.span() {
            d = d.with_span(span, "here");
        }
        match e {
            CompileError::DuplicateLoopLabel { previous, .. } => {
                d.with_secondary_span(*previous, "enclosing loop uses the same label")
            }
            CompileError::UnsupportedExpression { .. } => {
                d.with_suggestion("bind the call to a variable first: `$tmp = f ...;`")
            }
            CompileError::BreakOutsideLoop { .. } => {
                d.with_note("`break` only exits an enclosing `loop`")
            }
            _ => d,
        }
    }
}

impl From<&crate::vm::VmError> for Diagnostic {
    fn from(e: &crate::vm::VmError) -> Self {
        use crate::vm::VmError;
        let code = match e {
            VmError::UnknownFunction { .. } => "LL-R001",
            VmError::SlotOutOfRange { .. } => "LL-R002",
            VmError::ShrinkUnderflow { .. } => "LL-R003",
            VmError::ConditionNotBool { .. } => "LL-R004",
            VmError::Host { .. } => "LL-R005",
        };
        Diagnostic::error(e.to_string()).with_code(code)
    }
}

impl From<&crate::Error> for Diagnostic {
    fn from(e: &crate::Error) -> Self {
        match e {
            crate::Error::Frontend(e) => e.into(),
            crate::Error::Compile(e) => e.into(),
            crate::Error::Vm(e) => e.into(),
        }
    }
}
