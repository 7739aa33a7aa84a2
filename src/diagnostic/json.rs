use serde::Serialize;

use super::{Diagnostic, Label};
use crate::ast::SourceMap;

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: &'a str,
    labels: Vec<JsonLabel<'a>>,
    notes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

#[derive(Serialize)]
struct JsonLabel<'a> {
    start: usize,
    end: usize,
    message: &'a str,
    primary: bool,
    /// 1-based, present only when the diagnostic carries its source.
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    col: Option<usize>,
}

impl<'a> JsonLabel<'a> {
    fn new(label: &'a Label, map: Option<&SourceMap>) -> Self {
        let (line, col) = match map.map(|m| m.lookup(label.span.start)) {
            Some((line, col)) => (Some(line), Some(col)),
            None => (None, None),
        };
        JsonLabel {
            start: label.span.start,
            end: label.span.end,
            message: &label.message,
            primary: label.is_primary,
            line,
            col,
        }
    }
}

/// One diagnostic as a single-line JSON object.
pub fn render(d: &Diagnostic) -> String {
    let map = d.source.as_deref().map(SourceMap::new);
    let out = JsonDiagnostic {
        severity: "error",
        code: d.code,
        message: &d.message,
        labels: d.labels.iter().map(|l| JsonLabel::new(l, map.as_ref())).collect(),
        notes: &d.notes,
        suggestion: d.suggestion.as_deref(),
    };
    serde_json::to_string(&out).unwrap_or_else(|e| {
        format!(r#"{{"severity":"error","message":"cannot serialize diagnostic: {e}"}}"#)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn basic_error() {
        let v = parse_json(&render(&Diagnostic::error("break outside loop")));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "break outside loop");
        assert!(v["labels"].as_array().unwrap().is_empty());
        assert!(v.get("code").is_none());
        assert!(v.get("suggestion").is_none());
    }

    #[test]
    fn code_and_suggestion() {
        let d = Diagnostic::error("bad").with_code("LL-C001").with_suggestion("bind it first");
        let v = parse_json(&render(&d));
        assert_eq!(v["code"], "LL-C001");
        assert_eq!(v["suggestion"], "bind it first");
    }

    #[test]
    fn label_line_col_from_source() {
        // `break;` starts at byte 4, third column of the second line.
        let d = Diagnostic::error("bad")
            .with_span(Span::new(4, 10), "here")
            .with_source("{\n  break;\n}");
        let v = parse_json(&render(&d));
        let label = &v["labels"][0];
        assert_eq!(label["start"], 4);
        assert_eq!(label["end"], 10);
        assert_eq!(label["primary"], true);
        assert_eq!(label["line"], 2);
        assert_eq!(label["col"], 3);
    }

    #[test]
    fn label_without_source_has_no_position() {
        let d = Diagnostic::error("bad").with_span(Span::new(5, 8), "here");
        let v = parse_json(&render(&d));
        assert!(v["labels"][0].get("line").is_none());
        assert!(v["labels"][0].get("col").is_none());
    }

    #[test]
    fn duplicate_label_renders_both_loops() {
        let source = "{ loop a { loop a { } } }";
        let err = crate::compile_source(source).unwrap_err();
        let d = Diagnostic::from(&err).with_source(source);
        let v = parse_json(&render(&d));
        assert_eq!(v["code"], "LL-C004");
        let labels = v["labels"].as_array().unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0]["col"], 12);
        assert_eq!(labels[1]["primary"], false);
        assert_eq!(labels[1]["col"], 3);
    }

    #[test]
    fn notes_kept_in_order() {
        let d = Diagnostic::error("bad").with_note("first").with_note("second");
        let v = parse_json(&render(&d));
        assert_eq!(v["notes"][0], "first");
        assert_eq!(v["notes"][1], "second");
    }
}
