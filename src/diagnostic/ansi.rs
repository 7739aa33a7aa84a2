use super::Diagnostic;
use crate::ast::SourceMap;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn paint(&self, style: &str, s: &str) -> String {
        if self.use_color { format!("\x1b[{style}m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }

    fn red(&self, s: &str) -> String {
        self.paint("1;31", s)
    }

    fn blue(&self, s: &str) -> String {
        self.paint("1;34", s)
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[LL-P002]: message"
        let head = match d.code {
            Some(code) => format!("error[{code}]"),
            None => "error".to_string(),
        };
        out.push_str(&format!("{}: {}\n", self.red(&head), self.bold(&d.message)));

        let map = d.source.as_deref().map(SourceMap::new);
        let primary = d.labels.iter().find(|l| l.is_primary);
        if let (Some(label), Some(map), Some(source)) = (primary, &map, &d.source) {
            let (line, col) = map.lookup(label.span.start);
            let line_text = map.line_text(source, line);

            let gutter = line.to_string().len();
            let pad = " ".repeat(gutter);
            let pipe = self.blue("|");

            out.push_str(&format!("{pad}{} {line}:{col}\n", self.blue("-->")));
            out.push_str(&format!("{pad} {pipe}\n"));
            out.push_str(&format!("{} {pipe} {line_text}\n", self.blue(&format!("{line:>gutter$}"))));

            // Carets stop at the end of the line for multi-line spans.
            let room = line_text.len().saturating_sub(col - 1).max(1);
            let width = label.span.end.saturating_sub(label.span.start).clamp(1, room);
            let carets = self.red(&"^".repeat(width));
            let indent = " ".repeat(col - 1);
            if label.message.is_empty() {
                out.push_str(&format!("{pad} {pipe} {indent}{carets}\n"));
            } else {
                let msg = self.red(&label.message);
                out.push_str(&format!("{pad} {pipe} {indent}{carets} {msg}\n"));
            }
        }

        // Secondary labels are one line each, positioned when source is known.
        for label in d.labels.iter().filter(|l| !l.is_primary && !l.message.is_empty()) {
            match &map {
                Some(map) => {
                    let (line, col) = map.lookup(label.span.start);
                    out.push_str(&format!("  {} {line}:{col}: {}\n", self.blue("="), label.message));
                }
                None => out.push_str(&format!("  {} {}\n", self.blue("="), label.message)),
            }
        }
        for note in &d.notes {
            out.push_str(&format!("  {} note: {note}\n", self.blue("=")));
        }
        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} help: {suggestion}\n", self.blue("=")));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    const SRC: &str = "{ $a = f; loop { brake; } }";

    fn make_diag() -> Diagnostic {
        Diagnostic::error("expected statement")
            .with_code("LL-P007")
            .with_span(Span::new(17, 22), "here")
            .with_source(SRC)
            .with_note("inside loop")
            .with_suggestion("did you mean `break`?")
    }

    fn plain(d: &Diagnostic) -> String {
        AnsiRenderer { use_color: false }.render(d)
    }

    #[test]
    fn header_carries_code() {
        let out = plain(&make_diag());
        assert!(out.starts_with("error[LL-P007]: expected statement\n"), "got:\n{out}");
    }

    #[test]
    fn header_without_code() {
        let out = plain(&Diagnostic::error("something bad"));
        assert_eq!(out, "error: something bad\n");
    }

    #[test]
    fn snippet_points_at_span() {
        let out = plain(&make_diag());
        assert!(out.contains("--> 1:18"), "got:\n{out}");
        assert!(out.contains(SRC), "got:\n{out}");
        assert!(out.contains(&format!("{}^^^^^ here", " ".repeat(17))), "got:\n{out}");
    }

    #[test]
    fn notes_and_help() {
        let out = plain(&make_diag());
        assert!(out.contains("= note: inside loop"), "got:\n{out}");
        assert!(out.contains("= help: did you mean `break`?"), "got:\n{out}");
    }

    #[test]
    fn second_line() {
        let source = "{\n  f $x\n}";
        let d = Diagnostic::error("bad").with_span(Span::new(4, 5), "").with_source(source);
        let out = plain(&d);
        assert!(out.contains("--> 2:3"), "got:\n{out}");
        assert!(out.contains("2 |   f $x"), "got:\n{out}");
    }

    #[test]
    fn carets_clamped_to_line() {
        let source = "{ f\n}";
        let d = Diagnostic::error("bad").with_span(Span::new(2, 5), "").with_source(source);
        let out = plain(&d);
        assert!(out.contains(" ^\n"), "got:\n{out}");
        assert!(!out.contains("^^"), "got:\n{out}");
    }

    #[test]
    fn color_toggle() {
        let colored = AnsiRenderer { use_color: true }.render(&make_diag());
        assert!(colored.contains("\x1b["));
        assert!(!plain(&make_diag()).contains("\x1b["));
    }

    #[test]
    fn secondary_label_has_position() {
        let source = "{ loop a { loop a { } } }";
        let d = Diagnostic::error("duplicate")
            .with_span(Span::new(11, 17), "here")
            .with_secondary_span(Span::new(2, 8), "enclosing loop")
            .with_source(source);
        let out = plain(&d);
        assert!(out.contains("--> 1:12"), "got:\n{out}");
        assert!(out.contains("= 1:3: enclosing loop"), "got:\n{out}");
    }

    #[test]
    fn no_source_no_snippet() {
        let d = Diagnostic::error("bad").with_span(Span::new(0, 1), "here");
        assert!(!plain(&d).contains("-->"));
    }
}
