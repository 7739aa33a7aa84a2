/// Byte offset to line/column lookup over one source text.
///
/// Columns count bytes, so they line up with the byte-offset spans the
/// lexer produces.
pub struct SourceMap {
    /// Byte offset of the first byte of each line. Never empty.
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let newlines = source.match_indices('\n').map(|(i, _)| i + 1);
        SourceMap { line_starts: std::iter::once(0).chain(newlines).collect() }
    }

    /// `(line, col)`, both 1-based. Offsets past the end land on the last line.
    pub fn lookup(&self, offset: usize) -> (usize, usize) {
        let index = self.line_starts.partition_point(|&start| start <= offset).max(1) - 1;
        (index + 1, offset - self.line_starts[index] + 1)
    }

    /// Text of a 1-based line without its terminator. Empty when out of range.
    pub fn line_text<'a>(&self, source: &'a str, line: usize) -> &'a str {
        let Some(&start) = line.checked_sub(1).and_then(|i| self.line_starts.get(i)) else {
            return "";
        };
        let end = self.line_starts.get(line).map_or(source.len(), |next| next - 1);
        source.get(start..end).unwrap_or("").trim_end_matches('\r')
    }
}
