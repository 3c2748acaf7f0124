//! Offset-keyed edit buffers over immutable source text.
//!
//! All mutation is expressed as `(start, end, replacement)` edits against
//! the original byte offsets, so edits commute regardless of the order they
//! were recorded in. A single render sweep applies the edits, performs
//! trimming and indentation (honouring exclusion ranges for template
//! literals), and collects the mapping segments source maps are built from.

use crate::source_map::{Segment, SourceMap};

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE-SOURCE BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    content: String,
}

/// A raw mapping segment: generated position → original byte offset.
#[derive(Debug, Clone, Copy)]
pub struct RawSegment {
    pub line: u32,
    pub col: u32,
    pub source: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SourceBuffer {
    source: String,
    edits: Vec<Edit>,
    intro: String,
    outro: String,
    indent: Option<String>,
    exclude: Vec<(u32, u32)>,
    trim: bool,
}

impl SourceBuffer {
    pub fn new(source: impl Into<String>) -> Self {
        SourceBuffer {
            source: source.into(),
            ..SourceBuffer::default()
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn remove(&mut self, start: u32, end: u32) {
        self.replace(start, end, "");
    }

    pub fn replace(&mut self, start: u32, end: u32, content: impl Into<String>) {
        debug_assert!(start <= end && end as usize <= self.source.len());
        self.edits.push(Edit {
            start,
            end,
            content: content.into(),
        });
    }

    pub fn insert(&mut self, at: u32, content: impl Into<String>) {
        self.replace(at, at, content);
    }

    pub fn prepend(&mut self, content: &str) {
        self.intro.insert_str(0, content);
    }

    pub fn append(&mut self, content: &str) {
        self.outro.push_str(content);
    }

    pub fn trim(&mut self) {
        self.trim = true;
    }

    pub fn indent(&mut self, indent: &str) {
        if !indent.is_empty() {
            self.indent = Some(indent.to_string());
        }
    }

    /// Ranges (original offsets) that must never receive indentation, such
    /// as the interior of template literals.
    pub fn exclude_indent(&mut self, start: u32, end: u32) {
        self.exclude.push((start, end));
    }

    fn excluded(&self, offset: u32) -> bool {
        self.exclude.iter().any(|&(a, b)| offset > a && offset < b)
    }

    /// Apply the edits and produce the text plus raw mapping segments.
    /// Generated positions start at line 0, column 0.
    pub fn render(&self, source_index: u32) -> Rendered {
        let mut edits = self.edits.clone();
        edits.sort_by_key(|e| (e.start, e.end));

        let mut em = Emitter::new(self.indent.clone());
        em.push_synthetic(&self.intro);
        em.trim_leading = self.trim;

        let bytes = self.source.as_bytes();
        let mut cursor: u32 = 0;
        for edit in &edits {
            if edit.start < cursor {
                // Overlapping edit; the earlier one wins.
                continue;
            }
            self.push_original(&mut em, source_index, cursor, edit.start);
            em.push_synthetic(&edit.content);
            cursor = edit.end;
        }
        self.push_original(&mut em, source_index, cursor, bytes.len() as u32);

        if self.trim {
            em.trim_trailing();
        }
        em.push_synthetic(&self.outro);

        Rendered {
            code: em.code,
            segments: em.segments,
        }
    }

    pub fn to_string(&self) -> String {
        self.render(0).code
    }

    fn push_original(&self, em: &mut Emitter, source_index: u32, start: u32, end: u32) {
        if start >= end {
            return;
        }
        em.mark_segment();
        for (i, ch) in self.source[start as usize..end as usize].char_indices() {
            let offset = start + i as u32;
            em.put(ch, Some((source_index, offset)), self.excluded(offset));
            if ch == '\n' {
                em.mark_segment();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub code: String,
    pub segments: Vec<RawSegment>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMITTER
// ═══════════════════════════════════════════════════════════════════════════════

struct Emitter {
    code: String,
    line: u32,
    col: u32,
    indent: Option<String>,
    at_line_start: bool,
    trim_leading: bool,
    want_segment: bool,
    segments: Vec<RawSegment>,
}

impl Emitter {
    fn new(indent: Option<String>) -> Self {
        Emitter {
            code: String::new(),
            line: 0,
            col: 0,
            indent,
            at_line_start: true,
            trim_leading: false,
            want_segment: false,
            segments: Vec::new(),
        }
    }

    fn mark_segment(&mut self) {
        self.want_segment = true;
    }

    fn put(&mut self, ch: char, origin: Option<(u32, u32)>, excluded: bool) {
        if self.trim_leading {
            if ch.is_whitespace() {
                return;
            }
            self.trim_leading = false;
        }
        if ch == '\n' {
            self.code.push('\n');
            self.line += 1;
            self.col = 0;
            self.at_line_start = true;
            return;
        }
        if self.at_line_start {
            self.at_line_start = false;
            if !excluded {
                if let Some(indent) = &self.indent {
                    self.code.push_str(indent);
                    self.col += indent.len() as u32;
                }
            }
        }
        if self.want_segment {
            if let Some((source, offset)) = origin {
                self.segments.push(RawSegment {
                    line: self.line,
                    col: self.col,
                    source,
                    offset,
                });
                self.want_segment = false;
            }
        }
        self.code.push(ch);
        self.col += ch.len_utf8() as u32;
    }

    fn push_synthetic(&mut self, content: &str) {
        for ch in content.chars() {
            self.put(ch, None, false);
        }
    }

    fn trim_trailing(&mut self) {
        let trimmed_len = self.code.trim_end().len();
        if trimmed_len == self.code.len() {
            return;
        }
        self.code.truncate(trimmed_len);
        let end_line = self.code.matches('\n').count() as u32;
        let end_col = match self.code.rfind('\n') {
            Some(i) => (self.code.len() - i - 1) as u32,
            None => self.code.len() as u32,
        };
        self.line = end_line;
        self.col = end_col;
        self.at_line_start = false;
        self.segments
            .retain(|s| s.line < end_line || (s.line == end_line && s.col < end_col));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUNDLE BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

/// Concatenates rendered buffers with a separator while tracking which
/// original file each span of output came from.
#[derive(Default)]
pub struct BundleBuffer {
    parts: Vec<Part>,
    separator: String,
}

struct Part {
    file: String,
    buffer: SourceBuffer,
}

impl BundleBuffer {
    pub fn new(separator: &str) -> Self {
        BundleBuffer {
            parts: Vec::new(),
            separator: separator.to_string(),
        }
    }

    pub fn push(&mut self, file: impl Into<String>, buffer: SourceBuffer) {
        self.parts.push(Part {
            file: file.into(),
            buffer,
        });
    }

    pub fn render(&self) -> Rendered {
        let mut code = String::new();
        let mut segments = Vec::new();
        let mut line_offset = 0u32;
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                code.push_str(&self.separator);
                line_offset += self.separator.matches('\n').count() as u32;
            }
            let rendered = part.buffer.render(index as u32);
            for seg in &rendered.segments {
                segments.push(RawSegment {
                    line: seg.line + line_offset,
                    ..*seg
                });
            }
            line_offset += rendered.code.matches('\n').count() as u32;
            code.push_str(&rendered.code);
        }
        Rendered { code, segments }
    }

    /// Build the v3 map for a previous `render`, shifting generated lines by
    /// the number of preamble lines the wrapper put in front of the body.
    pub fn map(&self, rendered: &Rendered, file: &str, line_shift: u32) -> SourceMap {
        let tables: Vec<Vec<u32>> = self
            .parts
            .iter()
            .map(|p| line_starts(p.buffer.source()))
            .collect();
        let mut segments: Vec<Segment> = rendered
            .segments
            .iter()
            .map(|seg| {
                let (line, col) = locate(&tables[seg.source as usize], seg.offset);
                Segment {
                    generated_line: seg.line + line_shift,
                    generated_column: seg.col,
                    source_index: seg.source,
                    original_line: line,
                    original_column: col,
                }
            })
            .collect();
        SourceMap::new(
            file.to_string(),
            self.parts.iter().map(|p| p.file.clone()).collect(),
            Some(
                self.parts
                    .iter()
                    .map(|p| p.buffer.source().to_string())
                    .collect(),
            ),
            &mut segments,
        )
    }
}

fn line_starts(source: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i as u32 + 1);
        }
    }
    starts
}

fn locate(starts: &[u32], offset: u32) -> (u32, u32) {
    let line = match starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i - 1,
    };
    (line as u32, offset - starts[line])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_remove() {
        let mut buf = SourceBuffer::new("var foo = 1;\nfoo();\n");
        buf.replace(4, 7, "bar");
        buf.replace(13, 16, "bar");
        buf.remove(12, 13);
        assert_eq!(buf.to_string(), "var bar = 1;bar();\n");
    }

    #[test]
    fn test_edits_commute() {
        let mut a = SourceBuffer::new("a b c");
        a.replace(0, 1, "x");
        a.replace(4, 5, "z");
        let mut b = SourceBuffer::new("a b c");
        b.replace(4, 5, "z");
        b.replace(0, 1, "x");
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_insert_orders_before_removal() {
        let mut buf = SourceBuffer::new("abcdef");
        buf.remove(2, 4);
        buf.insert(2, "X");
        assert_eq!(buf.to_string(), "abXef");
    }

    #[test]
    fn test_trim_and_prepend() {
        let mut buf = SourceBuffer::new("\n\n  code();  \n\n");
        buf.trim();
        buf.prepend("var ns = {};\n");
        buf.append("\nexports.x = x;");
        assert_eq!(buf.to_string(), "var ns = {};\ncode();\nexports.x = x;");
    }

    #[test]
    fn test_indent_skips_excluded_ranges() {
        let source = "var t = `a\nb`;\nvar x = 1;\n";
        let mut buf = SourceBuffer::new(source);
        let tpl_start = source.find('`').unwrap() as u32;
        let tpl_end = source.rfind('`').unwrap() as u32 + 1;
        buf.exclude_indent(tpl_start, tpl_end);
        buf.indent("\t");
        assert_eq!(buf.to_string(), "\tvar t = `a\nb`;\n\tvar x = 1;\n");
    }

    #[test]
    fn test_bundle_render_and_map() {
        let mut bundle = BundleBuffer::new("\n\n");
        let mut a = SourceBuffer::new("var a = 1;\n");
        a.trim();
        let mut b = SourceBuffer::new("var b = a;\n");
        b.trim();
        bundle.push("a.js", a);
        bundle.push("b.js", b);
        let rendered = bundle.render();
        assert_eq!(rendered.code, "var a = 1;\n\nvar b = a;");
        let map = bundle.map(&rendered, "out.js", 2);
        assert_eq!(map.sources, vec!["a.js", "b.js"]);
        assert!(map.mappings.starts_with(";;"));
    }
}
