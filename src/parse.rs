//! Parser adapter.
//!
//! Thin wrapper around the oxc parser: module source type, typed parse
//! errors carrying the offending path, and the scan for `sourceMappingURL`
//! annotations that must be dropped from rewritten output.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;

use crate::errors::{CompileError, Result};

pub fn parse_program<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    path: &str,
) -> Result<Program<'a>> {
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .first()
            .map(|e| format!("{e:?}"))
            .unwrap_or_else(|| "invalid syntax".to_string());
        return Err(CompileError::Parse {
            path: path.to_string(),
            message,
        });
    }
    Ok(ret.program)
}

lazy_static! {
    static ref LINE_ANNOTATION: Regex =
        Regex::new(r"(?m)[ \t]*//[#@][ \t]*sourceMappingURL=\S+[ \t]*$").unwrap();
    static ref BLOCK_ANNOTATION: Regex =
        Regex::new(r"/\*[#@][ \t]*sourceMappingURL=[^*]*\*/").unwrap();
}

/// Spans of `sourceMappingURL` comments, to be deleted as edits.
pub fn sourcemap_comment_spans(source: &str) -> Vec<(u32, u32)> {
    let mut spans: Vec<(u32, u32)> = LINE_ANNOTATION
        .find_iter(source)
        .chain(BLOCK_ANNOTATION.find_iter(source))
        .map(|m| (m.start() as u32, m.end() as u32))
        .collect();
    spans.sort_unstable();
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_path() {
        let allocator = Allocator::default();
        let err = parse_program(&allocator, "var = ;", "broken.js").unwrap_err();
        match err {
            CompileError::Parse { path, .. } => assert_eq!(path, "broken.js"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sourcemap_annotation_spans() {
        let source = "var x = 1;\n//# sourceMappingURL=x.js.map\nvar y = 2;\n";
        let spans = sourcemap_comment_spans(source);
        assert_eq!(spans.len(), 1);
        let (a, b) = spans[0];
        assert_eq!(&source[a as usize..b as usize], "//# sourceMappingURL=x.js.map");
    }

    #[test]
    fn test_block_annotation() {
        let source = "var x = 1; /*# sourceMappingURL=x.js.map */\n";
        assert_eq!(sourcemap_comment_spans(source).len(), 1);
    }
}
