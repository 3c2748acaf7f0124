//! Source-map-v3 generation.
//!
//! Mappings arrive as absolute segments (generated line/column → source
//! index + original line/column) and are encoded into the relative
//! base64-VLQ `mappings` string the format requires.

use serde::{Deserialize, Serialize};

/// One resolved mapping segment, all positions 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source_index: u32,
    pub original_line: u32,
    pub original_column: u32,
}

/// The serialisable source-map object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    pub file: String,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn new(
        file: String,
        sources: Vec<String>,
        sources_content: Option<Vec<String>>,
        segments: &mut [Segment],
    ) -> Self {
        segments.sort_by(|a, b| {
            (a.generated_line, a.generated_column).cmp(&(b.generated_line, b.generated_column))
        });
        SourceMap {
            version: 3,
            file,
            sources,
            sources_content,
            names: Vec::new(),
            mappings: encode_mappings(segments),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Inline annotation carrying the whole map as a base64 data URI.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:application/json;charset=utf-8;base64,{}",
            base64_encode(self.to_json().as_bytes())
        )
    }
}

fn encode_mappings(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut current_line = 0u32;
    let mut prev_generated_column = 0i64;
    let mut prev_source_index = 0i64;
    let mut prev_original_line = 0i64;
    let mut prev_original_column = 0i64;
    let mut first_in_line = true;

    for seg in segments {
        while current_line < seg.generated_line {
            out.push(';');
            current_line += 1;
            prev_generated_column = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        vlq::encode_to(seg.generated_column as i64 - prev_generated_column, &mut out);
        prev_generated_column = seg.generated_column as i64;

        vlq::encode_to(seg.source_index as i64 - prev_source_index, &mut out);
        prev_source_index = seg.source_index as i64;

        vlq::encode_to(seg.original_line as i64 - prev_original_line, &mut out);
        prev_original_line = seg.original_line as i64;

        vlq::encode_to(seg.original_column as i64 - prev_original_column, &mut out);
        prev_original_column = seg.original_column as i64;
    }

    out
}

/// Variable-length-quantity encoding as used by the mappings string.
pub mod vlq {
    const SHIFT: i64 = 5;
    const BASE: i64 = 1 << SHIFT;
    const MASK: i64 = BASE - 1;
    const CONTINUATION: i64 = BASE;

    const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    pub fn encode_to(value: i64, buf: &mut String) {
        let mut vlq = if value < 0 { ((-value) << 1) + 1 } else { value << 1 };
        loop {
            let mut digit = vlq & MASK;
            vlq >>= SHIFT;
            if vlq > 0 {
                digit |= CONTINUATION;
            }
            buf.push(BASE64[digit as usize] as char);
            if vlq == 0 {
                break;
            }
        }
    }
}

pub fn base64_encode(input: &[u8]) -> String {
    const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let n = (b0 << 16) | (b1 << 8) | b2;
        out.push(BASE64[((n >> 18) & 63) as usize] as char);
        out.push(BASE64[((n >> 12) & 63) as usize] as char);
        if chunk.len() > 1 {
            out.push(BASE64[((n >> 6) & 63) as usize] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(BASE64[(n & 63) as usize] as char);
        } else {
            out.push('=');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: i64) -> String {
        let mut s = String::new();
        vlq::encode_to(value, &mut s);
        s
    }

    #[test]
    fn test_vlq_encode() {
        assert_eq!(encode(0), "A");
        assert_eq!(encode(1), "C");
        assert_eq!(encode(-1), "D");
        assert_eq!(encode(16), "gB");
    }

    #[test]
    fn test_mappings_lines_and_commas() {
        let mut segments = vec![
            Segment {
                generated_line: 0,
                generated_column: 0,
                source_index: 0,
                original_line: 0,
                original_column: 0,
            },
            Segment {
                generated_line: 0,
                generated_column: 4,
                source_index: 0,
                original_line: 0,
                original_column: 4,
            },
            Segment {
                generated_line: 2,
                generated_column: 0,
                source_index: 0,
                original_line: 1,
                original_column: 0,
            },
        ];
        let map = SourceMap::new("out.js".into(), vec!["in.js".into()], None, &mut segments);
        assert_eq!(map.version, 3);
        assert_eq!(map.mappings, "AAAA,IAAI;;AACJ");
    }

    #[test]
    fn test_data_uri() {
        let mut segments = vec![];
        let map = SourceMap::new("out.js".into(), vec![], None, &mut segments);
        assert!(map
            .to_data_uri()
            .starts_with("data:application/json;charset=utf-8;base64,"));
    }
}
