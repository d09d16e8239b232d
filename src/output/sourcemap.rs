//! Version 3 source maps.
//!
//! [`SourceMapSink`] collects CSS like [`StringSink`](super::StringSink) and
//! records one mapping per chunk that carries a source position.

use std::collections::HashMap;

use serde::Serialize;

use crate::options::SourceMapOptions;
use crate::tree::SourcePos;

use super::OutputSink;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, Copy)]
struct Mapping {
    generated_line: usize,
    generated_column: usize,
    source: usize,
    original_line: usize,
    original_column: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMapJson<'a> {
    version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources_content: Option<&'a [String]>,
    names: Vec<String>,
    mappings: String,
}

#[derive(Debug, Default)]
pub struct SourceMapSink {
    css: String,
    line: usize,
    column: usize,
    sources: Vec<String>,
    contents: Vec<String>,
    source_index: HashMap<String, usize>,
    /// Byte offsets of line starts, per source.
    line_starts: Vec<Vec<usize>>,
    mappings: Vec<Mapping>,
}

impl SourceMapSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn into_css(self) -> String {
        self.css
    }

    fn source_for(&mut self, pos: &SourcePos) -> Option<usize> {
        let file = pos.file.as_ref()?;
        if let Some(i) = self.source_index.get(&file.filename) {
            return Some(*i);
        }
        let contents = file.contents().to_string();
        let mut starts = vec![0];
        starts.extend(contents.match_indices('\n').map(|(i, _)| i + 1));
        let i = self.sources.len();
        self.sources.push(file.filename.clone());
        self.contents.push(contents);
        self.line_starts.push(starts);
        self.source_index.insert(file.filename.clone(), i);
        Some(i)
    }

    /// Serializes the map. Filenames are rewritten per `options`.
    pub fn to_json(&self, options: &SourceMapOptions, output_file: Option<&str>) -> String {
        let sources = self
            .sources
            .iter()
            .map(|name| {
                let mut name = name.replace('\\', "/");
                if let Some(base) = &options.source_map_basepath {
                    if let Some(stripped) = name.strip_prefix(base.as_str()) {
                        name = stripped.trim_start_matches('/').to_string();
                    }
                }
                match &options.source_map_rootpath {
                    Some(root) => format!("{root}{name}"),
                    None => name,
                }
            })
            .collect();
        let map = SourceMapJson {
            version: 3,
            file: output_file,
            sources,
            sources_content: options.outputs_source_files.then_some(self.contents.as_slice()),
            names: Vec::new(),
            mappings: self.encode_mappings(),
        };
        serde_json::to_string(&map).unwrap_or_default()
    }

    fn encode_mappings(&self) -> String {
        let mut out = String::new();
        let mut line = 0;
        let mut prev_column = 0i64;
        let mut prev_source = 0i64;
        let mut prev_orig_line = 0i64;
        let mut prev_orig_column = 0i64;
        let mut first_in_line = true;
        for m in &self.mappings {
            while line < m.generated_line {
                out.push(';');
                line += 1;
                prev_column = 0;
                first_in_line = true;
            }
            if !first_in_line {
                out.push(',');
            }
            first_in_line = false;
            encode_vlq(&mut out, m.generated_column as i64 - prev_column);
            encode_vlq(&mut out, m.source as i64 - prev_source);
            encode_vlq(&mut out, m.original_line as i64 - prev_orig_line);
            encode_vlq(&mut out, m.original_column as i64 - prev_orig_column);
            prev_column = m.generated_column as i64;
            prev_source = m.source as i64;
            prev_orig_line = m.original_line as i64;
            prev_orig_column = m.original_column as i64;
        }
        out
    }
}

impl OutputSink for SourceMapSink {
    fn add(&mut self, chunk: &str, pos: Option<&SourcePos>) {
        if chunk.is_empty() {
            return;
        }
        if let Some(pos) = pos {
            if let Some(source) = self.source_for(pos) {
                let starts = &self.line_starts[source];
                let original_line = match starts.binary_search(&pos.index) {
                    Ok(i) => i,
                    Err(i) => i - 1,
                };
                let original_column = pos.index - starts[original_line];
                self.mappings.push(Mapping {
                    generated_line: self.line,
                    generated_column: self.column,
                    source,
                    original_line,
                    original_column,
                });
            }
        }
        match chunk.rfind('\n') {
            Some(last) => {
                self.line += chunk.matches('\n').count();
                self.column = chunk.len() - last - 1;
            }
            None => self.column += chunk.len(),
        }
        self.css.push_str(chunk);
    }

    fn is_empty(&self) -> bool {
        self.css.is_empty()
    }
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::tree::FileInfo;

    #[test]
    fn test_vlq() {
        let mut out = String::new();
        for v in [0, 1, -1, 16, 123] {
            encode_vlq(&mut out, v);
            out.push(' ');
        }
        assert_eq!(out, "A C D gB 2H ");
    }

    #[test]
    fn test_mappings_track_lines() {
        let file = Rc::new(FileInfo::new("a.less", ".a {\n  color: red;\n}"));
        let mut sink = SourceMapSink::new();
        sink.add(".a", Some(&SourcePos::new(0, Some(file.clone()))));
        sink.add(" {\n  ", None);
        sink.add("color: ", Some(&SourcePos::new(7, Some(file))));
        sink.add("red;\n}", None);
        assert_eq!(sink.css(), ".a {\n  color: red;\n}");
        let json: serde_json::Value =
            serde_json::from_str(&sink.to_json(&SourceMapOptions::default(), Some("a.css"))).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["sources"][0], "a.less");
        assert_eq!(json["mappings"], "AAAA;EACE");
    }
}
