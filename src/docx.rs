//! Paragraph Reader: turns a `.docx` container into the flat, ordered line
//! sequence the rest of the pipeline consumes.
//!
//! A docx file is a ZIP archive whose main body lives in
//! `word/document.xml`. The grammar downstream is purely textual, so run
//! formatting is ignored; only `w:t` text inside `w:p` paragraphs matters.
//! Table cells need no special handling because their paragraphs appear in
//! row-major document order within the XML stream.

use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::errors::ImportError;

/// Read a docx file and return its non-empty, whitespace-normalized lines
/// in document order.
pub fn read_lines(path: &Path) -> Result<Vec<String>, ImportError> {
    let file = std::fs::File::open(path)?;
    lines_from_archive(BufReader::new(file))
}

/// Same as [`read_lines`] but over an in-memory byte buffer.
pub fn read_lines_from_bytes(bytes: &[u8]) -> Result<Vec<String>, ImportError> {
    lines_from_archive(Cursor::new(bytes))
}

fn lines_from_archive<R: Read + Seek>(reader: R) -> Result<Vec<String>, ImportError> {
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| ImportError::UnsupportedFormat(format!("not a zip container: {}", e)))?;

    let mut xml = String::new();
    {
        let mut document = archive.by_name("word/document.xml").map_err(|e| {
            ImportError::UnsupportedFormat(format!("no word/document.xml in archive: {}", e))
        })?;
        document
            .read_to_string(&mut xml)
            .map_err(ImportError::Io)?;
    }

    parse_document_xml(&xml)
}

/// Walk the WordprocessingML event stream and collect one string per
/// paragraph, trimmed, with interior whitespace runs collapsed. Empty
/// paragraphs are dropped.
fn parse_document_xml(xml: &str) -> Result<Vec<String>, ImportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_paragraph = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:p" => {
                    in_paragraph = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    in_paragraph = false;
                    let line = normalize_whitespace(&current);
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text && in_paragraph {
                    let text = e.unescape().map_err(|e| {
                        ImportError::UnsupportedFormat(format!("bad XML text: {}", e))
                    })?;
                    current.push_str(&text);
                }
            }
            // Self-closing <w:br/> and <w:tab/> inside a run still
            // separate words.
            Ok(Event::Empty(e)) => {
                if in_paragraph && matches!(e.name().as_ref(), b"w:br" | b"w:tab") {
                    current.push(' ');
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ImportError::UnsupportedFormat(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(lines)
}

/// Collapse interior whitespace runs to single spaces and trim the ends.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn wrap_body(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{}</w:body>
</w:document>"#,
            body
        )
    }

    #[test]
    fn test_paragraphs_in_order() {
        let xml = wrap_body(
            "<w:p><w:r><w:t>单选题ID: sc_001</w:t></w:r></w:p>\
             <w:p><w:r><w:t>中文题干: 下列哪项正确?</w:t></w:r></w:p>",
        );
        let lines = parse_document_xml(&xml).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "单选题ID: sc_001");
    }

    #[test]
    fn test_runs_within_paragraph_are_joined() {
        let xml = wrap_body("<w:p><w:r><w:t>A: 第一</w:t></w:r><w:r><w:t>部分</w:t></w:r></w:p>");
        let lines = parse_document_xml(&xml).unwrap();
        assert_eq!(lines, vec!["A: 第一部分"]);
    }

    #[test]
    fn test_empty_and_whitespace_paragraphs_dropped() {
        let xml = wrap_body(
            "<w:p><w:r><w:t>  </w:t></w:r></w:p>\
             <w:p></w:p>\
             <w:p><w:r><w:t>  keep   me  </w:t></w:r></w:p>",
        );
        let lines = parse_document_xml(&xml).unwrap();
        assert_eq!(lines, vec!["keep me"]);
    }

    #[test]
    fn test_tabs_and_breaks_separate_runs() {
        let xml = wrap_body(
            "<w:p><w:r><w:t>参数:</w:t><w:tab/><w:t>折现率: 0.08</w:t></w:r></w:p>\
             <w:p><w:r><w:t>first</w:t><w:br/><w:t>second</w:t></w:r></w:p>",
        );
        let lines = parse_document_xml(&xml).unwrap();
        assert_eq!(lines, vec!["参数: 折现率: 0.08", "first second"]);
    }

    #[test]
    fn test_table_cell_paragraphs_flattened() {
        let xml = wrap_body(
            "<w:tbl><w:tr>\
               <w:tc><w:p><w:r><w:t>cell one</w:t></w:r></w:p></w:tc>\
               <w:tc><w:p><w:r><w:t>cell two</w:t></w:r></w:p></w:tc>\
             </w:tr></w:tbl>\
             <w:p><w:r><w:t>after table</w:t></w:r></w:p>",
        );
        let lines = parse_document_xml(&xml).unwrap();
        assert_eq!(lines, vec!["cell one", "cell two", "after table"]);
    }

    #[test]
    fn test_non_zip_input_is_unsupported_format() {
        let err = read_lines_from_bytes(b"plain text, not a docx").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_zip_without_document_xml_is_unsupported_format() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zw = zip::ZipWriter::new(&mut buf);
            zw.start_file("readme.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            zw.write_all(b"hello").unwrap();
            zw.finish().unwrap();
        }
        let err = read_lines_from_bytes(buf.get_ref()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }
}
