//! Block Segmenter: groups the flat line sequence into question blocks.
//!
//! A block opens at a header line `<TypeLabel>ID: <id>` and runs until the
//! next header or end of stream. Lines before the first header are document
//! preamble and are discarded.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ImportError;
use crate::models::QuestionType;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(单选题|是非题|论述题|计算题)ID[:：]\s*(\S+)\s*$").expect("header regex")
});

/// One question block, carrying its 1-based source line range.
#[derive(Debug, Clone)]
pub struct Block {
    pub question_type: QuestionType,
    pub question_id: String,
    /// Line number of the header.
    pub start_line: usize,
    /// Line number of the last payload line (the header itself for an
    /// otherwise empty block).
    pub end_line: usize,
    /// Payload lines with their source line numbers; excludes the header.
    pub lines: Vec<(usize, String)>,
}

/// Result of segmenting one document: the blocks plus collected header
/// syntax errors, each tagged with its source line.
#[derive(Debug, Default)]
pub struct Segmented {
    pub blocks: Vec<Block>,
    pub header_errors: Vec<(usize, ImportError)>,
}

/// Walk the line stream and cut it into blocks. Header errors are
/// collected, never fatal; the offending line is treated as payload (or
/// preamble) so that segmentation continues.
pub fn segment(lines: &[String]) -> Segmented {
    let mut out = Segmented::default();
    let mut current: Option<Block> = None;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if let Some(caps) = HEADER_RE.captures(line) {
            let label = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let id = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            // The alternation only matches known labels.
            let question_type = QuestionType::from_label(label)
                .expect("header regex label is in the type vocabulary");

            if let Some(block) = current.take() {
                out.blocks.push(block);
            }
            current = Some(Block {
                question_type,
                question_id: id.to_string(),
                start_line: line_no,
                end_line: line_no,
                lines: Vec::new(),
            });
            continue;
        }

        if let Some(message) = malformed_header(line) {
            out.header_errors.push((
                line_no,
                ImportError::HeaderSyntax {
                    line: line_no,
                    message,
                },
            ));
            // Fall through: the line still belongs to whatever block is open.
        }

        if let Some(block) = current.as_mut() {
            block.lines.push((line_no, line.clone()));
            block.end_line = line_no;
        }
        // No block open: preamble, discarded.
    }

    if let Some(block) = current.take() {
        out.blocks.push(block);
    }
    out
}

/// A line that starts with `<TypeLabel>ID` but fails the full header
/// pattern has a malformed id segment. Returns the reason, or `None` for
/// ordinary payload lines.
fn malformed_header(line: &str) -> Option<String> {
    for qt in QuestionType::all() {
        let prefix = format!("{}ID", qt.label());
        if let Some(rest) = line.strip_prefix(&prefix) {
            // The colon must follow the label directly; trimming here would
            // let `单选题ID : sc_001` slip through unreported.
            let Some(id_part) = rest.strip_prefix([':', '：']) else {
                return Some(format!(
                    "expected ':' immediately after '{}' in header-like line",
                    prefix
                ));
            };
            let id_part = id_part.trim();
            if id_part.is_empty() {
                return Some(format!("empty question id after '{}'", prefix));
            }
            if id_part.split_whitespace().count() > 1 {
                return Some(format!(
                    "question id '{}' contains whitespace",
                    id_part
                ));
            }
            // Matched the full pattern after all; not malformed.
            return None;
        }
    }
    None
}
