//! Plain text rendering of the document model.

use crate::model::{Block, Document};

/// Convert a document to plain text.
///
/// Paragraphs are separated by blank lines, table cells by tabs and page
/// breaks by a form feed.
pub fn to_text(doc: &Document) -> String {
    let mut output = String::new();
    for section in &doc.sections {
        for block in &section.blocks {
            let text = match block {
                Block::Paragraph(p) => p.plain_text(),
                Block::Table(t) => t.plain_text(),
                Block::Image { alt_text, .. } => match alt_text {
                    Some(alt) => format!("[{}]", alt),
                    None => continue,
                },
                Block::PageBreak => {
                    output.push('\u{c}');
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }
            if !output.is_empty() && !output.ends_with('\u{c}') {
                output.push_str("\n\n");
            }
            output.push_str(&text);
        }
    }
    output.trim_end_matches('\u{c}').to_string()
}
