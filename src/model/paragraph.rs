//! Paragraph and text-level types.

use serde::{Deserialize, Serialize};

use super::style::{heading_style_id, BODY_STYLE_ID, LIST_STYLE_ID};

/// A paragraph of text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    /// Text runs in the paragraph
    pub content: Vec<TextRun>,

    /// Paragraph style
    pub style: ParagraphStyle,
}

impl Paragraph {
    /// Create a new empty body paragraph.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            style: ParagraphStyle::default(),
        }
    }

    /// Create a paragraph with plain text.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.add_text(text);
        p
    }

    /// Create a heading paragraph.
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        let mut p = Self::with_text(text);
        p.style = ParagraphStyle::heading(level);
        p
    }

    /// Add plain text to the paragraph.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.content.push(TextRun::new(text));
    }

    /// Add a styled text run, merging it into the previous run when styles match.
    pub fn add_run(&mut self, run: TextRun) {
        if let Some(last) = self.content.last_mut() {
            if last.style == run.style {
                last.text.push_str(&run.text);
                return;
            }
        }
        self.content.push(run);
    }

    /// Get plain text content of the paragraph.
    pub fn plain_text(&self) -> String {
        self.content.iter().map(|run| run.text.as_str()).collect()
    }

    /// Iterate over the text runs of the paragraph.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.content.iter()
    }

    /// Check if the paragraph is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() || self.plain_text().trim().is_empty()
    }

    /// Check if this is a heading.
    pub fn is_heading(&self) -> bool {
        self.style.heading_level.is_some()
    }

    /// Get the heading level or None.
    pub fn heading_level(&self) -> Option<u8> {
        self.style.heading_level
    }

    /// Check if this is a list item.
    pub fn is_list_item(&self) -> bool {
        self.style.list_info.is_some()
    }
}

impl Default for Paragraph {
    fn default() -> Self {
        Self::new()
    }
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Text styling
    pub style: TextStyle,
}

impl TextRun {
    /// Create a new text run with default style.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }

    /// Create a text run with an explicit style.
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Create a bold text run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                bold: true,
                ..Default::default()
            },
        )
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Text styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    pub bold: bool,

    /// Italic text
    pub italic: bool,

    /// Underlined text
    pub underline: bool,

    /// Font family
    pub font_name: Option<String>,

    /// Font size in points
    pub font_size: Option<f32>,
}

impl TextStyle {
    /// Check if any emphasis or font override is applied.
    pub fn has_styling(&self) -> bool {
        self.bold
            || self.italic
            || self.underline
            || self.font_name.is_some()
            || self.font_size.is_some()
    }
}

/// Paragraph styling properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Named output style (e.g. "Normal", "Heading1", "ListParagraph")
    pub style_id: String,

    /// Heading level (1 = largest) or None for non-heading paragraphs
    pub heading_level: Option<u8>,

    /// List information if this is a list item
    pub list_info: Option<ListInfo>,
}

impl ParagraphStyle {
    /// Body text style.
    pub fn body() -> Self {
        Self {
            style_id: BODY_STYLE_ID.to_string(),
            heading_level: None,
            list_info: None,
        }
    }

    /// Heading style for the given level.
    pub fn heading(level: u8) -> Self {
        let level = level.max(1);
        Self {
            style_id: heading_style_id(level),
            heading_level: Some(level),
            list_info: None,
        }
    }

    /// List paragraph style.
    pub fn list(info: ListInfo) -> Self {
        Self {
            style_id: LIST_STYLE_ID.to_string(),
            heading_level: None,
            list_info: Some(info),
        }
    }
}

impl Default for ParagraphStyle {
    fn default() -> Self {
        Self::body()
    }
}

/// Information about a list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListInfo {
    /// List style (ordered or unordered)
    pub style: ListStyle,

    /// Nesting level (0 = top level)
    pub level: u8,

    /// Item number for ordered lists
    pub item_number: Option<u32>,
}

impl ListInfo {
    /// Create a new bulleted list item.
    pub fn bullet(level: u8, marker: char) -> Self {
        Self {
            style: ListStyle::Unordered { marker },
            level,
            item_number: None,
        }
    }

    /// Create a new numbered list item.
    pub fn numbered(level: u8, number: u32, number_style: NumberStyle) -> Self {
        Self {
            style: ListStyle::Ordered { number_style },
            level,
            item_number: Some(number),
        }
    }

    /// Check if this is an ordered item.
    pub fn is_ordered(&self) -> bool {
        matches!(self.style, ListStyle::Ordered { .. })
    }
}

/// List style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListStyle {
    /// Ordered (numbered) list
    Ordered {
        /// Number style
        number_style: NumberStyle,
    },
    /// Unordered (bulleted) list
    Unordered {
        /// Bullet character
        marker: char,
    },
}

/// Number style for ordered lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStyle {
    /// 1, 2, 3, ...
    #[default]
    Decimal,
    /// a, b, c, ...
    LowerAlpha,
    /// A, B, C, ...
    UpperAlpha,
}
