//! # redocx
//!
//! Layout-driven document reconstruction for Rust.
//!
//! This library takes positioned text and image fragments, as reported by a
//! PDF or OCR extraction provider, and rebuilds the logical structure of the
//! document: lines, paragraphs, columns, headings, lists and tables. The
//! result is a structured document model that serializes to a deterministic
//! DOCX package.
//!
//! ## Quick Start
//!
//! ```no_run
//! use redocx::{render, JsonProvider, Redocx};
//!
//! fn main() -> redocx::Result<()> {
//!     // Load a fragment dump produced by an extraction tool
//!     let provider = JsonProvider::from_file("fragments.json")?;
//!
//!     // Reconstruct and write a DOCX package
//!     let result = Redocx::new().reconstruct(&provider)?;
//!     result.write_docx("output.docx")?;
//!
//!     for skipped in &result.report.skipped {
//!         eprintln!("page {} skipped: {}", skipped.index + 1, skipped.reason);
//!     }
//!     println!("{}", render::to_text(&result.document));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Adaptive thresholds**: line, paragraph and column detection scale with font size
//! - **Structure recovery**: headings from a document-wide style palette, lists, tables with merged cells
//! - **Multi-column reading order**: column bands with full-width blocks
//! - **Deterministic output**: shuffled input produces byte-identical packages
//! - **Parallel processing**: Uses Rayon for per-page analysis
//! - **Integrity checks**: packages are verified before they are written

pub mod error;
pub mod layout;
pub mod model;
pub mod render;

// Re-export commonly used types
pub use error::{Error, Result};
pub use layout::{
    Ambiguity, Cancellation, ConversionReport, ErrorMode, ExtractionProvider, JsonProvider,
    LayoutOptions, MemoryProvider, Pipeline, ProgressEvent, RawItem, RawKind, RawPage,
    Reconstruction, SkippedPage, StyleFlags,
};
pub use model::{
    Block, Document, ListInfo, Metadata, Paragraph, ParagraphStyle, Resource, Section,
    StylePalette, Table, TableCell, TextRun, TextStyle,
};
pub use render::{
    verify_package, ConversionStats, JsonFormat, PackageReport, PageSelection, RenderOptions,
};

use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::Sender;

/// Reconstruct a document from an extraction provider with default options.
///
/// # Example
///
/// ```no_run
/// use redocx::{reconstruct, JsonProvider};
///
/// let provider = JsonProvider::from_file("fragments.json").unwrap();
/// let result = reconstruct(&provider).unwrap();
/// println!("Sections: {}", result.document.sections.len());
/// ```
pub fn reconstruct(provider: &dyn ExtractionProvider) -> Result<Reconstruction> {
    reconstruct_with_options(provider, LayoutOptions::default())
}

/// Reconstruct a document with custom layout options.
///
/// # Example
///
/// ```no_run
/// use redocx::{reconstruct_with_options, JsonProvider, LayoutOptions};
///
/// let provider = JsonProvider::from_file("fragments.json").unwrap();
/// let options = LayoutOptions::new().strict().sequential();
/// let result = reconstruct_with_options(&provider, options).unwrap();
/// ```
pub fn reconstruct_with_options(
    provider: &dyn ExtractionProvider,
    options: LayoutOptions,
) -> Result<Reconstruction> {
    Pipeline::new(provider, options).run()
}

/// Reconstruct a document and serialize it to DOCX bytes.
pub fn to_docx(provider: &dyn ExtractionProvider) -> Result<Vec<u8>> {
    let result = reconstruct(provider)?;
    render::to_docx(&result.document, &RenderOptions::default())
}

/// Convert a JSON fragment dump into a DOCX file.
///
/// # Example
///
/// ```no_run
/// use redocx::convert_file;
///
/// let report = convert_file("fragments.json", "output.docx").unwrap();
/// println!("{} of {} pages", report.pages_processed, report.pages_total);
/// ```
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<ConversionReport> {
    let result = Redocx::new().reconstruct_file(input)?;
    result.write_docx(output)?;
    Ok(result.report)
}

/// Extract plain text from a JSON fragment dump.
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let result = Redocx::new().reconstruct_file(path)?;
    Ok(result.to_text())
}

/// Builder for reconstructing and rendering documents.
///
/// # Example
///
/// ```no_run
/// use redocx::{JsonProvider, PageSelection, Redocx};
///
/// let provider = JsonProvider::from_file("fragments.json")?;
/// let bytes = Redocx::new()
///     .strict()
///     .with_pages(PageSelection::Range(1..=3))
///     .with_page_breaks(false)
///     .reconstruct(&provider)?
///     .to_docx()?;
/// # Ok::<(), redocx::Error>(())
/// ```
pub struct Redocx {
    layout_options: LayoutOptions,
    render_options: RenderOptions,
    cancellation: Option<Arc<Cancellation>>,
    progress: Option<Sender<ProgressEvent>>,
}

impl Redocx {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            layout_options: LayoutOptions::default(),
            render_options: RenderOptions::default(),
            cancellation: None,
            progress: None,
        }
    }

    /// Replace the layout options.
    pub fn with_layout_options(mut self, options: LayoutOptions) -> Self {
        self.layout_options = options;
        self
    }

    /// Replace the render options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Skip unusable pages and report them.
    pub fn lenient(mut self) -> Self {
        self.layout_options = self.layout_options.lenient();
        self
    }

    /// Fail on the first unusable page.
    pub fn strict(mut self) -> Self {
        self.layout_options = self.layout_options.strict();
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.layout_options = self.layout_options.sequential();
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.layout_options = self.layout_options.with_pages(pages);
        self
    }

    /// Enable or disable page breaks between source pages.
    pub fn with_page_breaks(mut self, enabled: bool) -> Self {
        self.render_options = self.render_options.with_page_breaks(enabled);
        self
    }

    /// Enable or disable image embedding.
    pub fn with_images(mut self, enabled: bool) -> Self {
        self.render_options = self.render_options.with_images(enabled);
        self
    }

    /// Enable or disable table borders.
    pub fn with_table_borders(mut self, enabled: bool) -> Self {
        self.render_options = self.render_options.with_table_borders(enabled);
        self
    }

    /// Share a cancellation handle with the pipeline.
    pub fn with_cancellation(mut self, cancellation: Arc<Cancellation>) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Send progress events to a channel.
    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Reconstruct a document from a provider.
    pub fn reconstruct(self, provider: &dyn ExtractionProvider) -> Result<RedocxResult> {
        let mut pipeline = Pipeline::new(provider, self.layout_options);
        if let Some(cancellation) = self.cancellation {
            pipeline = pipeline.with_cancellation(cancellation);
        }
        if let Some(sender) = self.progress {
            pipeline = pipeline.with_progress(sender);
        }
        let Reconstruction { document, report } = pipeline.run()?;
        Ok(RedocxResult {
            document,
            report,
            render_options: self.render_options,
        })
    }

    /// Reconstruct a document from a JSON fragment dump on disk.
    pub fn reconstruct_file<P: AsRef<Path>>(self, path: P) -> Result<RedocxResult> {
        let provider = JsonProvider::from_file(path)?;
        self.reconstruct(&provider)
    }
}

impl Default for Redocx {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of reconstructing a document.
pub struct RedocxResult {
    /// The reconstructed document
    pub document: Document,
    /// Skipped pages, cancelled pages and fallback counts
    pub report: ConversionReport,
    render_options: RenderOptions,
}

impl RedocxResult {
    /// Serialize to DOCX bytes.
    pub fn to_docx(&self) -> Result<Vec<u8>> {
        render::to_docx(&self.document, &self.render_options)
    }

    /// Serialize to a DOCX file.
    pub fn write_docx<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        render::write_docx(&self.document, path, &self.render_options)
    }

    /// Convert to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.document, format)
    }

    /// Convert to plain text.
    pub fn to_text(&self) -> String {
        render::to_text(&self.document)
    }

    /// Document statistics, including the report's page counts.
    pub fn stats(&self) -> ConversionStats {
        ConversionStats::from_document(&self.document).with_report(&self.report)
    }

    /// Get the document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}
