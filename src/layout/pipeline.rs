//! Two-pass reconstruction coordinator.
//!
//! Pass one fetches and ingests every selected page in page order and builds
//! the document-wide [`StylePalette`]. Pass two analyses pages independently,
//! in parallel when enabled, reading only the palette. The coordinator then
//! concatenates page results in page order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::block::Block;
use super::builder::{build_page, PageContent};
use super::classify::classify_blocks;
use super::column::resolve_columns;
use super::fragment::{IngestedPage, Ingestor};
use super::line::assemble_lines;
use super::options::{ErrorMode, LayoutOptions};
use super::palette::PaletteBuilder;
use super::provider::ExtractionProvider;
use super::table_detector::{detect_tables, row_tolerance, TableRegion};
use super::Ambiguity;
use crate::error::{Error, Result};
use crate::model::{self, Document, Section, StylePalette};

/// Result of analysing one page.
#[derive(Debug, Clone)]
pub struct PageLayout {
    /// Page index (0-based)
    pub index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Classified blocks in reading order
    pub blocks: Vec<Block>,
    /// Accepted tables; their block indices refer to `blocks`
    pub tables: Vec<TableRegion>,
    /// Model content in reading order
    pub content: PageContent,
    /// Number of detected columns
    pub column_count: usize,
    /// Fallbacks taken on this page
    pub ambiguities: Vec<Ambiguity>,
}

impl PageLayout {
    fn empty(page: &IngestedPage, options: &LayoutOptions) -> Self {
        let (width, height) = page_size(page, options);
        Self {
            index: page.index,
            width,
            height,
            blocks: Vec::new(),
            tables: Vec::new(),
            content: PageContent::default(),
            column_count: 0,
            ambiguities: Vec::new(),
        }
    }
}

fn page_size(page: &IngestedPage, options: &LayoutOptions) -> (f32, f32) {
    (
        page.width.unwrap_or(options.default_page_size.0),
        page.height.unwrap_or(options.default_page_size.1),
    )
}

/// Run every per-page stage on an ingested page.
pub fn analyze_page(
    page: &IngestedPage,
    palette: &StylePalette,
    options: &LayoutOptions,
) -> PageLayout {
    run_stages(page, palette, options, &|| false)
        .unwrap_or_else(|| PageLayout::empty(page, options))
}

/// Stages with a cancellation check in between; `None` when cancelled.
fn run_stages(
    page: &IngestedPage,
    palette: &StylePalette,
    options: &LayoutOptions,
    cancelled: &dyn Fn() -> bool,
) -> Option<PageLayout> {
    let mut layout = PageLayout::empty(page, options);

    let lines = assemble_lines(&page.fragments, &options.line);
    let blocks = super::block::segment_blocks(lines, &options.block);
    if cancelled() {
        return None;
    }

    let columns = resolve_columns(blocks, &options.column, options.cluster_iteration_cap);
    layout.column_count = columns.column_count();
    layout.ambiguities.extend(columns.ambiguity);
    let mut blocks = columns.blocks;
    if cancelled() {
        return None;
    }

    let tolerance = row_tolerance(&blocks, &options.table);
    let list_ambiguities = classify_blocks(&mut blocks, palette, &options.classifier, tolerance);
    layout.ambiguities.extend(list_ambiguities);
    if cancelled() {
        return None;
    }

    let detection = detect_tables(&mut blocks, options);
    layout.ambiguities.extend(detection.ambiguities);
    if cancelled() {
        return None;
    }

    layout.content = build_page(&blocks, &detection.regions, palette);
    layout.tables = detection.regions;
    layout.blocks = blocks;

    debug!(
        "Page {}: {} blocks, {} columns, {} tables, {} fallbacks",
        page.index + 1,
        layout.blocks.len(),
        layout.column_count,
        layout.tables.len(),
        layout.ambiguities.len()
    );
    Some(layout)
}

/// Cooperative cancellation shared with page workers.
///
/// A cancelled page contributes nothing to the document; cancelling
/// everything aborts the conversion with [`Error::Cancelled`].
#[derive(Debug, Default)]
pub struct Cancellation {
    all: AtomicBool,
    pages: Mutex<BTreeSet<usize>>,
}

impl Cancellation {
    /// Create a handle with nothing cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the whole conversion.
    pub fn cancel_all(&self) {
        self.all.store(true, Ordering::SeqCst);
    }

    /// Cancel a single page (0-based index).
    pub fn cancel_page(&self, index: usize) {
        self.pages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(index);
    }

    /// Whether the whole conversion was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.all.load(Ordering::SeqCst)
    }

    /// Whether a page should stop.
    pub fn is_page_cancelled(&self, index: usize) -> bool {
        self.is_cancelled()
            || self
                .pages
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .contains(&index)
    }
}

/// Progress notifications sent while a conversion runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Conversion started; `total` pages are selected
    Started {
        /// Number of selected pages
        total: usize,
    },
    /// A worker picked up a page
    PageStarted {
        /// Page index (0-based)
        page: usize,
    },
    /// A page was analysed
    PageFinished {
        /// Page index (0-based)
        page: usize,
    },
    /// A page was skipped
    PageSkipped {
        /// Page index (0-based)
        page: usize,
        /// Why
        reason: String,
    },
    /// A page was cancelled
    PageCancelled {
        /// Page index (0-based)
        page: usize,
    },
    /// All pages are done
    Finished,
}

/// A page left out of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPage {
    /// Page index (0-based)
    pub index: usize,
    /// Why the page was skipped
    pub reason: String,
}

/// What happened during a conversion besides the document itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Pages offered by the provider
    pub pages_total: usize,
    /// Pages analysed into the document
    pub pages_processed: usize,
    /// Pages skipped because they could not be ingested
    pub skipped: Vec<SkippedPage>,
    /// Pages cancelled (0-based indices)
    pub cancelled: Vec<usize>,
    /// Fallback counts by category
    pub ambiguities: BTreeMap<String, usize>,
    /// Raw items dropped during ingestion
    pub dropped_items: usize,
}

impl ConversionReport {
    /// Whether every selected page made it into the document.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.cancelled.is_empty()
    }

    /// Total number of fallbacks.
    pub fn ambiguity_count(&self) -> usize {
        self.ambiguities.values().sum()
    }

    fn record(&mut self, ambiguity: &Ambiguity) {
        *self
            .ambiguities
            .entry(ambiguity.category().to_string())
            .or_insert(0) += 1;
    }
}

/// A reconstructed document and its report.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The document
    pub document: Document,
    /// The report
    pub report: ConversionReport,
}

enum PageOutcome {
    Done(Box<PageLayout>),
    Cancelled(usize),
}

/// Reconstruction driver over an extraction provider.
pub struct Pipeline<'a> {
    provider: &'a dyn ExtractionProvider,
    options: LayoutOptions,
    cancellation: Arc<Cancellation>,
    progress: Option<Sender<ProgressEvent>>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline.
    pub fn new(provider: &'a dyn ExtractionProvider, options: LayoutOptions) -> Self {
        Self {
            provider,
            options,
            cancellation: Arc::new(Cancellation::new()),
            progress: None,
        }
    }

    /// Share an existing cancellation handle.
    pub fn with_cancellation(mut self, cancellation: Arc<Cancellation>) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Send progress events to a channel.
    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Handle for cancelling this pipeline from another thread.
    pub fn cancellation(&self) -> Arc<Cancellation> {
        Arc::clone(&self.cancellation)
    }

    /// Layout options in use.
    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            // The observer may have gone away; progress is best effort.
            let _ = sender.send(event);
        }
    }

    /// Run both passes and assemble the document.
    pub fn run(&self) -> Result<Reconstruction> {
        self.options.validate()?;

        let total = self.provider.page_count();
        let mut metadata = self.provider.metadata();
        metadata.page_count = total;

        let mut report = ConversionReport {
            pages_total: total,
            ..Default::default()
        };

        let selected: Vec<usize> = (0..total)
            .filter(|&i| self.options.pages.includes((i + 1) as u32))
            .collect();
        self.emit(ProgressEvent::Started {
            total: selected.len(),
        });

        // Pass 1: ingest in page order and build the palette
        let mut ingestor = Ingestor::new();
        let mut palette_builder = PaletteBuilder::new();
        let mut pages: Vec<IngestedPage> = Vec::with_capacity(selected.len());

        for index in selected {
            if self.cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if self.cancellation.is_page_cancelled(index) {
                report.cancelled.push(index);
                self.emit(ProgressEvent::PageCancelled { page: index });
                continue;
            }

            let ingested = self
                .provider
                .page(index)
                .map_err(|err| match err {
                    Error::Ingestion { .. } | Error::Provider(_) => err,
                    other => Error::ingestion(index, other.to_string()),
                })
                .and_then(|raw| ingestor.ingest(index, &raw));

            match ingested {
                Ok(page) => {
                    palette_builder.add_fragments(&page.fragments);
                    report.dropped_items += page.dropped;
                    pages.push(page);
                }
                Err(err) => {
                    if err.is_fatal() || self.options.error_mode == ErrorMode::Strict {
                        return Err(err);
                    }
                    warn!("Skipping page {}: {}", index + 1, err);
                    let reason = match err {
                        Error::Ingestion { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    self.emit(ProgressEvent::PageSkipped {
                        page: index,
                        reason: reason.clone(),
                    });
                    report.skipped.push(SkippedPage { index, reason });
                }
            }
        }

        let palette = palette_builder.build(&self.options.classifier);

        // Pass 2: independent page workers sharing the palette
        let worker = |page: &IngestedPage| -> PageOutcome {
            let index = page.index;
            if self.cancellation.is_page_cancelled(index) {
                return PageOutcome::Cancelled(index);
            }
            self.emit(ProgressEvent::PageStarted { page: index });
            let is_cancelled = || self.cancellation.is_page_cancelled(index);
            match run_stages(page, &palette, &self.options, &is_cancelled) {
                Some(layout) => {
                    self.emit(ProgressEvent::PageFinished { page: index });
                    PageOutcome::Done(Box::new(layout))
                }
                None => PageOutcome::Cancelled(index),
            }
        };

        let outcomes: Vec<PageOutcome> = if self.options.parallel {
            pages.par_iter().map(worker).collect()
        } else {
            pages.iter().map(worker).collect()
        };

        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Assemble in page order
        let mut document = Document::with_palette(palette);
        document.metadata = metadata;

        for outcome in outcomes {
            match outcome {
                PageOutcome::Done(layout) => {
                    for ambiguity in &layout.ambiguities {
                        report.record(ambiguity);
                    }
                    report.pages_processed += 1;
                    append_page(&mut document, *layout);
                }
                PageOutcome::Cancelled(index) => {
                    self.emit(ProgressEvent::PageCancelled { page: index });
                    report.cancelled.push(index);
                }
            }
        }
        report.cancelled.sort_unstable();

        info!(
            "Reconstructed {} of {} pages ({} skipped, {} cancelled, {} fallbacks)",
            report.pages_processed,
            report.pages_total,
            report.skipped.len(),
            report.cancelled.len(),
            report.ambiguity_count()
        );
        self.emit(ProgressEvent::Finished);

        Ok(Reconstruction { document, report })
    }
}

/// Append one page to the document: a new section when the page size
/// changes, otherwise a page break followed by the page's blocks.
fn append_page(document: &mut Document, layout: PageLayout) {
    let PageLayout {
        width,
        height,
        content,
        ..
    } = layout;
    let PageContent {
        mut blocks,
        resources,
    } = content;

    for (provisional, resource) in resources {
        let id = document.intern_resource(resource);
        if id != provisional {
            for block in blocks.iter_mut() {
                if let model::Block::Image { resource_id, .. } = block {
                    if *resource_id == provisional {
                        *resource_id = id.clone();
                    }
                }
            }
        }
    }

    match document.sections.last_mut() {
        Some(section) if section.fits_page(width, height) => {
            section.add_block(model::Block::PageBreak);
            section.blocks.extend(blocks);
        }
        _ => {
            let mut section = Section::new(width, height);
            section.blocks = blocks;
            document.add_section(section);
        }
    }
}
