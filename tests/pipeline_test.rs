//! End-to-end tests for the reconstruction pipeline.

use std::collections::BTreeSet;

use redocx::layout::classify::classify_blocks;
use redocx::layout::table_detector::{detect_tables, row_tolerance};
use redocx::layout::{analyze_page, Ingestor, PaletteBuilder};
use redocx::{
    render, Block, JsonFormat, LayoutOptions, MemoryProvider, ParagraphStyle, Pipeline, RawItem,
    RawPage, RenderOptions,
};

fn text(x0: f32, top: f32, x1: f32, size: f32, s: &str) -> RawItem {
    RawItem::text([x0, top, x1, top + size], s).with_size(size)
}

/// Title, a three-line paragraph, a 3x3 table and a closing paragraph.
fn report_page(index: usize) -> RawPage {
    let mut page = RawPage::new(index).with_size(612.0, 792.0);
    page.push(text(72.0, 72.0, 540.0, 18.0, "Quarterly Report").bold());
    page.push(text(72.0, 100.0, 540.0, 10.0, "Revenue rose in every region"));
    page.push(text(72.0, 112.0, 540.0, 10.0, "while costs stayed flat and"));
    page.push(text(72.0, 124.0, 500.0, 10.0, "margins improved."));

    let rows = [
        ["Region", "Q1", "Q2"],
        ["North", "120", "135"],
        ["South", "98", "104"],
    ];
    for (r, row) in rows.iter().enumerate() {
        let top = 200.0 + r as f32 * 30.0;
        for (c, cell) in row.iter().enumerate() {
            let left = [72.0, 250.0, 420.0][c];
            page.push(text(left, top, left + 100.0, 10.0, cell));
        }
    }

    page.push(text(72.0, 320.0, 540.0, 10.0, "Figures are unaudited."));
    page
}

fn provider(pages: Vec<RawPage>) -> MemoryProvider {
    MemoryProvider::new(pages)
}

fn reconstruct(provider: &MemoryProvider) -> redocx::Reconstruction {
    Pipeline::new(provider, LayoutOptions::default())
        .run()
        .unwrap()
}

fn paragraphs(doc: &redocx::Document) -> Vec<&redocx::Paragraph> {
    doc.blocks()
        .filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
        .collect()
}

fn tables(doc: &redocx::Document) -> Vec<&redocx::Table> {
    doc.blocks()
        .filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
        .collect()
}

fn visible_chars(s: &str) -> BTreeSet<char> {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Deterministic permutation: reverse, then rotate.
fn shuffled(mut page: RawPage, rotate: usize) -> RawPage {
    page.items.reverse();
    let n = page.items.len();
    page.items.rotate_left(rotate % n.max(1));
    page
}

#[test]
fn test_close_lines_form_one_block() {
    let mut page = RawPage::new(0).with_size(612.0, 792.0);
    page.push(text(72.0, 100.0, 400.0, 10.0, "first line"));
    page.push(text(72.0, 112.0, 400.0, 10.0, "second line"));
    page.push(text(72.0, 124.0, 400.0, 10.0, "third line"));
    page.push(text(72.0, 150.0, 400.0, 10.0, "new block"));

    let result = reconstruct(&provider(vec![page]));
    let paras = paragraphs(&result.document);

    assert_eq!(paras.len(), 2);
    assert_eq!(paras[0].plain_text(), "first line second line third line");
    assert_eq!(paras[1].plain_text(), "new block");
    assert!(paras.iter().all(|p| p.style == ParagraphStyle::body()));
}

#[test]
fn test_bold_top_band_block_is_heading_level_1() {
    let result = reconstruct(&provider(vec![report_page(0)]));
    let paras = paragraphs(&result.document);

    assert_eq!(paras[0].plain_text(), "Quarterly Report");
    assert_eq!(paras[0].heading_level(), Some(1));
    assert!(paras[1..].iter().all(|p| !p.is_heading()));
}

#[test]
fn test_two_by_two_grid_becomes_table() {
    let mut page = RawPage::new(0).with_size(612.0, 792.0);
    page.push(text(40.0, 100.0, 200.0, 10.0, "a"));
    page.push(text(340.0, 100.0, 500.0, 10.0, "b"));
    page.push(text(40.0, 130.0, 200.0, 10.0, "c"));
    page.push(text(340.0, 130.0, 500.0, 10.0, "d"));

    let result = reconstruct(&provider(vec![page]));
    let tables = tables(&result.document);

    assert_eq!(tables.len(), 1);
    let table = tables[0];
    assert_eq!((table.row_count, table.column_count), (2, 2));
    assert_eq!(table.cells.len(), 4);
    assert!(table.cells.iter().all(|c| !c.is_merged()));
    assert_eq!(table.cell_at(0, 1).unwrap().plain_text(), "b");
    assert_eq!(table.cell_at(1, 0).unwrap().plain_text(), "c");
    assert!(paragraphs(&result.document).is_empty());
}

#[test]
fn test_two_unaligned_blocks_stay_paragraphs() {
    let mut page = RawPage::new(0).with_size(612.0, 792.0);
    page.push(text(40.0, 100.0, 200.0, 10.0, "left"));
    page.push(text(340.0, 100.0, 500.0, 10.0, "right"));

    let result = reconstruct(&provider(vec![page]));

    assert!(tables(&result.document).is_empty());
    let texts: Vec<String> = paragraphs(&result.document)
        .iter()
        .map(|p| p.plain_text())
        .collect();
    assert_eq!(texts, vec!["left", "right"]);
}

#[test]
fn test_two_column_article_reads_column_by_column() {
    let mut page = RawPage::new(0).with_size(612.0, 792.0);
    let mut column = |x0: f32, x1: f32, first: f32, count: usize, label: &str| {
        for i in 0..count {
            let top = first + i as f32 * 12.0;
            page.push(text(x0, top, x1, 10.0, &format!("{} {}", label, i)));
        }
    };
    column(72.0, 290.0, 100.0, 3, "Left one");
    column(72.0, 290.0, 150.0, 3, "Left two");
    column(320.0, 540.0, 100.0, 6, "Right one");
    column(320.0, 540.0, 190.0, 3, "Right two");

    let result = reconstruct(&provider(vec![page]));
    assert!(tables(&result.document).is_empty());

    let firsts: Vec<String> = paragraphs(&result.document)
        .iter()
        .map(|p| p.plain_text().split(' ').take(3).collect::<Vec<_>>().join(" "))
        .collect();
    assert_eq!(
        firsts,
        vec!["Left one 0", "Left two 0", "Right one 0", "Right two 0"]
    );
}

#[test]
fn test_overlapping_lines_keep_word_boundaries() {
    let mut page = RawPage::new(0).with_size(612.0, 792.0);
    page.push(text(72.0, 10.0, 400.0, 10.0, "one"));
    page.push(text(72.0, 12.0, 400.0, 10.0, "two"));
    page.push(text(72.0, 14.0, 400.0, 10.0, "three"));
    page.push(text(72.0, 40.0, 400.0, 10.0, "four"));

    let result = reconstruct(&provider(vec![page]));
    let texts: Vec<String> = paragraphs(&result.document)
        .iter()
        .map(|p| p.plain_text())
        .collect();
    assert_eq!(texts, vec!["one two three", "four"]);
}

#[test]
fn test_report_structure() {
    let result = reconstruct(&provider(vec![report_page(0)]));
    let doc = &result.document;

    let kinds: Vec<&str> = doc
        .blocks()
        .map(|b| match b {
            Block::Paragraph(p) if p.is_heading() => "heading",
            Block::Paragraph(_) => "paragraph",
            Block::Table(_) => "table",
            Block::Image { .. } => "image",
            Block::PageBreak => "break",
        })
        .collect();
    assert_eq!(kinds, vec!["heading", "paragraph", "table", "paragraph"]);

    let table = tables(doc)[0];
    assert_eq!((table.row_count, table.column_count), (3, 3));
    assert_eq!(table.cell_at(2, 2).unwrap().plain_text(), "104");
}

#[test]
fn test_no_text_loss() {
    let page = report_page(0);
    let input: String = page
        .items
        .iter()
        .filter_map(|item| item.text.clone())
        .collect();

    let result = reconstruct(&provider(vec![page]));
    assert_eq!(
        visible_chars(&result.document.plain_text()),
        visible_chars(&input)
    );
}

#[test]
fn test_classification_is_idempotent() {
    let options = LayoutOptions::default();
    let mut ingestor = Ingestor::new();
    let page = ingestor.ingest(0, &report_page(0)).unwrap();
    let mut palette = PaletteBuilder::new();
    palette.add_fragments(&page.fragments);
    let palette = palette.build(&options.classifier);

    let layout = analyze_page(&page, &palette, &options);
    let mut blocks = layout.blocks.clone();
    let tolerance = row_tolerance(&blocks, &options.table);
    classify_blocks(&mut blocks, &palette, &options.classifier, tolerance);
    detect_tables(&mut blocks, &options);

    let before: Vec<_> = layout.blocks.iter().map(|b| b.kind.clone()).collect();
    let after: Vec<_> = blocks.iter().map(|b| b.kind.clone()).collect();
    assert_eq!(before, after);
}

#[test]
fn test_shuffled_input_gives_identical_output() {
    let reference = provider(vec![report_page(0), report_page(1)]);
    let expected = reconstruct(&reference);
    let expected_json = render::to_json(&expected.document, JsonFormat::Compact).unwrap();
    let expected_docx = render::to_docx(&expected.document, &RenderOptions::default()).unwrap();

    for rotate in [0, 3, 7, 11] {
        let shuffled = provider(vec![
            shuffled(report_page(0), rotate),
            shuffled(report_page(1), rotate + 1),
        ]);
        let result = reconstruct(&shuffled);

        let json = render::to_json(&result.document, JsonFormat::Compact).unwrap();
        assert_eq!(json, expected_json, "rotation {}", rotate);
        let docx = render::to_docx(&result.document, &RenderOptions::default()).unwrap();
        assert_eq!(docx, expected_docx, "rotation {}", rotate);
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let pages: Vec<RawPage> = (0..6).map(report_page).collect();
    let provider = provider(pages);

    let parallel = reconstruct(&provider);
    let sequential = Pipeline::new(&provider, LayoutOptions::default().sequential())
        .run()
        .unwrap();

    assert_eq!(
        render::to_json(&parallel.document, JsonFormat::Compact).unwrap(),
        render::to_json(&sequential.document, JsonFormat::Compact).unwrap()
    );
    assert_eq!(parallel.report, sequential.report);
}

#[test]
fn test_accepted_tables_tile_their_grid() {
    let mut page = report_page(0);
    // A second table with a cell spanning two columns
    let rows: [&[(f32, f32, &str)]; 3] = [
        &[(72.0, 172.0, "A"), (250.0, 350.0, "B"), (420.0, 520.0, "C")],
        &[(72.0, 172.0, "D"), (250.0, 520.0, "E spans")],
        &[(72.0, 172.0, "F"), (250.0, 350.0, "G"), (420.0, 520.0, "H")],
    ];
    for (r, row) in rows.iter().enumerate() {
        let top = 400.0 + r as f32 * 30.0;
        for &(x0, x1, s) in row.iter() {
            page.push(text(x0, top, x1, 10.0, s));
        }
    }

    let result = reconstruct(&provider(vec![page]));
    let tables = tables(&result.document);
    assert_eq!(tables.len(), 2);

    for table in tables {
        for row in 0..table.row_count {
            for col in 0..table.column_count {
                let covering = table.cells.iter().filter(|c| c.covers(row, col)).count();
                assert_eq!(covering, 1, "({}, {})", row, col);
            }
        }
    }
}

#[test]
fn test_json_dump_round_trip_through_provider() {
    let dump = serde_json::to_string(&provider(vec![report_page(0)])).unwrap();
    let json = redocx::JsonProvider::from_json_str(&dump).unwrap();

    let from_json = Pipeline::new(&json, LayoutOptions::default()).run().unwrap();
    let direct = reconstruct(&provider(vec![report_page(0)]));
    assert_eq!(
        from_json.document.plain_text(),
        direct.document.plain_text()
    );
}
