//! Main content part (`word/document.xml`).
//!
//! Each model block maps to one fixed markup pattern. Nothing here inspects
//! text or geometry to decide structure.

use crate::error::{Error, Result};
use crate::model::{
    Block, Document, Paragraph, Section, Table, TableCell, TextRun, TextStyle, LIST_STYLE_ID,
    TABLE_STYLE_ID,
};
use crate::render::RenderOptions;

use super::parts::MediaTable;
use super::xml::XmlWriter;

/// Twentieths of a point per point.
pub(crate) const TWIPS_PER_POINT: f32 = 20.0;
/// English Metric Units per point.
pub(crate) const EMU_PER_POINT: f32 = 12_700.0;
/// One inch page margin, in twips.
pub(crate) const PAGE_MARGIN: u32 = 1440;
/// List indentation per level, in twips.
const LIST_INDENT: u32 = 360;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

pub(crate) fn twips(points: f32) -> u32 {
    (points * TWIPS_PER_POINT).round().max(0.0) as u32
}

fn emu(points: f32) -> u64 {
    (points * EMU_PER_POINT).round().max(0.0) as u64
}

/// Render the content part of a document.
pub(crate) fn document_xml(
    doc: &Document,
    media: &MediaTable,
    options: &RenderOptions,
) -> Result<String> {
    let mut writer = ContentWriter {
        xml: XmlWriter::new(),
        media,
        options,
        drawing_id: 0,
    };
    writer.document(doc)?;
    Ok(writer.xml.finish())
}

struct ContentWriter<'a> {
    xml: XmlWriter,
    media: &'a MediaTable,
    options: &'a RenderOptions,
    drawing_id: u32,
}

impl ContentWriter<'_> {
    fn document(&mut self, doc: &Document) -> Result<()> {
        self.xml.open(
            "w:document",
            &[
                ("xmlns:w", NS_W),
                ("xmlns:r", NS_R),
                ("xmlns:wp", NS_WP),
                ("xmlns:a", NS_A),
                ("xmlns:pic", NS_PIC),
            ],
        );
        self.xml.open("w:body", &[]);

        let last = doc.sections.len().saturating_sub(1);
        for (index, section) in doc.sections.iter().enumerate() {
            for block in &section.blocks {
                self.block(block, section)?;
            }
            if index < last {
                // A section other than the last closes with a paragraph
                // carrying its properties.
                self.xml.open("w:p", &[]).open("w:pPr", &[]);
                self.section_properties(section);
                self.xml.close("w:pPr").close("w:p");
            }
        }
        match doc.sections.last() {
            Some(section) => self.section_properties(section),
            None => self.section_properties(&Section::letter()),
        }

        self.xml.close("w:body").close("w:document");
        Ok(())
    }

    fn section_properties(&mut self, section: &Section) {
        let width = twips(section.page_width).to_string();
        let height = twips(section.page_height).to_string();
        let margin = PAGE_MARGIN.to_string();

        self.xml.open("w:sectPr", &[]);
        if section.is_landscape() {
            self.xml.empty(
                "w:pgSz",
                &[("w:w", &width), ("w:h", &height), ("w:orient", "landscape")],
            );
        } else {
            self.xml
                .empty("w:pgSz", &[("w:w", &width), ("w:h", &height)]);
        }
        self.xml.empty(
            "w:pgMar",
            &[
                ("w:top", &margin),
                ("w:right", &margin),
                ("w:bottom", &margin),
                ("w:left", &margin),
                ("w:header", "720"),
                ("w:footer", "720"),
                ("w:gutter", "0"),
            ],
        );
        self.xml.close("w:sectPr");
    }

    fn block(&mut self, block: &Block, section: &Section) -> Result<()> {
        match block {
            Block::Paragraph(p) => self.paragraph(p),
            Block::Table(t) => self.table(t, section),
            Block::Image {
                resource_id,
                alt_text,
                width,
                height,
            } => {
                if self.options.embed_images {
                    self.image(resource_id, alt_text.as_deref(), *width, *height)?;
                }
            }
            Block::PageBreak => {
                if self.options.page_breaks {
                    self.xml
                        .open("w:p", &[])
                        .open("w:r", &[])
                        .empty("w:br", &[("w:type", "page")])
                        .close("w:r")
                        .close("w:p");
                }
            }
        }
        Ok(())
    }

    fn paragraph(&mut self, paragraph: &Paragraph) {
        self.xml.open("w:p", &[]).open("w:pPr", &[]);
        self.xml
            .empty("w:pStyle", &[("w:val", &paragraph.style.style_id)]);
        if let Some(info) = &paragraph.style.list_info {
            debug_assert_eq!(paragraph.style.style_id, LIST_STYLE_ID);
            let left = (LIST_INDENT * 2 * (u32::from(info.level) + 1)).to_string();
            let hanging = LIST_INDENT.to_string();
            self.xml
                .empty("w:ind", &[("w:left", &left), ("w:hanging", &hanging)]);
        }
        self.xml.close("w:pPr");

        for run in &paragraph.content {
            self.run(run);
        }
        self.xml.close("w:p");
    }

    fn run(&mut self, run: &TextRun) {
        if run.text.is_empty() {
            return;
        }
        self.xml.open("w:r", &[]);
        if run.style.has_styling() {
            self.run_properties(&run.style);
        }
        self.xml
            .element("w:t", &[("xml:space", "preserve")], &run.text);
        self.xml.close("w:r");
    }

    fn run_properties(&mut self, style: &TextStyle) {
        self.xml.open("w:rPr", &[]);
        if let Some(font) = &style.font_name {
            self.xml.empty(
                "w:rFonts",
                &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font)],
            );
        }
        if style.bold {
            self.xml.empty("w:b", &[]);
        }
        if style.italic {
            self.xml.empty("w:i", &[]);
        }
        if let Some(size) = style.font_size {
            let half_points = half_points(size);
            self.xml
                .empty("w:sz", &[("w:val", &half_points)])
                .empty("w:szCs", &[("w:val", &half_points)]);
        }
        if style.underline {
            self.xml.empty("w:u", &[("w:val", "single")]);
        }
        self.xml.close("w:rPr");
    }

    fn table(&mut self, table: &Table, section: &Section) {
        if table.column_count == 0 || table.row_count == 0 {
            return;
        }
        let widths = grid_widths(table, section);

        self.xml.open("w:tbl", &[]).open("w:tblPr", &[]);
        self.xml
            .empty("w:tblStyle", &[("w:val", TABLE_STYLE_ID)])
            .empty("w:tblW", &[("w:w", "0"), ("w:type", "auto")]);
        if !self.options.table_borders {
            self.xml.open("w:tblBorders", &[]);
            for edge in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
                self.xml.empty(edge, &[("w:val", "nil")]);
            }
            self.xml.close("w:tblBorders");
        }
        self.xml
            .empty("w:tblLook", &[("w:val", "04A0"), ("w:firstRow", "0")]);
        self.xml.close("w:tblPr");

        self.xml.open("w:tblGrid", &[]);
        for width in &widths {
            self.xml
                .empty("w:gridCol", &[("w:w", &width.to_string())]);
        }
        self.xml.close("w:tblGrid");

        for row in 0..table.row_count {
            self.xml.open("w:tr", &[]);
            let mut col = 0;
            while col < table.column_count {
                match table.cell_at(row, col) {
                    Some(cell) if cell.row == row => {
                        self.cell(cell, &widths, CellRole::Anchor);
                        col = cell.col + cell.col_span;
                    }
                    Some(cell) => {
                        self.cell(cell, &widths, CellRole::Continuation);
                        col = cell.col + cell.col_span;
                    }
                    None => {
                        let filler = TableCell::empty(row, col);
                        self.cell(&filler, &widths, CellRole::Anchor);
                        col += 1;
                    }
                }
            }
            self.xml.close("w:tr");
        }
        self.xml.close("w:tbl");
    }

    fn cell(&mut self, cell: &TableCell, widths: &[u32], role: CellRole) {
        let end = (cell.col + cell.col_span).min(widths.len());
        let width: u32 = widths[cell.col.min(end)..end].iter().sum();

        self.xml.open("w:tc", &[]).open("w:tcPr", &[]);
        self.xml.empty(
            "w:tcW",
            &[("w:w", &width.to_string()), ("w:type", "dxa")],
        );
        if cell.col_span > 1 {
            self.xml
                .empty("w:gridSpan", &[("w:val", &cell.col_span.to_string())]);
        }
        match role {
            CellRole::Anchor if cell.row_span > 1 => {
                self.xml.empty("w:vMerge", &[("w:val", "restart")]);
            }
            CellRole::Continuation => {
                self.xml.empty("w:vMerge", &[]);
            }
            CellRole::Anchor => {}
        }
        self.xml.close("w:tcPr");

        let paragraphs = match role {
            CellRole::Anchor => cell.content.as_slice(),
            CellRole::Continuation => &[],
        };
        if paragraphs.is_empty() {
            // Every cell needs at least one paragraph.
            self.xml.empty("w:p", &[]);
        }
        for paragraph in paragraphs {
            self.paragraph(paragraph);
        }
        self.xml.close("w:tc");
    }

    fn image(
        &mut self,
        resource_id: &str,
        alt_text: Option<&str>,
        width: f32,
        height: f32,
    ) -> Result<()> {
        let entry = self.media.get(resource_id).ok_or_else(|| {
            Error::PackageIntegrity(format!("no media planned for resource {}", resource_id))
        })?;

        self.drawing_id += 1;
        let id = self.drawing_id.to_string();
        let name = format!("Picture {}", id);
        let cx = emu(width).to_string();
        let cy = emu(height).to_string();
        let description = alt_text.unwrap_or_default();

        let xml = &mut self.xml;
        xml.open("w:p", &[]).open("w:r", &[]).open("w:drawing", &[]);
        xml.open(
            "wp:inline",
            &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
        );
        xml.empty("wp:extent", &[("cx", &cx), ("cy", &cy)]);
        xml.empty(
            "wp:docPr",
            &[("id", &id), ("name", &name), ("descr", description)],
        );
        xml.open("wp:cNvGraphicFramePr", &[])
            .empty("a:graphicFrameLocks", &[("noChangeAspect", "1")])
            .close("wp:cNvGraphicFramePr");
        xml.open("a:graphic", &[])
            .open("a:graphicData", &[("uri", NS_PIC)])
            .open("pic:pic", &[]);
        xml.open("pic:nvPicPr", &[])
            .empty("pic:cNvPr", &[("id", &id), ("name", entry.target())])
            .empty("pic:cNvPicPr", &[])
            .close("pic:nvPicPr");
        xml.open("pic:blipFill", &[])
            .empty("a:blip", &[("r:embed", &entry.rel_id)])
            .open("a:stretch", &[])
            .empty("a:fillRect", &[])
            .close("a:stretch")
            .close("pic:blipFill");
        xml.open("pic:spPr", &[])
            .open("a:xfrm", &[])
            .empty("a:off", &[("x", "0"), ("y", "0")])
            .empty("a:ext", &[("cx", &cx), ("cy", &cy)])
            .close("a:xfrm")
            .open("a:prstGeom", &[("prst", "rect")])
            .empty("a:avLst", &[])
            .close("a:prstGeom")
            .close("pic:spPr");
        xml.close("pic:pic").close("a:graphicData").close("a:graphic");
        xml.close("wp:inline")
            .close("w:drawing")
            .close("w:r")
            .close("w:p");
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum CellRole {
    Anchor,
    Continuation,
}

/// Font size in half-points, as `w:sz` expects.
pub(crate) fn half_points(size: f32) -> String {
    ((size * 2.0).round().max(1.0) as u32).to_string()
}

/// Grid column widths in twips.
///
/// Measured column widths are used when the table carries one per column;
/// otherwise the text width of the section is shared evenly.
fn grid_widths(table: &Table, section: &Section) -> Vec<u32> {
    let measured = table.column_widths.len() == table.column_count
        && table.column_widths.iter().all(|w| w.is_finite() && *w > 0.0);
    if measured {
        return table.column_widths.iter().map(|&w| twips(w)).collect();
    }
    let text_width = twips(section.page_width).saturating_sub(2 * PAGE_MARGIN);
    let width = text_width / table.column_count.max(1) as u32;
    vec![width; table.column_count]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ListInfo, ParagraphStyle, Resource};

    fn render(doc: &Document, options: &RenderOptions) -> String {
        let media = MediaTable::collect(doc, options).unwrap();
        document_xml(doc, &media, options).unwrap()
    }

    #[test]
    fn test_heading_and_runs() {
        let mut doc = Document::new();
        doc.push_block(Block::Paragraph(Paragraph::heading("Intro", 1)));
        let mut body = Paragraph::with_text("plain ");
        body.add_run(TextRun::bold("bold"));
        doc.push_block(Block::Paragraph(body));

        let xml = render(&doc, &RenderOptions::default());
        assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(xml.contains(
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">bold</w:t></w:r>"#
        ));
        assert!(xml.contains(r#"<w:t xml:space="preserve">plain </w:t>"#));
    }

    #[test]
    fn test_run_properties_follow_schema_order() {
        let mut run = TextRun::new("note");
        run.style = TextStyle {
            bold: true,
            underline: true,
            font_size: Some(14.0),
            ..Default::default()
        };
        let mut paragraph = Paragraph::new();
        paragraph.add_run(run);
        let mut doc = Document::new();
        doc.push_block(Block::Paragraph(paragraph));

        let xml = render(&doc, &RenderOptions::default());
        assert!(xml.contains(
            r#"<w:rPr><w:b/><w:sz w:val="28"/><w:szCs w:val="28"/><w:u w:val="single"/></w:rPr>"#
        ));
    }

    #[test]
    fn test_list_indent() {
        let mut doc = Document::new();
        let mut item = Paragraph::with_text("2. nested");
        item.style = ParagraphStyle::list(ListInfo::numbered(1, 2, Default::default()));
        doc.push_block(Block::Paragraph(item));

        let xml = render(&doc, &RenderOptions::default());
        assert!(xml.contains(
            r#"<w:pStyle w:val="ListParagraph"/><w:ind w:left="1440" w:hanging="360"/>"#
        ));
        assert!(xml.contains("2. nested"));
    }

    #[test]
    fn test_merged_cells() {
        let mut table = Table::new(2, 2);
        table.add_cell(TableCell::text(0, 0, "wide").span(1, 2));
        table.add_cell(TableCell::text(1, 0, "tall"));
        table.add_cell(TableCell::text(1, 1, "x"));
        table.column_widths = vec![100.0, 50.0];

        let mut doc = Document::new();
        doc.push_block(Block::Table(table));
        let xml = render(&doc, &RenderOptions::default());

        assert!(xml.contains(r#"<w:gridCol w:w="2000"/><w:gridCol w:w="1000"/>"#));
        assert!(xml.contains(r#"<w:tcW w:w="3000" w:type="dxa"/><w:gridSpan w:val="2"/>"#));
        assert_eq!(xml.matches("<w:tc>").count(), 3);
    }

    #[test]
    fn test_vertical_merge() {
        let mut table = Table::new(2, 2);
        table.add_cell(TableCell::text(0, 0, "tall").span(2, 1));
        table.add_cell(TableCell::text(0, 1, "a"));
        table.add_cell(TableCell::text(1, 1, "b"));

        let mut doc = Document::new();
        doc.push_block(Block::Table(table));
        let xml = render(&doc, &RenderOptions::default());

        assert!(xml.contains(r#"<w:vMerge w:val="restart"/>"#));
        assert!(xml.contains("<w:vMerge/></w:tcPr><w:p/>"));
        assert_eq!(xml.matches("tall").count(), 1);
    }

    #[test]
    fn test_page_breaks_and_sections() {
        let mut doc = Document::new();
        let mut portrait = Section::letter();
        portrait.add_block(Block::Paragraph(Paragraph::with_text("one")));
        portrait.add_block(Block::PageBreak);
        portrait.add_block(Block::Paragraph(Paragraph::with_text("two")));
        doc.add_section(portrait);
        let mut landscape = Section::new(792.0, 612.0);
        landscape.add_block(Block::Paragraph(Paragraph::with_text("three")));
        doc.add_section(landscape);

        let xml = render(&doc, &RenderOptions::default());
        assert_eq!(xml.matches(r#"<w:br w:type="page"/>"#).count(), 1);
        assert_eq!(xml.matches("<w:sectPr>").count(), 2);
        assert!(xml.contains(r#"<w:pgSz w:w="12240" w:h="15840"/>"#));
        assert!(xml.contains(r#"<w:pgSz w:w="15840" w:h="12240" w:orient="landscape"/>"#));

        let xml = render(&doc, &RenderOptions::default().with_page_breaks(false));
        assert!(!xml.contains(r#"w:type="page""#));
    }

    #[test]
    fn test_inline_image() {
        let mut doc = Document::new();
        let resource = Resource::png(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        let id = doc.intern_resource(resource);
        doc.push_block(Block::image(id, 72.0, 36.0));

        let xml = render(&doc, &RenderOptions::default());
        assert!(xml.contains(r#"<wp:extent cx="914400" cy="457200"/>"#));
        assert!(xml.contains(r#"<a:blip r:embed="rId2"/>"#));
    }

    #[test]
    fn test_empty_document_has_section() {
        let xml = render(&Document::new(), &RenderOptions::default());
        assert!(xml.contains("<w:body><w:sectPr>"));
    }
}
