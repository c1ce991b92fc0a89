//! Styles part (`word/styles.xml`) derived from the style palette.

use crate::model::{heading_style_id, StylePalette, BODY_STYLE_ID, LIST_STYLE_ID, TABLE_STYLE_ID};

use super::content::half_points;
use super::xml::XmlWriter;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DEFAULT_FONT: &str = "Calibri";

/// Render the styles part: body, one style per heading level, list
/// paragraphs and the table grid.
pub(crate) fn styles_xml(palette: &StylePalette) -> String {
    let font = palette.body_font.as_deref().unwrap_or(DEFAULT_FONT);
    let body_size = half_points(palette.body_size());

    let mut xml = XmlWriter::new();
    xml.open("w:styles", &[("xmlns:w", NS_W)]);

    xml.open("w:docDefaults", &[])
        .open("w:rPrDefault", &[])
        .open("w:rPr", &[]);
    xml.empty(
        "w:rFonts",
        &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font)],
    );
    xml.empty("w:sz", &[("w:val", &body_size)])
        .empty("w:szCs", &[("w:val", &body_size)]);
    xml.close("w:rPr").close("w:rPrDefault");
    xml.open("w:pPrDefault", &[])
        .open("w:pPr", &[])
        .empty("w:spacing", &[("w:after", "120"), ("w:line", "240"), ("w:lineRule", "auto")])
        .close("w:pPr")
        .close("w:pPrDefault");
    xml.close("w:docDefaults");

    xml.open(
        "w:style",
        &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", BODY_STYLE_ID)],
    );
    xml.empty("w:name", &[("w:val", "Normal")]).empty("w:qFormat", &[]);
    xml.close("w:style");

    for level in 1..=palette.heading_style_count() {
        let id = heading_style_id(level);
        let name = format!("heading {}", level);
        let size = half_points(palette.heading_size(level));
        let outline = (level - 1).to_string();

        xml.open("w:style", &[("w:type", "paragraph"), ("w:styleId", &id)]);
        xml.empty("w:name", &[("w:val", &name)])
            .empty("w:basedOn", &[("w:val", BODY_STYLE_ID)])
            .empty("w:next", &[("w:val", BODY_STYLE_ID)])
            .empty("w:qFormat", &[]);
        xml.open("w:pPr", &[])
            .empty("w:keepNext", &[])
            .empty("w:spacing", &[("w:before", "240"), ("w:after", "120")])
            .empty("w:outlineLvl", &[("w:val", &outline)])
            .close("w:pPr");
        xml.open("w:rPr", &[])
            .empty("w:b", &[])
            .empty("w:sz", &[("w:val", &size)])
            .empty("w:szCs", &[("w:val", &size)])
            .close("w:rPr");
        xml.close("w:style");
    }

    xml.open("w:style", &[("w:type", "paragraph"), ("w:styleId", LIST_STYLE_ID)]);
    xml.empty("w:name", &[("w:val", "List Paragraph")])
        .empty("w:basedOn", &[("w:val", BODY_STYLE_ID)])
        .empty("w:qFormat", &[]);
    xml.open("w:pPr", &[])
        .empty("w:spacing", &[("w:after", "60")])
        .empty("w:ind", &[("w:left", "720")])
        .close("w:pPr");
    xml.close("w:style");

    xml.open("w:style", &[("w:type", "table"), ("w:styleId", TABLE_STYLE_ID)]);
    xml.empty("w:name", &[("w:val", "Table Grid")]);
    xml.open("w:pPr", &[])
        .empty("w:spacing", &[("w:after", "0")])
        .close("w:pPr");
    xml.open("w:tblPr", &[]).open("w:tblBorders", &[]);
    for edge in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
        xml.empty(
            edge,
            &[("w:val", "single"), ("w:sz", "4"), ("w:space", "0"), ("w:color", "auto")],
        );
    }
    xml.close("w:tblBorders");
    xml.open("w:tblCellMar", &[])
        .empty("w:left", &[("w:w", "108"), ("w:type", "dxa")])
        .empty("w:right", &[("w:w", "108"), ("w:type", "dxa")])
        .close("w:tblCellMar");
    xml.close("w:tblPr");
    xml.close("w:style");

    xml.close("w:styles");
    xml.finish()
}
