//! Package planning: media allocation, relationships and part list.
//!
//! Everything here runs before a single byte of the archive is written.
//! Parts come out in one fixed order and relationship ids are allocated in
//! first-use order, so a document always maps to the same package.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use md5::{Digest, Md5};

use super::content::document_xml;
use super::styles::styles_xml;
use super::verify::{verify_parts, PackageReport};
use super::xml::XmlWriter;
use crate::error::{Error, Result};
use crate::model::{Block, Document, Metadata};
use crate::render::RenderOptions;

pub(crate) const CONTENT_TYPES: &str = "[Content_Types].xml";
pub(crate) const PACKAGE_RELS: &str = "_rels/.rels";
pub(crate) const CORE_PROPS: &str = "docProps/core.xml";
pub(crate) const APP_PROPS: &str = "docProps/app.xml";
pub(crate) const DOCUMENT: &str = "word/document.xml";
pub(crate) const STYLES: &str = "word/styles.xml";
pub(crate) const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

/// Parts every package must contain.
pub const REQUIRED_PARTS: [&str; 7] = [
    CONTENT_TYPES,
    PACKAGE_RELS,
    CORE_PROPS,
    APP_PROPS,
    DOCUMENT,
    STYLES,
    DOCUMENT_RELS,
];

pub(crate) const STYLES_REL_ID: &str = "rId1";

pub(crate) const NS_CONTENT_TYPES: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";
pub(crate) const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_APP_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub(crate) const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
const CT_XML: &str = "application/xml";
const CT_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const CT_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
const CT_CORE: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const CT_APP: &str = "application/vnd.openxmlformats-officedocument.extended-properties+xml";

/// One file inside the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Path inside the archive, without a leading slash
    pub name: String,
    /// Part bytes
    pub data: Vec<u8>,
}

impl Part {
    fn xml(name: &str, xml: String) -> Self {
        Self {
            name: name.to_string(),
            data: xml.into_bytes(),
        }
    }
}

/// An embedded image as stored in the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    /// Relationship id used by the content part
    pub rel_id: String,
    /// Part name, e.g. `word/media/image1.png`
    pub part_name: String,
    /// MIME type
    pub content_type: String,
    /// File extension
    pub extension: String,
    /// Image bytes
    pub data: Vec<u8>,
}

impl MediaEntry {
    /// Target relative to the content part.
    pub fn target(&self) -> &str {
        self.part_name.trim_start_matches("word/")
    }
}

/// Media deduplicated across the document, in first-use order.
#[derive(Debug, Clone, Default)]
pub struct MediaTable {
    entries: Vec<MediaEntry>,
    by_resource: BTreeMap<String, usize>,
}

impl MediaTable {
    /// Allocate media for every image block the content part will emit.
    ///
    /// Identical bytes under different resource ids share one entry: the
    /// MD5 digest finds candidates and byte equality confirms them.
    pub fn collect(doc: &Document, options: &RenderOptions) -> Result<Self> {
        let mut table = Self::default();
        if !options.embed_images {
            return Ok(table);
        }

        let mut by_digest: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for block in doc.blocks() {
            let Block::Image { resource_id, .. } = block else {
                continue;
            };
            if table.by_resource.contains_key(resource_id) {
                continue;
            }
            let resource = doc.get_resource(resource_id).ok_or_else(|| {
                Error::PackageIntegrity(format!(
                    "image block references missing resource {}",
                    resource_id
                ))
            })?;

            let digest = format!("{:x}", Md5::digest(&resource.data));
            let candidates = by_digest.entry(digest).or_default();
            let existing = candidates
                .iter()
                .copied()
                .find(|&i| table.entries[i].data == resource.data);
            let index = match existing {
                Some(index) => index,
                None => {
                    let index = table.entries.len();
                    let number = index + 1;
                    let extension = resource.extension().to_string();
                    table.entries.push(MediaEntry {
                        rel_id: format!("rId{}", number + 1),
                        part_name: format!("word/media/image{}.{}", number, extension),
                        content_type: resource.mime_type.clone(),
                        extension,
                        data: resource.data.clone(),
                    });
                    candidates.push(index);
                    index
                }
            };
            table.by_resource.insert(resource_id.clone(), index);
        }

        Ok(table)
    }

    /// Media entries in relationship id order.
    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    /// Entry backing a document resource id.
    pub fn get(&self, resource_id: &str) -> Option<&MediaEntry> {
        self.by_resource
            .get(resource_id)
            .and_then(|&i| self.entries.get(i))
    }

    /// Number of distinct media parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no media is embedded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The complete, ordered contents of a package.
#[derive(Debug, Clone)]
pub struct PackagePlan {
    parts: Vec<Part>,
    media: MediaTable,
}

impl PackagePlan {
    /// Lay out every part of the package for a document.
    pub fn build(doc: &Document, options: &RenderOptions) -> Result<Self> {
        let media = MediaTable::collect(doc, options)?;

        let mut parts = vec![
            Part::xml(CONTENT_TYPES, content_types_xml(&media)),
            Part::xml(PACKAGE_RELS, package_rels_xml()),
            Part::xml(CORE_PROPS, core_xml(&doc.metadata)),
            Part::xml(APP_PROPS, app_xml(doc)),
            Part::xml(DOCUMENT, document_xml(doc, &media, options)?),
            Part::xml(STYLES, styles_xml(&doc.palette)),
            Part::xml(DOCUMENT_RELS, document_rels_xml(&media)),
        ];
        parts.extend(media.entries().iter().map(|entry| Part {
            name: entry.part_name.clone(),
            data: entry.data.clone(),
        }));

        debug!(
            "Planned package: {} parts, {} media",
            parts.len(),
            media.len()
        );
        Ok(Self { parts, media })
    }

    /// Run the package integrity checks on the planned parts.
    pub fn validate(&self) -> Result<PackageReport> {
        verify_parts(&self.parts)
    }

    /// Parts in archive order.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Embedded media.
    pub fn media(&self) -> &MediaTable {
        &self.media
    }

    /// Take the parts out of the plan.
    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    /// Look up a part by name.
    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }
}

fn content_types_xml(media: &MediaTable) -> String {
    let mut xml = XmlWriter::new();
    xml.open("Types", &[("xmlns", NS_CONTENT_TYPES)]);
    xml.empty(
        "Default",
        &[("Extension", "rels"), ("ContentType", CT_RELATIONSHIPS)],
    );
    xml.empty("Default", &[("Extension", "xml"), ("ContentType", CT_XML)]);

    let mut extensions: BTreeMap<&str, &str> = BTreeMap::new();
    for entry in media.entries() {
        extensions
            .entry(entry.extension.as_str())
            .or_insert(entry.content_type.as_str());
    }
    for (extension, content_type) in extensions {
        xml.empty(
            "Default",
            &[("Extension", extension), ("ContentType", content_type)],
        );
    }

    for (part, content_type) in [
        (DOCUMENT, CT_DOCUMENT),
        (STYLES, CT_STYLES),
        (CORE_PROPS, CT_CORE),
        (APP_PROPS, CT_APP),
    ] {
        let part_name = format!("/{}", part);
        xml.empty(
            "Override",
            &[("PartName", part_name.as_str()), ("ContentType", content_type)],
        );
    }
    xml.close("Types");
    xml.finish()
}

fn package_rels_xml() -> String {
    let mut xml = XmlWriter::new();
    xml.open("Relationships", &[("xmlns", NS_RELATIONSHIPS)]);
    for (id, rel_type, target) in [
        ("rId1", REL_OFFICE_DOCUMENT, DOCUMENT),
        ("rId2", REL_CORE_PROPS, CORE_PROPS),
        ("rId3", REL_APP_PROPS, APP_PROPS),
    ] {
        xml.empty(
            "Relationship",
            &[("Id", id), ("Type", rel_type), ("Target", target)],
        );
    }
    xml.close("Relationships");
    xml.finish()
}

fn document_rels_xml(media: &MediaTable) -> String {
    let mut xml = XmlWriter::new();
    xml.open("Relationships", &[("xmlns", NS_RELATIONSHIPS)]);
    xml.empty(
        "Relationship",
        &[
            ("Id", STYLES_REL_ID),
            ("Type", REL_STYLES),
            ("Target", "styles.xml"),
        ],
    );
    for entry in media.entries() {
        xml.empty(
            "Relationship",
            &[
                ("Id", entry.rel_id.as_str()),
                ("Type", REL_IMAGE),
                ("Target", entry.target()),
            ],
        );
    }
    xml.close("Relationships");
    xml.finish()
}

fn w3c_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn core_xml(metadata: &Metadata) -> String {
    let mut xml = XmlWriter::new();
    xml.open(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:dcmitype", "http://purl.org/dc/dcmitype/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    );
    for (tag, value) in [
        ("dc:title", &metadata.title),
        ("dc:subject", &metadata.subject),
        ("dc:creator", &metadata.author),
        ("cp:keywords", &metadata.keywords),
    ] {
        if let Some(value) = value {
            xml.element(tag, &[], value);
        }
    }
    // Absent timestamps stay absent so the package does not depend on the clock.
    for (tag, date) in [
        ("dcterms:created", &metadata.created),
        ("dcterms:modified", &metadata.modified),
    ] {
        if let Some(date) = date {
            xml.element(tag, &[("xsi:type", "dcterms:W3CDTF")], &w3c_date(date));
        }
    }
    xml.close("cp:coreProperties");
    xml.finish()
}

fn app_xml(doc: &Document) -> String {
    let pages = doc
        .sections
        .iter()
        .map(|s| 1 + s.blocks.iter().filter(|b| matches!(b, Block::PageBreak)).count())
        .sum::<usize>()
        .max(1)
        .to_string();

    let mut xml = XmlWriter::new();
    xml.open(
        "Properties",
        &[
            (
                "xmlns",
                "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
            ),
            (
                "xmlns:vt",
                "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes",
            ),
        ],
    );
    xml.element("Application", &[], "redocx");
    xml.element("Pages", &[], &pages);
    if let Some(creator) = &doc.metadata.creator {
        xml.element("Company", &[], creator);
    }
    xml.close("Properties");
    xml.finish()
}
