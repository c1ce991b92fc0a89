//! Package integrity checks.
//!
//! The same checks run on a planned package before it is written and on an
//! existing archive read back from bytes.

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::archive::read_archive;
use super::parts::{
    Part, CONTENT_TYPES, DOCUMENT, DOCUMENT_RELS, PACKAGE_RELS, REL_IMAGE, REQUIRED_PARTS,
    STYLES_REL_ID,
};
use crate::error::{Error, Result};

/// Summary of a package that passed verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReport {
    /// Number of parts
    pub parts: usize,
    /// Relationships across both relationship parts
    pub relationships: usize,
    /// Embedded media parts
    pub media: usize,
    /// Relationship references in the content part
    pub references: usize,
}

/// Open an archive and check that it is a self-consistent package.
pub fn verify_package(bytes: &[u8]) -> Result<PackageReport> {
    let parts = read_archive(bytes)?;
    verify_parts(&parts)
}

#[derive(Debug)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
    external: bool,
}

fn integrity(message: impl Into<String>) -> Error {
    Error::PackageIntegrity(message.into())
}

/// Check a list of parts as a package.
pub(crate) fn verify_parts(parts: &[Part]) -> Result<PackageReport> {
    let mut by_name: BTreeMap<&str, &[u8]> = BTreeMap::new();
    for part in parts {
        if by_name.insert(part.name.as_str(), &part.data).is_some() {
            return Err(integrity(format!("duplicate part {}", part.name)));
        }
    }

    // Step 1: required parts
    for required in REQUIRED_PARTS {
        if !by_name.contains_key(required) {
            return Err(integrity(format!("missing required part {}", required)));
        }
    }

    // Step 2: every XML part is well formed
    for (name, data) in &by_name {
        if name.ends_with(".xml") || name.ends_with(".rels") {
            scan(name, data, |_| Ok(()))?;
        }
    }

    // Step 3: every part has a content type
    let (defaults, overrides) = content_types(by_name[CONTENT_TYPES])?;
    for name in by_name.keys().filter(|n| **n != CONTENT_TYPES) {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !overrides.contains_key(&format!("/{}", name)) && !defaults.contains_key(&extension) {
            return Err(integrity(format!("part {} has no content type", name)));
        }
    }
    for part_name in overrides.keys() {
        if !by_name.contains_key(part_name.trim_start_matches('/')) {
            return Err(integrity(format!(
                "content type declared for missing part {}",
                part_name
            )));
        }
    }

    // Step 4: relationship ids are unique and their targets exist
    let package_rels = relationships(PACKAGE_RELS, by_name[PACKAGE_RELS])?;
    check_targets(PACKAGE_RELS, "", &package_rels, &by_name)?;
    if !package_rels
        .iter()
        .any(|r| resolve("", &r.target) == DOCUMENT)
    {
        return Err(integrity("package relationships do not reach the main document"));
    }

    let document_rels = relationships(DOCUMENT_RELS, by_name[DOCUMENT_RELS])?;
    check_targets(DOCUMENT_RELS, "word/", &document_rels, &by_name)?;
    if !document_rels.iter().any(|r| r.id == STYLES_REL_ID) {
        return Err(integrity(format!(
            "styles relationship {} is missing",
            STYLES_REL_ID
        )));
    }

    // Step 5: every reference in the content part resolves
    let known: BTreeSet<&str> = document_rels.iter().map(|r| r.id.as_str()).collect();
    let mut referenced: BTreeMap<String, usize> = BTreeMap::new();
    scan(DOCUMENT, by_name[DOCUMENT], |element| {
        for (key, value) in attributes(element)? {
            if matches!(key.as_str(), "r:embed" | "r:id" | "r:link") {
                if !known.contains(value.as_str()) {
                    return Err(integrity(format!(
                        "{} references unknown relationship {}",
                        DOCUMENT, value
                    )));
                }
                *referenced.entry(value).or_insert(0) += 1;
            }
        }
        Ok(())
    })?;

    // Step 6: media is stored once and used
    let mut media_targets: BTreeMap<String, usize> = BTreeMap::new();
    for rel in document_rels.iter().filter(|r| r.rel_type == REL_IMAGE) {
        if !referenced.contains_key(&rel.id) {
            return Err(integrity(format!(
                "image relationship {} is never used",
                rel.id
            )));
        }
        *media_targets.entry(resolve("word/", &rel.target)).or_insert(0) += 1;
    }
    for (target, count) in &media_targets {
        if *count > 1 {
            return Err(integrity(format!(
                "media part {} is targeted by {} relationships",
                target, count
            )));
        }
    }
    let media = by_name
        .keys()
        .filter(|n| n.starts_with("word/media/"))
        .count();
    if media != media_targets.len() {
        return Err(integrity(format!(
            "{} media parts but {} image relationships",
            media,
            media_targets.len()
        )));
    }

    Ok(PackageReport {
        parts: by_name.len(),
        relationships: package_rels.len() + document_rels.len(),
        media,
        references: referenced.values().sum(),
    })
}

/// Walk every start and empty element of an XML part.
fn scan(
    name: &str,
    data: &[u8],
    mut visit: impl FnMut(&BytesStart) -> Result<()>,
) -> Result<()> {
    let text = std::str::from_utf8(data)
        .map_err(|e| Error::Xml(format!("{} is not UTF-8: {}", name, e)))?;
    let mut reader = Reader::from_str(text);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
                visit(&e)?;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    roots += 1;
                }
                visit(&e)?;
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Xml(format!("{}: {}", name, e))),
        }
    }

    if depth != 0 || roots != 1 {
        return Err(Error::Xml(format!("{} is not a single well-formed element", name)));
    }
    Ok(())
}

fn attributes(element: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn attribute(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

type ContentTypes = (BTreeMap<String, String>, BTreeMap<String, String>);

fn content_types(data: &[u8]) -> Result<ContentTypes> {
    let mut defaults = BTreeMap::new();
    let mut overrides = BTreeMap::new();
    scan(CONTENT_TYPES, data, |element| {
        let attrs = attributes(element)?;
        match element.name().as_ref() {
            b"Default" => {
                if let (Some(ext), Some(ct)) = (
                    attribute(&attrs, "Extension"),
                    attribute(&attrs, "ContentType"),
                ) {
                    defaults.insert(ext.to_ascii_lowercase(), ct);
                }
            }
            b"Override" => {
                if let (Some(part), Some(ct)) = (
                    attribute(&attrs, "PartName"),
                    attribute(&attrs, "ContentType"),
                ) {
                    overrides.insert(part, ct);
                }
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok((defaults, overrides))
}

fn relationships(name: &str, data: &[u8]) -> Result<Vec<Relationship>> {
    let mut rels: Vec<Relationship> = Vec::new();
    scan(name, data, |element| {
        if element.name().as_ref() != b"Relationship" {
            return Ok(());
        }
        let attrs = attributes(element)?;
        let (Some(id), Some(target)) = (attribute(&attrs, "Id"), attribute(&attrs, "Target"))
        else {
            return Err(integrity(format!("{}: relationship without Id or Target", name)));
        };
        if rels.iter().any(|r| r.id == id) {
            return Err(integrity(format!("{}: duplicate relationship id {}", name, id)));
        }
        rels.push(Relationship {
            id,
            rel_type: attribute(&attrs, "Type").unwrap_or_default(),
            target,
            external: attribute(&attrs, "TargetMode").as_deref() == Some("External"),
        });
        Ok(())
    })?;
    Ok(rels)
}

fn check_targets(
    name: &str,
    base: &str,
    rels: &[Relationship],
    parts: &BTreeMap<&str, &[u8]>,
) -> Result<()> {
    for rel in rels.iter().filter(|r| !r.external) {
        let target = resolve(base, &rel.target);
        if !parts.contains_key(target.as_str()) {
            return Err(integrity(format!(
                "{}: relationship {} targets missing part {}",
                name, rel.id, target
            )));
        }
    }
    Ok(())
}

/// Resolve a relationship target against the directory of its source part.
fn resolve(base: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", base, target),
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
