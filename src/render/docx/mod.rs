//! DOCX package serializer.
//!
//! The serializer runs single-threaded after every page has been assembled.
//! [`PackagePlan`] lays out all parts and checks them with the same rules as
//! [`verify_package`] before anything is written, so an inconsistent package
//! is never emitted.

mod archive;
mod content;
mod parts;
mod styles;
mod verify;
mod xml;

use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::model::Document;

use super::RenderOptions;

pub use parts::{MediaEntry, MediaTable, PackagePlan, Part, REQUIRED_PARTS};
pub use verify::{verify_package, PackageReport};

/// Serialize a document into DOCX bytes.
pub fn to_docx(doc: &Document, options: &RenderOptions) -> Result<Vec<u8>> {
    let plan = PackagePlan::build(doc, options)?;
    let report = plan.validate()?;
    debug!(
        "Package verified: {} parts, {} relationships, {} media",
        report.parts, report.relationships, report.media
    );
    archive::write_archive(plan.parts())
}

/// Serialize a document and write it to a file.
pub fn write_docx(doc: &Document, path: impl AsRef<Path>, options: &RenderOptions) -> Result<()> {
    let bytes = to_docx(doc, options)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
