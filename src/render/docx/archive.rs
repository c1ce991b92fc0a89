//! Deterministic archive writing and reading.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use super::parts::Part;
use crate::error::Result;

/// Deflate with the fixed 1980-01-01 timestamp, so equal parts give equal bytes.
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Write parts into a zip archive in the given order.
pub(crate) fn write_archive(parts: &[Part]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for part in parts {
        zip.start_file(part.name.as_str(), entry_options())?;
        zip.write_all(&part.data)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Read every file entry of a zip archive, in archive order.
pub(crate) fn read_archive(bytes: &[u8]) -> Result<Vec<Part>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut parts = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        parts.push(Part {
            name: file.name().to_string(),
            data,
        });
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> Vec<Part> {
        vec![
            Part {
                name: "b.xml".into(),
                data: b"<b/>".to_vec(),
            },
            Part {
                name: "a/c.bin".into(),
                data: vec![0; 512],
            },
        ]
    }

    #[test]
    fn test_archive_round_trip_keeps_order() {
        let bytes = write_archive(&parts()).unwrap();
        let read = read_archive(&bytes).unwrap();
        assert_eq!(read, parts());
    }

    #[test]
    fn test_archive_is_deterministic() {
        assert_eq!(
            write_archive(&parts()).unwrap(),
            write_archive(&parts()).unwrap()
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(read_archive(b"not a zip").is_err());
    }
}
