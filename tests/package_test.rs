//! Package-level tests: reconstructed documents written as DOCX archives.

use std::io::{Cursor, Read, Write};

use redocx::{
    render, verify_package, Error, LayoutOptions, MemoryProvider, Metadata, Pipeline, RawItem,
    RawPage, Redocx, RenderOptions,
};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const PNG: [u8; 12] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
];

fn page(index: usize, caption: &str) -> RawPage {
    RawPage::new(index)
        .with_size(612.0, 792.0)
        .with_item(RawItem::text([72.0, 72.0, 400.0, 90.0], "Site Survey").with_size(18.0).bold())
        .with_item(RawItem::text([72.0, 110.0, 500.0, 120.0], caption).with_size(10.0))
        .with_item(RawItem::image([72.0, 140.0, 272.0, 290.0], PNG.to_vec()))
        .with_item(RawItem::text([72.0, 310.0, 500.0, 320.0], "End of page.").with_size(10.0))
}

fn provider() -> MemoryProvider {
    MemoryProvider::new(vec![
        page(0, "The north elevation & <annex>."),
        page(1, "The same photo, shown again."),
    ])
}

fn docx() -> Vec<u8> {
    Redocx::new().reconstruct(&provider()).unwrap().to_docx().unwrap()
}

fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}

fn rezip(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn edit(entries: &mut [(String, Vec<u8>)], name: &str, from: &str, to: &str) {
    let entry = entries.iter_mut().find(|(n, _)| n == name).unwrap();
    let text = String::from_utf8(entry.1.clone()).unwrap();
    assert!(text.contains(from), "{} does not contain {}", name, from);
    entry.1 = text.replacen(from, to, 1).into_bytes();
}

#[test]
fn test_reconstructed_package_verifies() {
    let bytes = docx();
    let report = verify_package(&bytes).unwrap();

    // One shared image referenced from both pages
    assert_eq!(report.media, 1);
    assert_eq!(report.references, 2);

    let names: Vec<String> = entries(&bytes).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names[0], "[Content_Types].xml");
    assert!(names.contains(&"word/media/image1.png".to_string()));
    assert!(!names.contains(&"word/media/image2.png".to_string()));
}

#[test]
fn test_document_text_is_escaped() {
    let bytes = docx();
    let document = entries(&bytes)
        .into_iter()
        .find(|(n, _)| n == "word/document.xml")
        .map(|(_, d)| String::from_utf8(d).unwrap())
        .unwrap();

    assert!(document.contains("The north elevation &amp; &lt;annex&gt;."));
    assert!(document.contains(r#"<w:pStyle w:val="Heading1"/>"#));
    assert!(document.contains(r#"<w:br w:type="page"/>"#));
}

#[test]
fn test_packages_are_byte_identical() {
    assert_eq!(docx(), docx());

    let parallel = Pipeline::new(&provider(), LayoutOptions::default())
        .run()
        .unwrap();
    let sequential = Pipeline::new(&provider(), LayoutOptions::default().sequential())
        .run()
        .unwrap();
    let options = RenderOptions::default();
    assert_eq!(
        render::to_docx(&parallel.document, &options).unwrap(),
        render::to_docx(&sequential.document, &options).unwrap()
    );
}

#[test]
fn test_removing_any_part_is_detected() {
    let original = entries(&docx());
    for (name, _) in &original {
        let remaining: Vec<(String, Vec<u8>)> = original
            .iter()
            .filter(|(n, _)| n != name)
            .cloned()
            .collect();
        assert!(
            verify_package(&rezip(&remaining)).is_err(),
            "removing {} went unnoticed",
            name
        );
    }
}

#[test]
fn test_dangling_relationship_is_fatal() {
    let mut parts = entries(&docx());
    edit(&mut parts, "word/_rels/document.xml.rels", r#"Id="rId2""#, r#"Id="rId7""#);

    let result = verify_package(&rezip(&parts));
    assert!(matches!(result, Err(Error::PackageIntegrity(_))));
}

#[test]
fn test_relationship_to_missing_part_is_fatal() {
    let mut parts = entries(&docx());
    edit(
        &mut parts,
        "word/_rels/document.xml.rels",
        "media/image1.png",
        "media/image5.png",
    );
    assert!(verify_package(&rezip(&parts)).is_err());
}

#[test]
fn test_rezipped_package_still_verifies() {
    let parts = entries(&docx());
    verify_package(&rezip(&parts)).unwrap();
}

#[test]
fn test_images_can_be_left_out() {
    let bytes = Redocx::new()
        .with_images(false)
        .reconstruct(&provider())
        .unwrap()
        .to_docx()
        .unwrap();
    let report = verify_package(&bytes).unwrap();
    assert_eq!(report.media, 0);
    assert_eq!(report.references, 0);
}

#[test]
fn test_provider_metadata_reaches_core_properties() {
    let metadata = Metadata {
        title: Some("Site Survey".into()),
        author: Some("Field Team".into()),
        ..Default::default()
    };
    let bytes = Redocx::new()
        .reconstruct(&provider().with_metadata(metadata))
        .unwrap()
        .to_docx()
        .unwrap();

    let core = entries(&bytes)
        .into_iter()
        .find(|(n, _)| n == "docProps/core.xml")
        .map(|(_, d)| String::from_utf8(d).unwrap())
        .unwrap();
    assert!(core.contains("<dc:title>Site Survey</dc:title>"));
    assert!(core.contains("<dc:creator>Field Team</dc:creator>"));
}

#[test]
fn test_not_a_zip() {
    assert!(matches!(verify_package(b"plain text"), Err(Error::Zip(_))));
}
