//! Integration tests for reading notes and question banks from disk.
//!
//! PDF tests need the pdfium shared library and are skipped when it cannot
//! be bound. Run with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test normalize -- --nocapture

use edgequake_notes2answers::normalize::pdf::pdfium;
use edgequake_notes2answers::normalize::BATCH_SEPARATOR;
use edgequake_notes2answers::{
    normalize_file, normalize_paths, AnswerKitError, NormalizeOptions, SourceFile,
};
use pdfium_render::prelude::*;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

macro_rules! skip_unless_pdfium {
    () => {{
        match pdfium() {
            Ok(p) => p,
            Err(e) => {
                println!("SKIP — pdfium not available: {e}");
                return;
            }
        }
    }};
}

fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn mixed_batch_is_joined_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write(&dir, "a.txt", b"\xEF\xBB\xBFFirst file\r\nsecond line"),
        write(&dir, "b.md", b"# Heading\n\nBody"),
        write(&dir, "c.docx", &minimal_docx(&["Word paragraph one", "Word paragraph two"])),
    ];

    let doc = normalize_paths(&paths, &NormalizeOptions::default())
        .await
        .unwrap();

    let parts: Vec<&str> = doc.text.split(BATCH_SEPARATOR).collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "First file\nsecond line");
    assert_eq!(parts[1], "# Heading\n\nBody");
    assert!(parts[2].contains("Word paragraph one\nWord paragraph two"));
    assert!(doc.images.is_empty());
}

#[tokio::test]
async fn missing_file_aborts_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write(&dir, "ok.txt", b"fine"),
        dir.path().join("does-not-exist.md"),
    ];

    let err = normalize_paths(&paths, &NormalizeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AnswerKitError::FileNotFound { .. }), "got: {err}");
}

#[tokio::test]
async fn corrupt_docx_names_the_file() {
    let file = SourceFile::new("broken.docx", b"PK\x03\x04 definitely not a zip".to_vec());

    let err = normalize_file(&file, &NormalizeOptions::default())
        .await
        .unwrap_err();

    match err {
        AnswerKitError::DocumentParse { file, .. } => assert_eq!(file, "broken.docx"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn legacy_doc_is_unsupported() {
    let file = SourceFile::new("old.doc", vec![0xD0, 0xCF, 0x11, 0xE0]);

    let err = normalize_file(&file, &NormalizeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AnswerKitError::UnsupportedFileType { .. }), "got: {err}");
}

// ── PDF (needs pdfium) ───────────────────────────────────────────────────────

fn blank_pdf(pdfium: &Pdfium, pages: usize) -> Vec<u8> {
    let mut document = pdfium.create_new_pdf().unwrap();
    for _ in 0..pages {
        document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
    }
    document.save_to_bytes().unwrap()
}

#[tokio::test]
async fn scanned_pages_are_rendered_for_notes() {
    let pdfium = skip_unless_pdfium!();
    let bytes = blank_pdf(pdfium, 2);

    let file = SourceFile::new("scan.pdf", bytes);
    let doc = normalize_file(&file, &NormalizeOptions::default())
        .await
        .unwrap();

    // Identical blank renders still give one image per scanned page.
    assert_eq!(doc.images.len(), 2);
    assert!(doc.images.iter().all(|i| i.mime_type == "image/png"));
}

#[tokio::test]
async fn question_bank_pdf_is_text_only() {
    let pdfium = skip_unless_pdfium!();
    let bytes = blank_pdf(pdfium, 1);

    let file = SourceFile::new("bank.pdf", bytes);
    let doc = normalize_file(&file, &NormalizeOptions::text_only())
        .await
        .unwrap();

    assert!(doc.images.is_empty());
    assert!(doc.text.trim().is_empty());
}
