//! Document normaliser: uploaded files → [`NormalizedDocument`].
//!
//! ```text
//! SourceFile ──▶ DocumentKind::detect ──┬─ Text / Markdown ─▶ text::normalize_text
//!                                       ├─ Docx ────────────▶ docx::normalize_docx
//!                                       └─ Pdf ─────────────▶ pdf::normalize_pdf
//! ```
//!
//! Notes are normalised with images; the question bank in text-only mode
//! (`extract_images = false`), which skips image extraction and page renders.
//! A batch is all-or-nothing: the first failing file aborts it.

pub mod docx;
pub mod encode;
pub mod pdf;
pub mod text;

use crate::config::{DEDUP_PREFIX_LEN, RENDER_SCALE, SCAN_TEXT_THRESHOLD};
use crate::document::{ImagePart, NormalizedDocument, SourceFile};
use crate::error::AnswerKitError;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Visible separator between the texts of consecutive files in a batch.
pub const BATCH_SEPARATOR: &str = "\n\n---\n\n";

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// Collect embedded images and scanned-page renders.
    pub extract_images: bool,
    pub scan_text_threshold: usize,
    pub render_scale: f32,
    pub dedup_prefix_len: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            extract_images: true,
            scan_text_threshold: SCAN_TEXT_THRESHOLD,
            render_scale: RENDER_SCALE,
            dedup_prefix_len: DEDUP_PREFIX_LEN,
        }
    }
}

impl NormalizeOptions {
    pub fn text_only() -> Self {
        Self {
            extract_images: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Declared MIME type first, then extension, then magic bytes.
    pub fn detect(file: &SourceFile) -> Result<Self, AnswerKitError> {
        if let Some(kind) = file.mime_type.as_deref().and_then(Self::from_mime) {
            return Ok(kind);
        }

        let ext = Path::new(&file.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("txt") | Some("text") => return Ok(DocumentKind::Text),
            Some("md") | Some("markdown") => return Ok(DocumentKind::Markdown),
            Some("pdf") => return Ok(DocumentKind::Pdf),
            Some("docx") => return Ok(DocumentKind::Docx),
            Some("doc") => {
                return Err(AnswerKitError::UnsupportedFileType {
                    file: file.name.clone(),
                    detail: "legacy binary .doc; save it as .docx".into(),
                })
            }
            _ => {}
        }

        if file.bytes.starts_with(b"%PDF") {
            return Ok(DocumentKind::Pdf);
        }
        if file.bytes.starts_with(b"PK\x03\x04") {
            return Ok(DocumentKind::Docx);
        }
        if file.mime_type.as_deref().is_some_and(|m| m.starts_with("text/")) {
            return Ok(DocumentKind::Text);
        }

        Err(AnswerKitError::UnsupportedFileType {
            file: file.name.clone(),
            detail: match file.mime_type.as_deref() {
                Some(m) => format!("type '{m}' is not recognised"),
                None => "unknown extension and content".into(),
            },
        })
    }

    fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Some(DocumentKind::Text),
            "text/markdown" | "text/x-markdown" => Some(DocumentKind::Markdown),
            "application/pdf" => Some(DocumentKind::Pdf),
            DOCX_MIME => Some(DocumentKind::Docx),
            _ => None,
        }
    }
}

/// Images in insertion order, skipping any whose base64 payload starts with
/// the same `prefix_len` characters as one already kept.
pub(crate) struct ImageSet {
    prefix_len: usize,
    seen: HashSet<String>,
    images: Vec<ImagePart>,
}

impl ImageSet {
    pub(crate) fn new(prefix_len: usize) -> Self {
        Self {
            prefix_len,
            seen: HashSet::new(),
            images: Vec::new(),
        }
    }

    /// Returns `false` when the image was a duplicate.
    pub(crate) fn push(&mut self, image: ImagePart) -> bool {
        let key: String = image.data.chars().take(self.prefix_len).collect();
        if !self.seen.insert(key) {
            debug!("Skipping duplicate image");
            return false;
        }
        self.images.push(image);
        true
    }

    /// Keep a page render even when its prefix was already seen, so every
    /// scanned page contributes its own image. The key is still recorded.
    pub(crate) fn push_render(&mut self, image: ImagePart) {
        let key: String = image.data.chars().take(self.prefix_len).collect();
        self.seen.insert(key);
        self.images.push(image);
    }

    pub(crate) fn into_images(self) -> Vec<ImagePart> {
        self.images
    }
}

/// Normalise one file.
///
/// # Errors
/// * `UnsupportedFileType` when the kind cannot be detected;
/// * `DocumentParse` when the container is corrupt;
/// * `PdfiumBindingFailed` for PDFs when pdfium is unavailable.
pub async fn normalize_file(
    file: &SourceFile,
    opts: &NormalizeOptions,
) -> Result<NormalizedDocument, AnswerKitError> {
    let kind = DocumentKind::detect(file)?;
    debug!("{}: detected {:?} ({} bytes)", file.name, kind, file.bytes.len());

    match kind {
        DocumentKind::Text | DocumentKind::Markdown => Ok(text::normalize_text(&file.bytes)),
        DocumentKind::Docx => docx::normalize_docx(&file.bytes, opts.extract_images).map_err(
            |detail| AnswerKitError::DocumentParse {
                file: file.name.clone(),
                detail,
            },
        ),
        DocumentKind::Pdf => pdf::normalize_pdf(&file.name, file.bytes.clone(), opts).await,
    }
}

/// Normalise several files into one document, in order.
///
/// Texts are joined with [`BATCH_SEPARATOR`]; images are concatenated.
/// The first failure aborts the batch and no partial document is returned.
pub async fn normalize_batch(
    files: &[SourceFile],
    opts: &NormalizeOptions,
) -> Result<NormalizedDocument, AnswerKitError> {
    let mut texts = Vec::with_capacity(files.len());
    let mut images = Vec::new();

    for file in files {
        let doc = normalize_file(file, opts).await.map_err(|e| match e {
            AnswerKitError::Internal(detail) => AnswerKitError::DocumentParse {
                file: file.name.clone(),
                detail,
            },
            other => other,
        })?;
        texts.push(doc.text);
        images.extend(doc.images);
    }

    let doc = NormalizedDocument {
        text: texts.join(BATCH_SEPARATOR),
        images,
    };
    info!(
        "Normalised {} file(s): {} chars, {} images",
        files.len(),
        doc.text.len(),
        doc.images.len()
    );
    Ok(doc)
}

/// Read a file from disk into a [`SourceFile`].
pub async fn read_source_file(path: &Path) -> Result<SourceFile, AnswerKitError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => AnswerKitError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => AnswerKitError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => AnswerKitError::DocumentParse {
            file: path.display().to_string(),
            detail: e.to_string(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile::new(name, bytes))
}

/// Read and normalise files from disk.
pub async fn normalize_paths(
    paths: &[PathBuf],
    opts: &NormalizeOptions,
) -> Result<NormalizedDocument, AnswerKitError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_source_file(path).await?);
    }
    normalize_batch(&files, opts).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, bytes: &[u8]) -> SourceFile {
        SourceFile::new(name, bytes.to_vec())
    }

    #[test]
    fn detect_prefers_declared_mime() {
        let f = file("notes.bin", b"hello").with_mime_type("text/markdown; charset=utf-8");
        assert_eq!(DocumentKind::detect(&f).unwrap(), DocumentKind::Markdown);
    }

    #[test]
    fn detect_by_extension() {
        assert_eq!(DocumentKind::detect(&file("a.TXT", b"")).unwrap(), DocumentKind::Text);
        assert_eq!(DocumentKind::detect(&file("a.md", b"")).unwrap(), DocumentKind::Markdown);
        assert_eq!(DocumentKind::detect(&file("a.pdf", b"")).unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::detect(&file("a.docx", b"")).unwrap(), DocumentKind::Docx);
    }

    #[test]
    fn detect_by_magic_bytes() {
        assert_eq!(
            DocumentKind::detect(&file("upload", b"%PDF-1.7\n")).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::detect(&file("upload", b"PK\x03\x04rest")).unwrap(),
            DocumentKind::Docx
        );
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let err = DocumentKind::detect(&file("slides.pptx.bak", b"\x00\x01")).unwrap_err();
        assert!(matches!(err, AnswerKitError::UnsupportedFileType { .. }));
        let err = DocumentKind::detect(&file("old.doc", b"")).unwrap_err();
        assert!(err.to_string().contains(".docx"));
    }

    #[test]
    fn image_set_dedups_by_prefix() {
        let mut set = ImageSet::new(4);
        assert!(set.push(ImagePart::new("AAAAxxxx", "image/png")));
        assert!(!set.push(ImagePart::new("AAAAyyyy", "image/png")));
        assert!(set.push(ImagePart::new("BBBBxxxx", "image/png")));
        let images = set.into_images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].data, "AAAAxxxx");
    }

    #[test]
    fn image_set_default_prefix_boundary() {
        let shared = "A".repeat(DEDUP_PREFIX_LEN);

        let mut set = ImageSet::new(DEDUP_PREFIX_LEN);
        assert!(set.push(ImagePart::new(format!("{shared}x"), "image/png")));
        assert!(!set.push(ImagePart::new(format!("{shared}y"), "image/png")));
        assert_eq!(set.into_images().len(), 1);

        let mut differs_at_99 = "A".repeat(DEDUP_PREFIX_LEN - 1);
        differs_at_99.push('B');
        let mut set = ImageSet::new(DEDUP_PREFIX_LEN);
        assert!(set.push(ImagePart::new(format!("{shared}x"), "image/png")));
        assert!(set.push(ImagePart::new(format!("{differs_at_99}x"), "image/png")));
        assert_eq!(set.into_images().len(), 2);
    }

    #[test]
    fn page_renders_are_always_kept() {
        let mut set = ImageSet::new(4);
        set.push_render(ImagePart::new("RRRRpage1", "image/png"));
        set.push_render(ImagePart::new("RRRRpage2", "image/png"));
        assert!(!set.push(ImagePart::new("RRRRembedded", "image/png")));
        let images = set.into_images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].data, "RRRRpage2");
    }

    #[tokio::test]
    async fn batch_joins_text_with_separator() {
        let files = vec![file("a.txt", b"first"), file("b.md", b"# second")];
        let doc = normalize_batch(&files, &NormalizeOptions::default()).await.unwrap();
        assert_eq!(doc.text, "first\n\n---\n\n# second");
        assert!(doc.images.is_empty());
    }

    #[tokio::test]
    async fn batch_fails_on_any_bad_file() {
        let files = vec![file("a.txt", b"fine"), file("broken.docx", b"not a zip")];
        let err = normalize_batch(&files, &NormalizeOptions::default())
            .await
            .unwrap_err();
        match err {
            AnswerKitError::DocumentParse { file, .. } => assert_eq!(file, "broken.docx"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_concatenates_docx_images() {
        let body = r#"<w:document xmlns:w="w" xmlns:a="a" xmlns:r="r"><w:body><w:p><w:r><w:t>fig</w:t></w:r><a:blip r:embed="rId1"/></w:p></w:body></w:document>"#;
        let rels = r#"<Relationships><Relationship Id="rId1" Target="media/i.jpeg"/></Relationships>"#;
        let docx = docx::tests::build_docx(body, Some(rels), &[("word/media/i.jpeg", &b"jpg"[..])]);
        let files = vec![file("a.txt", b"text"), file("b.docx", &docx)];
        let doc = normalize_batch(&files, &NormalizeOptions::default()).await.unwrap();
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.images[0].mime_type, "image/jpeg");
        assert_eq!(doc.text, "text\n\n---\n\nfig");
    }

    #[tokio::test]
    async fn missing_path_is_file_not_found() {
        let err = normalize_paths(
            &[PathBuf::from("/definitely/not/here.txt")],
            &NormalizeOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AnswerKitError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_paths_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "mitochondria").unwrap();
        let doc = normalize_paths(&[path], &NormalizeOptions::text_only())
            .await
            .unwrap();
        assert_eq!(doc.text, "mitochondria");
    }
}
