//! PDF notes via pdfium.
//!
//! Every page contributes its text layer. When images are wanted, each page
//! also contributes the raster images of its image objects and, if its text
//! layer is shorter than the scan threshold, a full render of the page so a
//! scanned sheet still reaches the model.
//!
//! pdfium is CPU-bound and not async-aware, so the whole document is handled
//! inside `tokio::task::spawn_blocking`.

use super::encode::encode_png;
use super::{ImageSet, NormalizeOptions};
use crate::document::NormalizedDocument;
use crate::error::AnswerKitError;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium shared library (file or directory).
pub const PDFIUM_LIB_PATH_VAR: &str = "PDFIUM_LIB_PATH";

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// The process-wide pdfium instance, bound on first use.
///
/// pdfium keeps global state, so the library is bound once and shared by
/// every PDF of the process.
pub fn pdfium() -> Result<&'static Pdfium, AnswerKitError> {
    PDFIUM.get_or_try_init(bind_pdfium)
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the working directory, then
/// the system library path.
fn bind_pdfium() -> Result<Pdfium, AnswerKitError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_VAR) {
        Ok(path) if !path.trim().is_empty() => {
            if Path::new(&path).is_dir() {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                Pdfium::bind_to_library(path)
            }
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| AnswerKitError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Normalise one PDF. `name` is used in errors and logs.
pub async fn normalize_pdf(
    name: &str,
    bytes: Vec<u8>,
    opts: &NormalizeOptions,
) -> Result<NormalizedDocument, AnswerKitError> {
    let name_owned = name.to_string();
    let opts = opts.clone();

    tokio::task::spawn_blocking(move || normalize_pdf_blocking(&name_owned, bytes, &opts))
        .await
        .map_err(|e| AnswerKitError::Internal(format!("PDF task panicked: {e}")))?
}

fn normalize_pdf_blocking(
    name: &str,
    bytes: Vec<u8>,
    opts: &NormalizeOptions,
) -> Result<NormalizedDocument, AnswerKitError> {
    let pdfium = pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_vec(bytes, None)
        .map_err(|e| AnswerKitError::DocumentParse {
            file: name.to_string(),
            detail: format!("{e:?}"),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(opts.render_scale);
    let mut page_texts = Vec::new();
    let mut images = ImageSet::new(opts.dedup_prefix_len);
    let mut scanned_pages = 0usize;

    for (idx, page) in document.pages().iter().enumerate() {
        let page_num = idx + 1;
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("{name}: page {page_num} has no readable text layer ({e:?})");
                String::new()
            }
        };

        if opts.extract_images {
            for object in page.objects().iter() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };
                match image_object.get_raw_image() {
                    Ok(raw) => match encode_png(&raw) {
                        Ok(part) => {
                            images.push(part);
                        }
                        Err(e) => warn!("{name}: page {page_num} image not encodable: {e}"),
                    },
                    Err(e) => debug!("{name}: page {page_num} image not decodable: {e:?}"),
                }
            }

            if is_scanned(&text, opts.scan_text_threshold) {
                scanned_pages += 1;
                match page.render_with_config(&render_config) {
                    Ok(bitmap) => match encode_png(&bitmap.as_image()) {
                        Ok(part) => images.push_render(part),
                        Err(e) => warn!("{name}: page {page_num} render not encodable: {e}"),
                    },
                    Err(e) => warn!("{name}: page {page_num} could not be rendered: {e:?}"),
                }
            }
        }

        page_texts.push(text);
    }

    let images = images.into_images();
    info!(
        "{name}: {} pages, {} scanned, {} images",
        page_texts.len(),
        scanned_pages,
        images.len()
    );

    Ok(NormalizedDocument {
        text: page_texts.join("\n\n"),
        images,
    })
}

/// A page whose trimmed text is shorter than `threshold` characters.
pub(crate) fn is_scanned(text: &str, threshold: usize) -> bool {
    text.trim().chars().count() < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_counts_as_scanned() {
        assert!(is_scanned("", 100));
        assert!(is_scanned("   Fig. 3   ", 100));
        assert!(!is_scanned(&"a".repeat(100), 100));
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        // 50 two-byte characters: 100 bytes but only 50 chars.
        let text = "é".repeat(50);
        assert!(is_scanned(&text, 60));
    }
}
